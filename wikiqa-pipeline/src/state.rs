//! Pipeline state carried between node invocations
//!
//! The state bag is a typed record of the well-known fields plus an `extra`
//! map, so fields no node in the pipeline knows about still travel forward.
//! The dispatch layer works on the flattened field map form
//! ([`PipelineState::to_fields`]) and converts back when a node is done.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use wikiqa_core::{
    missing_argument_error, Document, ErrorContext, MultiLabel, WikiqaError, WikiqaResult,
};

pub const QUERY: &str = "query";
pub const QUERIES: &str = "queries";
pub const FILE_PATHS: &str = "file_paths";
pub const LABELS: &str = "labels";
pub const DOCUMENTS: &str = "documents";
pub const META: &str = "meta";
pub const PARAMS: &str = "params";
pub const DEBUG: &str = "debug";
pub const DEBUG_TRACE: &str = "_debug";

/// Overrides keyed by node name, or global overrides keyed by parameter name
pub type Params = Map<String, Value>;

/// Accumulated debug information keyed by node name
pub type DebugTrace = BTreeMap<String, NodeDebugInfo>;

/// Routing label for the `n`-th outgoing edge of a node
pub fn edge(n: usize) -> String {
    format!("output_{}", n)
}

/// Debug data recorded for one node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDebugInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Value>,
}

impl NodeDebugInfo {
    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none() && self.runtime.is_none()
    }
}

/// The state bag handed from node to node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queries: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<MultiLabel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Document>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    #[serde(rename = "_debug", default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugTrace>,
    /// Any other field, forwarded untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(name.to_string(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Debug data recorded for `node`, if any
    pub fn debug_for(&self, node: &str) -> Option<&NodeDebugInfo> {
        self.debug.as_ref().and_then(|trace| trace.get(node))
    }

    /// Flatten into a field map. Absent optional fields produce no key.
    pub fn to_fields(&self) -> WikiqaResult<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(WikiqaError::Internal {
                message: format!("pipeline state serialized to a non-object: {}", other),
                source: None,
                context: ErrorContext::new("pipeline_state").with_operation("to_fields"),
            }),
        }
    }

    pub fn from_fields(fields: Map<String, Value>) -> WikiqaResult<Self> {
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// Fold another branch's state into this one: documents are concatenated,
    /// debug traces unioned, every other field keeps the first value seen.
    pub fn join(&mut self, other: &PipelineState) {
        if let Some(docs) = &other.documents {
            self.documents
                .get_or_insert_with(Vec::new)
                .extend(docs.iter().cloned());
        }
        if let Some(trace) = &other.debug {
            let merged = self.debug.get_or_insert_with(DebugTrace::new);
            for (node, info) in trace {
                merged.entry(node.clone()).or_insert_with(|| info.clone());
            }
        }

        fill(&mut self.query, &other.query);
        fill(&mut self.queries, &other.queries);
        fill(&mut self.file_paths, &other.file_paths);
        fill(&mut self.labels, &other.labels);
        fill(&mut self.meta, &other.meta);
        fill(&mut self.params, &other.params);
        for (key, value) in &other.extra {
            self.extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, other: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(other);
    }
}

/// Arguments handed to a node: exactly the declared fields the state carried,
/// merged with any overrides.
#[derive(Debug, Clone)]
pub struct RunArgs {
    node: String,
    fields: Map<String, Value>,
}

impl RunArgs {
    pub fn new(node: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            node: node.into(),
            fields,
        }
    }

    /// Name of the node the arguments were built for
    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Typed lookup; an absent or `null` field is `None`
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> WikiqaResult<Option<T>> {
        match self.fields.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                WikiqaError::Validation {
                    message: format!(
                        "argument '{}' for the node '{}' has the wrong shape: {}",
                        name, self.node, e
                    ),
                    field: Some(name.to_string()),
                    context: ErrorContext::new("run_args").with_operation("get"),
                }
            }),
        }
    }

    /// Like [`RunArgs::get`] but fails with a missing-argument error
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> WikiqaResult<T> {
        self.get(name)?
            .ok_or_else(|| missing_argument_error!(name, self.node, "run_args"))
    }

    pub fn query(&self) -> WikiqaResult<Option<String>> {
        self.get(QUERY)
    }

    pub fn queries(&self) -> WikiqaResult<Option<Vec<String>>> {
        self.get(QUERIES)
    }

    pub fn file_paths(&self) -> WikiqaResult<Option<Vec<String>>> {
        self.get(FILE_PATHS)
    }

    pub fn labels(&self) -> WikiqaResult<Option<Vec<MultiLabel>>> {
        self.get(LABELS)
    }

    pub fn documents(&self) -> WikiqaResult<Option<Vec<Document>>> {
        self.get(DOCUMENTS)
    }

    pub fn meta(&self) -> WikiqaResult<Option<Map<String, Value>>> {
        self.get(META)
    }
}

/// What a node hands back to the dispatch layer
#[derive(Debug, Clone, Default)]
pub struct NodeOutput {
    pub state: PipelineState,
    /// Node-emitted debug payload, folded into the trace under `runtime`
    pub runtime_debug: Option<Value>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.state.query = Some(query.into());
        self
    }

    pub fn with_documents(mut self, documents: Vec<Document>) -> Self {
        self.state.documents = Some(documents);
        self
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.state.extra.insert(name.to_string(), value.into());
        self
    }

    pub fn with_runtime_debug(mut self, debug: Value) -> Self {
        self.runtime_debug = Some(debug);
        self
    }
}
