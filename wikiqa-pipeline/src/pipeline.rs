//! Pipeline graph that drives components through the dispatch layer
//!
//! Nodes are kept in insertion order, which is also execution order: a node
//! may only take its inputs from the root (`Query` or `File`) or from nodes
//! added before it.

use crate::component::Component;
use crate::config::{ComponentDefinition, PipelineConfig, PipelineDefinition, PipelineNodeDefinition};
use crate::node::RunMode;
use crate::registry::NodeRegistry;
use crate::state::{edge, Params, PipelineState, DEBUG};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use wikiqa_core::{
    integrity_error, log_operation_error, log_operation_start, log_operation_success, performance,
    validation_error, Document, MultiLabel, WikiqaResult,
};

pub const QUERY_ROOT: &str = "Query";
pub const FILE_ROOT: &str = "File";

/// One input reference: `Node` or `Node.output_<n>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInput {
    pub source: String,
    pub edge: Option<String>,
}

impl NodeInput {
    pub fn parse(input: &str) -> Self {
        match input.split_once('.') {
            Some((source, edge)) => Self {
                source: source.to_string(),
                edge: Some(edge.to_string()),
            },
            None => Self {
                source: input.to_string(),
                edge: None,
            },
        }
    }

    pub fn render(&self) -> String {
        match &self.edge {
            Some(edge) => format!("{}.{}", self.source, edge),
            None => self.source.clone(),
        }
    }
}

fn edge_index(label: &str) -> Option<usize> {
    label.strip_prefix("output_")?.parse().ok()
}

#[derive(Debug)]
struct PipelineNode {
    name: String,
    component: Arc<Component>,
    inputs: Vec<NodeInput>,
}

/// Inputs for one pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub query: Option<String>,
    pub queries: Option<Vec<String>>,
    pub file_paths: Option<Vec<String>>,
    pub labels: Option<Vec<MultiLabel>>,
    pub documents: Option<Vec<Document>>,
    pub meta: Option<Map<String, Value>>,
    pub params: Option<Params>,
    /// Record debug data for every node
    pub debug: Option<bool>,
}

impl RunRequest {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// Request used by indexing runs: empty file paths, meta and params
    pub fn indexing() -> Self {
        Self {
            file_paths: Some(Vec::new()),
            meta: Some(Map::new()),
            params: Some(Params::new()),
            ..Self::default()
        }
    }

    fn into_state(self) -> PipelineState {
        PipelineState {
            query: self.query,
            queries: self.queries,
            file_paths: self.file_paths,
            labels: self.labels,
            documents: self.documents,
            meta: self.meta,
            params: self.params,
            ..PipelineState::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct Pipeline {
    root: Option<String>,
    nodes: Vec<PipelineNode>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `component` under `name`, fed by `inputs`
    pub fn add_node(
        &mut self,
        component: Arc<Component>,
        name: &str,
        inputs: &[&str],
    ) -> WikiqaResult<()> {
        if name == QUERY_ROOT || name == FILE_ROOT || self.position(name).is_some() {
            return Err(validation_error!(
                format!("a node named '{}' already exists in the pipeline", name),
                "name",
                "pipeline"
            ));
        }
        if inputs.is_empty() {
            return Err(validation_error!(
                format!("node '{}' needs at least one input", name),
                "inputs",
                "pipeline"
            ));
        }

        let mut parsed = Vec::with_capacity(inputs.len());
        for raw in inputs {
            let input = NodeInput::parse(raw);
            self.check_input(name, &input)?;
            if input.source == QUERY_ROOT || input.source == FILE_ROOT {
                self.root = Some(input.source.clone());
            }
            parsed.push(input);
        }

        component.set_name(name)?;
        debug!(node = name, inputs = ?inputs, "Added node to pipeline");
        self.nodes.push(PipelineNode {
            name: name.to_string(),
            component,
            inputs: parsed,
        });
        Ok(())
    }

    fn check_input(&self, node: &str, input: &NodeInput) -> WikiqaResult<()> {
        let edges = if input.source == QUERY_ROOT || input.source == FILE_ROOT {
            if let Some(root) = self.root.as_ref().filter(|root| **root != input.source) {
                return Err(validation_error!(
                    format!(
                        "node '{}' uses root '{}' but the pipeline already starts at '{}'",
                        node, input.source, root
                    ),
                    "inputs",
                    "pipeline"
                ));
            }
            1
        } else {
            match self.get_node(&input.source) {
                Some(source) => source.outgoing_edges(),
                None => {
                    return Err(validation_error!(
                        format!(
                            "node '{}' takes input from unknown node '{}'",
                            node, input.source
                        ),
                        "inputs",
                        "pipeline"
                    ))
                }
            }
        };

        if let Some(label) = &input.edge {
            match edge_index(label) {
                Some(n) if n >= 1 && n <= edges => {}
                _ => {
                    return Err(validation_error!(
                        format!(
                            "'{}' is not a valid edge of '{}', which has {} outgoing edge(s)",
                            label, input.source, edges
                        ),
                        "inputs",
                        "pipeline"
                    ))
                }
            }
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.name == name)
    }

    pub fn get_node(&self, name: &str) -> Option<Arc<Component>> {
        self.position(name)
            .map(|index| Arc::clone(&self.nodes[index].component))
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub async fn run(&self, request: RunRequest) -> WikiqaResult<PipelineState> {
        performance::measure_async("pipeline_run", self.execute(RunMode::Single, request)).await
    }

    pub async fn run_batch(&self, request: RunRequest) -> WikiqaResult<PipelineState> {
        performance::measure_async("pipeline_run_batch", self.execute(RunMode::Batch, request))
            .await
    }

    async fn execute(&self, mode: RunMode, mut request: RunRequest) -> WikiqaResult<PipelineState> {
        log_operation_start!("pipeline_run", nodes = self.nodes.len());

        if request.debug == Some(true) {
            let params = request.params.get_or_insert_with(Params::new);
            for node in &self.nodes {
                let entry = params
                    .entry(node.name.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(node_params) = entry {
                    node_params.insert(DEBUG.to_string(), Value::Bool(true));
                }
            }
        }

        let root_state = request.into_state();
        let root = self.root.clone().unwrap_or_else(|| QUERY_ROOT.to_string());
        let mut produced: HashMap<String, (PipelineState, String)> = HashMap::new();
        produced.insert(root, (root_state.clone(), edge(1)));
        let mut last = root_state;

        for node in &self.nodes {
            let mut incoming = node.inputs.iter().filter_map(|input| {
                let (state, taken) = produced.get(&input.source)?;
                match &input.edge {
                    Some(wanted) if wanted != taken => None,
                    _ => Some(state),
                }
            });
            let Some(first) = incoming.next() else {
                debug!(node = %node.name, "No input fired, skipping node");
                continue;
            };
            let mut state = first.clone();
            for other in incoming {
                state.join(other);
            }

            let result = match mode {
                RunMode::Single => node.component.dispatch_run(&state).await,
                RunMode::Batch => node.component.dispatch_run_batch(&state).await,
            };
            let (output, label) = match result {
                Ok(result) => result,
                Err(e) => {
                    log_operation_error!("pipeline_run", e);
                    return Err(e);
                }
            };

            match edge_index(&label) {
                Some(n) if n >= 1 && n <= node.component.outgoing_edges() => {}
                _ => {
                    return Err(validation_error!(
                        format!("node '{}' returned unknown edge '{}'", node.name, label),
                        "edge",
                        "pipeline"
                    ))
                }
            }

            produced.insert(node.name.clone(), (output.clone(), label));
            last = output;
        }

        log_operation_success!("pipeline_run");
        Ok(last)
    }

    /// Build the pipeline called `pipeline_name` from a parsed config
    pub fn load_from_config(
        registry: &NodeRegistry,
        config: &PipelineConfig,
        pipeline_name: &str,
    ) -> WikiqaResult<Self> {
        let definition = config.pipeline(pipeline_name).ok_or_else(|| {
            integrity_error!(
                format!("Pipeline '{}' is not defined in the config", pipeline_name),
                "pipeline"
            )
        })?;

        let components = registry.load_many_from_pipeline_config(
            config,
            definition.nodes.iter().map(|node| node.name.as_str()),
        )?;

        let mut pipeline = Pipeline::new();
        for (node, component) in definition.nodes.iter().zip(components) {
            let inputs: Vec<&str> = node.inputs.iter().map(String::as_str).collect();
            pipeline.add_node(component, &node.name, &inputs)?;
        }
        info!(
            pipeline = pipeline_name,
            nodes = pipeline.nodes.len(),
            "Loaded pipeline"
        );
        Ok(pipeline)
    }

    pub fn load_from_yaml<P: AsRef<Path>>(
        registry: &NodeRegistry,
        path: P,
        pipeline_name: &str,
    ) -> WikiqaResult<Self> {
        let config = PipelineConfig::from_yaml_file(path)?;
        Self::load_from_config(registry, &config, pipeline_name)
    }

    /// Export components and graph in the YAML layout
    pub fn get_config(&self, pipeline_name: &str) -> PipelineConfig {
        let mut components = BTreeMap::new();
        for node in &self.nodes {
            collect_definitions(&node.component, &mut components);
        }

        let nodes = self
            .nodes
            .iter()
            .map(|node| PipelineNodeDefinition {
                name: node.name.clone(),
                inputs: node.inputs.iter().map(NodeInput::render).collect(),
            })
            .collect();

        PipelineConfig {
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            components: Some(components.into_values().collect()),
            pipelines: vec![PipelineDefinition {
                name: pipeline_name.to_string(),
                nodes,
            }],
        }
    }

    pub fn save_to_yaml<P: AsRef<Path>>(&self, path: P, pipeline_name: &str) -> WikiqaResult<()> {
        self.get_config(pipeline_name).save_to_file(path)
    }
}

fn collect_definitions(
    component: &Arc<Component>,
    definitions: &mut BTreeMap<String, ComponentDefinition>,
) {
    let name = component.label().to_string();
    if definitions.contains_key(&name) {
        return;
    }
    let params = component
        .get_params(false)
        .iter()
        .map(|(key, value)| (key.clone(), value.to_export_value()))
        .collect();
    definitions.insert(
        name.clone(),
        ComponentDefinition {
            name,
            component_type: component.component_type().to_string(),
            params,
        },
    );
    for nested in component.utilized_components() {
        collect_definitions(&nested, definitions);
    }
}
