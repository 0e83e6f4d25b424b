//! Small node types shared by the unit tests

use crate::component::{Component, InitArgs};
use crate::node::{InitParam, Node, NodeType};
use crate::registry::NodeRegistry;
use crate::state::{edge, NodeOutput, RunArgs};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use wikiqa_core::{Document, WikiqaResult};

fn seen_args(args: &RunArgs) -> Value {
    Value::Array(args.raw().keys().map(|k| json!(k)).collect())
}

/// Echoes the query into a document and reports the arguments it saw
pub struct Echo;

#[async_trait]
impl Node for Echo {
    async fn run(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let query: String = args.require("query")?;
        let mut output = NodeOutput::new()
            .with_documents(vec![Document::new(format!("echo: {}", query))])
            .with_field("seen_args", seen_args(&args));
        if let Some(top_k) = args.get::<u64>("top_k")? {
            output = output.with_field("top_k", top_k);
        }
        Ok((output, edge(1)))
    }

    async fn run_batch(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let queries: Vec<String> = args.require("queries")?;
        let documents = queries
            .iter()
            .map(|q| Document::new(format!("echo: {}", q)))
            .collect();
        let output = NodeOutput::new()
            .with_documents(documents)
            .with_field("seen_args", seen_args(&args));
        Ok((output, edge(1)))
    }
}

impl NodeType for Echo {
    const TYPE_NAME: &'static str = "Echo";
    const RUN_PARAMS: &'static [&'static str] = &["query", "top_k"];
    const RUN_BATCH_PARAMS: &'static [&'static str] = &["queries", "top_k"];

    fn from_args(_args: &InitArgs<'_>) -> WikiqaResult<Self> {
        Ok(Echo)
    }
}

/// Upper-cases the query and emits runtime debug data
pub struct Shouter;

#[async_trait]
impl Node for Shouter {
    async fn run(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let query: String = args.require("query")?;
        let output = NodeOutput::new()
            .with_query(query.to_uppercase())
            .with_runtime_debug(json!({"original": query}));
        Ok((output, edge(1)))
    }

    async fn run_batch(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let queries: Vec<String> = args.require("queries")?;
        let shouted: Vec<String> = queries.iter().map(|q| q.to_uppercase()).collect();
        let mut output = NodeOutput::new();
        output.state.queries = Some(shouted);
        Ok((output, edge(1)))
    }
}

impl NodeType for Shouter {
    const TYPE_NAME: &'static str = "Shouter";
    const RUN_PARAMS: &'static [&'static str] = &["query"];
    const RUN_BATCH_PARAMS: &'static [&'static str] = &["queries"];

    fn from_args(_args: &InitArgs<'_>) -> WikiqaResult<Self> {
        Ok(Shouter)
    }
}

/// Passes the query through and writes its notes as a `_debug` field
pub struct Annotator;

#[async_trait]
impl Node for Annotator {
    async fn run(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let query: String = args.require("query")?;
        let output = NodeOutput::new()
            .with_query(query)
            .with_field("_debug", json!({"note": "annotated"}));
        Ok((output, edge(1)))
    }

    async fn run_batch(&self, _args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        Ok((NodeOutput::new(), edge(1)))
    }
}

impl NodeType for Annotator {
    const TYPE_NAME: &'static str = "Annotator";
    const RUN_PARAMS: &'static [&'static str] = &["query"];
    const RUN_BATCH_PARAMS: &'static [&'static str] = &["queries"];

    fn from_args(_args: &InitArgs<'_>) -> WikiqaResult<Self> {
        Ok(Annotator)
    }
}

/// Returns `top_k` documents for the query
pub struct Retriever {
    pub top_k: u64,
    pub index: String,
}

#[async_trait]
impl Node for Retriever {
    async fn run(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let query: String = args.require("query")?;
        let top_k = args.get::<u64>("top_k")?.unwrap_or(self.top_k);
        let documents = (0..top_k)
            .map(|i| Document::new(format!("{} #{} from {}", query, i, self.index)))
            .collect();
        Ok((NodeOutput::new().with_documents(documents), edge(1)))
    }

    async fn run_batch(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let queries: Vec<String> = args.require("queries")?;
        let documents = queries
            .iter()
            .map(|q| Document::new(format!("{} from {}", q, self.index)))
            .collect();
        Ok((NodeOutput::new().with_documents(documents), edge(1)))
    }
}

impl NodeType for Retriever {
    const TYPE_NAME: &'static str = "Retriever";
    const RUN_PARAMS: &'static [&'static str] = &["query", "top_k"];
    const RUN_BATCH_PARAMS: &'static [&'static str] = &["queries", "top_k"];

    fn init_params() -> Vec<InitParam> {
        vec![
            InitParam::optional("top_k", 10),
            InitParam::optional("index", "document"),
        ]
    }

    fn from_args(args: &InitArgs<'_>) -> WikiqaResult<Self> {
        Ok(Self {
            top_k: args.get("top_k")?,
            index: args.get("index")?,
        })
    }
}

/// Turns documents into answers; wired to a retriever component
pub struct Reader {
    pub retriever: Arc<Component>,
    pub model: String,
}

#[async_trait]
impl Node for Reader {
    async fn run(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let documents: Vec<Document> = args.require("documents")?;
        let answers: Vec<Value> = documents
            .iter()
            .map(|doc| json!(format!("{}: {}", self.model, doc.content)))
            .collect();
        Ok((NodeOutput::new().with_field("answers", answers), edge(1)))
    }

    async fn run_batch(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        self.run(args).await
    }
}

impl NodeType for Reader {
    const TYPE_NAME: &'static str = "Reader";
    const RUN_PARAMS: &'static [&'static str] = &["query", "documents"];
    const RUN_BATCH_PARAMS: &'static [&'static str] = &["queries", "documents"];

    fn init_params() -> Vec<InitParam> {
        vec![
            InitParam::required("retriever"),
            InitParam::optional("model", "base"),
        ]
    }

    fn from_args(args: &InitArgs<'_>) -> WikiqaResult<Self> {
        let retriever = args.component("retriever")?.ok_or_else(|| {
            wikiqa_core::missing_argument_error!("retriever", Self::TYPE_NAME, "reader")
        })?;
        Ok(Self {
            retriever,
            model: args.get("model")?,
        })
    }
}

/// Sends questions (queries ending in '?') down the second edge
pub struct QuestionRouter;

#[async_trait]
impl Node for QuestionRouter {
    async fn run(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let query: String = args.require("query")?;
        let label = if query.ends_with('?') { edge(2) } else { edge(1) };
        Ok((NodeOutput::new(), label))
    }

    async fn run_batch(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let _: Vec<String> = args.require("queries")?;
        Ok((NodeOutput::new(), edge(1)))
    }
}

impl NodeType for QuestionRouter {
    const TYPE_NAME: &'static str = "QuestionRouter";
    const OUTGOING_EDGES: usize = 2;
    const RUN_PARAMS: &'static [&'static str] = &["query"];
    const RUN_BATCH_PARAMS: &'static [&'static str] = &["queries"];

    fn from_args(_args: &InitArgs<'_>) -> WikiqaResult<Self> {
        Ok(QuestionRouter)
    }
}

pub fn test_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register::<Echo>().unwrap();
    registry.register::<Shouter>().unwrap();
    registry.register::<Annotator>().unwrap();
    registry.register::<Retriever>().unwrap();
    registry.register::<Reader>().unwrap();
    registry.register::<QuestionRouter>().unwrap();
    registry
}
