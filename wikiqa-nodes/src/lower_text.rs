use async_trait::async_trait;
use serde_json::json;
use wikiqa_core::WikiqaResult;
use wikiqa_pipeline::{edge, InitArgs, Node, NodeOutput, NodeType, RunArgs};

/// Lowercases the query
pub struct LowerText;

#[async_trait]
impl Node for LowerText {
    async fn run(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let query: String = args.require("query")?;
        let output = NodeOutput::new()
            .with_query(query.to_lowercase())
            .with_runtime_debug(json!({ "original_query": query }));
        Ok((output, edge(1)))
    }

    async fn run_batch(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let queries: Vec<String> = args.require("queries")?;
        let mut output = NodeOutput::new()
            .with_runtime_debug(json!({ "original_queries": queries.clone() }));
        output.state.queries = Some(queries.iter().map(|q| q.to_lowercase()).collect());
        Ok((output, edge(1)))
    }
}

impl NodeType for LowerText {
    const TYPE_NAME: &'static str = "LowerText";
    const RUN_PARAMS: &'static [&'static str] = &["query"];
    const RUN_BATCH_PARAMS: &'static [&'static str] = &["queries"];

    fn from_args(_args: &InitArgs<'_>) -> WikiqaResult<Self> {
        Ok(LowerText)
    }
}
