//! Wiki data loader node
//!
//! Fetches every wiki page, flattens the tables of contents and emits one
//! document per section. When a question/answer generator component is wired
//! in through the `qa_generator` parameter, the sections are sent through it
//! and the generated question documents are emitted instead. Pipeline
//! `params` reach the generator unchanged, and whatever debug trace it
//! records comes back as the loader's runtime debug data.

use crate::graphql::GraphqlWikiClient;
use crate::toc::{flatten_pages, TocRecord};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;
use wikiqa_core::{Document, WikiSourceConfig, WikiqaResult};
use wikiqa_pipeline::{
    edge, Component, DebugTrace, InitArgs, InitParam, Node, NodeOutput, NodeType, Params,
    PipelineState, RunArgs, PARAMS,
};

// Only `params` is read, so overrides aimed at the wired generator can be
// passed on.
const LOADER_RUN_PARAMS: &[&str] = &[PARAMS];

pub struct WikiDataLoader {
    client: GraphqlWikiClient,
    qa_generator: Option<Arc<Component>>,
}

fn section_meta(record: &TocRecord, document: Document) -> Document {
    document
        .with_meta_entry("page", record.page.clone())
        .with_meta_entry("title", record.title.clone())
        .with_meta_entry("path", record.path.clone())
}

/// Section text prefixed by its combined title
pub fn section_document(record: &TocRecord) -> Document {
    section_meta(
        record,
        Document::new(format!("{} {}", record.title_combined, record.content)),
    )
}

impl WikiDataLoader {
    pub fn new(client: GraphqlWikiClient, qa_generator: Option<Arc<Component>>) -> Self {
        Self {
            client,
            qa_generator,
        }
    }

    pub fn client(&self) -> &GraphqlWikiClient {
        &self.client
    }

    pub async fn load_documents(&self) -> WikiqaResult<Vec<Document>> {
        let (documents, _) = self.load_with_params(Params::new()).await?;
        Ok(documents)
    }

    /// Load the documents, handing `params` to the wired generator.
    /// Returns the generator's debug trace alongside.
    pub async fn load_with_params(
        &self,
        params: Params,
    ) -> WikiqaResult<(Vec<Document>, Option<DebugTrace>)> {
        let pages = self.client.fetch_pages().await?;
        let records = flatten_pages(&pages);

        let (documents, trace) = match &self.qa_generator {
            None => (records.iter().map(section_document).collect(), None),
            Some(generator) => {
                // The generator only sees the section summary.
                let sections = records
                    .iter()
                    .map(|record| section_meta(record, Document::new(record.content.clone())))
                    .collect();
                let state = PipelineState::new()
                    .with_documents(sections)
                    .with_params(params);
                let (output, _) = generator.dispatch_run(&state).await?;
                (output.documents.unwrap_or_default(), output.debug)
            }
        };

        info!(
            pages = pages.len(),
            sections = records.len(),
            documents = documents.len(),
            qa = self.qa_generator.is_some(),
            "Loaded wiki documents"
        );
        Ok((documents, trace))
    }

    /// Construction defaults taken from the `[wiki]` configuration section
    pub fn config_defaults(config: &WikiSourceConfig) -> Map<String, Value> {
        let mut defaults = Map::new();
        defaults.insert("graphql_url".to_string(), json!(config.graphql_url));
        defaults.insert("timeout_secs".to_string(), json!(config.timeout_secs));
        defaults.insert("max_retries".to_string(), json!(config.max_retries));
        defaults
    }
}

#[async_trait]
impl Node for WikiDataLoader {
    async fn run(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let params: Params = args.get(PARAMS)?.unwrap_or_default();
        let (documents, trace) = self.load_with_params(params).await?;

        let mut output = NodeOutput::new().with_documents(documents);
        if let Some(trace) = trace.filter(|trace| !trace.is_empty()) {
            output = output.with_runtime_debug(json!({ "qa_generator": trace }));
        }
        Ok((output, edge(1)))
    }

    async fn run_batch(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        self.run(args).await
    }
}

impl NodeType for WikiDataLoader {
    const TYPE_NAME: &'static str = "WikiDataLoader";
    const RUN_PARAMS: &'static [&'static str] = LOADER_RUN_PARAMS;
    const RUN_BATCH_PARAMS: &'static [&'static str] = LOADER_RUN_PARAMS;

    fn init_params() -> Vec<InitParam> {
        let defaults = WikiSourceConfig::default();
        vec![
            InitParam::optional("graphql_url", defaults.graphql_url),
            InitParam::optional("timeout_secs", defaults.timeout_secs),
            InitParam::optional("max_retries", defaults.max_retries),
            InitParam::optional("qa_generator", Value::Null),
        ]
    }

    fn from_args(args: &InitArgs<'_>) -> WikiqaResult<Self> {
        let client = GraphqlWikiClient::new(
            args.get::<String>("graphql_url")?,
            args.get("timeout_secs")?,
            args.get("max_retries")?,
        );
        Ok(Self::new(client, args.component("qa_generator")?))
    }
}
