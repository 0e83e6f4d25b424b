//! In-memory document store, usable as the last node of an indexing pipeline

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::info;
use wikiqa_core::{
    DocumentStore, Document, DuplicatePolicy, ErrorContext, WikiqaError, WikiqaResult,
};
use wikiqa_pipeline::{edge, InitArgs, InitParam, Node, NodeOutput, NodeType, RunArgs};

pub struct InMemoryDocumentStore {
    index: String,
    policy: DuplicatePolicy,
    documents: RwLock<BTreeMap<String, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new(index: impl Into<String>, policy: DuplicatePolicy) -> Self {
        Self {
            index: index.into(),
            policy,
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    async fn write_from_args(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let documents = args.documents()?.unwrap_or_default();
        let written = self.write_documents(documents, self.policy).await?;
        Ok((
            NodeOutput::new().with_field("documents_written", written),
            edge(1),
        ))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn write_documents(
        &self,
        documents: Vec<Document>,
        policy: DuplicatePolicy,
    ) -> WikiqaResult<usize> {
        let mut stored = self.documents.write().await;

        if policy == DuplicatePolicy::Fail {
            let mut incoming = std::collections::HashSet::new();
            for doc in &documents {
                if stored.contains_key(&doc.id) || !incoming.insert(doc.id.as_str()) {
                    return Err(WikiqaError::Storage {
                        message: format!(
                            "Document with id '{}' already exists in index '{}'",
                            doc.id, self.index
                        ),
                        source: None,
                        context: ErrorContext::new("document_store")
                            .with_operation("write_documents")
                            .with_suggestion("Use duplicate_documents: overwrite or skip"),
                    });
                }
            }
        }

        let mut written = 0;
        for doc in documents {
            if policy == DuplicatePolicy::Skip && stored.contains_key(&doc.id) {
                continue;
            }
            stored.insert(doc.id.clone(), doc);
            written += 1;
        }

        info!(
            index = %self.index,
            written = written,
            total = stored.len(),
            "Wrote documents"
        );
        Ok(written)
    }

    async fn get_all_documents(&self) -> WikiqaResult<Vec<Document>> {
        Ok(self.documents.read().await.values().cloned().collect())
    }

    async fn count(&self) -> WikiqaResult<usize> {
        Ok(self.documents.read().await.len())
    }
}

#[async_trait]
impl Node for InMemoryDocumentStore {
    async fn run(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        self.write_from_args(args).await
    }

    async fn run_batch(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        self.write_from_args(args).await
    }
}

impl NodeType for InMemoryDocumentStore {
    const TYPE_NAME: &'static str = "InMemoryDocumentStore";
    const RUN_PARAMS: &'static [&'static str] = &["documents"];
    const RUN_BATCH_PARAMS: &'static [&'static str] = &["documents"];

    fn init_params() -> Vec<InitParam> {
        vec![
            InitParam::optional("index", "document"),
            InitParam::optional("duplicate_documents", "overwrite"),
        ]
    }

    fn from_args(args: &InitArgs<'_>) -> WikiqaResult<Self> {
        Ok(Self::new(
            args.get::<String>("index")?,
            args.get::<DuplicatePolicy>("duplicate_documents")?,
        ))
    }
}
