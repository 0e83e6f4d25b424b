//! Core trait definitions

use crate::error::WikiqaResult;
use crate::types::Document;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How a store reacts to a document whose id it already holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    Overwrite,
    Skip,
    Fail,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(Self::Overwrite),
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            other => Err(format!(
                "unknown duplicate policy '{}', expected overwrite, skip or fail",
                other
            )),
        }
    }
}

/// Document storage backend used by indexing pipelines
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Write documents, returning how many were actually stored
    async fn write_documents(
        &self,
        documents: Vec<Document>,
        policy: DuplicatePolicy,
    ) -> WikiqaResult<usize>;

    async fn get_all_documents(&self) -> WikiqaResult<Vec<Document>>;

    async fn count(&self) -> WikiqaResult<usize>;
}
