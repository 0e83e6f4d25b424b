//! Core data type definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::logging::LoggingConfig;

/// A unit of indexable text flowing between pipeline nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

fn default_content_type() -> String {
    "text".to_string()
}

impl Document {
    /// Create a text document whose id is derived from its content
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: Self::content_id(&content),
            content,
            content_type: default_content_type(),
            meta: Map::new(),
            score: None,
        }
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_meta_entry(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    /// Deterministic id so re-indexing the same text lands on the same key
    pub fn content_id(content: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()).to_string()
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(Value::as_str)
    }
}

/// An annotated answer used for evaluation runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub query: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub is_correct_answer: bool,
}

/// All labels collected for a single query
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultiLabel {
    pub labels: Vec<Label>,
}

impl MultiLabel {
    pub fn new(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    pub fn query(&self) -> Option<&str> {
        self.labels.first().map(|l| l.query.as_str())
    }

    pub fn answers(&self) -> Vec<&str> {
        self.labels
            .iter()
            .filter_map(|l| l.answer.as_deref())
            .collect()
    }
}

/// 配置信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiqaConfig {
    pub wiki: WikiSourceConfig,
    pub qa: QaConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiSourceConfig {
    /// GraphQL endpoint serving the wiki pages
    pub graphql_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Repeats after the first attempt for transient fetch failures; 0 disables retrying
    pub max_retries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    /// Provider type (openai, anthropic, ollama)
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Upper bound of question/answer pairs per section
    pub max_pairs: usize,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// YAML file declaring components and pipelines
    pub pipeline_yaml_path: Option<String>,
    /// Name of the pipeline triggered by the update-index endpoint
    pub indexing_pipeline_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_is_content_derived() {
        let a = Document::new("hello");
        let b = Document::new("hello").with_meta_entry("page", "Home");
        let c = Document::new("world");

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(b.meta_str("page"), Some("Home"));
    }

    #[test]
    fn test_document_defaults_on_deserialize() {
        let doc: Document = serde_json::from_str(r#"{"id": "1", "content": "x"}"#).unwrap();
        assert_eq!(doc.content_type, "text");
        assert!(doc.meta.is_empty());
        assert!(doc.score.is_none());
    }

    #[test]
    fn test_multilabel_answers() {
        let labels = MultiLabel::new(vec![
            Label {
                query: "q".to_string(),
                answer: Some("a".to_string()),
                document_id: None,
                is_correct_answer: true,
            },
            Label {
                query: "q".to_string(),
                answer: None,
                document_id: Some("d".to_string()),
                is_correct_answer: false,
            },
        ]);

        assert_eq!(labels.query(), Some("q"));
        assert_eq!(labels.answers(), vec!["a"]);
    }
}
