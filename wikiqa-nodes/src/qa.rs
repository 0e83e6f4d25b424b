//! Question/answer generation over section text
//!
//! The generator asks an LLM for question/answer pairs about each incoming
//! document and emits one document per question. The model sits behind the
//! [`QaModel`] trait; the registered node uses [`SiumaiQaModel`], which builds
//! its siumai client on first use so constructing a pipeline never needs
//! network access or credentials.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use siumai::prelude::*;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use wikiqa_core::{
    config_error, Document, ErrorContext, QaConfig, WikiqaError, WikiqaResult,
};
use wikiqa_pipeline::{edge, InitArgs, InitParam, Node, NodeOutput, NodeType, RunArgs};

const SYSTEM_PROMPT: &str = "You write study questions for an internal knowledge base. \
Reply with a JSON array only. Each element is an object with the keys \"question\" and \"answer\". \
Answers must be short and taken from the given text.";

/// One generated pair; either side may be missing when the model is sloppy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
}

#[async_trait]
pub trait QaModel: Send + Sync {
    async fn generate_pairs(&self, text: &str, max_pairs: usize) -> WikiqaResult<Vec<QaPair>>;
}

/// Connection settings for [`SiumaiQaModel`]
#[derive(Debug, Clone, PartialEq)]
pub struct QaSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// [`QaModel`] backed by a siumai chat client
pub struct SiumaiQaModel {
    settings: QaSettings,
    client: OnceCell<Box<dyn LlmClient>>,
}

impl SiumaiQaModel {
    pub fn new(settings: QaSettings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &QaSettings {
        &self.settings
    }

    fn llm_error(&self, message: String) -> WikiqaError {
        WikiqaError::Llm {
            message,
            provider: Some(self.settings.provider.clone()),
            model: Some(self.settings.model.clone()),
            context: ErrorContext::new("qa_generator"),
        }
    }

    async fn client(&self) -> WikiqaResult<&dyn LlmClient> {
        let client = self
            .client
            .get_or_try_init(|| self.build_client())
            .await?;
        Ok(client.as_ref())
    }

    async fn build_client(&self) -> WikiqaResult<Box<dyn LlmClient>> {
        let settings = &self.settings;
        let client: Box<dyn LlmClient> = match settings.provider.as_str() {
            "openai" => {
                let api_key = settings
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                    .ok_or_else(|| config_error!("OpenAI API key not found", "qa_generator"))?;

                let mut builder = LlmBuilder::new()
                    .openai()
                    .api_key(&api_key)
                    .model(&settings.model)
                    .temperature(settings.temperature);

                if let Some(max_tokens) = settings.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                if let Some(base_url) = &settings.base_url {
                    builder = builder.base_url(base_url);
                }

                let client = builder.build().await.map_err(|e| {
                    self.llm_error(format!("Failed to build OpenAI client: {}", e))
                })?;
                Box::new(client)
            }
            "anthropic" => {
                let api_key = settings
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
                    .ok_or_else(|| config_error!("Anthropic API key not found", "qa_generator"))?;

                let mut builder = LlmBuilder::new()
                    .anthropic()
                    .api_key(&api_key)
                    .model(&settings.model)
                    .temperature(settings.temperature);

                if let Some(max_tokens) = settings.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder.build().await.map_err(|e| {
                    self.llm_error(format!("Failed to build Anthropic client: {}", e))
                })?;
                Box::new(client)
            }
            "ollama" => {
                let base_url = settings
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string());

                let mut builder = LlmBuilder::new()
                    .ollama()
                    .model(&settings.model)
                    .base_url(&base_url)
                    .temperature(settings.temperature);

                if let Some(max_tokens) = settings.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder.build().await.map_err(|e| {
                    self.llm_error(format!("Failed to build Ollama client: {}", e))
                })?;
                Box::new(client)
            }
            provider => {
                return Err(config_error!(
                    format!("Unsupported LLM provider: {}", provider),
                    "qa_generator"
                ))
            }
        };

        info!(
            provider = %settings.provider,
            model = %settings.model,
            "Created QA generation client"
        );
        Ok(client)
    }
}

#[async_trait]
impl QaModel for SiumaiQaModel {
    async fn generate_pairs(&self, text: &str, max_pairs: usize) -> WikiqaResult<Vec<QaPair>> {
        let client = self.client().await?;
        let prompt = format!(
            "Write at most {} question/answer pairs about this text:\n\n{}",
            max_pairs, text
        );
        let messages = vec![system!(SYSTEM_PROMPT), user!(prompt.as_str())];

        let response = client
            .chat(messages)
            .await
            .map_err(|e| self.llm_error(format!("QA generation failed: {}", e)))?;

        match response.content_text() {
            Some(content) => parse_qa_pairs(&content.to_string(), max_pairs),
            None => Err(self.llm_error("No text content in LLM response".to_string())),
        }
    }
}

/// Pull the JSON array out of a model reply, tolerating code fences or chatter
/// around it, and keep at most `max_pairs` entries.
pub fn parse_qa_pairs(reply: &str, max_pairs: usize) -> WikiqaResult<Vec<QaPair>> {
    let (start, end) = match (reply.find('['), reply.rfind(']')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(WikiqaError::Llm {
                message: "QA reply does not contain a JSON array".to_string(),
                provider: None,
                model: None,
                context: ErrorContext::new("qa_generator").with_operation("parse_qa_pairs"),
            })
        }
    };

    let mut pairs: Vec<QaPair> = serde_json::from_str(&reply[start..=end])?;
    pairs.truncate(max_pairs);
    Ok(pairs)
}

/// Node emitting one document per generated question
pub struct QuestionAnswerGenerator {
    model: Arc<dyn QaModel>,
    max_pairs: usize,
}

impl QuestionAnswerGenerator {
    pub fn with_model(model: Arc<dyn QaModel>, max_pairs: usize) -> Self {
        Self { model, max_pairs }
    }

    /// Questions for every document. Each question document inherits the
    /// source document's meta and adds `answer`.
    pub async fn generate(&self, documents: &[Document]) -> WikiqaResult<Vec<Document>> {
        let mut generated = Vec::new();
        for source in documents {
            if source.content.trim().is_empty() {
                debug!(document = %source.id, "Skipping empty section");
                continue;
            }

            let pairs = self
                .model
                .generate_pairs(&source.content, self.max_pairs)
                .await?;
            for pair in pairs {
                let Some(question) = pair.question.filter(|q| !q.trim().is_empty()) else {
                    warn!(document = %source.id, "Dropping generated pair without a question");
                    continue;
                };
                generated.push(
                    Document::new(question)
                        .with_meta(source.meta.clone())
                        .with_meta_entry("answer", pair.answer),
                );
            }
        }
        info!(
            sources = documents.len(),
            questions = generated.len(),
            "Generated questions"
        );
        Ok(generated)
    }
}

#[async_trait]
impl Node for QuestionAnswerGenerator {
    async fn run(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        let documents = args.documents()?.unwrap_or_default();
        let generated = self.generate(&documents).await?;
        Ok((NodeOutput::new().with_documents(generated), edge(1)))
    }

    async fn run_batch(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)> {
        self.run(args).await
    }
}

fn declared_params(config: &QaConfig) -> Vec<InitParam> {
    vec![
        InitParam::optional("provider", config.provider.clone()),
        InitParam::optional("model", config.model.clone()),
        InitParam::optional("temperature", config.temperature),
        InitParam::optional("max_tokens", config.max_tokens),
        InitParam::optional("api_key", config.api_key.clone()),
        InitParam::optional("base_url", config.base_url.clone()),
        InitParam::optional("max_pairs", config.max_pairs),
    ]
}

impl QuestionAnswerGenerator {
    /// Construction defaults taken from the `[qa]` configuration section
    pub fn config_defaults(config: &QaConfig) -> Map<String, Value> {
        declared_params(config)
            .into_iter()
            .map(|param| (param.name.to_string(), param.default.unwrap_or(Value::Null)))
            .collect()
    }
}

impl NodeType for QuestionAnswerGenerator {
    const TYPE_NAME: &'static str = "QuestionAnswerGenerator";
    const RUN_PARAMS: &'static [&'static str] = &["documents"];
    const RUN_BATCH_PARAMS: &'static [&'static str] = &["documents"];

    fn init_params() -> Vec<InitParam> {
        declared_params(&QaConfig::default())
    }

    fn from_args(args: &InitArgs<'_>) -> WikiqaResult<Self> {
        let settings = QaSettings {
            provider: args.get("provider")?,
            model: args.get("model")?,
            temperature: args.get("temperature")?,
            max_tokens: args.get_opt("max_tokens")?,
            api_key: args.get_opt("api_key")?,
            base_url: args.get_opt("base_url")?,
        };
        let max_pairs: usize = args.get("max_pairs")?;
        Ok(Self::with_model(
            Arc::new(SiumaiQaModel::new(settings)),
            max_pairs,
        ))
    }
}
