//! wikiqa Web Server
//!
//! Exposes the indexing pipeline declared in the pipeline YAML over HTTP.

pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use server::WikiqaServer;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, Method},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use wikiqa_core::{LoggingConfig, ServerConfig, WikiqaError};

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

/// Configuration for the web server
#[derive(Debug, Clone, PartialEq)]
pub struct WebConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// YAML file declaring components and pipelines
    pub pipeline_yaml_path: Option<String>,
    /// Pipeline run by `POST /api/update-index`
    pub indexing_pipeline_name: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for WebConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            pipeline_yaml_path: config.pipeline_yaml_path.clone(),
            indexing_pipeline_name: config.indexing_pipeline_name.clone(),
        }
    }
}

impl WebConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Overlay `WIKIQA_*` variables on the defaults
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            host: var("WIKIQA_HOST").unwrap_or(defaults.host),
            port: var("WIKIQA_PORT")
                .and_then(|port| port.parse().ok())
                .unwrap_or(defaults.port),
            pipeline_yaml_path: var("WIKIQA_PIPELINE_YAML_PATH").or(defaults.pipeline_yaml_path),
            indexing_pipeline_name: var("WIKIQA_INDEXING_PIPELINE_NAME")
                .unwrap_or(defaults.indexing_pipeline_name),
        }
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] WikiqaError),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

/// Initialize logging for the web server
pub fn init_logging(level: &str) -> WebResult<()> {
    let mut config = LoggingConfig {
        level: level.to_string(),
        ..LoggingConfig::default()
    };
    config.directives.push(format!("wikiqa_web={}", level));
    config.directives.push("tower_http=debug".to_string());

    Ok(wikiqa_core::init_logging(&config)?)
}
