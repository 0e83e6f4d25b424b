//! wikiqa web server
//!
//! Binds the axum application built by [`create_app`].

use crate::{create_app, AppState, WebConfig, WebError, WebResult};
use axum::serve;
use tokio::net::TcpListener;
use tracing::{error, info};
use wikiqa_pipeline::NodeRegistry;

pub struct WikiqaServer {
    config: WebConfig,
    state: AppState,
}

impl WikiqaServer {
    /// Create a server, loading the indexing pipeline if one is configured
    pub fn new(config: WebConfig) -> WebResult<Self> {
        let state = AppState::new(config.clone())?;
        Ok(Self { config, state })
    }

    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config.clone(),
            state,
        }
    }

    /// Start the web server
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();
        info!(
            address = %address,
            indexing = self.state.indexing_pipeline().is_some(),
            "Starting wikiqa web server"
        );

        let app = create_app(self.state);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        if let Err(e) = serve(listener, app).await {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        Ok(())
    }

    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Builder for [`WikiqaServer`]
pub struct WikiqaServerBuilder {
    config: WebConfig,
    registry: Option<NodeRegistry>,
}

impl WikiqaServerBuilder {
    pub fn new() -> Self {
        Self::from_config(WebConfig::default())
    }

    pub fn from_config(config: WebConfig) -> Self {
        Self {
            config,
            registry: None,
        }
    }

    /// Node types used to load the indexing pipeline; defaults to the
    /// wiki nodes with built-in settings
    pub fn registry(mut self, registry: NodeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn pipeline_yaml_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.pipeline_yaml_path = Some(path.into());
        self
    }

    pub fn indexing_pipeline_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.indexing_pipeline_name = name.into();
        self
    }

    pub fn build(self) -> WebResult<WikiqaServer> {
        match self.registry {
            Some(registry) => Ok(WikiqaServer::with_state(AppState::with_registry(
                self.config,
                &registry,
            )?)),
            None => WikiqaServer::new(self.config),
        }
    }
}

impl Default for WikiqaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
