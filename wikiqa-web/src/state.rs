//! Application state shared by the handlers

use crate::{WebConfig, WebResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use wikiqa_pipeline::{NodeRegistry, Pipeline};

#[derive(Clone)]
pub struct AppState {
    pub config: WebConfig,
    /// Pipeline behind `/api/update-index`, absent when none was configured
    indexing_pipeline: Option<Arc<Pipeline>>,
    /// Serializes indexing runs
    indexing_lock: Arc<Mutex<()>>,
}

impl AppState {
    /// Build the state, loading the indexing pipeline when a YAML path is set
    pub fn new(config: WebConfig) -> WebResult<Self> {
        let registry = wikiqa_nodes::default_registry()?;
        Self::with_registry(config, &registry)
    }

    pub fn with_registry(config: WebConfig, registry: &NodeRegistry) -> WebResult<Self> {
        let pipeline = match &config.pipeline_yaml_path {
            Some(path) => {
                let pipeline =
                    Pipeline::load_from_yaml(registry, path, &config.indexing_pipeline_name)?;
                info!(
                    path = %path,
                    pipeline = %config.indexing_pipeline_name,
                    nodes = ?pipeline.node_names(),
                    "Indexing pipeline loaded"
                );
                Some(pipeline)
            }
            None => {
                warn!("No pipeline YAML configured, update-index is disabled");
                None
            }
        };

        Ok(Self::from_parts(config, pipeline))
    }

    pub fn from_parts(config: WebConfig, indexing_pipeline: Option<Pipeline>) -> Self {
        Self {
            config,
            indexing_pipeline: indexing_pipeline.map(Arc::new),
            indexing_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn indexing_pipeline(&self) -> Option<&Arc<Pipeline>> {
        self.indexing_pipeline.as_ref()
    }

    pub fn indexing_lock(&self) -> &Mutex<()> {
        &self.indexing_lock
    }
}
