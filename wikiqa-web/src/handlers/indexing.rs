//! Indexing trigger

use super::types::{ApiError, UpdateIndexResponse};
use crate::AppState;
use axum::{extract::State, response::Json};
use tracing::info;
use wikiqa_core::{ErrorContext, WikiqaError};
use wikiqa_pipeline::RunRequest;

/// Run the indexing pipeline with empty file paths, meta and params
pub async fn update_index(
    State(state): State<AppState>,
) -> Result<Json<UpdateIndexResponse>, ApiError> {
    let pipeline = state.indexing_pipeline().ok_or_else(|| WikiqaError::NotConfigured {
        resource: "Indexing Pipeline".to_string(),
        context: ErrorContext::new("web")
            .with_operation("update_index")
            .with_suggestion("Set WIKIQA_PIPELINE_YAML_PATH to a pipeline YAML file"),
    })?;

    let _running = state.indexing_lock().lock().await;
    info!(pipeline = %state.config.indexing_pipeline_name, "Updating index");

    let output = pipeline.run(RunRequest::indexing()).await?;

    let response = UpdateIndexResponse {
        status: "ok".to_string(),
        documents_written: output
            .field("documents_written")
            .and_then(|value| value.as_u64()),
        documents: output.documents.as_ref().map_or(0, Vec::len),
    };
    info!(
        documents_written = ?response.documents_written,
        documents = response.documents,
        "Index updated"
    );
    Ok(Json(response))
}
