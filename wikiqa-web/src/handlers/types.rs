//! Request/response types used by the handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use wikiqa_core::WikiqaError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether `/api/update-index` has a pipeline behind it
    pub indexing_configured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateIndexResponse {
    pub status: String,
    /// Count reported by the document store node, if the pipeline ends in one
    pub documents_written: Option<u64>,
    /// Documents carried by the final pipeline state
    pub documents: usize,
}

/// Error body in the `{"detail": ...}` shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

/// Handler error carrying the status it maps to
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<WikiqaError> for ApiError {
    fn from(err: WikiqaError) -> Self {
        match &err {
            WikiqaError::NotConfigured { .. } => {
                Self::new(StatusCode::NOT_IMPLEMENTED, err.to_string())
            }
            _ => {
                err.log();
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorDetail { detail: self.detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikiqa_core::{network_error, ErrorContext};

    #[test]
    fn test_status_follows_error_kind() {
        let missing = ApiError::from(WikiqaError::NotConfigured {
            resource: "Indexing Pipeline".to_string(),
            context: ErrorContext::new("web"),
        });
        assert_eq!(missing.status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(missing.detail, "Indexing Pipeline is not configured.");

        let failed = ApiError::from(network_error!("wiki unreachable", "graphql"));
        assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(failed.detail.contains("wiki unreachable"));
    }
}
