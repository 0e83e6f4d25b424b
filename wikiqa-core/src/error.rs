//! Unified error handling system
//!
//! Provides structured error types with context, recovery suggestions, and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type WikiqaResult<T> = Result<T, WikiqaError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the wikiqa system
#[derive(Error, Debug)]
pub enum WikiqaError {
    /// A node type name is not present in the registry, or a node type
    /// declares an unusable parameter set.
    #[error("Schema error: {message}")]
    Schema {
        message: String,
        context: ErrorContext,
    },

    /// An override or construction argument the target node does not accept.
    #[error("Invalid parameter '{parameter}' for the node '{node}'.")]
    InvalidParameter {
        parameter: String,
        node: String,
        context: ErrorContext,
    },

    /// A node needed an input that was neither in the state nor overridden.
    #[error("Missing argument '{argument}' for the node '{node}'")]
    MissingArgument {
        argument: String,
        node: String,
        context: ErrorContext,
    },

    /// Declarative pipeline configuration is malformed.
    #[error("Configuration integrity error: {message}")]
    ConfigurationIntegrity {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// A dependency that was never wired up was asked for.
    #[error("{resource} is not configured.")]
    NotConfigured {
        resource: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("LLM error: {message}")]
    Llm {
        message: String,
        provider: Option<String>,
        model: Option<String>,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl WikiqaError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            WikiqaError::Schema { context, .. } => Some(context),
            WikiqaError::InvalidParameter { context, .. } => Some(context),
            WikiqaError::MissingArgument { context, .. } => Some(context),
            WikiqaError::ConfigurationIntegrity { context, .. } => Some(context),
            WikiqaError::NotConfigured { context, .. } => Some(context),
            WikiqaError::Config { context, .. } => Some(context),
            WikiqaError::Validation { context, .. } => Some(context),
            WikiqaError::Network { context, .. } => Some(context),
            WikiqaError::Llm { context, .. } => Some(context),
            WikiqaError::Storage { context, .. } => Some(context),
            WikiqaError::Timeout { context, .. } => Some(context),
            WikiqaError::Internal { context, .. } => Some(context),
            WikiqaError::Io(_) | WikiqaError::Serialization(_) => None,
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WikiqaError::Network { .. } | WikiqaError::Timeout { .. }
        )
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            WikiqaError::Internal { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Internal error occurred"
                );
            }
            WikiqaError::Schema { .. }
            | WikiqaError::InvalidParameter { .. }
            | WikiqaError::ConfigurationIntegrity { .. }
            | WikiqaError::Config { .. }
            | WikiqaError::Validation { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration or validation error"
                );
            }
            WikiqaError::Network { .. } | WikiqaError::Timeout { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Network or timeout error (may be recoverable)"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! schema_error {
    ($msg:expr, $component:expr) => {
        $crate::WikiqaError::Schema {
            message: $msg.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check that the node type is registered before loading it"),
        }
    };
}

#[macro_export]
macro_rules! invalid_parameter_error {
    ($parameter:expr, $node:expr, $component:expr) => {
        $crate::WikiqaError::InvalidParameter {
            parameter: $parameter.to_string(),
            node: $node.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Only pass parameters the node declares"),
        }
    };
}

#[macro_export]
macro_rules! missing_argument_error {
    ($argument:expr, $node:expr, $component:expr) => {
        $crate::WikiqaError::MissingArgument {
            argument: $argument.to_string(),
            node: $node.to_string(),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! integrity_error {
    ($msg:expr, $component:expr) => {
        $crate::WikiqaError::ConfigurationIntegrity {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the components section of the pipeline YAML"),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::WikiqaError::ConfigurationIntegrity {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the components section of the pipeline YAML"),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::WikiqaError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'wikiqa config --init' to create default config"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::WikiqaError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}

#[macro_export]
macro_rules! network_error {
    ($msg:expr, $component:expr) => {
        $crate::WikiqaError::Network {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check network connectivity"),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::WikiqaError::Network {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check network connectivity"),
        }
    };
}
