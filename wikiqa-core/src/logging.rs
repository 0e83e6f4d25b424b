//! Tracing setup shared by the binaries
//!
//! `init_logging` installs one global `tracing` subscriber built from the
//! `[logging]` configuration section. `RUST_LOG` wins over the configured
//! level when it is set.

use crate::error::{ErrorContext, WikiqaError, WikiqaResult};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{
    filter::Directive,
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level (trace, debug, info, warn, error)
    pub level: String,
    pub format: LogFormat,
    /// Print source file and line
    pub include_location: bool,
    /// Append to this file instead of writing to stdout
    pub log_file: Option<String>,
    /// Emit an event with the elapsed time whenever a span closes
    pub span_timing: bool,
    /// Extra `EnvFilter` directives such as `wikiqa_pipeline=debug`
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_location: false,
            log_file: None,
            span_timing: false,
            directives: vec!["wikiqa_pipeline=debug".to_string()],
        }
    }
}

impl LoggingConfig {
    fn filter(&self) -> WikiqaResult<EnvFilter> {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        for directive in &self.directives {
            let parsed = directive.parse::<Directive>().map_err(|e| WikiqaError::Config {
                message: format!("invalid log directive '{}': {}", directive, e),
                source: None,
                context: ErrorContext::new("logging").with_operation("init_logging"),
            })?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }

    fn writer(&self) -> WikiqaResult<BoxMakeWriter> {
        Ok(match &self.log_file {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                BoxMakeWriter::new(Mutex::new(file))
            }
            None => BoxMakeWriter::new(std::io::stdout),
        })
    }
}

/// Install the global subscriber. Fails when one is already installed.
pub fn init_logging(config: &LoggingConfig) -> WikiqaResult<()> {
    let filter = config.filter()?;
    let writer = config.writer()?;
    let spans = if config.span_timing {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_span_events(spans)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_writer(writer);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| WikiqaError::Config {
            message: format!("failed to install the log subscriber: {}", e),
            source: None,
            context: ErrorContext::new("logging").with_operation("init_logging"),
        })
}

pub mod performance {
    use std::future::Future;
    use std::time::Instant;
    use tracing::{info_span, Instrument};

    /// Run `future` inside a span and log how long it took
    pub async fn measure_async<F, T>(operation: &str, future: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let result = future
            .instrument(info_span!("timed", operation = operation))
            .await;
        tracing::info!(
            target: "performance",
            operation = operation,
            duration_ms = started.elapsed().as_millis() as u64,
            "Operation timed"
        );
        result
    }
}

#[macro_export]
macro_rules! log_operation_start {
    ($operation:expr $(, $($field:tt)*)?) => {
        tracing::info!(operation = $operation, $($($field)*,)? "Starting operation")
    };
}

#[macro_export]
macro_rules! log_operation_success {
    ($operation:expr $(, $($field:tt)*)?) => {
        tracing::info!(operation = $operation, $($($field)*,)? "Operation completed successfully")
    };
}

#[macro_export]
macro_rules! log_operation_error {
    ($operation:expr, $error:expr $(, $($field:tt)*)?) => {
        tracing::error!(operation = $operation, error = %$error, $($($field)*,)? "Operation failed")
    };
}
