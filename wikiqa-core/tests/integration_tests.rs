//! Integration tests for wikiqa-core infrastructure

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use wikiqa_core::{
    config_error, init_logging, integrity_error, invalid_parameter_error, network_error,
    retry_async, schema_error, validation_error, with_timeout, ErrorContext, LogFormat,
    LoggingConfig, RetryConfig, WikiqaConfig, WikiqaError,
};

fn fast_retry(max_attempts: usize) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms: 5,
        max_delay_ms: 20,
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

#[tokio::test]
async fn test_error_handling() {
    let error = schema_error!("Component with the name 'Nope' not found.", "registry");

    match &error {
        WikiqaError::Schema { message, context } => {
            assert!(message.contains("Nope"));
            assert_eq!(context.component, "registry");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected Schema error"),
    }

    // Should not panic
    error.log();

    let network = WikiqaError::Network {
        message: "Connection failed".to_string(),
        source: None,
        context: ErrorContext::new("test"),
    };
    assert!(network.is_recoverable());

    let config = config_error!("Invalid config", "test");
    assert!(!config.is_recoverable());
}

#[test]
fn test_invalid_parameter_message_names_key_and_node() {
    let err = invalid_parameter_error!("top_k", "Retriever", "dispatch");
    assert_eq!(
        err.to_string(),
        "Invalid parameter 'top_k' for the node 'Retriever'."
    );
}

#[test]
fn test_error_macros() {
    let integrity = integrity_error!("missing 'components'", "pipeline_config");
    match integrity {
        WikiqaError::ConfigurationIntegrity {
            message,
            source,
            context,
        } => {
            assert_eq!(message, "missing 'components'");
            assert!(source.is_none());
            assert!(!context.recovery_suggestions.is_empty());
        }
        _ => panic!("Expected ConfigurationIntegrity error"),
    }

    let validation = validation_error!("Invalid field value", "graphql_url", "validator");
    match validation {
        WikiqaError::Validation {
            message,
            field,
            context,
        } => {
            assert_eq!(message, "Invalid field value");
            assert_eq!(field, Some("graphql_url".to_string()));
            assert_eq!(context.component, "validator");
        }
        _ => panic!("Expected Validation error"),
    }
}

#[tokio::test]
async fn test_logging_initialization() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Compact,
        include_location: false,
        log_file: None,
        span_timing: true,
        directives: vec!["wikiqa_core=debug".to_string()],
    };

    // The global subscriber can only be set once per process, so a second
    // call must report an error instead of panicking.
    let _ = init_logging(&config);
    assert!(matches!(
        init_logging(&config),
        Err(WikiqaError::Config { .. })
    ));
}

#[tokio::test]
async fn test_logging_rejects_unwritable_file() {
    let config = LoggingConfig {
        log_file: Some("/nonexistent/dir/wikiqa.log".to_string()),
        ..LoggingConfig::default()
    };
    assert!(init_logging(&config).is_err());
}

#[tokio::test]
async fn test_retry_recovers_from_transient_errors() {
    let attempts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&attempts);
    let result = retry_async(
        move || {
            let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if count < 3 {
                    Err(network_error!("temporary failure", "test"))
                } else {
                    Ok("Success")
                }
            }
        },
        fast_retry(5),
        "test_operation",
    )
    .await;

    assert_eq!(result.unwrap(), "Success");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_stops_on_permanent_errors() {
    let attempts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&attempts);
    let result: Result<(), _> = retry_async(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(config_error!("bad", "test")) }
        },
        fast_retry(5),
        "permanent",
    )
    .await;

    assert!(matches!(result, Err(WikiqaError::Config { .. })));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_gives_up_after_max_attempts() {
    let attempts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&attempts);
    let result: Result<(), _> = retry_async(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(network_error!("down", "test")) }
        },
        fast_retry(2),
        "always_down",
    )
    .await;

    assert!(matches!(result, Err(WikiqaError::Network { .. })));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_timeout_mechanism() {
    let quick = async {
        sleep(Duration::from_millis(10)).await;
        Ok("Success")
    };
    let result = with_timeout(quick, 200, "quick_test").await;
    assert_eq!(result.unwrap(), "Success");

    let slow = async {
        sleep(Duration::from_millis(200)).await;
        Ok("Should not reach here")
    };
    match with_timeout(slow, 20, "slow_test").await {
        Err(WikiqaError::Timeout {
            operation,
            duration_ms,
            ..
        }) => {
            assert_eq!(operation, "slow_test");
            assert_eq!(duration_ms, 20);
        }
        other => panic!("Expected Timeout error, got {:?}", other),
    }
}

#[test]
fn test_config_validation() {
    let mut config = WikiqaConfig::default();
    assert!(config.validate().is_ok());

    // a single attempt without retries is a valid setup
    config.wiki.max_retries = 0;
    assert!(config.validate().is_ok());

    config.wiki.timeout_secs = 0;
    match config.validate() {
        Err(WikiqaError::Config { message, .. }) => assert!(message.contains("timeout_secs")),
        other => panic!("Expected Config error, got {:?}", other),
    }
    config.wiki.timeout_secs = 30;

    config.qa.max_pairs = 0;
    match config.validate() {
        Err(WikiqaError::Config { message, .. }) => assert!(message.contains("max_pairs")),
        other => panic!("Expected Config error, got {:?}", other),
    }
}

#[test]
fn test_config_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wikiqa.toml");

    let mut config = WikiqaConfig::default();
    config.wiki.graphql_url = "http://wiki.internal/graphql".to_string();
    config.server.pipeline_yaml_path = Some("pipelines.yml".to_string());
    config.save_to_file(&path).unwrap();

    let loaded = WikiqaConfig::from_file(&path).unwrap();
    assert_eq!(loaded.wiki.graphql_url, "http://wiki.internal/graphql");
    assert_eq!(
        loaded.server.pipeline_yaml_path.as_deref(),
        Some("pipelines.yml")
    );
    assert_eq!(loaded.logging.format, LogFormat::Pretty);
}

#[test]
fn test_config_from_missing_file() {
    let result = WikiqaConfig::from_file("/definitely/not/here.toml");
    assert!(matches!(result, Err(WikiqaError::Config { .. })));
}
