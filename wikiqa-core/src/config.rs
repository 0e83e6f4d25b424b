//! 配置管理

use crate::error::{ErrorContext, WikiqaError, WikiqaResult};
use crate::logging::LoggingConfig;
use crate::types::{QaConfig, ServerConfig, WikiSourceConfig, WikiqaConfig};

use std::path::Path;

impl Default for WikiSourceConfig {
    fn default() -> Self {
        Self {
            graphql_url: "http://localhost:3000/graphql".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: Some(1024),
            max_pairs: 5,
            api_key: None,
            base_url: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            pipeline_yaml_path: None,
            indexing_pipeline_name: "indexing".to_string(),
        }
    }
}

impl Default for WikiqaConfig {
    fn default() -> Self {
        Self {
            wiki: WikiSourceConfig::default(),
            qa: QaConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl WikiqaConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> WikiqaResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| WikiqaError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: WikiqaConfig = toml::from_str(&content).map_err(|e| WikiqaError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> WikiqaResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| WikiqaError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| WikiqaError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// 验证配置
    pub fn validate(&self) -> WikiqaResult<()> {
        if self.wiki.graphql_url.trim().is_empty() {
            return Err(WikiqaError::Config {
                message: "wiki.graphql_url must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Point wiki.graphql_url at the wiki GraphQL endpoint"),
            });
        }

        if self.wiki.timeout_secs == 0 {
            return Err(WikiqaError::Config {
                message: "wiki.timeout_secs must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set wiki.timeout_secs to at least 1"),
            });
        }

        if !(0.0..=2.0).contains(&self.qa.temperature) {
            return Err(WikiqaError::Config {
                message: "qa.temperature must be within 0.0..=2.0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use a temperature between 0.0 and 2.0"),
            });
        }

        if self.qa.max_pairs == 0 {
            return Err(WikiqaError::Config {
                message: "qa.max_pairs must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set qa.max_pairs to a positive value"),
            });
        }

        if self.server.indexing_pipeline_name.trim().is_empty() {
            return Err(WikiqaError::Config {
                message: "server.indexing_pipeline_name must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config").with_operation("validate"),
            });
        }

        Ok(())
    }
}
