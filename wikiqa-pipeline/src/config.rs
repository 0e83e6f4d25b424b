//! Declarative pipeline definitions (YAML)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use wikiqa_core::{integrity_error, ErrorContext, WikiqaError, WikiqaResult};

/// One entry of the `components` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineNodeDefinition {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<PipelineNodeDefinition>,
}

/// Top-level YAML document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Kept optional so a document without the key can be told apart from
    /// one with an empty list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ComponentDefinition>>,
    #[serde(default)]
    pub pipelines: Vec<PipelineDefinition>,
}

impl PipelineConfig {
    pub fn from_yaml_str(yaml: &str) -> WikiqaResult<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| integrity_error!(format!("Invalid pipeline YAML: {}", e), "pipeline_config", e))
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> WikiqaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| WikiqaError::Config {
            message: format!("Failed to read pipeline YAML {}", path.display()),
            source: Some(Box::new(e)),
            context: ErrorContext::new("pipeline_config")
                .with_operation("from_yaml_file")
                .with_suggestion("Check the pipeline_yaml_path setting"),
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_string(&self) -> WikiqaResult<String> {
        serde_yaml::to_string(self).map_err(|e| WikiqaError::Internal {
            message: format!("Failed to serialize pipeline config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("pipeline_config").with_operation("to_yaml_string"),
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> WikiqaResult<()> {
        let yaml = self.to_yaml_string()?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn component(&self, name: &str) -> Option<&ComponentDefinition> {
        self.components
            .as_ref()
            .and_then(|components| components.iter().find(|c| c.name == name))
    }

    pub fn pipeline(&self, name: &str) -> Option<&PipelineDefinition> {
        self.pipelines.iter().find(|p| p.name == name)
    }
}
