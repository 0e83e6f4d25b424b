//! The node contract
//!
//! A node type implements [`Node`] for execution and [`NodeType`] for the
//! static description the registry keeps: its type name, the construction
//! parameters it declares and the run parameters it accepts.

use crate::component::InitArgs;
use crate::state::{NodeOutput, RunArgs};
use async_trait::async_trait;
use serde_json::Value;
use wikiqa_core::WikiqaResult;

/// Which of a node's two entry points a dispatch targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Single,
    Batch,
}

/// Executable half of a node.
///
/// Both entry points return the node's output together with the label of the
/// outgoing edge the output travels on, usually `"output_1"`.
#[async_trait]
pub trait Node: Send + Sync {
    async fn run(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)>;

    async fn run_batch(&self, args: RunArgs) -> WikiqaResult<(NodeOutput, String)>;
}

/// One declared construction parameter
#[derive(Debug, Clone, PartialEq)]
pub struct InitParam {
    pub name: &'static str,
    /// `None` marks a required parameter
    pub default: Option<Value>,
}

impl InitParam {
    pub fn required(name: &'static str) -> Self {
        Self {
            name,
            default: None,
        }
    }

    pub fn optional(name: &'static str, default: impl Into<Value>) -> Self {
        Self {
            name,
            default: Some(default.into()),
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Static description of a node type
pub trait NodeType: Node + Sized + 'static {
    /// Name the type is registered and referenced under
    const TYPE_NAME: &'static str;

    /// Number of outgoing edges
    const OUTGOING_EDGES: usize = 1;

    /// Parameters `run` accepts
    const RUN_PARAMS: &'static [&'static str];

    /// Parameters `run_batch` accepts
    const RUN_BATCH_PARAMS: &'static [&'static str];

    /// Construction parameters in declaration order
    fn init_params() -> Vec<InitParam> {
        Vec::new()
    }

    /// Build an instance from the resolved construction arguments
    fn from_args(args: &InitArgs<'_>) -> WikiqaResult<Self>;
}
