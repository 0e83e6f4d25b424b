//! wikiqa Core - Core data structures and trait definitions
//!
//! Error taxonomy, logging, configuration and the document types shared by the
//! pipeline framework, the custom nodes and the servers built on top of them.

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use async_utils::*;
pub use error::*;
pub use logging::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio;
pub use tracing;
