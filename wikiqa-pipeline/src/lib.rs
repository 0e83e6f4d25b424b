//! wikiqa Pipeline - node registry, parameter capture and dispatch
//!
//! Node types are registered in a [`NodeRegistry`] and constructed through
//! it, which records the arguments each [`Component`] was built from so the
//! pipeline can be written back out as YAML. A [`Pipeline`] drives its
//! components through the dispatch layer, which routes the declared subset of
//! the [`PipelineState`] into each node.

pub mod component;
pub mod config;
pub mod dispatch;
pub mod node;
pub mod pipeline;
pub mod registry;
pub mod state;

#[cfg(test)]
mod testing;

pub use component::*;
pub use config::*;
pub use node::*;
pub use pipeline::*;
pub use registry::*;
pub use state::*;

pub use async_trait::async_trait;
