//! HTTP request handlers

pub mod health;
pub mod indexing;
pub mod types;

pub use health::*;
pub use indexing::*;
pub use types::*;
