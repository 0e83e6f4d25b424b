//! wikiqa Nodes - custom pipeline nodes for wiki question answering
//!
//! A GraphQL wiki source, table of contents flattening, LLM-backed
//! question/answer generation, a query normalizer and an in-memory document
//! store, all registered through [`register_nodes`].

pub mod graphql;
pub mod loader;
pub mod lower_text;
pub mod qa;
pub mod store;
pub mod toc;

pub use graphql::{GraphqlWikiClient, TocEntry, WikiPage, PAGES_TOC_QUERY};
pub use loader::{section_document, WikiDataLoader};
pub use lower_text::LowerText;
pub use qa::{parse_qa_pairs, QaModel, QaPair, QaSettings, QuestionAnswerGenerator, SiumaiQaModel};
pub use store::InMemoryDocumentStore;
pub use toc::{flatten_pages, TocRecord};

use wikiqa_core::{WikiqaConfig, WikiqaResult};
use wikiqa_pipeline::NodeRegistry;

/// Register every node type of this crate with built-in defaults
pub fn register_nodes(registry: &mut NodeRegistry) -> WikiqaResult<()> {
    register_nodes_with(registry, &WikiqaConfig::default())
}

/// Register every node type of this crate. The `[wiki]` and `[qa]` sections
/// of `config` become the construction defaults of the loader and the
/// generator, so pipeline files only need to spell out what differs.
pub fn register_nodes_with(registry: &mut NodeRegistry, config: &WikiqaConfig) -> WikiqaResult<()> {
    registry.register_with_defaults::<WikiDataLoader>(&WikiDataLoader::config_defaults(
        &config.wiki,
    ))?;
    registry.register_with_defaults::<QuestionAnswerGenerator>(
        &QuestionAnswerGenerator::config_defaults(&config.qa),
    )?;
    registry.register::<LowerText>()?;
    registry.register::<InMemoryDocumentStore>()?;
    Ok(())
}

/// A registry holding the node types of this crate
pub fn default_registry() -> WikiqaResult<NodeRegistry> {
    registry_from_config(&WikiqaConfig::default())
}

pub fn registry_from_config(config: &WikiqaConfig) -> WikiqaResult<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    register_nodes_with(&mut registry, config)?;
    Ok(registry)
}
