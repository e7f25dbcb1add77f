//! OpenSearch implementation of the document index provider.
//!
//! This module provides a concrete implementation of `DocumentIndexProvider`
//! using OpenSearch as the backend.

mod index_config;
mod provider;

pub use index_config::{get_index_settings, IndexConfig, DEFAULT_ALIAS};
pub use provider::OpenSearchProvider;
