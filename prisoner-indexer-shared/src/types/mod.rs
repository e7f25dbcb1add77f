//! This module defines the core data structures and types used across the prisoner indexer.

pub mod diff_category;
pub mod events;
pub mod index_status;
pub mod prisoner_document;

pub use diff_category::DiffCategory;
pub use events::{PrisonerEvent, ReceiveReason, ReleaseReason};
pub use index_status::{IndexState, IndexStatus, SyncIndex};
pub use prisoner_document::PrisonerDocument;
