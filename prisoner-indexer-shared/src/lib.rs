//! # Prisoner Indexer Shared
//!
//! This crate defines shared data structures and types used across the prisoner
//! indexer crates: the indexed prisoner document, the blue/green index status
//! record, difference categories and the outbound domain events.

pub mod types;

pub use types::diff_category::DiffCategory;
pub use types::events::{PrisonerEvent, ReceiveReason, ReleaseReason};
pub use types::index_status::{IndexState, IndexStatus, SyncIndex};
pub use types::prisoner_document::{
    CurrentIncentive, IncentiveLevel, PhoneNumber, PrisonerAddress, PrisonerAlert, PrisonerAlias,
    PrisonerDocument, PrisonerIdentifier,
};
