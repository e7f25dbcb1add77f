//! Consistency engine: per-prisoner synchronisation and event decisions.

pub mod decisions;
pub mod dedup;
pub mod difference;
pub mod locks;
pub mod movement;
mod notifications;
mod synchroniser;

pub use decisions::{decide, EventDecisions};
pub use dedup::{Claim, DedupGate};
pub use difference::{changed_categories, get_differences, Difference};
pub use locks::EntityLocks;
pub use movement::{classify, Classification, MovementChange, MovementSnapshot};
pub use synchroniser::{PrisonerSynchroniser, SyncOutcome};
