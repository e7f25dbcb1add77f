//! Blue/green index status record.
//!
//! One `IndexStatus` exists per deployment. It records which of the two physical
//! indices the public alias targets ("current") and the build state of the other
//! one. The transition helpers here are pure; guard checks and persistence live
//! with the lifecycle manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the two physical indices, or `None` before the first build completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncIndex {
    None,
    A,
    B,
}

impl SyncIndex {
    /// The index that is "other" when `self` is current.
    ///
    /// Before anything has been built the first rebuild targets `A`.
    pub fn other(self) -> SyncIndex {
        match self {
            SyncIndex::None => SyncIndex::A,
            SyncIndex::A => SyncIndex::B,
            SyncIndex::B => SyncIndex::A,
        }
    }

    /// Physical index name for this index under the given alias, e.g. `prisoner-search-a`.
    pub fn index_name(self, alias: &str) -> Option<String> {
        match self {
            SyncIndex::None => None,
            SyncIndex::A => Some(format!("{}-a", alias)),
            SyncIndex::B => Some(format!("{}-b", alias)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncIndex::None => "NONE",
            SyncIndex::A => "A",
            SyncIndex::B => "B",
        }
    }

    pub fn parse(value: &str) -> Option<SyncIndex> {
        match value {
            "NONE" => Some(SyncIndex::None),
            "A" => Some(SyncIndex::A),
            "B" => Some(SyncIndex::B),
            _ => None,
        }
    }
}

/// Build state of a physical index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexState {
    Absent,
    Building,
    Completed,
    Cancelled,
}

impl IndexState {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexState::Absent => "ABSENT",
            IndexState::Building => "BUILDING",
            IndexState::Completed => "COMPLETED",
            IndexState::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<IndexState> {
        match value {
            "ABSENT" => Some(IndexState::Absent),
            "BUILDING" => Some(IndexState::Building),
            "COMPLETED" => Some(IndexState::Completed),
            "CANCELLED" => Some(IndexState::Cancelled),
            _ => None,
        }
    }

    /// Whether documents should be written to an index in this state.
    pub fn is_active(self) -> bool {
        matches!(self, IndexState::Building | IndexState::Completed)
    }
}

/// The singleton index status record.
///
/// `version` is bumped by every persisted transition and is the compare-and-swap
/// token used by the status repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub current_index: SyncIndex,
    pub current_index_state: IndexState,
    pub current_index_start_build_time: Option<DateTime<Utc>>,
    pub current_index_end_build_time: Option<DateTime<Utc>>,
    pub other_index_state: IndexState,
    pub other_index_start_build_time: Option<DateTime<Utc>>,
    pub other_index_end_build_time: Option<DateTime<Utc>>,
    pub version: i64,
}

impl Default for IndexStatus {
    fn default() -> Self {
        Self::new_absent()
    }
}

impl IndexStatus {
    /// The bootstrap record: no current index, nothing built.
    pub fn new_absent() -> Self {
        Self {
            current_index: SyncIndex::None,
            current_index_state: IndexState::Absent,
            current_index_start_build_time: None,
            current_index_end_build_time: None,
            other_index_state: IndexState::Absent,
            other_index_start_build_time: None,
            other_index_end_build_time: None,
            version: 0,
        }
    }

    pub fn other_index(&self) -> SyncIndex {
        self.current_index.other()
    }

    pub fn is_building(&self) -> bool {
        self.other_index_state == IndexState::Building
    }

    /// Indices that should receive document writes, current first.
    pub fn active_indices(&self) -> Vec<SyncIndex> {
        let mut indices = Vec::with_capacity(2);
        if self.current_index != SyncIndex::None && self.current_index_state.is_active() {
            indices.push(self.current_index);
        }
        if self.other_index_state.is_active() {
            indices.push(self.other_index());
        }
        indices
    }

    /// Other index starts building.
    pub fn to_building(&self, now: DateTime<Utc>) -> Self {
        Self {
            other_index_state: IndexState::Building,
            other_index_start_build_time: Some(now),
            other_index_end_build_time: None,
            ..self.clone()
        }
    }

    /// Other index build is abandoned; the index is left in place, unaliased.
    pub fn to_cancelled(&self, now: DateTime<Utc>) -> Self {
        Self {
            other_index_state: IndexState::Cancelled,
            other_index_end_build_time: Some(now),
            ..self.clone()
        }
    }

    /// Other index build completes and becomes current; the old current is
    /// demoted to other with its state reset to `ABSENT`.
    pub fn to_build_complete(&self, now: DateTime<Utc>) -> Self {
        Self {
            current_index: self.other_index(),
            current_index_state: IndexState::Completed,
            current_index_start_build_time: self.other_index_start_build_time,
            current_index_end_build_time: Some(now),
            other_index_state: IndexState::Absent,
            other_index_start_build_time: None,
            other_index_end_build_time: None,
            version: self.version,
        }
    }

    /// Swap current and other without rebuilding.
    pub fn to_switched(&self) -> Self {
        Self {
            current_index: self.other_index(),
            current_index_state: self.other_index_state,
            current_index_start_build_time: self.other_index_start_build_time,
            current_index_end_build_time: self.other_index_end_build_time,
            other_index_state: self.current_index_state,
            other_index_start_build_time: self.current_index_start_build_time,
            other_index_end_build_time: self.current_index_end_build_time,
            version: self.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_index() {
        assert_eq!(SyncIndex::None.other(), SyncIndex::A);
        assert_eq!(SyncIndex::A.other(), SyncIndex::B);
        assert_eq!(SyncIndex::B.other(), SyncIndex::A);
    }

    #[test]
    fn test_index_name() {
        assert_eq!(SyncIndex::None.index_name("prisoner-search"), None);
        assert_eq!(
            SyncIndex::A.index_name("prisoner-search"),
            Some("prisoner-search-a".to_string())
        );
        assert_eq!(
            SyncIndex::B.index_name("prisoner-search"),
            Some("prisoner-search-b".to_string())
        );
    }

    #[test]
    fn test_parse_round_trips_names() {
        for index in [SyncIndex::None, SyncIndex::A, SyncIndex::B] {
            assert_eq!(SyncIndex::parse(index.as_str()), Some(index));
        }
        for state in [
            IndexState::Absent,
            IndexState::Building,
            IndexState::Completed,
            IndexState::Cancelled,
        ] {
            assert_eq!(IndexState::parse(state.as_str()), Some(state));
        }
        assert_eq!(IndexState::parse("bogus"), None);
    }

    #[test]
    fn test_active_indices_bootstrap() {
        let status = IndexStatus::new_absent();
        assert!(status.active_indices().is_empty());

        let building = status.to_building(Utc::now());
        assert_eq!(building.active_indices(), vec![SyncIndex::A]);
    }

    #[test]
    fn test_build_complete_swaps_and_demotes() {
        let start = Utc::now();
        let status = IndexStatus::new_absent().to_building(start);
        let completed = status.to_build_complete(start + chrono::Duration::minutes(5));

        assert_eq!(completed.current_index, SyncIndex::A);
        assert_eq!(completed.current_index_state, IndexState::Completed);
        assert_eq!(completed.current_index_start_build_time, Some(start));
        assert_eq!(completed.other_index(), SyncIndex::B);
        assert_eq!(completed.other_index_state, IndexState::Absent);
        assert_eq!(completed.active_indices(), vec![SyncIndex::A]);
    }

    #[test]
    fn test_building_on_top_of_current_writes_both() {
        let now = Utc::now();
        let status = IndexStatus::new_absent()
            .to_building(now)
            .to_build_complete(now)
            .to_building(now);

        assert_eq!(status.active_indices(), vec![SyncIndex::A, SyncIndex::B]);
    }

    #[test]
    fn test_cancelled_index_is_not_active() {
        let now = Utc::now();
        let status = IndexStatus::new_absent()
            .to_building(now)
            .to_build_complete(now)
            .to_building(now)
            .to_cancelled(now);

        assert_eq!(status.other_index_state, IndexState::Cancelled);
        assert_eq!(status.active_indices(), vec![SyncIndex::A]);
    }

    #[test]
    fn test_switched_swaps_roles_and_states() {
        let now = Utc::now();
        let mut status = IndexStatus::new_absent().to_building(now).to_build_complete(now);
        status.other_index_state = IndexState::Completed;

        let switched = status.to_switched();
        assert_eq!(switched.current_index, SyncIndex::B);
        assert_eq!(switched.current_index_state, IndexState::Completed);
        assert_eq!(switched.other_index(), SyncIndex::A);
        assert_eq!(switched.other_index_state, IndexState::Completed);
    }
}
