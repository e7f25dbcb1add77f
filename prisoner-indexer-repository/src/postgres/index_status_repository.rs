//! PostgreSQL implementation of the index status repository.
//!
//! Stores the singleton record in the `index_status` table under `id = 1`.
//! Every write is guarded by the `version` column.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::debug;

use crate::errors::RepositoryError;
use crate::interfaces::IndexStatusRepository;
use prisoner_indexer_shared::{IndexState, IndexStatus, SyncIndex};

const STATUS_COLUMNS: &str = "current_index, current_index_state, \
    current_index_start_build_time, current_index_end_build_time, \
    other_index_state, other_index_start_build_time, other_index_end_build_time, version";

/// PostgreSQL-backed index status repository.
pub struct PostgresIndexStatusRepository {
    pool: sqlx::PgPool,
}

impl PostgresIndexStatusRepository {
    /// Creates a new repository over a pool whose schema has been migrated.
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, RepositoryError> {
        Ok(Self { pool })
    }

    fn map_row(row: &PgRow) -> Result<IndexStatus, RepositoryError> {
        let current_index: String = row.try_get("current_index")?;
        let current_state: String = row.try_get("current_index_state")?;
        let other_state: String = row.try_get("other_index_state")?;

        Ok(IndexStatus {
            current_index: SyncIndex::parse(&current_index).ok_or_else(|| {
                RepositoryError::corrupt(format!("unknown current_index {}", current_index))
            })?,
            current_index_state: Self::parse_state(&current_state)?,
            current_index_start_build_time: row.try_get("current_index_start_build_time")?,
            current_index_end_build_time: row.try_get("current_index_end_build_time")?,
            other_index_state: Self::parse_state(&other_state)?,
            other_index_start_build_time: row.try_get("other_index_start_build_time")?,
            other_index_end_build_time: row.try_get("other_index_end_build_time")?,
            version: row.try_get("version")?,
        })
    }

    fn parse_state(value: &str) -> Result<IndexState, RepositoryError> {
        IndexState::parse(value)
            .ok_or_else(|| RepositoryError::corrupt(format!("unknown index state {}", value)))
    }

    async fn update_if_version(
        &self,
        expected_version: i64,
        next: &IndexStatus,
    ) -> Result<Option<IndexStatus>, RepositoryError> {
        let sql = format!(
            "UPDATE index_status SET \
                current_index = $1, \
                current_index_state = $2, \
                current_index_start_build_time = $3, \
                current_index_end_build_time = $4, \
                other_index_state = $5, \
                other_index_start_build_time = $6, \
                other_index_end_build_time = $7, \
                version = version + 1 \
             WHERE id = 1 AND version = $8 \
             RETURNING {}",
            STATUS_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(next.current_index.as_str())
            .bind(next.current_index_state.as_str())
            .bind(next.current_index_start_build_time)
            .bind(next.current_index_end_build_time)
            .bind(next.other_index_state.as_str())
            .bind(next.other_index_start_build_time)
            .bind(next.other_index_end_build_time)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::map_row).transpose()
    }
}

#[async_trait]
impl IndexStatusRepository for PostgresIndexStatusRepository {
    async fn get(&self) -> Result<Option<IndexStatus>, RepositoryError> {
        let sql = format!("SELECT {} FROM index_status WHERE id = 1", STATUS_COLUMNS);
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::map_row).transpose()
    }

    async fn get_or_create(&self) -> Result<IndexStatus, RepositoryError> {
        let bootstrap = IndexStatus::new_absent();
        let sql = format!(
            "INSERT INTO index_status (id, {columns}) \
             VALUES (1, $1, $2, NULL, NULL, $3, NULL, NULL, 0) \
             ON CONFLICT (id) DO NOTHING",
            columns = STATUS_COLUMNS
        );
        sqlx::query(&sql)
            .bind(bootstrap.current_index.as_str())
            .bind(bootstrap.current_index_state.as_str())
            .bind(bootstrap.other_index_state.as_str())
            .execute(&self.pool)
            .await?;

        self.get()
            .await?
            .ok_or_else(|| RepositoryError::corrupt("index_status row missing after insert"))
    }

    async fn compare_and_swap(
        &self,
        expected_version: i64,
        next: &IndexStatus,
    ) -> Result<Option<IndexStatus>, RepositoryError> {
        let stored = self.update_if_version(expected_version, next).await?;
        if stored.is_none() {
            debug!(expected_version, "Index status compare-and-swap lost");
        }
        Ok(stored)
    }

    async fn reset(&self) -> Result<IndexStatus, RepositoryError> {
        let current = self.get_or_create().await?;
        self.update_if_version(current.version, &IndexStatus::new_absent())
            .await?
            .ok_or_else(|| RepositoryError::corrupt("index_status changed during reset"))
    }
}
