//! PostgreSQL implementation of the dedup hash repository.
//!
//! Each [`HashStream`] maps to its own table keyed by prisoner number. The
//! conditional upsert is a single statement, so the "has it changed?" check and
//! the write cannot interleave with another publisher.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::errors::RepositoryError;
use crate::interfaces::EntityHashRepository;
use crate::types::HashStream;

/// PostgreSQL-backed dedup hash repository.
pub struct PostgresEntityHashRepository {
    pool: sqlx::PgPool,
}

impl PostgresEntityHashRepository {
    /// Creates a new repository over a pool whose schema has been migrated.
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, RepositoryError> {
        Ok(Self { pool })
    }
}

#[async_trait]
impl EntityHashRepository for PostgresEntityHashRepository {
    async fn upsert_if_changed(
        &self,
        stream: HashStream,
        prisoner_number: &str,
        hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let table = stream.table();
        let sql = format!(
            "INSERT INTO {table} (prisoner_number, hash, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (prisoner_number) DO UPDATE \
             SET hash = EXCLUDED.hash, updated_at = EXCLUDED.updated_at \
             WHERE {table}.hash <> EXCLUDED.hash",
            table = table
        );

        let result = sqlx::query(&sql)
            .bind(prisoner_number)
            .bind(hash)
            .bind(updated_at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn get_hash(
        &self,
        stream: HashStream,
        prisoner_number: &str,
    ) -> Result<Option<String>, RepositoryError> {
        let sql = format!(
            "SELECT hash FROM {} WHERE prisoner_number = $1",
            stream.table()
        );
        let row = sqlx::query(&sql)
            .bind(prisoner_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.try_get("hash")).transpose()?)
    }

    async fn delete(
        &self,
        stream: HashStream,
        prisoner_number: &str,
    ) -> Result<u64, RepositoryError> {
        let sql = format!("DELETE FROM {} WHERE prisoner_number = $1", stream.table());
        let result = sqlx::query(&sql)
            .bind(prisoner_number)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_older_than(
        &self,
        stream: HashStream,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let sql = format!("DELETE FROM {} WHERE updated_at < $1", stream.table());
        let result = sqlx::query(&sql)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
