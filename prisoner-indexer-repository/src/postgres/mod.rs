//! PostgreSQL implementations of the status and dedup hash repositories.

mod entity_hash_repository;
mod index_status_repository;

pub use entity_hash_repository::PostgresEntityHashRepository;
pub use index_status_repository::PostgresIndexStatusRepository;

use crate::errors::RepositoryError;

/// Apply the bundled schema migrations.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), RepositoryError> {
    sqlx::migrate!("src/postgres/migrations").run(pool).await?;
    Ok(())
}
