use thiserror::Error;

/// Represents errors that can occur within the status and hash repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    /// The call did not finish within its timeout.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A stored value could not be mapped back to its domain type.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl RepositoryError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptRecord(msg.into())
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::DatabaseError(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut
            ),
            Self::Timeout(_) => true,
            Self::MigrationError(_) | Self::CorruptRecord(_) => false,
        }
    }
}
