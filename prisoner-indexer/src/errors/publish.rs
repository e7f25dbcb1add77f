use thiserror::Error;

/// Errors from publishing a decided event.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("Failed to serialize event: {0}")]
    Serialization(String),

    #[error("Failed to deliver event: {0}")]
    Delivery(String),
}

impl PublishError {
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }
}
