use thiserror::Error;

/// Errors from the prison system of record.
#[derive(Error, Debug, Clone)]
pub enum UpstreamError {
    /// The requested resource does not exist upstream.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The API answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never got a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call did not finish within its timeout.
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::NotFound(_) | Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(0)
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}
