use thiserror::Error;

/// Everything that can go wrong outside the fetch path.
///
/// Fetch failures never show up here: they are folded into
/// `Outcome::Error` by the accumulator. These are for saved-article,
/// config and setup operations, which report straight to their caller.
#[derive(Error, Debug)]
pub enum Error {
    #[error("API client error: {0}")]
    ApiError(String),

    #[error("Saved article store failed: {0}")]
    StoreError(#[from] newsdesk_store::StoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Background task failed: {0}")]
    TaskError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Which layer a failed fetch broke in. Only used for logging; callers
/// just see the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No network path, detected before calling out
    Connectivity,
    /// The request itself failed (timeout, reset, refused)
    Transport,
    /// The call went through but the payload was missing or unreadable
    Protocol,
    /// The server answered with an error status
    Server,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Connectivity => write!(f, "connectivity"),
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Protocol => write!(f, "protocol"),
            FailureKind::Server => write!(f, "server"),
        }
    }
}
