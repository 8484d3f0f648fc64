use thiserror::Error;

use crate::{
    error::FailureKind,
    models::Page,
    outcome::{CONVERSION_ERROR, NETWORK_FAILURE},
};

/// How a remote page fetch can fail
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("request timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("server returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("response had no body ({message})")]
    EmptyBody { message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RemoteError::Timeout | RemoteError::Transport(_) => FailureKind::Transport,
            RemoteError::EmptyBody { .. } | RemoteError::Malformed(_) => FailureKind::Protocol,
            RemoteError::Status { .. } => FailureKind::Server,
        }
    }

    /// The text subscribers get to see. Server-provided messages pass
    /// through untouched, even when empty.
    pub fn user_message(&self) -> String {
        match self {
            RemoteError::Timeout | RemoteError::Transport(_) => NETWORK_FAILURE.to_string(),
            RemoteError::Malformed(_) => CONVERSION_ERROR.to_string(),
            RemoteError::Status { message, .. } | RemoteError::EmptyBody { message } => {
                message.clone()
            }
        }
    }
}

/// Where pages of articles come from.
///
/// Implementations make exactly one attempt per call.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch_breaking_news(&self, country: &str, page: u32) -> Result<Page, RemoteError>;
    async fn search(&self, query: &str, page: u32) -> Result<Page, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(RemoteError::Timeout.kind(), FailureKind::Transport);
        assert_eq!(RemoteError::Timeout.user_message(), "Network Failure");

        let refused = RemoteError::Transport("connection refused".into());
        assert_eq!(refused.user_message(), "Network Failure");

        let bad = RemoteError::Malformed("expected array".into());
        assert_eq!(bad.kind(), FailureKind::Protocol);
        assert_eq!(bad.user_message(), "Conversion error");

        let status = RemoteError::Status {
            code: 429,
            message: "Too many requests".into(),
        };
        assert_eq!(status.kind(), FailureKind::Server);
        assert_eq!(status.user_message(), "Too many requests");

        let empty = RemoteError::EmptyBody {
            message: String::new(),
        };
        assert_eq!(empty.kind(), FailureKind::Protocol);
        assert_eq!(empty.user_message(), "");
    }
}
