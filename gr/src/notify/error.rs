//! Notification error types

use std::time::Duration;

use thiserror::Error;

/// A single delivery attempt failed
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("webhook returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("invalid webhook URL '{0}'")]
    InvalidUrl(String),

    #[error("sink error: {0}")]
    Sink(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            DispatchError::Timeout(Duration::from_secs(10)).to_string(),
            "timeout after 10s"
        );
        let err = DispatchError::Http {
            status: 400,
            body: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "webhook returned HTTP 400: bad");
    }
}
