use thiserror::Error;

/// Errors returned by the portal REST client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure: connect, timeout, body read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    /// Whether a retry could plausibly succeed. The client never retries on
    /// its own; this only informs the caller's decision.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Status { status, .. } => transient_status(*status),
        }
    }
}

pub(crate) fn transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_throttling_are_transient() {
        assert!(transient_status(500));
        assert!(transient_status(503));
        assert!(transient_status(429));
        assert!(transient_status(408));
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!transient_status(400));
        assert!(!transient_status(404));
        assert!(!transient_status(409));
        let err = ApiError::Status {
            status: 404,
            message: "gone".into(),
        };
        assert!(!err.is_transient());
    }
}
