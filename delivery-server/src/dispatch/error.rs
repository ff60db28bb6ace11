//! Dispatch provider errors

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Errors returned by a [`DispatchProvider`](super::DispatchProvider)
#[derive(Debug, Error)]
pub enum DispatchError {
    /// 401/403: the API key is wrong or revoked. Never retried silently.
    #[error("dispatch provider rejected credentials (HTTP {status})")]
    Auth { status: u16 },

    /// 404 on an endpoint where absence is not a valid answer
    #[error("dispatch provider resource not found")]
    NotFound,

    /// Any other non-2xx answer
    #[error("dispatch provider returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("dispatch provider request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    /// 2xx answer we could not make sense of
    #[error("unexpected dispatch provider response: {0}")]
    Decode(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    /// Whether retrying on the next trigger may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::Upstream { status, .. } => *status >= 500 || *status == 429,
            DispatchError::Timeout | DispatchError::Network(_) => true,
            DispatchError::Auth { .. } | DispatchError::NotFound | DispatchError::Decode(_) => {
                false
            }
        }
    }

    /// Short machine-readable kind used in reconcile reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Auth { .. } => "auth",
            DispatchError::NotFound => "not_found",
            DispatchError::Upstream { .. } => "upstream",
            DispatchError::Timeout => "timeout",
            DispatchError::Network(_) => "network",
            DispatchError::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DispatchError::Timeout
        } else if err.is_decode() {
            DispatchError::Decode(err.to_string())
        } else {
            DispatchError::Network(err.to_string())
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Auth { status } => {
                AppError::new(ErrorCode::DispatchAuthFailed).with_detail("status", status)
            }
            DispatchError::NotFound => AppError::new(ErrorCode::DispatchOrderNotFound),
            DispatchError::Upstream { status, .. } if status < 500 && status != 429 => {
                AppError::new(ErrorCode::DispatchRejected).with_detail("status", status)
            }
            DispatchError::Upstream { .. }
            | DispatchError::Timeout
            | DispatchError::Network(_)
            | DispatchError::Decode(_) => AppError::dispatch_unavailable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DispatchError::Timeout.is_transient());
        assert!(DispatchError::Network("reset".into()).is_transient());
        assert!(
            DispatchError::Upstream {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            DispatchError::Upstream {
                status: 429,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !DispatchError::Upstream {
                status: 422,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!DispatchError::Auth { status: 401 }.is_transient());
        assert!(!DispatchError::NotFound.is_transient());
    }

    #[test]
    fn test_into_app_error() {
        let err: AppError = DispatchError::Auth { status: 403 }.into();
        assert_eq!(err.code, ErrorCode::DispatchAuthFailed);

        let err: AppError = DispatchError::Timeout.into();
        assert_eq!(err.code, ErrorCode::DispatchUnavailable);

        let err: AppError = DispatchError::Upstream {
            status: 400,
            body: "bad address".into(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::DispatchRejected);
    }
}
