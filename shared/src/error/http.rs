//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // 404 Not Found
            Self::OrderNotFound
            | Self::TrackingNotAvailable
            | Self::BusinessAccountNotFound
            | Self::DriverWalletNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::OrderNotRefundable | Self::LedgerConflict => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::WebhookSignatureInvalid => StatusCode::UNAUTHORIZED,

            // 402 Payment Required
            Self::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,

            // 422 Unprocessable Entity
            Self::PaymentMethodUnsupported => StatusCode::UNPROCESSABLE_ENTITY,

            // 502 Bad Gateway (upstream answered, but not usefully)
            Self::DispatchAuthFailed | Self::DispatchOrderNotFound | Self::DispatchRejected => {
                StatusCode::BAD_GATEWAY
            }

            // 503 Service Unavailable (transient errors, client can retry)
            Self::DispatchUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        assert_eq!(
            ErrorCode::OrderNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::DriverWalletNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_ledger_status() {
        assert_eq!(
            ErrorCode::InsufficientCredits.http_status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            ErrorCode::LedgerConflict.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::InvalidAmount.http_status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_dispatch_status() {
        assert_eq!(
            ErrorCode::DispatchUnavailable.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::DispatchAuthFailed.http_status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_unauthorized_status() {
        assert_eq!(
            ErrorCode::WebhookSignatureInvalid.http_status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_internal_status() {
        assert_eq!(
            ErrorCode::DatabaseError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_defaults_to_bad_request() {
        assert_eq!(
            ErrorCode::ValidationFailed.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::InvalidRequest.http_status(),
            StatusCode::BAD_REQUEST
        );
    }
}
