//! Error type and the JSON error body

use super::category::ErrorCategory;
use super::codes::ErrorCode;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Application error with structured error code and details
///
/// Handlers return [`AppResult`]; the error renders as an [`ErrorBody`]
/// with the status from [`ErrorCode::http_status`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    /// Context for the caller (ids, balances, upstream reason)
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Error with the default message for `code`
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    // ==================== Convenience constructors ====================

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::DatabaseError, msg)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidRequest, msg)
    }

    pub fn invalid_signature(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::WebhookSignatureInvalid, msg)
    }

    pub fn insufficient_credits(available: i64, required: i64) -> Self {
        Self::new(ErrorCode::InsufficientCredits)
            .with_detail("available", available)
            .with_detail("required", required)
    }

    pub fn dispatch_unavailable() -> Self {
        Self::new(ErrorCode::DispatchUnavailable)
    }
}

/// JSON body of every error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code.code(),
            message: err.message.clone(),
            details: err.details.clone(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

// ===== Axum Integration =====

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;

        let status = self.http_status();
        let body = ErrorBody::from(&self);

        if self.code.category() == ErrorCategory::System {
            tracing::error!(
                code = %self.code,
                message = %self.message,
                "System error occurred"
            );
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_new() {
        let err = AppError::new(ErrorCode::OrderNotFound);
        assert_eq!(err.code, ErrorCode::OrderNotFound);
        assert_eq!(err.message, "Order not found");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_app_error_with_detail() {
        let err = AppError::validation("Missing required fields")
            .with_detail("field", "customer.address")
            .with_detail("reason", "required");

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        let details = err.details.unwrap();
        assert_eq!(details.get("field").unwrap(), "customer.address");
        assert_eq!(details.get("reason").unwrap(), "required");
    }

    #[test]
    fn test_app_error_http_status() {
        assert_eq!(
            AppError::new(ErrorCode::TrackingNotAvailable).http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::invalid_signature("bad").http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::insufficient_credits(0, 1).http_status(),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[test]
    fn test_app_error_convenience_constructors() {
        let err = AppError::insufficient_credits(0, 1);
        assert_eq!(err.code, ErrorCode::InsufficientCredits);
        assert_eq!(err.details.as_ref().unwrap().get("required").unwrap(), 1);

        let err = AppError::dispatch_unavailable();
        assert_eq!(err.code, ErrorCode::DispatchUnavailable);
        assert!(err.message.contains("credits were not charged"));

        let err = AppError::database("Connection failed");
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.to_string(), "Connection failed");
    }

    #[test]
    fn test_error_body_serialize() {
        let err = AppError::new(ErrorCode::OrderNotRefundable).with_detail("order_id", "o1");
        let json = serde_json::to_value(ErrorBody::from(&err)).unwrap();
        assert_eq!(json["code"], 4003);
        assert_eq!(json["details"]["order_id"], "o1");

        let json = serde_json::to_value(ErrorBody::from(&AppError::validation("x"))).unwrap();
        assert!(json.get("details").is_none());
    }
}
