//! Unified error codes for the delivery platform
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 4xxx: Order errors
//! - 5xxx: Ledger errors (credits, wallets)
//! - 6xxx: Dispatch provider errors
//! - 9xxx: System errors

use std::fmt;

/// Unified error code enum
///
/// Codes are sent to the portals as plain numbers in the error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// Webhook signature missing or invalid
    WebhookSignatureInvalid = 1101,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order is not in a state that allows a credit refund
    OrderNotRefundable = 4003,
    /// Tracking information not available yet
    TrackingNotAvailable = 4004,

    // ==================== 5xxx: Ledger ====================
    /// Business has fewer credits than the order costs
    InsufficientCredits = 5001,
    /// Business credit account not found
    BusinessAccountNotFound = 5002,
    /// Driver wallet not found
    DriverWalletNotFound = 5003,
    /// Concurrent write contention on an account
    LedgerConflict = 5005,
    /// Payment method cannot be settled
    PaymentMethodUnsupported = 5006,
    /// Amount must be positive
    InvalidAmount = 5007,

    // ==================== 6xxx: Dispatch ====================
    /// Dispatch provider unavailable (network, timeout, 5xx)
    DispatchUnavailable = 6001,
    /// Dispatch provider rejected our credentials
    DispatchAuthFailed = 6002,
    /// Dispatch provider does not know the order
    DispatchOrderNotFound = 6003,
    /// Dispatch provider rejected the request
    DispatchRejected = 6004,

    // ==================== 9xxx: System ====================
    /// Database error
    DatabaseError = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::InvalidRequest => "Invalid request",

            // Auth
            ErrorCode::WebhookSignatureInvalid => "Webhook signature is invalid",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderNotRefundable => "Order cannot be refunded in its current status",
            ErrorCode::TrackingNotAvailable => "Tracking is not available yet",

            // Ledger
            ErrorCode::InsufficientCredits => "Insufficient credits",
            ErrorCode::BusinessAccountNotFound => "Business account not found",
            ErrorCode::DriverWalletNotFound => "Driver wallet not found",
            ErrorCode::LedgerConflict => "Account is busy, please retry",
            ErrorCode::PaymentMethodUnsupported => "Payment method cannot be settled",
            ErrorCode::InvalidAmount => "Amount must be positive",

            // Dispatch
            ErrorCode::DispatchUnavailable => {
                "Delivery provider unavailable, credits were not charged"
            }
            ErrorCode::DispatchAuthFailed => "Delivery provider rejected our credentials",
            ErrorCode::DispatchOrderNotFound => "Delivery provider does not know this order",
            ErrorCode::DispatchRejected => "Delivery provider rejected the order",

            // System
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
