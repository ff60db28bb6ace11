//! Error category classification

use super::codes::ErrorCode;

/// Error category derived from the code range
///
/// - 0xxx: General errors
/// - 1xxx: Authentication errors
/// - 4xxx: Order errors
/// - 5xxx: Ledger errors
/// - 6xxx: Dispatch provider errors
/// - 9xxx: System errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    General,
    Auth,
    Order,
    Ledger,
    Dispatch,
    /// 9xxx and unassigned ranges; logged when returned to a caller
    System,
}

impl ErrorCategory {
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            1000..2000 => Self::Auth,
            4000..5000 => Self::Order,
            5000..6000 => Self::Ledger,
            6000..7000 => Self::Dispatch,
            _ => Self::System,
        }
    }
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_ranges() {
        assert_eq!(ErrorCategory::from_code(2), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(1101), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_code(4001), ErrorCategory::Order);
        assert_eq!(ErrorCategory::from_code(5001), ErrorCategory::Ledger);
        assert_eq!(ErrorCategory::from_code(6001), ErrorCategory::Dispatch);
        assert_eq!(ErrorCategory::from_code(9002), ErrorCategory::System);
        assert_eq!(ErrorCategory::from_code(2500), ErrorCategory::System);
    }

    #[test]
    fn test_code_category() {
        assert_eq!(
            ErrorCode::InsufficientCredits.category(),
            ErrorCategory::Ledger
        );
        assert_eq!(
            ErrorCode::DispatchAuthFailed.category(),
            ErrorCategory::Dispatch
        );
        assert_eq!(ErrorCode::DatabaseError.category(), ErrorCategory::System);
    }
}
