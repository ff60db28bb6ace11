//! Ledger model: business credits, driver wallets and the transaction log

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prepaid credit account, one per business
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessAccount {
    pub business_id: String,
    /// Remaining order credits (never negative)
    pub credits: i64,
    /// Orders ever created against this account
    pub total_orders: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Driver wallet and cash-debt ledger, one per driver
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverWallet {
    pub driver_id: String,
    /// Dispatch provider carrier linked to this driver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier_id: Option<String>,
    /// Money owed to the driver; negative when the driver holds an advance
    pub wallet_balance: Decimal,
    /// Platform fees the driver owes from cash orders
    pub pending_debts: Decimal,
    /// Above this the driver may not take more cash orders
    pub driver_debt_limit: Decimal,
    /// Everything collected or earned across completed orders
    pub gross_income: Decimal,
    pub completed_orders: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DriverWallet {
    pub fn can_accept_cash_orders(&self) -> bool {
        self.pending_debts < self.driver_debt_limit
    }
}

/// Kind of ledger entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Credit debited when a business creates an order
    OrderCreation,
    /// Credit returned to a business (failed creation, cancelled order)
    Refund,
    /// Credits bought through the payment processor
    CreditTopUp,
    /// Cash order settled: platform fee added to the driver's debts
    CashSettlement,
    /// Card order settled: driver earnings added to the wallet
    CardSettlement,
    /// Driver paid down pending debts out-of-band
    DebtPayment,
}

impl TransactionType {
    /// Idempotency kind: at most one transaction per `(reference, kind)`
    ///
    /// Both settlement branches share one kind so an order can only ever
    /// settle once, whichever branch ran.
    pub fn idempotency_kind(&self) -> &'static str {
        match self {
            TransactionType::OrderCreation => "ORDER_CREATION",
            TransactionType::Refund => "REFUND",
            TransactionType::CreditTopUp => "CREDIT_TOP_UP",
            TransactionType::CashSettlement | TransactionType::CardSettlement => "SETTLEMENT",
            TransactionType::DebtPayment => "DEBT_PAYMENT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::OrderCreation => "ORDER_CREATION",
            TransactionType::Refund => "REFUND",
            TransactionType::CreditTopUp => "CREDIT_TOP_UP",
            TransactionType::CashSettlement => "CASH_SETTLEMENT",
            TransactionType::CardSettlement => "CARD_SETTLEMENT",
            TransactionType::DebtPayment => "DEBT_PAYMENT",
        };
        f.write_str(s)
    }
}

/// Immutable ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerTransaction {
    pub id: i64,
    pub tx_type: TransactionType,
    /// Signed change applied to the subject's primary balance
    pub amount: Decimal,
    /// Order (or payment reference) this entry belongs to
    pub order_id: String,
    /// Business or driver id
    pub subject_id: String,
    /// Primary balance after this entry: credits for businesses,
    /// pending debts for cash settlements, wallet balance otherwise
    pub balance_after: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: i64,
}

/// Business account plus recent history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessAccountView {
    pub account: BusinessAccount,
    pub transactions: Vec<LedgerTransaction>,
}

/// Driver wallet plus recent history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverWalletView {
    pub wallet: DriverWallet,
    pub can_accept_cash_orders: bool,
    pub transactions: Vec<LedgerTransaction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_settlement_kinds_share_idempotency_key() {
        assert_eq!(
            TransactionType::CashSettlement.idempotency_kind(),
            TransactionType::CardSettlement.idempotency_kind()
        );
        assert_ne!(
            TransactionType::OrderCreation.idempotency_kind(),
            TransactionType::Refund.idempotency_kind()
        );
    }

    #[test]
    fn test_can_accept_cash_orders() {
        let mut wallet = DriverWallet {
            driver_id: "drv-1".into(),
            carrier_id: None,
            wallet_balance: Decimal::ZERO,
            pending_debts: dec!(199),
            driver_debt_limit: dec!(200),
            gross_income: Decimal::ZERO,
            completed_orders: 0,
            created_at: 0,
            updated_at: 0,
        };
        assert!(wallet.can_accept_cash_orders());
        wallet.pending_debts = dec!(200);
        assert!(!wallet.can_accept_cash_orders());
    }
}
