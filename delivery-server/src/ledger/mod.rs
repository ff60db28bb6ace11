//! Ledger engine: business credits and driver wallets
//!
//! Every mutation is one redb write transaction that reads the account,
//! validates, writes the account back and appends the ledger row together
//! with its idempotency key. A crash can never leave a balance change
//! without its row, or a row without its balance change.
//!
//! Idempotency: at most one transaction exists per `(reference, kind)`.
//! Replaying an operation with the same key returns the recorded outcome
//! without mutating anything, so callers retry freely with the same key.
//!
//! Account tables are private to this module; no other part of the crate
//! can write `credits`, `wallet_balance` or `pending_debts`.

mod storage;

pub(crate) use storage::create_tables;

use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::ledger::{
    BusinessAccount, BusinessAccountView, DriverWallet, DriverWalletView, LedgerTransaction,
    TransactionType,
};
use shared::order::PaymentMethod;
use thiserror::Error;

use crate::db::{Database, StorageError};

/// How many ledger rows the account views include
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient credits: available {available}, required {required}")]
    InsufficientCredits { available: i64, required: i64 },

    #[error("business account not found: {0}")]
    BusinessNotFound(String),

    #[error("driver wallet not found: {0}")]
    DriverNotFound(String),

    #[error("payment method {0:?} cannot be settled")]
    UnsupportedPaymentMethod(PaymentMethod),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("no credit debit recorded for order {0}")]
    NothingToRefund(String),

    /// Storage failed mid-operation; nothing was written. Retry with the same key.
    #[error("ledger storage conflict: {0}")]
    Conflict(#[from] StorageError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<redb::CommitError> for LedgerError {
    fn from(err: redb::CommitError) -> Self {
        LedgerError::Conflict(err.into())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits {
                available,
                required,
            } => AppError::insufficient_credits(available, required),
            LedgerError::BusinessNotFound(id) => {
                AppError::new(ErrorCode::BusinessAccountNotFound).with_detail("business_id", id)
            }
            LedgerError::DriverNotFound(id) => {
                AppError::new(ErrorCode::DriverWalletNotFound).with_detail("driver_id", id)
            }
            LedgerError::UnsupportedPaymentMethod(_) => {
                AppError::new(ErrorCode::PaymentMethodUnsupported)
            }
            LedgerError::InvalidAmount(msg) => {
                AppError::with_message(ErrorCode::InvalidAmount, msg)
            }
            LedgerError::NothingToRefund(order_id) => {
                AppError::new(ErrorCode::OrderNotRefundable).with_detail("order_id", order_id)
            }
            LedgerError::Conflict(e) => {
                tracing::warn!(error = %e, "Ledger operation failed in storage");
                AppError::new(ErrorCode::LedgerConflict)
            }
        }
    }
}

/// Outcome of [`LedgerService::pre_debit_for_new_order`]
#[derive(Debug, Clone, PartialEq)]
pub struct PreDebit {
    pub remaining_credits: i64,
    pub transaction: LedgerTransaction,
    /// `true` when the key was already recorded and nothing changed
    pub replayed: bool,
}

/// Outcome of a keyed credit operation (refund, top-up, debt payment)
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub transaction: LedgerTransaction,
    pub replayed: bool,
}

/// Outcome of [`LedgerService::settle_completed_order`]
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Applied(LedgerTransaction),
    AlreadySettled(LedgerTransaction),
}

impl Settlement {
    pub fn transaction(&self) -> &LedgerTransaction {
        match self {
            Settlement::Applied(tx) | Settlement::AlreadySettled(tx) => tx,
        }
    }
}

/// Owner of every balance in the system
#[derive(Clone)]
pub struct LedgerService {
    db: Database,
    default_debt_limit: Decimal,
}

impl LedgerService {
    pub fn new(db: Database, default_debt_limit: Decimal) -> Self {
        Self {
            db,
            default_debt_limit,
        }
    }

    // ========== Accounts ==========

    /// Open a credit account, or return the existing one untouched
    pub fn open_business_account(
        &self,
        business_id: &str,
        initial_credits: i64,
    ) -> LedgerResult<BusinessAccount> {
        if initial_credits < 0 {
            return Err(LedgerError::InvalidAmount(
                "initial credits cannot be negative".into(),
            ));
        }

        let txn = self.db.begin_write()?;
        let account = match storage::business(&txn, business_id)? {
            Some(existing) => existing,
            None => {
                let now = shared::util::now_millis();
                let account = BusinessAccount {
                    business_id: business_id.to_string(),
                    credits: initial_credits,
                    total_orders: 0,
                    created_at: now,
                    updated_at: now,
                };
                storage::put_business(&txn, &account)?;
                account
            }
        };
        txn.commit()?;
        Ok(account)
    }

    /// Create a driver wallet, or update the carrier link of an existing one
    pub fn register_driver(
        &self,
        driver_id: &str,
        carrier_id: Option<&str>,
        debt_limit: Option<Decimal>,
    ) -> LedgerResult<DriverWallet> {
        let txn = self.db.begin_write()?;
        let now = shared::util::now_millis();
        let mut wallet = match storage::wallet(&txn, driver_id)? {
            Some(existing) => existing,
            None => DriverWallet {
                driver_id: driver_id.to_string(),
                carrier_id: None,
                wallet_balance: Decimal::ZERO,
                pending_debts: Decimal::ZERO,
                driver_debt_limit: debt_limit.unwrap_or(self.default_debt_limit),
                gross_income: Decimal::ZERO,
                completed_orders: 0,
                created_at: now,
                updated_at: now,
            },
        };

        if let Some(limit) = debt_limit {
            wallet.driver_debt_limit = limit;
        }
        if let Some(carrier_id) = carrier_id {
            if let Some(previous) = wallet.carrier_id.as_deref()
                && previous != carrier_id
            {
                storage::unlink_carrier(&txn, previous)?;
            }
            storage::link_carrier(&txn, carrier_id, driver_id)?;
            wallet.carrier_id = Some(carrier_id.to_string());
        }
        wallet.updated_at = now;
        storage::put_wallet(&txn, &wallet)?;
        txn.commit()?;

        tracing::info!(driver_id = %driver_id, carrier_id = ?carrier_id, "Driver wallet registered");
        Ok(wallet)
    }

    pub fn find_driver_by_carrier(&self, carrier_id: &str) -> LedgerResult<Option<String>> {
        Ok(storage::read_driver_for_carrier(&self.db, carrier_id)?)
    }

    pub fn driver_can_accept_cash(&self, driver_id: &str) -> LedgerResult<bool> {
        storage::read_wallet(&self.db, driver_id)?
            .map(|w| w.can_accept_cash_orders())
            .ok_or_else(|| LedgerError::DriverNotFound(driver_id.to_string()))
    }

    pub fn business_account(&self, business_id: &str) -> LedgerResult<BusinessAccountView> {
        let account = storage::read_business(&self.db, business_id)?
            .ok_or_else(|| LedgerError::BusinessNotFound(business_id.to_string()))?;
        let transactions = storage::read_transactions_for(&self.db, business_id, HISTORY_LIMIT)?;
        Ok(BusinessAccountView {
            account,
            transactions,
        })
    }

    pub fn driver_wallet(&self, driver_id: &str) -> LedgerResult<DriverWalletView> {
        let wallet = storage::read_wallet(&self.db, driver_id)?
            .ok_or_else(|| LedgerError::DriverNotFound(driver_id.to_string()))?;
        let transactions = storage::read_transactions_for(&self.db, driver_id, HISTORY_LIMIT)?;
        Ok(DriverWalletView {
            can_accept_cash_orders: wallet.can_accept_cash_orders(),
            wallet,
            transactions,
        })
    }

    /// Newest-first ledger history of a business or driver
    pub fn transactions_for(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        Ok(storage::read_transactions_for(&self.db, subject_id, limit)?)
    }

    /// Whether the order already has a settlement row
    pub fn is_settled(&self, order_id: &str) -> LedgerResult<bool> {
        Ok(storage::read_key_exists(
            &self.db,
            order_id,
            TransactionType::CashSettlement.idempotency_kind(),
        )?)
    }

    // ========== Business credits ==========

    /// Debit the order's credit cost before the order is created anywhere
    ///
    /// Fails with [`LedgerError::InsufficientCredits`] without mutating when
    /// the balance is below `cost`.
    pub fn pre_debit_for_new_order(
        &self,
        business_id: &str,
        order_id: &str,
        cost: i64,
    ) -> LedgerResult<PreDebit> {
        if cost <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "order credit cost must be positive, got {cost}"
            )));
        }

        let txn = self.db.begin_write()?;
        let mut account = storage::business(&txn, business_id)?
            .ok_or_else(|| LedgerError::BusinessNotFound(business_id.to_string()))?;

        let kind = TransactionType::OrderCreation.idempotency_kind();
        if let Some(existing) = storage::find_by_key(&txn, order_id, kind)? {
            return Ok(PreDebit {
                remaining_credits: account.credits,
                transaction: existing,
                replayed: true,
            });
        }

        if account.credits < cost {
            return Err(LedgerError::InsufficientCredits {
                available: account.credits,
                required: cost,
            });
        }

        let now = shared::util::now_millis();
        account.credits -= cost;
        account.total_orders += 1;
        account.updated_at = now;

        let tx = LedgerTransaction {
            id: storage::next_transaction_id(&txn)?,
            tx_type: TransactionType::OrderCreation,
            amount: -Decimal::from(cost),
            order_id: order_id.to_string(),
            subject_id: business_id.to_string(),
            balance_after: Decimal::from(account.credits),
            note: None,
            created_at: now,
        };

        storage::put_business(&txn, &account)?;
        storage::append(&txn, &tx, order_id)?;
        txn.commit()?;

        tracing::info!(
            business_id = %business_id,
            order_id = %order_id,
            cost,
            remaining = account.credits,
            "Order credits debited"
        );

        Ok(PreDebit {
            remaining_credits: account.credits,
            transaction: tx,
            replayed: false,
        })
    }

    /// Return credits for an order (compensation or cancellation)
    ///
    /// At most one refund per order, never more than was debited.
    pub fn refund_order_credits(
        &self,
        business_id: &str,
        order_id: &str,
        credits: i64,
        reason: &str,
    ) -> LedgerResult<Applied> {
        if credits <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "refund must be positive, got {credits}"
            )));
        }

        let txn = self.db.begin_write()?;
        let mut account = storage::business(&txn, business_id)?
            .ok_or_else(|| LedgerError::BusinessNotFound(business_id.to_string()))?;

        let refund_kind = TransactionType::Refund.idempotency_kind();
        if let Some(existing) = storage::find_by_key(&txn, order_id, refund_kind)? {
            return Ok(Applied {
                transaction: existing,
                replayed: true,
            });
        }

        let debit_kind = TransactionType::OrderCreation.idempotency_kind();
        let debit = storage::find_by_key(&txn, order_id, debit_kind)?
            .filter(|tx| tx.subject_id == business_id)
            .ok_or_else(|| LedgerError::NothingToRefund(order_id.to_string()))?;

        if Decimal::from(credits) > debit.amount.abs() {
            return Err(LedgerError::InvalidAmount(format!(
                "refund of {credits} exceeds debit of {}",
                debit.amount.abs()
            )));
        }

        let now = shared::util::now_millis();
        account.credits += credits;
        account.updated_at = now;

        let tx = LedgerTransaction {
            id: storage::next_transaction_id(&txn)?,
            tx_type: TransactionType::Refund,
            amount: Decimal::from(credits),
            order_id: order_id.to_string(),
            subject_id: business_id.to_string(),
            balance_after: Decimal::from(account.credits),
            note: Some(reason.to_string()),
            created_at: now,
        };

        storage::put_business(&txn, &account)?;
        storage::append(&txn, &tx, order_id)?;
        txn.commit()?;

        tracing::info!(
            business_id = %business_id,
            order_id = %order_id,
            credits,
            reason = %reason,
            "Order credits refunded"
        );

        Ok(Applied {
            transaction: tx,
            replayed: false,
        })
    }

    /// Add purchased credits. Opens the account on first purchase.
    pub fn top_up_credits(
        &self,
        business_id: &str,
        payment_ref: &str,
        credits: i64,
    ) -> LedgerResult<Applied> {
        if credits <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "top-up must be positive, got {credits}"
            )));
        }

        let txn = self.db.begin_write()?;
        let kind = TransactionType::CreditTopUp.idempotency_kind();
        if let Some(existing) = storage::find_by_key(&txn, payment_ref, kind)? {
            return Ok(Applied {
                transaction: existing,
                replayed: true,
            });
        }

        let now = shared::util::now_millis();
        let mut account = storage::business(&txn, business_id)?.unwrap_or(BusinessAccount {
            business_id: business_id.to_string(),
            credits: 0,
            total_orders: 0,
            created_at: now,
            updated_at: now,
        });
        account.credits += credits;
        account.updated_at = now;

        let tx = LedgerTransaction {
            id: storage::next_transaction_id(&txn)?,
            tx_type: TransactionType::CreditTopUp,
            amount: Decimal::from(credits),
            order_id: payment_ref.to_string(),
            subject_id: business_id.to_string(),
            balance_after: Decimal::from(account.credits),
            note: None,
            created_at: now,
        };

        storage::put_business(&txn, &account)?;
        storage::append(&txn, &tx, payment_ref)?;
        txn.commit()?;

        tracing::info!(
            business_id = %business_id,
            payment_ref = %payment_ref,
            credits,
            balance = account.credits,
            "Credits topped up"
        );

        Ok(Applied {
            transaction: tx,
            replayed: false,
        })
    }

    // ========== Driver wallets ==========

    /// Apply a completed order's money to the driver, exactly once per order
    ///
    /// - `CASH`: the driver holds the cash, so the platform fee becomes debt.
    /// - `CARD`: the platform holds the money, so the driver's share goes to
    ///   the wallet.
    pub fn settle_completed_order(
        &self,
        driver_id: &str,
        order_id: &str,
        payment_method: PaymentMethod,
        amount_to_collect: Decimal,
        service_fee: Decimal,
    ) -> LedgerResult<Settlement> {
        if amount_to_collect.is_sign_negative() || service_fee.is_sign_negative() {
            return Err(LedgerError::InvalidAmount(
                "settlement amounts cannot be negative".into(),
            ));
        }

        let txn = self.db.begin_write()?;
        let kind = TransactionType::CashSettlement.idempotency_kind();
        if let Some(existing) = storage::find_by_key(&txn, order_id, kind)? {
            tracing::debug!(order_id = %order_id, "Order already settled");
            return Ok(Settlement::AlreadySettled(existing));
        }

        let mut wallet = storage::wallet(&txn, driver_id)?
            .ok_or_else(|| LedgerError::DriverNotFound(driver_id.to_string()))?;

        let (tx_type, amount, balance_after) = match payment_method {
            PaymentMethod::Cash => {
                wallet.pending_debts += service_fee;
                (
                    TransactionType::CashSettlement,
                    service_fee,
                    wallet.pending_debts,
                )
            }
            PaymentMethod::Card => {
                let earnings = amount_to_collect - service_fee;
                wallet.wallet_balance += earnings;
                (
                    TransactionType::CardSettlement,
                    earnings,
                    wallet.wallet_balance,
                )
            }
            PaymentMethod::Unknown => {
                return Err(LedgerError::UnsupportedPaymentMethod(payment_method));
            }
        };

        let now = shared::util::now_millis();
        wallet.gross_income += amount_to_collect;
        wallet.completed_orders += 1;
        wallet.updated_at = now;

        let tx = LedgerTransaction {
            id: storage::next_transaction_id(&txn)?,
            tx_type,
            amount,
            order_id: order_id.to_string(),
            subject_id: driver_id.to_string(),
            balance_after,
            note: None,
            created_at: now,
        };

        storage::put_wallet(&txn, &wallet)?;
        storage::append(&txn, &tx, order_id)?;
        txn.commit()?;

        tracing::info!(
            driver_id = %driver_id,
            order_id = %order_id,
            tx_type = %tx_type,
            amount = %amount,
            "Order settled"
        );

        Ok(Settlement::Applied(tx))
    }

    /// Record an out-of-band payment against the driver's pending debts
    pub fn record_debt_payment(
        &self,
        driver_id: &str,
        payment_ref: &str,
        amount: Decimal,
    ) -> LedgerResult<Applied> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "debt payment must be positive, got {amount}"
            )));
        }

        let txn = self.db.begin_write()?;
        let kind = TransactionType::DebtPayment.idempotency_kind();
        if let Some(existing) = storage::find_by_key(&txn, payment_ref, kind)? {
            return Ok(Applied {
                transaction: existing,
                replayed: true,
            });
        }

        let mut wallet = storage::wallet(&txn, driver_id)?
            .ok_or_else(|| LedgerError::DriverNotFound(driver_id.to_string()))?;

        if amount > wallet.pending_debts {
            return Err(LedgerError::InvalidAmount(format!(
                "payment of {amount} exceeds pending debts of {}",
                wallet.pending_debts
            )));
        }

        let now = shared::util::now_millis();
        wallet.pending_debts -= amount;
        wallet.updated_at = now;

        let tx = LedgerTransaction {
            id: storage::next_transaction_id(&txn)?,
            tx_type: TransactionType::DebtPayment,
            amount: -amount,
            order_id: payment_ref.to_string(),
            subject_id: driver_id.to_string(),
            balance_after: wallet.pending_debts,
            note: None,
            created_at: now,
        };

        storage::put_wallet(&txn, &wallet)?;
        storage::append(&txn, &tx, payment_ref)?;
        txn.commit()?;

        tracing::info!(
            driver_id = %driver_id,
            payment_ref = %payment_ref,
            amount = %amount,
            pending_debts = %wallet.pending_debts,
            "Driver debt payment recorded"
        );

        Ok(Applied {
            transaction: tx,
            replayed: false,
        })
    }
}
