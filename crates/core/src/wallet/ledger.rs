//! Wallet balance ledger.
//!
//! Every balance change is paired with exactly one `WalletTransaction`, so a
//! wallet's balance can always be rebuilt from its entries.

use chrono::{DateTime, Utc};
use quill_shared::WalletTransactionId;
use rust_decimal::Decimal;

use super::error::WalletError;
use super::types::{
    TransactionReason, TransactionStatus, TransactionType, Wallet, WalletTransaction,
};

/// A ledger operation request.
#[derive(Debug, Clone)]
pub struct WalletOperation {
    /// Amount in currency units.
    pub amount: Decimal,
    /// Why the operation happens.
    pub reason: TransactionReason,
    /// What the operation settles or funds.
    pub reference_id: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
}

impl WalletOperation {
    /// Creates an operation with no reference or description.
    #[must_use]
    pub fn new(amount: Decimal, reason: TransactionReason) -> Self {
        Self {
            amount,
            reason,
            reference_id: None,
            description: None,
        }
    }

    /// Sets the reference.
    #[must_use]
    pub fn with_reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }
}

/// Stateless service applying ledger operations to wallets.
pub struct WalletLedger;

impl WalletLedger {
    /// Debits `op.amount` from the wallet.
    ///
    /// # Errors
    ///
    /// Returns `WalletError` if the wallet is not active, the amount is not
    /// positive, or the balance is insufficient. The wallet is unchanged on error.
    pub fn debit(
        wallet: &mut Wallet,
        op: &WalletOperation,
        now: DateTime<Utc>,
    ) -> Result<WalletTransaction, WalletError> {
        let credit_amount = Self::check(wallet, op)?;
        if wallet.balance < op.amount {
            return Err(WalletError::InsufficientBalance {
                wallet_id: wallet.id,
                available: wallet.balance,
                requested: op.amount,
            });
        }

        wallet.balance -= op.amount;
        wallet.credit_balance -= credit_amount;
        wallet.updated_at = now;
        Ok(Self::entry(wallet, TransactionType::Debit, op, credit_amount, now))
    }

    /// Credits `op.amount` to the wallet.
    ///
    /// # Errors
    ///
    /// Returns `WalletError` if the wallet is not active or the amount is not positive.
    pub fn credit(
        wallet: &mut Wallet,
        op: &WalletOperation,
        now: DateTime<Utc>,
    ) -> Result<WalletTransaction, WalletError> {
        let credit_amount = Self::check(wallet, op)?;

        wallet.balance += op.amount;
        wallet.credit_balance += credit_amount;
        wallet.updated_at = now;
        Ok(Self::entry(wallet, TransactionType::Credit, op, credit_amount, now))
    }

    /// Rebuilds a balance from ledger entries.
    #[must_use]
    pub fn balance_from(transactions: &[WalletTransaction]) -> Decimal {
        transactions.iter().map(WalletTransaction::signed_amount).sum()
    }

    /// Validates the operation and returns its amount in credits.
    fn check(wallet: &Wallet, op: &WalletOperation) -> Result<Decimal, WalletError> {
        if !wallet.is_active() {
            return Err(WalletError::NotActive {
                wallet_id: wallet.id,
                status: wallet.wallet_status,
            });
        }
        if op.amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(op.amount));
        }
        if wallet.conversion_rate <= Decimal::ZERO {
            return Err(WalletError::InvalidConversionRate(wallet.conversion_rate));
        }
        op.amount
            .checked_div(wallet.conversion_rate)
            .ok_or(WalletError::InvalidConversionRate(wallet.conversion_rate))
    }

    fn entry(
        wallet: &Wallet,
        transaction_type: TransactionType,
        op: &WalletOperation,
        credit_amount: Decimal,
        now: DateTime<Utc>,
    ) -> WalletTransaction {
        WalletTransaction {
            id: WalletTransactionId::new(),
            tenant_id: wallet.tenant_id,
            environment_id: wallet.environment_id,
            wallet_id: wallet.id,
            transaction_type,
            amount: op.amount,
            credit_amount,
            credits_available: wallet.credit_balance,
            balance_after: wallet.balance,
            reference_id: op.reference_id.clone(),
            reason: op.reason,
            status: TransactionStatus::Completed,
            description: op.description.clone(),
            created_at: now,
        }
    }
}
