//! Persistence contract for the billing engine.
//!
//! Every unit of work runs inside one [`StoreTransaction`] begun for a
//! [`TenantScope`]. The transaction holds exclusive access to the invoice
//! and wallets it reads "for update" until it is committed or dropped;
//! dropping it without committing discards every write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_core::invoice::Invoice;
use quill_core::payment::Payment;
use quill_core::wallet::{Wallet, WalletTransaction};
use quill_shared::{CustomerId, FaultKind, InvoiceId, SubscriptionId, TenantScope, WalletId};
use thiserror::Error;

use crate::error::EngineError;

/// Errors raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced record does not exist in the scope.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Record ID.
        id: String,
    },

    /// A unique constraint was violated.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A write carried a stale version.
    #[error("Version conflict on {entity} {id}: expected {expected}, found {found}")]
    VersionConflict {
        /// Entity kind.
        entity: &'static str,
        /// Record ID.
        id: String,
        /// Version the writer read.
        expected: i64,
        /// Version currently stored.
        found: i64,
    },

    /// Backend failure.
    #[error("Storage failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns the fault classification.
    #[must_use]
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            Self::NotFound { .. } => FaultKind::NotFound,
            Self::UniqueViolation(_) => FaultKind::Duplicate,
            Self::VersionConflict { .. } | Self::Backend(_) => FaultKind::System,
        }
    }
}

/// Entry point to a store backend.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Transaction type of the backend.
    type Tx: StoreTransaction;

    /// Begins a unit of work bound to `scope`. Every lookup in it is filtered by the scope.
    async fn begin(&self, scope: TenantScope) -> Result<Self::Tx, StoreError>;
}

/// One atomic unit of work.
#[async_trait]
pub trait StoreTransaction: Send + Sized {
    /// Scope the transaction is bound to.
    fn scope(&self) -> TenantScope;

    /// Reads an invoice and locks it until the transaction ends.
    async fn invoice_for_update(&mut self, id: InvoiceId) -> Result<Option<Invoice>, StoreError>;

    /// Finds the invoice created under an idempotency key.
    async fn invoice_by_idempotency_key(&mut self, key: &str) -> Result<Option<Invoice>, StoreError>;

    /// Returns true if a non-voided invoice already covers this subscription period.
    async fn invoice_exists_for_period(
        &mut self,
        subscription_id: SubscriptionId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Returns the next billing sequence number for a subscription (starting at 1).
    async fn next_billing_sequence(&mut self, subscription_id: SubscriptionId) -> Result<u32, StoreError>;

    /// Returns the next invoice number in the scope.
    async fn next_invoice_number(&mut self) -> Result<String, StoreError>;

    /// Inserts a new invoice.
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError>;

    /// Writes an invoice if its version matches the stored one, then bumps the version.
    async fn update_invoice(&mut self, invoice: &mut Invoice) -> Result<(), StoreError>;

    /// Lists a customer's invoices.
    async fn invoices_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Invoice>, StoreError>;

    /// Reads a customer's wallets and locks them until the transaction ends.
    async fn wallets_for_update(&mut self, customer_id: CustomerId) -> Result<Vec<Wallet>, StoreError>;

    /// Reads one wallet and locks it until the transaction ends.
    async fn wallet_for_update(&mut self, id: WalletId) -> Result<Option<Wallet>, StoreError>;

    /// Inserts a new wallet.
    async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError>;

    /// Writes a wallet if its version matches the stored one, then bumps the version.
    async fn update_wallet(&mut self, wallet: &mut Wallet) -> Result<(), StoreError>;

    /// Appends a ledger entry.
    async fn insert_wallet_transaction(&mut self, transaction: &WalletTransaction) -> Result<(), StoreError>;

    /// Inserts a payment record.
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;

    /// Returns true if a succeeded payment exists for the invoice.
    async fn has_succeeded_payments(&mut self, invoice_id: InvoiceId) -> Result<bool, StoreError>;

    /// Makes every write of the transaction durable.
    async fn commit(self) -> Result<(), StoreError>;
}

/// Reads and locks an invoice that must exist in the transaction scope.
pub(crate) async fn require_invoice<T: StoreTransaction>(
    tx: &mut T,
    id: InvoiceId,
) -> Result<Invoice, EngineError> {
    tx.invoice_for_update(id)
        .await?
        .ok_or(EngineError::InvoiceNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_kinds() {
        assert_eq!(
            StoreError::UniqueViolation("k".into()).fault_kind(),
            FaultKind::Duplicate
        );
        let conflict = StoreError::VersionConflict {
            entity: "invoice",
            id: "1".into(),
            expected: 1,
            found: 2,
        };
        assert!(conflict.fault_kind().is_retryable());
        assert_eq!(
            StoreError::NotFound {
                entity: "wallet",
                id: "w".into()
            }
            .fault_kind(),
            FaultKind::NotFound
        );
    }
}
