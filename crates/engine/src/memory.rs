//! In-memory store.
//!
//! One async mutex guards every table, so a transaction has exclusive access
//! for its whole lifetime. Writes go to a working copy that replaces the
//! tables on commit; dropping the transaction discards it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_core::invoice::{Invoice, InvoiceStatus};
use quill_core::payment::Payment;
use quill_core::wallet::{
    AllocationError, TransactionReason, Wallet, WalletLedger, WalletOperation, WalletTransaction,
};
use quill_shared::{CustomerId, InvoiceId, SubscriptionId, TenantScope, WalletId};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::EngineError;
use crate::store::{BillingStore, StoreError, StoreTransaction};

#[derive(Debug, Clone, Default)]
struct Tables {
    invoices: HashMap<InvoiceId, Invoice>,
    wallets: HashMap<WalletId, Wallet>,
    wallet_transactions: Vec<WalletTransaction>,
    payments: Vec<Payment>,
    invoice_numbers: HashMap<TenantScope, u64>,
}

/// Store keeping every table in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_payment_inserts: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later payment insert fail with a backend error.
    pub fn fail_payment_inserts(&self, fail: bool) {
        self.fail_payment_inserts.store(fail, Ordering::SeqCst);
    }

    /// Stores `wallet` and credits `opening_balance` to it through the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the wallet cannot be credited or already exists.
    pub async fn seed_wallet(
        &self,
        mut wallet: Wallet,
        opening_balance: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Wallet, EngineError> {
        let scope = TenantScope::new(wallet.tenant_id, wallet.environment_id);
        let mut tx = self.begin(scope).await?;
        tx.insert_wallet(&wallet).await?;

        if opening_balance > Decimal::ZERO {
            let op = WalletOperation::new(opening_balance, TransactionReason::CreditGrant);
            let entry = WalletLedger::credit(&mut wallet, &op, now).map_err(AllocationError::from)?;
            tx.update_wallet(&mut wallet).await?;
            tx.insert_wallet_transaction(&entry).await?;
        }

        tx.commit().await?;
        Ok(wallet)
    }

    /// Stores an invoice as-is.
    ///
    /// # Errors
    ///
    /// Returns `UniqueViolation` if the ID or idempotency key is taken.
    pub async fn seed_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        let scope = TenantScope::new(invoice.tenant_id, invoice.environment_id);
        let mut tx = self.begin(scope).await?;
        tx.insert_invoice(invoice).await?;
        tx.commit().await
    }

    /// Stores a payment record as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if payment inserts are failing.
    pub async fn seed_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        let scope = TenantScope::new(payment.tenant_id, payment.environment_id);
        let mut tx = self.begin(scope).await?;
        tx.insert_payment(payment).await?;
        tx.commit().await
    }

    /// Committed state of an invoice.
    pub async fn invoice(&self, id: InvoiceId) -> Option<Invoice> {
        self.tables.lock().await.invoices.get(&id).cloned()
    }

    /// Committed state of a wallet.
    pub async fn wallet(&self, id: WalletId) -> Option<Wallet> {
        self.tables.lock().await.wallets.get(&id).cloned()
    }

    /// Committed payments for an invoice, in insertion order.
    pub async fn payments_for_invoice(&self, invoice_id: InvoiceId) -> Vec<Payment> {
        self.tables
            .lock()
            .await
            .payments
            .iter()
            .filter(|p| p.destination_id == invoice_id)
            .cloned()
            .collect()
    }

    /// Committed ledger entries for a wallet, in insertion order.
    pub async fn wallet_transactions(&self, wallet_id: WalletId) -> Vec<WalletTransaction> {
        self.tables
            .lock()
            .await
            .wallet_transactions
            .iter()
            .filter(|t| t.wallet_id == wallet_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self, scope: TenantScope) -> Result<Self::Tx, StoreError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            scope,
            guard,
            working,
            fail_payment_inserts: self.fail_payment_inserts.load(Ordering::SeqCst),
        })
    }
}

/// Transaction over an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryTransaction {
    scope: TenantScope,
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    fail_payment_inserts: bool,
}

impl InMemoryTransaction {
    fn visible_invoice(&self, invoice: &Invoice) -> bool {
        self.scope.contains(invoice.tenant_id, invoice.environment_id)
    }

    fn scoped_invoices(&self) -> impl Iterator<Item = &Invoice> {
        self.working
            .invoices
            .values()
            .filter(|invoice| self.visible_invoice(invoice))
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    fn scope(&self) -> TenantScope {
        self.scope
    }

    async fn invoice_for_update(&mut self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        Ok(self
            .working
            .invoices
            .get(&id)
            .filter(|invoice| self.visible_invoice(invoice))
            .cloned())
    }

    async fn invoice_by_idempotency_key(&mut self, key: &str) -> Result<Option<Invoice>, StoreError> {
        Ok(self
            .scoped_invoices()
            .find(|invoice| invoice.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn invoice_exists_for_period(
        &mut self,
        subscription_id: SubscriptionId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.scoped_invoices().any(|invoice| {
            invoice.subscription_id == Some(subscription_id)
                && invoice.invoice_status != InvoiceStatus::Voided
                && invoice.period_start == Some(period_start)
                && invoice.period_end == Some(period_end)
        }))
    }

    async fn next_billing_sequence(&mut self, subscription_id: SubscriptionId) -> Result<u32, StoreError> {
        let last = self
            .scoped_invoices()
            .filter(|invoice| invoice.subscription_id == Some(subscription_id))
            .filter_map(|invoice| invoice.billing_sequence)
            .max()
            .unwrap_or(0);
        Ok(last + 1)
    }

    async fn next_invoice_number(&mut self) -> Result<String, StoreError> {
        let counter = self.working.invoice_numbers.entry(self.scope).or_insert(0);
        *counter += 1;
        Ok(format!("INV-{counter:06}"))
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError> {
        if !self.visible_invoice(invoice) {
            return Err(StoreError::Backend(format!(
                "invoice {} is outside the transaction scope",
                invoice.id
            )));
        }
        if self.working.invoices.contains_key(&invoice.id) {
            return Err(StoreError::UniqueViolation(format!("invoice id {}", invoice.id)));
        }
        if let Some(key) = invoice.idempotency_key.as_deref()
            && self
                .scoped_invoices()
                .any(|existing| existing.idempotency_key.as_deref() == Some(key))
        {
            return Err(StoreError::UniqueViolation(format!("idempotency key {key}")));
        }
        self.working.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn update_invoice(&mut self, invoice: &mut Invoice) -> Result<(), StoreError> {
        let scope = self.scope;
        let stored = self
            .working
            .invoices
            .get_mut(&invoice.id)
            .filter(|stored| scope.contains(stored.tenant_id, stored.environment_id))
            .ok_or_else(|| StoreError::NotFound {
                entity: "invoice",
                id: invoice.id.to_string(),
            })?;
        if stored.version != invoice.version {
            return Err(StoreError::VersionConflict {
                entity: "invoice",
                id: invoice.id.to_string(),
                expected: invoice.version,
                found: stored.version,
            });
        }
        invoice.version += 1;
        *stored = invoice.clone();
        Ok(())
    }

    async fn invoices_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Invoice>, StoreError> {
        let mut invoices: Vec<Invoice> = self
            .scoped_invoices()
            .filter(|invoice| invoice.customer_id == customer_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(invoices)
    }

    async fn wallets_for_update(&mut self, customer_id: CustomerId) -> Result<Vec<Wallet>, StoreError> {
        let scope = self.scope;
        let mut wallets: Vec<Wallet> = self
            .working
            .wallets
            .values()
            .filter(|w| w.customer_id == customer_id && scope.contains(w.tenant_id, w.environment_id))
            .cloned()
            .collect();
        wallets.sort_by_key(|w| w.id);
        Ok(wallets)
    }

    async fn wallet_for_update(&mut self, id: WalletId) -> Result<Option<Wallet>, StoreError> {
        let scope = self.scope;
        Ok(self
            .working
            .wallets
            .get(&id)
            .filter(|w| scope.contains(w.tenant_id, w.environment_id))
            .cloned())
    }

    async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<(), StoreError> {
        if !self.scope.contains(wallet.tenant_id, wallet.environment_id) {
            return Err(StoreError::Backend(format!(
                "wallet {} is outside the transaction scope",
                wallet.id
            )));
        }
        if self.working.wallets.contains_key(&wallet.id) {
            return Err(StoreError::UniqueViolation(format!("wallet id {}", wallet.id)));
        }
        self.working.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn update_wallet(&mut self, wallet: &mut Wallet) -> Result<(), StoreError> {
        let scope = self.scope;
        let stored = self
            .working
            .wallets
            .get_mut(&wallet.id)
            .filter(|stored| scope.contains(stored.tenant_id, stored.environment_id))
            .ok_or_else(|| StoreError::NotFound {
                entity: "wallet",
                id: wallet.id.to_string(),
            })?;
        if stored.version != wallet.version {
            return Err(StoreError::VersionConflict {
                entity: "wallet",
                id: wallet.id.to_string(),
                expected: wallet.version,
                found: stored.version,
            });
        }
        wallet.version += 1;
        *stored = wallet.clone();
        Ok(())
    }

    async fn insert_wallet_transaction(&mut self, transaction: &WalletTransaction) -> Result<(), StoreError> {
        self.working.wallet_transactions.push(transaction.clone());
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        if self.fail_payment_inserts {
            return Err(StoreError::Backend("payment insert failed".to_string()));
        }
        self.working.payments.push(payment.clone());
        Ok(())
    }

    async fn has_succeeded_payments(&mut self, invoice_id: InvoiceId) -> Result<bool, StoreError> {
        let scope = self.scope;
        Ok(self.working.payments.iter().any(|p| {
            p.destination_id == invoice_id
                && p.is_succeeded()
                && scope.contains(p.tenant_id, p.environment_id)
        }))
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut guard = self.guard;
        *guard = self.working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quill_core::wallet::WalletType;
    use quill_shared::{Currency, EnvironmentId, TenantId};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn scope() -> TenantScope {
        TenantScope::new(TenantId::new(), EnvironmentId::new())
    }

    fn open_wallet(scope: TenantScope) -> Wallet {
        Wallet::open(
            scope.tenant_id,
            scope.environment_id,
            CustomerId::new(),
            Currency::new("usd"),
            WalletType::PrePaid,
            Decimal::ONE,
            now(),
        )
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = InMemoryStore::new();
        let scope = scope();
        let wallet = open_wallet(scope);
        {
            let mut tx = store.begin(scope).await.unwrap();
            tx.insert_wallet(&wallet).await.unwrap();
        }
        assert!(store.wallet(wallet.id).await.is_none());
    }

    #[tokio::test]
    async fn test_seed_wallet_writes_ledger_entry() {
        let store = InMemoryStore::new();
        let wallet = store
            .seed_wallet(open_wallet(scope()), dec!(75), now())
            .await
            .unwrap();
        assert_eq!(wallet.balance, dec!(75));
        assert_eq!(wallet.version, 1);
        let ledger = store.wallet_transactions(wallet.id).await;
        assert_eq!(WalletLedger::balance_from(&ledger), dec!(75));
    }

    #[tokio::test]
    async fn test_stale_wallet_write_conflicts() {
        let store = InMemoryStore::new();
        let scope = scope();
        let wallet = store.seed_wallet(open_wallet(scope), dec!(10), now()).await.unwrap();

        let mut tx = store.begin(scope).await.unwrap();
        let mut stale = wallet.clone();
        stale.version = 0;
        let err = tx.update_wallet(&mut stale).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 0, found: 1, .. }));
    }

    #[tokio::test]
    async fn test_invoice_numbers_are_per_scope() {
        let store = InMemoryStore::new();
        let first = scope();
        let second = scope();

        let mut tx = store.begin(first).await.unwrap();
        assert_eq!(tx.next_invoice_number().await.unwrap(), "INV-000001");
        assert_eq!(tx.next_invoice_number().await.unwrap(), "INV-000002");
        tx.commit().await.unwrap();

        let mut tx = store.begin(second).await.unwrap();
        assert_eq!(tx.next_invoice_number().await.unwrap(), "INV-000001");
    }

    #[tokio::test]
    async fn test_wallets_are_scoped() {
        let store = InMemoryStore::new();
        let owner = scope();
        let wallet = store.seed_wallet(open_wallet(owner), dec!(10), now()).await.unwrap();

        let mut tx = store.begin(scope()).await.unwrap();
        assert!(tx.wallets_for_update(wallet.customer_id).await.unwrap().is_empty());
        drop(tx);

        let mut tx = store.begin(owner).await.unwrap();
        assert_eq!(tx.wallets_for_update(wallet.customer_id).await.unwrap().len(), 1);
    }
}
