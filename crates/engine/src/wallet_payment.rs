//! Settling invoices from customer wallets.

use chrono::Utc;
use quill_core::invoice::{Invoice, Metadata};
use quill_core::wallet::{
    AllocationError, AllocationOptions, WalletAllocator, Wallet, WalletLedger, WalletOperation,
    WalletPaymentStrategy, WalletSelector, WalletTransaction,
};
use quill_shared::config::BillingConfig;
use quill_shared::{CustomerId, TenantScope, WalletId};
use rust_decimal::Decimal;
use tracing::info;

use crate::collaborators::Collaborators;
use crate::error::EngineError;
use crate::events::{Outbox, WebhookEventName};
use crate::store::{BillingStore, StoreError, StoreTransaction, require_invoice};

/// Options for one wallet settlement run.
#[derive(Debug, Clone, Default)]
pub struct WalletPaymentOptions {
    /// Wallet ordering.
    pub strategy: WalletPaymentStrategy,
    /// Maximum wallets debited (0 = unbounded).
    pub max_wallets_to_use: usize,
    /// Extra metadata copied onto every payment.
    pub metadata: Metadata,
}

impl WalletPaymentOptions {
    /// Options from the configured defaults.
    #[must_use]
    pub fn from_config(config: &BillingConfig) -> Self {
        Self {
            strategy: config.default_wallet_strategy,
            max_wallets_to_use: config.max_wallets_to_use,
            metadata: Metadata::new(),
        }
    }

    /// Overrides the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: WalletPaymentStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Overrides the wallet cap.
    #[must_use]
    pub fn with_max_wallets(mut self, max_wallets_to_use: usize) -> Self {
        self.max_wallets_to_use = max_wallets_to_use;
        self
    }

    /// Adds a metadata entry copied onto every payment.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Wallet selection, settlement and top-ups.
pub struct WalletPaymentService<S> {
    store: S,
    collaborators: Collaborators,
    config: BillingConfig,
}

impl<S: BillingStore> WalletPaymentService<S> {
    /// Creates a service over `store`.
    pub fn new(store: S, collaborators: Collaborators, config: BillingConfig) -> Self {
        Self {
            store,
            collaborators,
            config,
        }
    }

    /// Returns the customer's wallets that can pay in `currency`, ordered for `strategy`.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn get_wallets_for_payment(
        &self,
        scope: TenantScope,
        customer_id: CustomerId,
        currency: &str,
        strategy: WalletPaymentStrategy,
    ) -> Result<Vec<Wallet>, EngineError> {
        let mut tx = self.store.begin(scope).await?;
        let wallets = tx.wallets_for_update(customer_id).await?;
        Ok(WalletSelector::wallets_for_payment(
            &wallets,
            customer_id,
            currency,
            strategy,
        ))
    }

    /// Pays down an invoice from the customer's wallets and returns the amount paid.
    ///
    /// The invoice and wallets are re-read under lock, so the caller's copy
    /// only identifies the invoice. Each debited wallet gets a ledger entry
    /// and a payment record; the whole run commits or rolls back as one.
    /// Partial settlement is not an error.
    ///
    /// # Errors
    ///
    /// Returns a validation fault without an invoice, a not-found fault if the
    /// invoice is not in the scope, or the fault that stopped the run.
    pub async fn process_invoice_payment_with_wallets(
        &self,
        scope: TenantScope,
        invoice: Option<&Invoice>,
        options: &WalletPaymentOptions,
    ) -> Result<Decimal, EngineError> {
        let Some(invoice) = invoice else {
            return Err(AllocationError::MissingInvoice.into());
        };
        if invoice.amount_remaining <= Decimal::ZERO {
            info!(invoice_id = %invoice.id, "Invoice already settled, no wallets charged");
            return Ok(Decimal::ZERO);
        }

        let now = Utc::now();
        let mut tx = self.store.begin(scope).await?;
        let mut locked = require_invoice(&mut tx, invoice.id).await?;
        let wallets = tx.wallets_for_update(locked.customer_id).await?;
        let mut ordered = WalletSelector::wallets_for_payment(
            &wallets,
            locked.customer_id,
            locked.currency.as_str(),
            options.strategy,
        );

        let allocation_options = AllocationOptions {
            max_wallets_to_use: options.max_wallets_to_use,
            metadata: options.metadata.clone(),
        };
        let outcome = WalletAllocator::allocate(Some(&mut locked), &mut ordered, &allocation_options, now)?;
        if outcome.debits.is_empty() {
            info!(
                invoice_id = %locked.id,
                eligible_wallets = ordered.len(),
                "No wallet balance available for invoice"
            );
            return Ok(Decimal::ZERO);
        }

        for wallet in ordered
            .iter_mut()
            .filter(|w| outcome.debits.iter().any(|d| d.wallet_id == w.id))
        {
            tx.update_wallet(wallet).await?;
        }
        for debit in &outcome.debits {
            tx.insert_wallet_transaction(&debit.transaction).await?;
            tx.insert_payment(&debit.payment).await?;
        }
        tx.update_invoice(&mut locked).await?;
        tx.commit().await?;

        info!(
            invoice_id = %locked.id,
            strategy = %options.strategy,
            wallets_used = outcome.debits.len(),
            amount_paid = %outcome.amount_paid,
            amount_remaining = %locked.amount_remaining,
            payment_status = %locked.payment_status,
            "Invoice paid from wallets"
        );

        let mut outbox = Outbox::new();
        outbox.webhook(WebhookEventName::InvoiceUpdatePayment, &locked, now);
        if let (true, Some(subscription_id)) = (outcome.activate_subscription, locked.subscription_id) {
            outbox.activate(scope, subscription_id);
        }
        outbox
            .dispatch(
                self.collaborators.notifier.as_ref(),
                self.collaborators.activator.as_ref(),
                self.config.notifications_enabled,
            )
            .await;

        Ok(outcome.amount_paid)
    }

    /// Credits a wallet and records the ledger entry.
    ///
    /// # Errors
    ///
    /// Returns a not-found fault for an unknown wallet, or a wallet fault if it
    /// is not active or the amount is not positive.
    pub async fn credit_wallet(
        &self,
        scope: TenantScope,
        wallet_id: WalletId,
        op: &WalletOperation,
    ) -> Result<WalletTransaction, EngineError> {
        let now = Utc::now();
        let mut tx = self.store.begin(scope).await?;
        let mut wallet = tx
            .wallet_for_update(wallet_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "wallet",
                id: wallet_id.to_string(),
            })?;

        let entry = WalletLedger::credit(&mut wallet, op, now).map_err(AllocationError::from)?;
        tx.update_wallet(&mut wallet).await?;
        tx.insert_wallet_transaction(&entry).await?;
        tx.commit().await?;

        info!(
            wallet_id = %wallet_id,
            amount = %op.amount,
            balance = %wallet.balance,
            "Wallet credited"
        );
        Ok(entry)
    }
}
