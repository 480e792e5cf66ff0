//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use quill_core::invoice::{
    BillingReason, CreateInvoiceInput, Invoice, InvoiceType, LineItemEntityType, LineItemInput,
    Metadata, PriceType,
};
use quill_core::wallet::{Wallet, WalletStatus, WalletType};
use quill_engine::{
    CollaboratorError, Collaborators, DiscountResolver, InMemoryStore, InvoiceService,
    SubscriptionActivator, TaxResolver, WalletPaymentService, WebhookEvent, WebhookEventName,
    WebhookNotifier,
};
use quill_shared::config::BillingConfig;
use quill_shared::{Currency, CustomerId, EnvironmentId, SubscriptionId, TenantId, TenantScope};
use rust_decimal::Decimal;

pub fn new_scope() -> TenantScope {
    TenantScope::new(TenantId::new(), EnvironmentId::new())
}

pub fn seeded_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Notifier that remembers what it published.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<WebhookEvent>>,
}

impl RecordingNotifier {
    pub fn names(&self) -> Vec<WebhookEventName> {
        self.events.lock().unwrap().iter().map(|e| e.name).collect()
    }
}

#[async_trait]
impl WebhookNotifier for RecordingNotifier {
    async fn publish(&self, event: &WebhookEvent) -> Result<(), CollaboratorError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Notifier whose endpoint is always down.
pub struct FailingNotifier;

#[async_trait]
impl WebhookNotifier for FailingNotifier {
    async fn publish(&self, _event: &WebhookEvent) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::new("webhooks", "endpoint unreachable"))
    }
}

/// Activator that remembers which subscriptions it was asked to activate.
#[derive(Default)]
pub struct RecordingActivator {
    activated: Mutex<Vec<SubscriptionId>>,
}

impl RecordingActivator {
    pub fn activated(&self) -> Vec<SubscriptionId> {
        self.activated.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriptionActivator for RecordingActivator {
    async fn activate_incomplete(
        &self,
        _scope: TenantScope,
        subscription_id: SubscriptionId,
    ) -> Result<(), CollaboratorError> {
        self.activated.lock().unwrap().push(subscription_id);
        Ok(())
    }
}

/// Discount resolver granting a fixed amount per coupon, rejecting "EXPIRED".
pub struct FlatCouponDiscount(pub Decimal);

#[async_trait]
impl DiscountResolver for FlatCouponDiscount {
    async fn total_discount(&self, _invoice: &Invoice, coupons: &[String]) -> Result<Decimal, CollaboratorError> {
        if coupons.iter().any(|c| c == "EXPIRED") {
            return Err(CollaboratorError::new("discounts", "coupon EXPIRED is no longer valid"));
        }
        Ok(self.0 * Decimal::from(coupons.len()))
    }
}

/// Tax resolver charging a percentage of the discounted subtotal.
pub struct PercentTax(pub Decimal);

#[async_trait]
impl TaxResolver for PercentTax {
    async fn total_tax(&self, invoice: &Invoice) -> Result<Decimal, CollaboratorError> {
        Ok(((invoice.subtotal - invoice.total_discount) * self.0 / Decimal::ONE_HUNDRED).round_dp(2))
    }
}

/// Store, services and recording collaborators wired together.
pub struct Harness {
    pub store: InMemoryStore,
    pub invoices: InvoiceService<InMemoryStore>,
    pub wallets: WalletPaymentService<InMemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub activator: Arc<RecordingActivator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(BillingConfig::default(), |_| {})
    }

    /// Harness with a custom config and collaborator overrides.
    pub fn with(config: BillingConfig, customize: impl FnOnce(&mut Collaborators)) -> Self {
        let store = InMemoryStore::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let activator = Arc::new(RecordingActivator::default());
        let mut collaborators = Collaborators {
            notifier: notifier.clone(),
            activator: activator.clone(),
            ..Collaborators::default()
        };
        customize(&mut collaborators);

        Self {
            invoices: InvoiceService::new(store.clone(), collaborators.clone(), config.clone()),
            wallets: WalletPaymentService::new(store.clone(), collaborators, config),
            store,
            notifier,
            activator,
        }
    }

    /// Opens and funds an active wallet.
    pub async fn wallet(
        &self,
        scope: TenantScope,
        customer_id: CustomerId,
        currency: &str,
        wallet_type: WalletType,
        balance: Decimal,
    ) -> Wallet {
        let wallet = Wallet::open(
            scope.tenant_id,
            scope.environment_id,
            customer_id,
            Currency::new(currency),
            wallet_type,
            Decimal::ONE,
            seeded_at(),
        );
        self.store.seed_wallet(wallet, balance, seeded_at()).await.unwrap()
    }

    /// Opens a funded wallet and closes it.
    pub async fn closed_wallet(
        &self,
        scope: TenantScope,
        customer_id: CustomerId,
        balance: Decimal,
    ) -> Wallet {
        let mut wallet = Wallet::open(
            scope.tenant_id,
            scope.environment_id,
            customer_id,
            Currency::new("usd"),
            WalletType::PrePaid,
            Decimal::ONE,
            seeded_at(),
        );
        wallet.balance = balance;
        wallet.credit_balance = balance;
        wallet.wallet_status = WalletStatus::Closed;
        self.store.seed_wallet(wallet, Decimal::ZERO, seeded_at()).await.unwrap()
    }

    /// Creates a finalized, unpaid one-off usd invoice.
    pub async fn pending_invoice(&self, scope: TenantScope, customer_id: CustomerId, amount: Decimal) -> Invoice {
        self.invoices
            .create_invoice(scope, one_off_input(customer_id, amount))
            .await
            .unwrap()
    }
}

pub fn line(amount: Decimal, price_type: PriceType) -> LineItemInput {
    LineItemInput {
        entity_type: Some(LineItemEntityType::Plan),
        entity_id: None,
        price_id: None,
        price_type,
        display_name: None,
        amount,
        quantity: Decimal::ONE,
        currency: Currency::new("usd"),
        period_start: None,
        period_end: None,
    }
}

pub fn one_off_input(customer_id: CustomerId, amount: Decimal) -> CreateInvoiceInput {
    CreateInvoiceInput {
        customer_id,
        subscription_id: None,
        invoice_type: InvoiceType::OneOff,
        currency: Currency::new("usd"),
        invoice_status: None,
        payment_status: None,
        subtotal: None,
        amount_paid: None,
        billing_reason: BillingReason::Manual,
        idempotency_key: Some(format!("one-off-{}", uuid_like())),
        period_start: None,
        period_end: None,
        due_date: None,
        line_items: vec![line(amount, PriceType::Fixed)],
        coupons: vec![],
        metadata: Metadata::new(),
    }
}

pub fn subscription_input(
    customer_id: CustomerId,
    subscription_id: SubscriptionId,
    amount: Decimal,
    month: u32,
    billing_reason: BillingReason,
) -> CreateInvoiceInput {
    CreateInvoiceInput {
        subscription_id: Some(subscription_id),
        invoice_type: InvoiceType::Subscription,
        billing_reason,
        idempotency_key: None,
        period_start: Some(Utc.with_ymd_and_hms(2026, month, 1, 0, 0, 0).unwrap()),
        period_end: Some(Utc.with_ymd_and_hms(2026, month + 1, 1, 0, 0, 0).unwrap()),
        ..one_off_input(customer_id, amount)
    }
}

/// One-off invoices without a caller key would collide on the derived key,
/// so fixtures give each one its own.
fn uuid_like() -> String {
    quill_shared::InvoiceId::new().to_string()
}
