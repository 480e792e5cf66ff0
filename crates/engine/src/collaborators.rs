//! External collaborator contracts.
//!
//! Discount and tax resolvers sit on the money path and their failures abort
//! the unit of work. The subscription activator and webhook notifier are
//! best-effort: they run after commit and their failures are only logged.

use std::sync::Arc;

use async_trait::async_trait;
use quill_core::invoice::Invoice;
use quill_shared::{SubscriptionId, TenantScope};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::events::WebhookEvent;

/// Failure reported by a collaborator.
#[derive(Debug, Error)]
#[error("{collaborator}: {message}")]
pub struct CollaboratorError {
    /// Collaborator name.
    pub collaborator: &'static str,
    /// Failure description.
    pub message: String,
}

impl CollaboratorError {
    /// Creates a collaborator error.
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}

/// Resolves coupons to a single total discount amount.
#[async_trait]
pub trait DiscountResolver: Send + Sync {
    /// Returns the total discount for `coupons` on `invoice`, in the invoice currency.
    async fn total_discount(&self, invoice: &Invoice, coupons: &[String]) -> Result<Decimal, CollaboratorError>;
}

/// Resolves the total tax for an invoice.
#[async_trait]
pub trait TaxResolver: Send + Sync {
    /// Returns the total tax on `invoice`. Zero when no rate applies.
    async fn total_tax(&self, invoice: &Invoice) -> Result<Decimal, CollaboratorError>;
}

/// Moves incomplete subscriptions to active once their first invoice is paid.
#[async_trait]
pub trait SubscriptionActivator: Send + Sync {
    /// Activates `subscription_id` if it is still incomplete.
    async fn activate_incomplete(
        &self,
        scope: TenantScope,
        subscription_id: SubscriptionId,
    ) -> Result<(), CollaboratorError>;
}

/// Publishes invoice events.
#[async_trait]
pub trait WebhookNotifier: Send + Sync {
    /// Publishes one event.
    async fn publish(&self, event: &WebhookEvent) -> Result<(), CollaboratorError>;
}

/// Discount resolver that never discounts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDiscount;

#[async_trait]
impl DiscountResolver for NoDiscount {
    async fn total_discount(&self, _invoice: &Invoice, _coupons: &[String]) -> Result<Decimal, CollaboratorError> {
        Ok(Decimal::ZERO)
    }
}

/// Tax resolver for untaxed tenants.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTax;

#[async_trait]
impl TaxResolver for NoTax {
    async fn total_tax(&self, _invoice: &Invoice) -> Result<Decimal, CollaboratorError> {
        Ok(Decimal::ZERO)
    }
}

/// Activator that only logs the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingActivator;

#[async_trait]
impl SubscriptionActivator for LoggingActivator {
    async fn activate_incomplete(
        &self,
        _scope: TenantScope,
        subscription_id: SubscriptionId,
    ) -> Result<(), CollaboratorError> {
        info!(subscription_id = %subscription_id, "subscription activation requested");
        Ok(())
    }
}

/// Notifier that only logs the event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl WebhookNotifier for LoggingNotifier {
    async fn publish(&self, event: &WebhookEvent) -> Result<(), CollaboratorError> {
        info!(event = event.name.as_str(), invoice_id = %event.invoice_id, "webhook event");
        Ok(())
    }
}

/// The collaborators an engine service talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Coupon discount resolution.
    pub discounts: Arc<dyn DiscountResolver>,
    /// Tax resolution.
    pub taxes: Arc<dyn TaxResolver>,
    /// Subscription activation.
    pub activator: Arc<dyn SubscriptionActivator>,
    /// Event publication.
    pub notifier: Arc<dyn WebhookNotifier>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            discounts: Arc::new(NoDiscount),
            taxes: Arc::new(NoTax),
            activator: Arc::new(LoggingActivator),
            notifier: Arc::new(LoggingNotifier),
        }
    }
}
