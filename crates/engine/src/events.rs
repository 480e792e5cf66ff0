//! Best-effort side effects dispatched after commit.

use std::fmt;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use quill_core::invoice::Invoice;
use quill_shared::{EnvironmentId, InvoiceId, SubscriptionId, TenantId, TenantScope};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

use crate::collaborators::{SubscriptionActivator, WebhookNotifier};

/// Invoice event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WebhookEventName {
    /// A draft invoice was created.
    #[serde(rename = "invoice.create.drafted")]
    InvoiceCreateDrafted,
    /// An invoice was finalized.
    #[serde(rename = "invoice.update.finalized")]
    InvoiceUpdateFinalized,
    /// An invoice was voided.
    #[serde(rename = "invoice.update.voided")]
    InvoiceUpdateVoided,
    /// An invoice's payment state changed.
    #[serde(rename = "invoice.update.payment")]
    InvoiceUpdatePayment,
    /// An invoice's amounts were recalculated.
    #[serde(rename = "invoice.update")]
    InvoiceUpdate,
}

impl WebhookEventName {
    /// Returns the wire name of the event.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvoiceCreateDrafted => "invoice.create.drafted",
            Self::InvoiceUpdateFinalized => "invoice.update.finalized",
            Self::InvoiceUpdateVoided => "invoice.update.voided",
            Self::InvoiceUpdatePayment => "invoice.update.payment",
            Self::InvoiceUpdate => "invoice.update",
        }
    }
}

impl fmt::Display for WebhookEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invoice event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookEvent {
    /// Event name.
    pub name: WebhookEventName,
    /// Invoice the event is about.
    pub invoice_id: InvoiceId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning environment.
    pub environment_id: EnvironmentId,
    /// When the event was raised.
    pub occurred_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Creates an event for `invoice`.
    #[must_use]
    pub fn for_invoice(name: WebhookEventName, invoice: &Invoice, occurred_at: DateTime<Utc>) -> Self {
        Self {
            name,
            invoice_id: invoice.id,
            tenant_id: invoice.tenant_id,
            environment_id: invoice.environment_id,
            occurred_at,
        }
    }

    /// Event payload.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        json!({
            "invoice_id": self.invoice_id,
            "tenant_id": self.tenant_id,
        })
    }
}

/// A side effect queued during a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Publish a webhook event.
    Webhook(WebhookEvent),
    /// Ask for an incomplete subscription to be activated.
    ActivateSubscription {
        /// Scope of the subscription.
        scope: TenantScope,
        /// Subscription to activate.
        subscription_id: SubscriptionId,
    },
}

/// Side effects collected during a unit of work and dispatched once it commits.
#[derive(Debug, Default)]
pub struct Outbox {
    effects: Vec<SideEffect>,
}

impl Outbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a webhook event for `invoice`.
    pub fn webhook(&mut self, name: WebhookEventName, invoice: &Invoice, now: DateTime<Utc>) {
        self.effects
            .push(SideEffect::Webhook(WebhookEvent::for_invoice(name, invoice, now)));
    }

    /// Queues a subscription activation.
    pub fn activate(&mut self, scope: TenantScope, subscription_id: SubscriptionId) {
        self.effects.push(SideEffect::ActivateSubscription {
            scope,
            subscription_id,
        });
    }

    /// Queued effects.
    #[must_use]
    pub fn effects(&self) -> &[SideEffect] {
        &self.effects
    }

    /// Runs every queued effect. Failures are logged and swallowed.
    ///
    /// Webhooks are skipped when `notifications_enabled` is false;
    /// activations always run.
    pub async fn dispatch(
        self,
        notifier: &dyn WebhookNotifier,
        activator: &dyn SubscriptionActivator,
        notifications_enabled: bool,
    ) {
        let tasks = self.effects.into_iter().map(|effect| async move {
            match effect {
                SideEffect::Webhook(event) => {
                    if !notifications_enabled {
                        debug!(event = event.name.as_str(), "notifications disabled");
                        return;
                    }
                    if let Err(e) = notifier.publish(&event).await {
                        error!(
                            error = %e,
                            event = event.name.as_str(),
                            invoice_id = %event.invoice_id,
                            "Failed to publish webhook event"
                        );
                    }
                }
                SideEffect::ActivateSubscription {
                    scope,
                    subscription_id,
                } => {
                    if let Err(e) = activator.activate_incomplete(scope, subscription_id).await {
                        error!(
                            error = %e,
                            subscription_id = %subscription_id,
                            "Failed to activate incomplete subscription"
                        );
                    }
                }
            }
        });
        join_all(tasks).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(
            WebhookEventName::InvoiceCreateDrafted.as_str(),
            "invoice.create.drafted"
        );
        assert_eq!(
            serde_json::to_value(WebhookEventName::InvoiceUpdatePayment).unwrap(),
            "invoice.update.payment"
        );
        assert_eq!(WebhookEventName::InvoiceUpdate.to_string(), "invoice.update");
    }
}
