//! Idempotency key derivation for invoice creation.
//!
//! Keys are a SHA-256 digest over a scope name and the stable attributes of
//! the request, sorted by name. Wall-clock time never participates, so a
//! retried request always maps to the same key.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use super::model::CreateInvoiceInput;
use super::types::InvoiceType;
use quill_shared::TenantScope;

/// Namespace a key is generated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyScope {
    /// One-off and credit invoices.
    OneOffInvoice,
    /// Subscription invoices.
    SubscriptionInvoice,
}

impl IdempotencyScope {
    /// Returns the string representation of the scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneOffInvoice => "one_off_invoice",
            Self::SubscriptionInvoice => "subscription_invoice",
        }
    }

    /// Returns the scope for an invoice type.
    #[must_use]
    pub fn for_invoice_type(invoice_type: InvoiceType) -> Self {
        match invoice_type {
            InvoiceType::Subscription => Self::SubscriptionInvoice,
            InvoiceType::OneOff | InvoiceType::Credit => Self::OneOffInvoice,
        }
    }
}

/// Generates deterministic idempotency keys.
pub struct IdempotencyKeyGenerator;

impl IdempotencyKeyGenerator {
    /// Hashes `params` under `scope`. Parameter order does not matter.
    #[must_use]
    pub fn generate(scope: IdempotencyScope, params: &BTreeMap<&str, String>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(scope.as_str().as_bytes());
        for (name, value) in params {
            hasher.update(b"|");
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Returns the key for a create request.
    ///
    /// A caller-supplied key is used verbatim. Otherwise the key covers the
    /// tenant, customer, period bounds and subscription.
    #[must_use]
    pub fn for_create(scope: &TenantScope, input: &CreateInvoiceInput) -> String {
        if let Some(key) = input.idempotency_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return key.clone();
        }

        let mut params = BTreeMap::new();
        params.insert("tenant_id", scope.tenant_id.to_string());
        params.insert("environment_id", scope.environment_id.to_string());
        params.insert("customer_id", input.customer_id.to_string());
        if let Some(start) = input.period_start {
            params.insert("period_start", start.to_rfc3339());
        }
        if let Some(end) = input.period_end {
            params.insert("period_end", end.to_rfc3339());
        }
        if let Some(subscription_id) = input.subscription_id {
            params.insert("subscription_id", subscription_id.to_string());
        }

        Self::generate(
            IdempotencyScope::for_invoice_type(input.invoice_type),
            &params,
        )
    }
}
