//! Invoice aggregate and its line items.
//!
//! The `Invoice` owns every monetary field of a bill. Mutations go through
//! the computation pipeline, the payment-status state machine, or the
//! lifecycle rules; this module only builds new aggregates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use quill_shared::{
    Currency, CustomerId, EnvironmentId, InvoiceId, LineItemId, SubscriptionId, TenantId,
    TenantScope,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::InvoiceError;
use super::types::{
    BillingReason, InvoiceStatus, InvoiceType, LineItemEntityType, PaymentStatus, PriceType,
};
use super::validation::InvoiceValidator;

/// Free-form key/value annotations.
pub type Metadata = BTreeMap<String, String>;

/// One billable component of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    /// Line item ID.
    pub id: LineItemId,
    /// Owning invoice.
    pub invoice_id: InvoiceId,
    /// Kind of billable entity.
    pub entity_type: Option<LineItemEntityType>,
    /// Billable entity ID.
    pub entity_id: Option<String>,
    /// Price reference.
    pub price_id: Option<String>,
    /// Usage or fixed pricing.
    pub price_type: PriceType,
    /// Display label.
    pub display_name: Option<String>,
    /// Line amount.
    pub amount: Decimal,
    /// Billed quantity.
    pub quantity: Decimal,
    /// Line currency (equal to the invoice currency).
    pub currency: Currency,
    /// Start of the service window, if any.
    pub period_start: Option<DateTime<Utc>>,
    /// End of the service window, if any.
    pub period_end: Option<DateTime<Utc>>,
}

/// Input for one line item of a new invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemInput {
    /// Kind of billable entity.
    pub entity_type: Option<LineItemEntityType>,
    /// Billable entity ID.
    pub entity_id: Option<String>,
    /// Price reference.
    pub price_id: Option<String>,
    /// Usage or fixed pricing.
    pub price_type: PriceType,
    /// Display label.
    pub display_name: Option<String>,
    /// Line amount (already priced by the quoting service).
    pub amount: Decimal,
    /// Billed quantity.
    pub quantity: Decimal,
    /// Line currency.
    pub currency: Currency,
    /// Start of the service window, if any.
    pub period_start: Option<DateTime<Utc>>,
    /// End of the service window, if any.
    pub period_end: Option<DateTime<Utc>>,
}

/// Input for creating a new invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceInput {
    /// Billed customer.
    pub customer_id: CustomerId,
    /// Subscription this invoice belongs to, if any.
    pub subscription_id: Option<SubscriptionId>,
    /// Invoice kind.
    pub invoice_type: InvoiceType,
    /// Invoice currency.
    pub currency: Currency,
    /// Overrides the lifecycle status derived from the invoice type.
    pub invoice_status: Option<InvoiceStatus>,
    /// Overrides the payment status derived from the amounts.
    pub payment_status: Option<PaymentStatus>,
    /// Overrides the subtotal derived from the line items.
    pub subtotal: Option<Decimal>,
    /// Amount already collected.
    pub amount_paid: Option<Decimal>,
    /// Why the invoice is issued.
    pub billing_reason: BillingReason,
    /// Caller-supplied deduplication key.
    pub idempotency_key: Option<String>,
    /// Billing period start.
    pub period_start: Option<DateTime<Utc>>,
    /// Billing period end.
    pub period_end: Option<DateTime<Utc>>,
    /// Payment due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Priced line items.
    pub line_items: Vec<LineItemInput>,
    /// Coupon references handed to the discount resolver.
    pub coupons: Vec<String>,
    /// Annotations.
    pub metadata: Metadata,
}

/// One bill owed by a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice ID.
    pub id: InvoiceId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning environment.
    pub environment_id: EnvironmentId,
    /// Billed customer.
    pub customer_id: CustomerId,
    /// Subscription this invoice belongs to, if any.
    pub subscription_id: Option<SubscriptionId>,
    /// Sequential human-facing number.
    pub invoice_number: Option<String>,
    /// Invoice kind.
    pub invoice_type: InvoiceType,
    /// Lifecycle status.
    pub invoice_status: InvoiceStatus,
    /// Payment status.
    pub payment_status: PaymentStatus,
    /// Currency of every monetary field.
    pub currency: Currency,
    /// Sum of line items before discounts and taxes.
    pub subtotal: Decimal,
    /// Discount folded in by the pipeline.
    pub total_discount: Decimal,
    /// Tax folded in by the pipeline.
    pub total_tax: Decimal,
    /// `max(subtotal - total_discount + total_tax, 0)`.
    pub total: Decimal,
    /// Credit-note adjustment applied after finalization.
    pub adjustment_amount: Decimal,
    /// Amount refunded through credit notes.
    pub refunded_amount: Decimal,
    /// Amount the customer owes.
    pub amount_due: Decimal,
    /// Amount collected so far.
    pub amount_paid: Decimal,
    /// Amount still outstanding.
    pub amount_remaining: Decimal,
    /// Deduplication key, unique per tenant.
    pub idempotency_key: Option<String>,
    /// Position within the subscription's invoice history.
    pub billing_sequence: Option<u32>,
    /// Why the invoice was issued.
    pub billing_reason: BillingReason,
    /// Billing period start.
    pub period_start: Option<DateTime<Utc>>,
    /// Billing period end.
    pub period_end: Option<DateTime<Utc>>,
    /// Payment due date.
    pub due_date: Option<DateTime<Utc>>,
    /// When the invoice was finalized.
    pub finalized_at: Option<DateTime<Utc>>,
    /// When the invoice was voided.
    pub voided_at: Option<DateTime<Utc>>,
    /// When the invoice was paid.
    pub paid_at: Option<DateTime<Utc>>,
    /// Line items, replaced as a batch.
    pub line_items: Vec<InvoiceLineItem>,
    /// Annotations.
    pub metadata: Metadata,
    /// Optimistic concurrency version.
    pub version: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Builds a new invoice from a create request.
    ///
    /// One-off and credit invoices start finalized, subscription invoices
    /// start as drafts. Payment status starts pending, or succeeded when
    /// nothing remains to be paid. Discount and tax are folded in afterwards
    /// by the computation pipeline.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceError` if the request is malformed or the resulting
    /// invoice violates an invariant.
    pub fn create(
        scope: &TenantScope,
        input: &CreateInvoiceInput,
        now: DateTime<Utc>,
    ) -> Result<Self, InvoiceError> {
        if !input.currency.is_valid() {
            return Err(InvoiceError::InvalidCurrency(input.currency.to_string()));
        }

        match (input.period_start, input.period_end) {
            (Some(start), Some(end)) if end <= start => return Err(InvoiceError::InvalidPeriod),
            (None, _) | (_, None) if input.invoice_type == InvoiceType::Subscription => {
                return Err(InvoiceError::MissingPeriod);
            }
            _ => {}
        }

        let id = InvoiceId::new();
        let line_items = input
            .line_items
            .iter()
            .map(|item| Self::build_line_item(id, &input.currency, item))
            .collect::<Result<Vec<_>, _>>()?;

        let subtotal = input
            .subtotal
            .unwrap_or_else(|| line_items.iter().map(|item| item.amount).sum());
        if subtotal.is_sign_negative() {
            return Err(InvoiceError::NegativeAmount {
                field: "subtotal",
                amount: subtotal,
            });
        }

        let invoice_status = match input.invoice_status {
            Some(InvoiceStatus::Voided) => {
                return Err(InvoiceError::InvalidStatusTransition {
                    from: InvoiceStatus::Draft,
                    to: InvoiceStatus::Voided,
                });
            }
            Some(status) => status,
            None if input.invoice_type == InvoiceType::Subscription => InvoiceStatus::Draft,
            None => InvoiceStatus::Finalized,
        };

        let amount_due = subtotal;
        let amount_paid = match (input.amount_paid, input.payment_status) {
            (Some(paid), _) => paid,
            (None, Some(PaymentStatus::Succeeded)) => amount_due,
            (None, _) => Decimal::ZERO,
        };
        if amount_paid.is_sign_negative() {
            return Err(InvoiceError::NegativeAmount {
                field: "amount_paid",
                amount: amount_paid,
            });
        }
        if amount_paid > amount_due {
            return Err(InvoiceError::AmountPaidExceedsDue {
                paid: amount_paid,
                due: amount_due,
            });
        }
        let amount_remaining = amount_due - amount_paid;

        let payment_status = input.payment_status.unwrap_or(if amount_remaining.is_zero() {
            PaymentStatus::Succeeded
        } else {
            PaymentStatus::Pending
        });

        let invoice = Self {
            id,
            tenant_id: scope.tenant_id,
            environment_id: scope.environment_id,
            customer_id: input.customer_id,
            subscription_id: input.subscription_id,
            invoice_number: None,
            invoice_type: input.invoice_type,
            invoice_status,
            payment_status,
            currency: input.currency.clone(),
            subtotal,
            total_discount: Decimal::ZERO,
            total_tax: Decimal::ZERO,
            total: subtotal,
            adjustment_amount: Decimal::ZERO,
            refunded_amount: Decimal::ZERO,
            amount_due,
            amount_paid,
            amount_remaining,
            idempotency_key: input.idempotency_key.clone(),
            billing_sequence: None,
            billing_reason: input.billing_reason,
            period_start: input.period_start,
            period_end: input.period_end,
            due_date: input.due_date,
            finalized_at: (invoice_status == InvoiceStatus::Finalized).then_some(now),
            voided_at: None,
            paid_at: payment_status.is_settled().then_some(now),
            line_items,
            metadata: input.metadata.clone(),
            version: 0,
            created_at: now,
            updated_at: now,
        };

        InvoiceValidator::validate(&invoice)?;
        Ok(invoice)
    }

    fn build_line_item(
        invoice_id: InvoiceId,
        currency: &Currency,
        item: &LineItemInput,
    ) -> Result<InvoiceLineItem, InvoiceError> {
        if item.currency != *currency {
            return Err(InvoiceError::CurrencyMismatch {
                expected: currency.clone(),
                found: item.currency.clone(),
            });
        }
        if item.amount.is_sign_negative() {
            return Err(InvoiceError::NegativeAmount {
                field: "line_item.amount",
                amount: item.amount,
            });
        }
        if item.quantity.is_sign_negative() {
            return Err(InvoiceError::NegativeQuantity(item.quantity));
        }

        Ok(InvoiceLineItem {
            id: LineItemId::new(),
            invoice_id,
            entity_type: item.entity_type,
            entity_id: item.entity_id.clone(),
            price_id: item.price_id.clone(),
            price_type: item.price_type,
            display_name: item.display_name.clone(),
            amount: item.amount,
            quantity: item.quantity,
            currency: currency.clone(),
            period_start: item.period_start,
            period_end: item.period_end,
        })
    }

    /// Remaining amount implied by the due/paid amounts and payment status.
    ///
    /// `max(amount_due - amount_paid, 0)`, or zero when overpaid.
    #[must_use]
    pub fn expected_remaining(&self) -> Decimal {
        if self.payment_status == PaymentStatus::Overpaid {
            Decimal::ZERO
        } else {
            (self.amount_due - self.amount_paid).max(Decimal::ZERO)
        }
    }

    /// Re-derives the creation-time payment status after discount and tax
    /// have been folded in: succeeded when nothing remains, pending otherwise.
    pub fn derive_initial_payment_status(&mut self, now: DateTime<Utc>) {
        if self.amount_remaining.is_zero() {
            self.payment_status = PaymentStatus::Succeeded;
            self.paid_at.get_or_insert(now);
        } else {
            self.payment_status = PaymentStatus::Pending;
            self.paid_at = None;
        }
    }

    /// Returns true if the invoice is the paid first invoice of a subscription.
    #[must_use]
    pub fn activates_subscription(&self) -> bool {
        self.subscription_id.is_some()
            && self.billing_reason.is_subscription_start()
            && self.payment_status.is_settled()
    }
}
