//! Invoice operations, each one unit of work.

use chrono::{DateTime, Utc};
use quill_core::invoice::{
    CreateInvoiceInput, CustomerInvoiceSummary, IdempotencyKeyGenerator, Invoice, InvoiceError,
    InvoiceLifecycle, InvoiceStatus, InvoiceType, InvoiceValidator, Metadata, PaymentStatus,
};
use quill_core::payment::{Payment, PaymentMethodType, PaymentStatusMachine};
use quill_core::pipeline::InvoiceCalculator;
use quill_shared::config::{BillingConfig, DuplicatePolicy};
use quill_shared::{Currency, CustomerId, InvoiceId, TenantScope};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::collaborators::Collaborators;
use crate::error::EngineError;
use crate::events::{Outbox, WebhookEventName};
use crate::store::{BillingStore, StoreTransaction, require_invoice};

/// Invoice creation, lifecycle, payment-status and recalculation operations.
pub struct InvoiceService<S> {
    store: S,
    collaborators: Collaborators,
    config: BillingConfig,
}

impl<S: BillingStore> InvoiceService<S> {
    /// Creates a service over `store`.
    pub fn new(store: S, collaborators: Collaborators, config: BillingConfig) -> Self {
        Self {
            store,
            collaborators,
            config,
        }
    }

    /// Creates an invoice, or returns the one already created for the same request.
    ///
    /// The idempotency key is the caller's key when given, otherwise derived
    /// from the scope, customer, period and subscription. A key hit returns
    /// the existing invoice or fails, depending on the duplicate policy.
    /// Subscription invoices also fail when the period is already billed.
    ///
    /// # Errors
    ///
    /// Returns a duplicate fault, a validation fault for a malformed request,
    /// or a collaborator or store failure.
    pub async fn create_invoice(
        &self,
        scope: TenantScope,
        input: CreateInvoiceInput,
    ) -> Result<Invoice, EngineError> {
        let now = Utc::now();
        let key = IdempotencyKeyGenerator::for_create(&scope, &input);
        let mut tx = self.store.begin(scope).await?;

        if let Some(existing) = tx.invoice_by_idempotency_key(&key).await? {
            return match self.config.duplicate_policy {
                DuplicatePolicy::ReturnExisting => {
                    info!(
                        invoice_id = %existing.id,
                        idempotency_key = %key,
                        "Returning invoice for repeated create request"
                    );
                    Ok(existing)
                }
                DuplicatePolicy::Reject => Err(EngineError::Duplicate(format!(
                    "idempotency key {key} already used by invoice {}",
                    existing.id
                ))),
            };
        }

        let mut invoice = Invoice::create(&scope, &input, now)?;
        invoice.idempotency_key = Some(key);

        if let (InvoiceType::Subscription, Some(subscription_id), Some(start), Some(end)) = (
            invoice.invoice_type,
            invoice.subscription_id,
            invoice.period_start,
            invoice.period_end,
        ) {
            if tx.invoice_exists_for_period(subscription_id, start, end).await? {
                return Err(EngineError::Duplicate(format!(
                    "subscription {subscription_id} already invoiced for {start} to {end}"
                )));
            }
            invoice.billing_sequence = Some(tx.next_billing_sequence(subscription_id).await?);
        }
        invoice.invoice_number = Some(tx.next_invoice_number().await?);

        self.fold_discount_and_tax(&mut invoice, &input.coupons, true)
            .await?;
        match input.payment_status {
            None => invoice.derive_initial_payment_status(now),
            Some(PaymentStatus::Succeeded) if input.amount_paid.is_none() => {
                invoice.amount_paid = invoice.amount_due;
                invoice.amount_remaining = Decimal::ZERO;
            }
            Some(_) => {}
        }
        InvoiceValidator::validate(&invoice)?;

        tx.insert_invoice(&invoice).await?;
        tx.commit().await?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = invoice.invoice_number.as_deref().unwrap_or_default(),
            customer_id = %invoice.customer_id,
            amount_due = %invoice.amount_due,
            status = %invoice.invoice_status,
            "Invoice created"
        );

        let mut outbox = Outbox::new();
        let event = if invoice.invoice_status == InvoiceStatus::Draft {
            WebhookEventName::InvoiceCreateDrafted
        } else {
            WebhookEventName::InvoiceUpdateFinalized
        };
        outbox.webhook(event, &invoice, now);
        self.dispatch(outbox).await;

        Ok(invoice)
    }

    /// Finalizes a draft invoice.
    ///
    /// # Errors
    ///
    /// Returns a state fault unless the invoice is a draft.
    pub async fn finalize_invoice(&self, scope: TenantScope, id: InvoiceId) -> Result<Invoice, EngineError> {
        let invoice = self
            .mutate(scope, id, WebhookEventName::InvoiceUpdateFinalized, |invoice, now| {
                InvoiceLifecycle::finalize(invoice, now)
            })
            .await?;
        info!(invoice_id = %id, "Invoice finalized");
        Ok(invoice)
    }

    /// Voids an unpaid invoice, merging `metadata` into its annotations.
    ///
    /// # Errors
    ///
    /// Returns a state fault if the invoice is already voided or has been paid.
    pub async fn void_invoice(
        &self,
        scope: TenantScope,
        id: InvoiceId,
        metadata: Metadata,
    ) -> Result<Invoice, EngineError> {
        let invoice = self
            .mutate(scope, id, WebhookEventName::InvoiceUpdateVoided, |invoice, now| {
                InvoiceLifecycle::void(invoice, metadata, now)
            })
            .await?;
        info!(invoice_id = %id, "Invoice voided");
        Ok(invoice)
    }

    /// Operator correction of the payment status, overwriting the paid amount.
    ///
    /// Refused once any succeeded payment has been recorded for the invoice.
    ///
    /// # Errors
    ///
    /// Returns a state fault for a disallowed invoice status or transition, or
    /// when payments exist; a validation fault for a bad amount.
    pub async fn update_payment_status(
        &self,
        scope: TenantScope,
        id: InvoiceId,
        status: PaymentStatus,
        amount: Option<Decimal>,
    ) -> Result<Invoice, EngineError> {
        let now = Utc::now();
        let mut tx = self.store.begin(scope).await?;
        let mut invoice = require_invoice(&mut tx, id).await?;
        let has_payments = tx.has_succeeded_payments(id).await?;
        let from = invoice.payment_status;

        if let Err(e) = PaymentStatusMachine::apply_absolute(&mut invoice, status, amount, has_payments, now) {
            warn!(invoice_id = %id, from = %from, to = %status, error = %e, "Payment status update rejected");
            return Err(e.into());
        }

        tx.update_invoice(&mut invoice).await?;
        tx.commit().await?;
        info!(invoice_id = %id, from = %from, to = %status, "Payment status updated");

        let mut outbox = Outbox::new();
        outbox.webhook(WebhookEventName::InvoiceUpdatePayment, &invoice, now);
        self.dispatch(outbox).await;
        Ok(invoice)
    }

    /// Applies a settlement event, accumulating into the paid amount.
    ///
    /// # Errors
    ///
    /// Returns a state fault for a disallowed invoice status or transition,
    /// or a validation fault for a bad amount.
    pub async fn reconcile_payment_status(
        &self,
        scope: TenantScope,
        id: InvoiceId,
        status: PaymentStatus,
        amount: Option<Decimal>,
    ) -> Result<Invoice, EngineError> {
        let now = Utc::now();
        let mut tx = self.store.begin(scope).await?;
        let mut invoice = require_invoice(&mut tx, id).await?;
        let from = invoice.payment_status;

        let outcome = PaymentStatusMachine::apply_reconciling(&mut invoice, status, amount, now)?;
        tx.update_invoice(&mut invoice).await?;
        tx.commit().await?;

        info!(
            invoice_id = %id,
            from = %from,
            to = %outcome.payment_status,
            amount_paid = %invoice.amount_paid,
            "Payment status reconciled"
        );
        self.after_settlement(scope, &invoice, outcome.activate_subscription, now)
            .await;
        Ok(invoice)
    }

    /// Records a payment made outside the wallets (card, ACH, offline) and
    /// reconciles the invoice against it.
    ///
    /// # Errors
    ///
    /// Returns a validation fault for a non-positive amount, an invoice fault
    /// for a closed invoice, or a store failure.
    pub async fn record_external_payment(
        &self,
        scope: TenantScope,
        id: InvoiceId,
        method: PaymentMethodType,
        gateway_reference: Option<String>,
        amount: Decimal,
    ) -> Result<Payment, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidPaymentAmount(amount));
        }

        let now = Utc::now();
        let mut tx = self.store.begin(scope).await?;
        let mut invoice = require_invoice(&mut tx, id).await?;

        let payment = Payment::external(&invoice, method, gateway_reference, amount, now);
        let status = PaymentStatusMachine::settlement_status(&invoice, amount);
        let outcome = PaymentStatusMachine::apply_reconciling(&mut invoice, status, Some(amount), now)?;

        tx.insert_payment(&payment).await?;
        tx.update_invoice(&mut invoice).await?;
        tx.commit().await?;

        info!(
            invoice_id = %id,
            payment_id = %payment.id,
            method = method.as_str(),
            amount = %amount,
            status = %outcome.payment_status,
            "External payment recorded"
        );
        self.after_settlement(scope, &invoice, outcome.activate_subscription, now)
            .await;
        Ok(payment)
    }

    /// Re-runs the discount and tax folding on an open invoice.
    ///
    /// # Errors
    ///
    /// Returns a state fault for a voided invoice, a collaborator failure, or
    /// a validation fault if the new amounts fall below what was already paid.
    pub async fn recalculate_invoice(
        &self,
        scope: TenantScope,
        id: InvoiceId,
        coupons: &[String],
    ) -> Result<Invoice, EngineError> {
        let now = Utc::now();
        let mut tx = self.store.begin(scope).await?;
        let mut invoice = require_invoice(&mut tx, id).await?;

        self.fold_discount_and_tax(&mut invoice, coupons, false).await?;
        invoice.updated_at = now;
        InvoiceValidator::validate(&invoice)?;

        tx.update_invoice(&mut invoice).await?;
        tx.commit().await?;
        info!(invoice_id = %id, total = %invoice.total, amount_due = %invoice.amount_due, "Invoice recalculated");

        let mut outbox = Outbox::new();
        outbox.webhook(WebhookEventName::InvoiceUpdate, &invoice, now);
        self.dispatch(outbox).await;
        Ok(invoice)
    }

    /// Adds a credit note's adjustment and refund to a finalized invoice.
    ///
    /// # Errors
    ///
    /// Returns a validation fault for negative amounts or a state fault
    /// unless the invoice is finalized.
    pub async fn apply_credit_note_adjustment(
        &self,
        scope: TenantScope,
        id: InvoiceId,
        adjustment_amount: Decimal,
        refunded_amount: Decimal,
    ) -> Result<Invoice, EngineError> {
        InvoiceValidator::non_negative("adjustment_amount", adjustment_amount)?;
        InvoiceValidator::non_negative("refunded_amount", refunded_amount)?;

        let invoice = self
            .mutate(scope, id, WebhookEventName::InvoiceUpdate, |invoice, now| {
                let adjustment = invoice.adjustment_amount + adjustment_amount;
                let refund = invoice.refunded_amount + refunded_amount;
                InvoiceCalculator::recalculate_adjustments(invoice, adjustment, refund, now)?;
                invoice.updated_at = now;
                InvoiceValidator::validate(invoice)
            })
            .await?;
        info!(
            invoice_id = %id,
            adjustment_amount = %invoice.adjustment_amount,
            amount_remaining = %invoice.amount_remaining,
            "Credit note applied"
        );
        Ok(invoice)
    }

    /// Fetches an invoice.
    ///
    /// # Errors
    ///
    /// Returns a not-found fault if the invoice is not in the scope.
    pub async fn get_invoice(&self, scope: TenantScope, id: InvoiceId) -> Result<Invoice, EngineError> {
        let mut tx = self.store.begin(scope).await?;
        require_invoice(&mut tx, id).await
    }

    /// Summarizes a customer's receivables in `currency`.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn customer_invoice_summary(
        &self,
        scope: TenantScope,
        customer_id: CustomerId,
        currency: &Currency,
    ) -> Result<CustomerInvoiceSummary, EngineError> {
        let mut tx = self.store.begin(scope).await?;
        let invoices = tx.invoices_for_customer(customer_id).await?;
        drop(tx);
        Ok(CustomerInvoiceSummary::build(
            customer_id,
            currency,
            &invoices,
            Utc::now(),
        ))
    }

    /// Resolves and folds discount then tax. On creation the discount
    /// resolver is only consulted when coupons are referenced.
    async fn fold_discount_and_tax(
        &self,
        invoice: &mut Invoice,
        coupons: &[String],
        creating: bool,
    ) -> Result<(), EngineError> {
        if !coupons.is_empty() || !creating {
            let discount = if coupons.is_empty() {
                Decimal::ZERO
            } else {
                self.collaborators
                    .discounts
                    .total_discount(invoice, coupons)
                    .await
                    .map_err(EngineError::Discount)?
            };
            debug!(invoice_id = %invoice.id, discount = %discount, "discount resolved");
            InvoiceCalculator::apply_discount(invoice, discount)?;
        }

        let tax = self
            .collaborators
            .taxes
            .total_tax(invoice)
            .await
            .map_err(EngineError::Tax)?;
        InvoiceCalculator::apply_tax(invoice, tax)?;
        Ok(())
    }

    /// Locks an invoice, applies `change`, writes it back and publishes `event`.
    async fn mutate<F>(
        &self,
        scope: TenantScope,
        id: InvoiceId,
        event: WebhookEventName,
        change: F,
    ) -> Result<Invoice, EngineError>
    where
        F: FnOnce(&mut Invoice, DateTime<Utc>) -> Result<(), InvoiceError> + Send,
    {
        let now = Utc::now();
        let mut tx = self.store.begin(scope).await?;
        let mut invoice = require_invoice(&mut tx, id).await?;

        change(&mut invoice, now)?;
        tx.update_invoice(&mut invoice).await?;
        tx.commit().await?;

        let mut outbox = Outbox::new();
        outbox.webhook(event, &invoice, now);
        self.dispatch(outbox).await;
        Ok(invoice)
    }

    async fn after_settlement(
        &self,
        scope: TenantScope,
        invoice: &Invoice,
        activate_subscription: bool,
        now: DateTime<Utc>,
    ) {
        let mut outbox = Outbox::new();
        outbox.webhook(WebhookEventName::InvoiceUpdatePayment, invoice, now);
        if let (true, Some(subscription_id)) = (activate_subscription, invoice.subscription_id) {
            outbox.activate(scope, subscription_id);
        }
        self.dispatch(outbox).await;
    }

    async fn dispatch(&self, outbox: Outbox) {
        outbox
            .dispatch(
                self.collaborators.notifier.as_ref(),
                self.collaborators.activator.as_ref(),
                self.config.notifications_enabled,
            )
            .await;
    }
}
