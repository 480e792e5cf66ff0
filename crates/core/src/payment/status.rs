//! Payment-status state machine.
//!
//! Two update disciplines share one transition table:
//!
//! - **absolute**: operator corrections that overwrite the paid amount
//! - **reconciling**: settlement events that accumulate into the paid amount
//!
//! Both check the invoice status, the amount argument and the transition
//! before touching any field. Mutations run on a copy that is validated and
//! only then written back, so a failed update leaves the invoice untouched.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::invoice::{Invoice, InvoiceError, InvoiceValidator, PaymentStatus};

/// Result of a reconciling update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    /// Status the invoice ended in (may be escalated to overpaid).
    pub payment_status: PaymentStatus,
    /// True if the invoice settled the first invoice of an incomplete subscription.
    pub activate_subscription: bool,
}

/// Stateless service for payment-status transitions.
pub struct PaymentStatusMachine;

impl PaymentStatusMachine {
    /// Checks if a payment-status transition is in the transition table.
    ///
    /// | from | allowed to |
    /// |---|---|
    /// | pending | pending, succeeded, overpaid, failed |
    /// | succeeded | succeeded, overpaid |
    /// | overpaid | overpaid |
    /// | failed | pending, failed, succeeded, overpaid |
    #[must_use]
    pub fn is_valid_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
        matches!(
            (from, to),
            (PaymentStatus::Pending | PaymentStatus::Failed, _)
                | (
                    PaymentStatus::Succeeded,
                    PaymentStatus::Succeeded | PaymentStatus::Overpaid
                )
                | (PaymentStatus::Overpaid, PaymentStatus::Overpaid)
        )
    }

    /// Returns every status reachable from `from`.
    #[must_use]
    pub fn allowed_targets(from: PaymentStatus) -> Vec<PaymentStatus> {
        [
            PaymentStatus::Pending,
            PaymentStatus::Succeeded,
            PaymentStatus::Overpaid,
            PaymentStatus::Failed,
        ]
        .into_iter()
        .filter(|to| Self::is_valid_transition(from, *to))
        .collect()
    }

    /// Status a settlement of `amount` should reconcile to.
    ///
    /// Succeeded when it clears the remaining balance, overpaid when it goes
    /// beyond it (or the invoice is already overpaid), pending otherwise.
    /// A succeeded invoice that still has money owed stays succeeded; the
    /// reconciling update escalates it to overpaid when needed.
    #[must_use]
    pub fn settlement_status(invoice: &Invoice, amount: Decimal) -> PaymentStatus {
        match invoice.payment_status {
            PaymentStatus::Overpaid => return PaymentStatus::Overpaid,
            PaymentStatus::Succeeded => return PaymentStatus::Succeeded,
            PaymentStatus::Pending | PaymentStatus::Failed => {}
        }
        let remaining = invoice.amount_due - invoice.amount_paid - amount;
        if remaining.is_zero() {
            PaymentStatus::Succeeded
        } else if remaining.is_sign_negative() {
            PaymentStatus::Overpaid
        } else {
            PaymentStatus::Pending
        }
    }

    /// Applies an operator correction.
    ///
    /// - pending: `amount_paid = amount` (unchanged when no amount is given)
    /// - succeeded: paid in full, `paid_at = now`
    /// - overpaid: `amount_paid = amount`, which must exceed `amount_due`
    /// - failed: nothing paid, `paid_at` cleared
    ///
    /// # Errors
    ///
    /// Returns `PaymentUpdateNotAllowed`, `NegativeAmount`,
    /// `InvalidPaymentTransition` or `ManualUpdateBlocked` (checked in that
    /// order), or a validation error for the resulting amounts.
    pub fn apply_absolute(
        invoice: &mut Invoice,
        status: PaymentStatus,
        amount: Option<Decimal>,
        has_succeeded_payments: bool,
        now: DateTime<Utc>,
    ) -> Result<(), InvoiceError> {
        Self::precheck(invoice, status, amount)?;
        if has_succeeded_payments {
            return Err(InvoiceError::ManualUpdateBlocked);
        }

        let mut next = invoice.clone();
        match status {
            PaymentStatus::Pending => {
                if let Some(amount) = amount {
                    next.amount_paid = amount;
                }
                next.amount_remaining = next.amount_due - next.amount_paid;
            }
            PaymentStatus::Succeeded => {
                next.amount_paid = next.amount_due;
                next.amount_remaining = Decimal::ZERO;
                next.paid_at = Some(now);
            }
            PaymentStatus::Overpaid => {
                let paid = amount
                    .filter(|paid| *paid > next.amount_due)
                    .ok_or(InvoiceError::OverpaidAmountRequired {
                        amount: amount.unwrap_or_default(),
                        due: next.amount_due,
                    })?;
                next.amount_paid = paid;
                next.amount_remaining = Decimal::ZERO;
                next.paid_at = Some(now);
            }
            PaymentStatus::Failed => {
                next.amount_paid = Decimal::ZERO;
                next.amount_remaining = next.amount_due;
                next.paid_at = None;
            }
        }
        next.payment_status = status;
        next.updated_at = now;

        InvoiceValidator::validate(&next)?;
        *invoice = next;
        Ok(())
    }

    /// Applies a settlement event.
    ///
    /// - pending: `amount_paid += amount`
    /// - succeeded: `amount_paid += amount` (or `= amount_due` without an
    ///   amount), escalating to overpaid when the result exceeds `amount_due`
    /// - overpaid: `amount_paid += amount`, remaining stays zero
    /// - failed: amounts untouched, `paid_at` cleared
    ///
    /// # Errors
    ///
    /// Returns `PaymentUpdateNotAllowed`, `NegativeAmount` or
    /// `InvalidPaymentTransition`, or a validation error for the resulting
    /// amounts.
    pub fn apply_reconciling(
        invoice: &mut Invoice,
        status: PaymentStatus,
        amount: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, InvoiceError> {
        Self::precheck(invoice, status, amount)?;

        let mut next = invoice.clone();
        let mut final_status = status;
        match status {
            PaymentStatus::Pending => {
                next.amount_paid += amount.unwrap_or_default();
                next.amount_remaining = next.amount_due - next.amount_paid;
            }
            PaymentStatus::Succeeded => {
                next.amount_paid = amount.map_or(next.amount_due, |paid| next.amount_paid + paid);
                if next.amount_paid > next.amount_due {
                    final_status = PaymentStatus::Overpaid;
                    next.amount_remaining = Decimal::ZERO;
                } else {
                    next.amount_remaining = next.amount_due - next.amount_paid;
                }
                next.paid_at = Some(now);
            }
            PaymentStatus::Overpaid => {
                next.amount_paid += amount.unwrap_or_default();
                next.amount_remaining = Decimal::ZERO;
                next.paid_at.get_or_insert(now);
            }
            PaymentStatus::Failed => {
                next.paid_at = None;
            }
        }
        next.payment_status = final_status;
        next.updated_at = now;

        InvoiceValidator::validate(&next)?;
        *invoice = next;

        Ok(ReconcileOutcome {
            payment_status: final_status,
            activate_subscription: invoice.activates_subscription(),
        })
    }

    fn precheck(
        invoice: &Invoice,
        status: PaymentStatus,
        amount: Option<Decimal>,
    ) -> Result<(), InvoiceError> {
        if !invoice.invoice_status.accepts_payment_updates() {
            return Err(InvoiceError::PaymentUpdateNotAllowed(invoice.invoice_status));
        }
        if let Some(amount) = amount {
            InvoiceValidator::non_negative("amount", amount)?;
        }
        if !Self::is_valid_transition(invoice.payment_status, status) {
            return Err(InvoiceError::InvalidPaymentTransition {
                from: invoice.payment_status,
                to: status,
            });
        }
        Ok(())
    }
}
