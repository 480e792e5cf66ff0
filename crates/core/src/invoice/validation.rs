//! Invoice-level invariant checks.
//!
//! Re-run after every mutation, before an invoice is handed back for
//! persistence.

use rust_decimal::Decimal;

use super::error::InvoiceError;
use super::model::Invoice;
use super::types::PaymentStatus;

/// Validator for invoice monetary invariants.
pub struct InvoiceValidator;

impl InvoiceValidator {
    /// Validates an invoice at rest.
    ///
    /// Rules:
    /// 1. No monetary field is negative
    /// 2. `total_discount <= subtotal`
    /// 3. `amount_paid <= amount_due` unless the invoice is overpaid
    /// 4. `amount_remaining` equals `max(amount_due - amount_paid, 0)`, or zero when overpaid
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(invoice: &Invoice) -> Result<(), InvoiceError> {
        let fields = [
            ("subtotal", invoice.subtotal),
            ("total_discount", invoice.total_discount),
            ("total_tax", invoice.total_tax),
            ("total", invoice.total),
            ("adjustment_amount", invoice.adjustment_amount),
            ("refunded_amount", invoice.refunded_amount),
            ("amount_due", invoice.amount_due),
            ("amount_paid", invoice.amount_paid),
            ("amount_remaining", invoice.amount_remaining),
        ];
        for (field, amount) in fields {
            Self::non_negative(field, amount)?;
        }

        if invoice.total_discount > invoice.subtotal {
            return Err(InvoiceError::DiscountExceedsSubtotal {
                discount: invoice.total_discount,
                subtotal: invoice.subtotal,
            });
        }

        if invoice.payment_status != PaymentStatus::Overpaid
            && invoice.amount_paid > invoice.amount_due
        {
            return Err(InvoiceError::AmountPaidExceedsDue {
                paid: invoice.amount_paid,
                due: invoice.amount_due,
            });
        }

        let expected = invoice.expected_remaining();
        if invoice.amount_remaining != expected {
            return Err(InvoiceError::RemainingMismatch {
                expected,
                actual: invoice.amount_remaining,
            });
        }

        Ok(())
    }

    /// Rejects a negative amount argument.
    ///
    /// # Errors
    ///
    /// Returns `NegativeAmount` naming `field`.
    pub fn non_negative(field: &'static str, amount: Decimal) -> Result<(), InvoiceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(InvoiceError::NegativeAmount { field, amount });
        }
        Ok(())
    }
}
