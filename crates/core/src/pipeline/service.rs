//! Folding of discount, tax and credit-note results into an invoice.
//!
//! Discount is always netted against the subtotal before tax, so the tax
//! base is `subtotal - total_discount`. Every function here is pure: it
//! mutates the in-memory aggregate and never performs I/O.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::invoice::{Invoice, InvoiceError, InvoiceStatus, InvoiceValidator, PaymentStatus};
use crate::payment::PaymentStatusMachine;

/// Stateless calculator for invoice totals.
pub struct InvoiceCalculator;

impl InvoiceCalculator {
    /// Folds a resolved discount into the invoice.
    ///
    /// The discount is clamped to the subtotal. Any previously folded tax is
    /// cleared, since it was computed on the old base; call
    /// [`apply_tax`](Self::apply_tax) afterwards.
    ///
    /// # Errors
    ///
    /// Returns `NegativeAmount` for a negative discount and
    /// `PaymentUpdateNotAllowed` for a voided invoice.
    pub fn apply_discount(invoice: &mut Invoice, total_discount: Decimal) -> Result<(), InvoiceError> {
        Self::ensure_open(invoice)?;
        InvoiceValidator::non_negative("total_discount", total_discount)?;

        let discount = if total_discount > invoice.subtotal {
            debug!(
                invoice_id = %invoice.id,
                requested = %total_discount,
                subtotal = %invoice.subtotal,
                "discount clamped to subtotal"
            );
            invoice.subtotal
        } else {
            total_discount
        };

        invoice.total_discount = discount;
        invoice.total_tax = Decimal::ZERO;
        invoice.total = Self::clamp(invoice, "total", invoice.subtotal - discount);
        Self::refresh_due(invoice);
        Ok(())
    }

    /// Folds a resolved tax amount into the invoice.
    ///
    /// # Errors
    ///
    /// Returns `NegativeAmount` for a negative tax and
    /// `PaymentUpdateNotAllowed` for a voided invoice.
    pub fn apply_tax(invoice: &mut Invoice, total_tax: Decimal) -> Result<(), InvoiceError> {
        Self::ensure_open(invoice)?;
        InvoiceValidator::non_negative("total_tax", total_tax)?;

        invoice.total_tax = total_tax;
        invoice.total = Self::clamp(
            invoice,
            "total",
            invoice.subtotal - invoice.total_discount + total_tax,
        );
        Self::refresh_due(invoice);
        Ok(())
    }

    /// Applies cumulative credit-note adjustment and refund amounts.
    ///
    /// `amount_due` becomes `total - adjustment_amount`. An adjustment may only
    /// credit the unpaid part of the invoice, so `amount_due` never drops
    /// below `amount_paid`. When nothing remains the payment status moves to
    /// succeeded with `paid_at = now`; an overpaid invoice stays overpaid.
    ///
    /// # Errors
    ///
    /// Returns `NegativeAmount` for negative arguments,
    /// `AdjustmentNotAllowed` unless the invoice is finalized, and
    /// `AdjustmentExceedsCreditable` when the added adjustment is larger than
    /// `max(total - adjustment_amount - amount_paid, 0)`.
    pub fn recalculate_adjustments(
        invoice: &mut Invoice,
        adjustment_amount: Decimal,
        refunded_amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), InvoiceError> {
        if invoice.invoice_status != InvoiceStatus::Finalized {
            return Err(InvoiceError::AdjustmentNotAllowed(invoice.invoice_status));
        }
        InvoiceValidator::non_negative("adjustment_amount", adjustment_amount)?;
        InvoiceValidator::non_negative("refunded_amount", refunded_amount)?;

        let requested = adjustment_amount - invoice.adjustment_amount;
        let creditable = Self::creditable_amount(invoice);
        if requested > creditable {
            return Err(InvoiceError::AdjustmentExceedsCreditable {
                requested,
                creditable,
            });
        }

        invoice.adjustment_amount = adjustment_amount;
        invoice.refunded_amount = refunded_amount;
        Self::refresh_due(invoice);

        if invoice.amount_remaining.is_zero()
            && invoice.payment_status != PaymentStatus::Succeeded
            && PaymentStatusMachine::is_valid_transition(
                invoice.payment_status,
                PaymentStatus::Succeeded,
            )
        {
            debug!(
                invoice_id = %invoice.id,
                from = %invoice.payment_status,
                "adjustment settled invoice"
            );
            invoice.payment_status = PaymentStatus::Succeeded;
            invoice.paid_at = Some(now);
        }
        Ok(())
    }

    /// Largest further adjustment the invoice can take: the unpaid part of
    /// its adjusted total.
    #[must_use]
    pub fn creditable_amount(invoice: &Invoice) -> Decimal {
        (invoice.total - invoice.adjustment_amount - invoice.amount_paid).max(Decimal::ZERO)
    }

    fn ensure_open(invoice: &Invoice) -> Result<(), InvoiceError> {
        if invoice.invoice_status.accepts_payment_updates() {
            Ok(())
        } else {
            Err(InvoiceError::PaymentUpdateNotAllowed(invoice.invoice_status))
        }
    }

    /// Recomputes `amount_due` and `amount_remaining` from the current total.
    fn refresh_due(invoice: &mut Invoice) {
        invoice.amount_due = Self::clamp(
            invoice,
            "amount_due",
            invoice.total - invoice.adjustment_amount,
        );
        invoice.amount_remaining = if invoice.payment_status == PaymentStatus::Overpaid {
            Decimal::ZERO
        } else {
            Self::clamp(
                invoice,
                "amount_remaining",
                invoice.amount_due - invoice.amount_paid,
            )
        };
    }

    fn clamp(invoice: &Invoice, field: &'static str, value: Decimal) -> Decimal {
        if value.is_sign_negative() && !value.is_zero() {
            debug!(invoice_id = %invoice.id, field, value = %value, "clamped to zero");
            Decimal::ZERO
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::test_support::{fixed_now, pending_invoice};
    use rust_decimal_macros::dec;

    #[test]
    fn test_discount_then_tax() {
        let mut invoice = pending_invoice(dec!(100));
        InvoiceCalculator::apply_discount(&mut invoice, dec!(20)).unwrap();
        assert_eq!(invoice.total, dec!(80));
        assert_eq!(invoice.amount_due, dec!(80));

        InvoiceCalculator::apply_tax(&mut invoice, dec!(8)).unwrap();
        assert_eq!(invoice.total_discount, dec!(20));
        assert_eq!(invoice.total_tax, dec!(8));
        assert_eq!(invoice.total, dec!(88));
        assert_eq!(invoice.amount_due, dec!(88));
        assert_eq!(invoice.amount_remaining, dec!(88));
        assert!(InvoiceValidator::validate(&invoice).is_ok());
    }

    #[test]
    fn test_discount_clamped_to_subtotal_tax_still_added() {
        let mut invoice = pending_invoice(dec!(50));
        InvoiceCalculator::apply_discount(&mut invoice, dec!(80)).unwrap();
        assert_eq!(invoice.total_discount, dec!(50));
        assert_eq!(invoice.total, Decimal::ZERO);

        InvoiceCalculator::apply_tax(&mut invoice, dec!(3.25)).unwrap();
        assert_eq!(invoice.total, dec!(3.25));
    }

    #[test]
    fn test_reapplying_same_inputs_is_idempotent() {
        let mut invoice = pending_invoice(dec!(100));
        InvoiceCalculator::apply_discount(&mut invoice, dec!(10)).unwrap();
        InvoiceCalculator::apply_tax(&mut invoice, dec!(9)).unwrap();
        let first = invoice.clone();

        InvoiceCalculator::apply_discount(&mut invoice, dec!(10)).unwrap();
        InvoiceCalculator::apply_tax(&mut invoice, dec!(9)).unwrap();
        assert_eq!(invoice, first);
    }

    #[test]
    fn test_discount_resets_stale_tax() {
        let mut invoice = pending_invoice(dec!(100));
        InvoiceCalculator::apply_tax(&mut invoice, dec!(10)).unwrap();
        InvoiceCalculator::apply_discount(&mut invoice, dec!(50)).unwrap();
        assert_eq!(invoice.total_tax, Decimal::ZERO);
        assert_eq!(invoice.total, dec!(50));
    }

    #[test]
    fn test_remaining_accounts_for_paid() {
        let mut invoice = pending_invoice(dec!(100));
        invoice.amount_paid = dec!(30);
        invoice.amount_remaining = dec!(70);
        InvoiceCalculator::apply_discount(&mut invoice, dec!(10)).unwrap();
        assert_eq!(invoice.amount_remaining, dec!(60));
    }

    #[test]
    fn test_negative_arguments_rejected() {
        let mut invoice = pending_invoice(dec!(100));
        let before = invoice.clone();
        assert!(matches!(
            InvoiceCalculator::apply_discount(&mut invoice, dec!(-1)),
            Err(InvoiceError::NegativeAmount { field: "total_discount", .. })
        ));
        assert!(matches!(
            InvoiceCalculator::apply_tax(&mut invoice, dec!(-0.01)),
            Err(InvoiceError::NegativeAmount { field: "total_tax", .. })
        ));
        assert_eq!(invoice, before);
    }

    #[test]
    fn test_voided_invoice_rejected() {
        let mut invoice = pending_invoice(dec!(100));
        invoice.invoice_status = InvoiceStatus::Voided;
        assert!(matches!(
            InvoiceCalculator::apply_tax(&mut invoice, dec!(1)),
            Err(InvoiceError::PaymentUpdateNotAllowed(InvoiceStatus::Voided))
        ));
    }

    #[test]
    fn test_adjustment_reduces_due() {
        let mut invoice = pending_invoice(dec!(100));
        invoice.amount_paid = dec!(40);
        invoice.amount_remaining = dec!(60);

        InvoiceCalculator::recalculate_adjustments(&mut invoice, dec!(25), Decimal::ZERO, fixed_now()).unwrap();
        assert_eq!(invoice.amount_due, dec!(75));
        assert_eq!(invoice.amount_remaining, dec!(35));
        assert_eq!(invoice.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_adjustment_to_zero_marks_succeeded() {
        let mut invoice = pending_invoice(dec!(100));
        invoice.amount_paid = dec!(40);
        invoice.amount_remaining = dec!(60);

        InvoiceCalculator::recalculate_adjustments(&mut invoice, dec!(60), Decimal::ZERO, fixed_now()).unwrap();
        assert_eq!(invoice.amount_due, dec!(40));
        assert_eq!(invoice.amount_remaining, Decimal::ZERO);
        assert_eq!(invoice.payment_status, PaymentStatus::Succeeded);
        assert_eq!(invoice.paid_at, Some(fixed_now()));
        assert!(InvoiceValidator::validate(&invoice).is_ok());
    }

    #[test]
    fn test_adjustment_beyond_unpaid_part_rejected() {
        let mut invoice = pending_invoice(dec!(100));
        invoice.amount_paid = dec!(40);
        invoice.amount_remaining = dec!(60);
        let before = invoice.clone();

        let err = InvoiceCalculator::recalculate_adjustments(&mut invoice, dec!(70), Decimal::ZERO, fixed_now())
            .unwrap_err();
        assert!(matches!(
            err,
            InvoiceError::AdjustmentExceedsCreditable { requested, creditable }
                if requested == dec!(70) && creditable == dec!(60)
        ));
        assert_eq!(err.error_code(), "ADJUSTMENT_EXCEEDS_CREDITABLE");
        assert_eq!(invoice, before);
    }

    #[test]
    fn test_creditable_amount_counts_prior_adjustments() {
        let mut invoice = pending_invoice(dec!(100));
        invoice.amount_paid = dec!(40);
        invoice.amount_remaining = dec!(60);
        InvoiceCalculator::recalculate_adjustments(&mut invoice, dec!(25), Decimal::ZERO, fixed_now()).unwrap();
        assert_eq!(InvoiceCalculator::creditable_amount(&invoice), dec!(35));

        assert!(
            InvoiceCalculator::recalculate_adjustments(&mut invoice, dec!(61), Decimal::ZERO, fixed_now())
                .is_err()
        );
        InvoiceCalculator::recalculate_adjustments(&mut invoice, dec!(60), Decimal::ZERO, fixed_now()).unwrap();
        assert_eq!(invoice.amount_due, dec!(40));
        assert_eq!(invoice.payment_status, PaymentStatus::Succeeded);
    }

    #[test]
    fn test_overpaid_invoice_takes_refund_but_no_adjustment() {
        let mut invoice = pending_invoice(dec!(100));
        invoice.payment_status = PaymentStatus::Overpaid;
        invoice.amount_paid = dec!(120);
        invoice.amount_remaining = Decimal::ZERO;
        assert_eq!(InvoiceCalculator::creditable_amount(&invoice), Decimal::ZERO);

        assert!(matches!(
            InvoiceCalculator::recalculate_adjustments(&mut invoice, dec!(10), Decimal::ZERO, fixed_now()),
            Err(InvoiceError::AdjustmentExceedsCreditable { .. })
        ));

        InvoiceCalculator::recalculate_adjustments(&mut invoice, Decimal::ZERO, dec!(20), fixed_now()).unwrap();
        assert_eq!(invoice.refunded_amount, dec!(20));
        assert_eq!(invoice.payment_status, PaymentStatus::Overpaid);
        assert_eq!(invoice.amount_remaining, Decimal::ZERO);
    }

    #[test]
    fn test_adjustment_requires_finalized() {
        let mut invoice = pending_invoice(dec!(100));
        invoice.invoice_status = InvoiceStatus::Draft;
        assert!(matches!(
            InvoiceCalculator::recalculate_adjustments(&mut invoice, dec!(10), Decimal::ZERO, fixed_now()),
            Err(InvoiceError::AdjustmentNotAllowed(InvoiceStatus::Draft))
        ));
    }
}
