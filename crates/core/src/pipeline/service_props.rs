//! Property-based tests for `InvoiceCalculator`.

use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::invoice::test_support::pending_invoice;
use crate::invoice::InvoiceValidator;
use crate::pipeline::service::InvoiceCalculator;

/// Strategy for non-negative amounts with two decimal places.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// total == max(subtotal - min(discount, subtotal) + tax, 0) after discount then tax.
    #[test]
    fn prop_total_formula_holds(
        subtotal in arb_amount(),
        discount in arb_amount(),
        tax in arb_amount(),
    ) {
        let mut invoice = pending_invoice(subtotal);
        InvoiceCalculator::apply_discount(&mut invoice, discount).unwrap();
        InvoiceCalculator::apply_tax(&mut invoice, tax).unwrap();

        let applied = discount.min(subtotal);
        prop_assert_eq!(invoice.total_discount, applied);
        prop_assert_eq!(invoice.total, (subtotal - applied + tax).max(Decimal::ZERO));
        prop_assert_eq!(invoice.amount_due, invoice.total);
    }

    /// Folding keeps the remaining-amount invariant for any amount already paid.
    #[test]
    fn prop_remaining_consistent_after_folding(
        subtotal in arb_amount(),
        discount in arb_amount(),
        tax in arb_amount(),
        paid_ratio in 0u32..=100,
    ) {
        let mut invoice = pending_invoice(subtotal);
        let paid = (subtotal * Decimal::from(paid_ratio) / Decimal::ONE_HUNDRED).round_dp(2);
        invoice.amount_paid = paid;
        invoice.amount_remaining = subtotal - paid;

        InvoiceCalculator::apply_discount(&mut invoice, discount).unwrap();
        InvoiceCalculator::apply_tax(&mut invoice, tax).unwrap();

        prop_assert_eq!(
            invoice.amount_remaining,
            (invoice.amount_due - invoice.amount_paid).max(Decimal::ZERO)
        );
        prop_assert!(!invoice.amount_remaining.is_sign_negative() || invoice.amount_remaining.is_zero());
    }

    /// Reapplying identical inputs never changes the result.
    #[test]
    fn prop_folding_idempotent(
        subtotal in arb_amount(),
        discount in arb_amount(),
        tax in arb_amount(),
    ) {
        let mut invoice = pending_invoice(subtotal);
        InvoiceCalculator::apply_discount(&mut invoice, discount).unwrap();
        InvoiceCalculator::apply_tax(&mut invoice, tax).unwrap();
        let once = invoice.clone();

        InvoiceCalculator::apply_discount(&mut invoice, discount).unwrap();
        InvoiceCalculator::apply_tax(&mut invoice, tax).unwrap();
        prop_assert_eq!(invoice, once);
    }

    /// An unpaid invoice stays valid through the whole pipeline.
    #[test]
    fn prop_unpaid_invoice_valid_after_folding(
        subtotal in arb_amount(),
        discount in arb_amount(),
        tax in arb_amount(),
    ) {
        let mut invoice = pending_invoice(subtotal);
        InvoiceCalculator::apply_discount(&mut invoice, discount).unwrap();
        InvoiceCalculator::apply_tax(&mut invoice, tax).unwrap();
        prop_assert!(InvoiceValidator::validate(&invoice).is_ok());
    }
}
