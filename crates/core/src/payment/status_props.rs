//! Property-based tests for `PaymentStatusMachine`.

use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::invoice::test_support::{fixed_now, pending_invoice};
use crate::invoice::{InvoiceValidator, PaymentStatus};
use crate::payment::status::PaymentStatusMachine;

/// Strategy for generating random `PaymentStatus` values.
fn arb_status() -> impl Strategy<Value = PaymentStatus> {
    prop_oneof![
        Just(PaymentStatus::Pending),
        Just(PaymentStatus::Succeeded),
        Just(PaymentStatus::Overpaid),
        Just(PaymentStatus::Failed),
    ]
}

/// Strategy for optional non-negative amounts.
fn arb_amount() -> impl Strategy<Value = Option<Decimal>> {
    prop_oneof![
        Just(None),
        (0i64..50_000).prop_map(|cents| Some(Decimal::new(cents, 2))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Any sequence of reconciling updates only ever walks the transition table,
    /// and the invoice stays valid after each accepted update.
    #[test]
    fn prop_reconcile_walks_transition_table(
        steps in prop::collection::vec((arb_status(), arb_amount()), 1..12),
    ) {
        let mut invoice = pending_invoice(Decimal::new(10_000, 2));
        for (status, amount) in steps {
            let before = invoice.payment_status;
            let before_invoice = invoice.clone();
            match PaymentStatusMachine::apply_reconciling(&mut invoice, status, amount, fixed_now()) {
                Ok(outcome) => {
                    prop_assert!(PaymentStatusMachine::is_valid_transition(before, outcome.payment_status));
                    prop_assert_eq!(invoice.payment_status, outcome.payment_status);
                    prop_assert!(InvoiceValidator::validate(&invoice).is_ok());
                }
                Err(_) => prop_assert_eq!(&invoice, &before_invoice),
            }
        }
    }

    /// Once overpaid, no update moves the invoice out of overpaid.
    #[test]
    fn prop_overpaid_is_absorbing(
        status in arb_status(),
        amount in arb_amount(),
    ) {
        let mut invoice = pending_invoice(Decimal::ONE_HUNDRED);
        invoice.payment_status = PaymentStatus::Overpaid;
        invoice.amount_paid = Decimal::new(150, 0);
        invoice.amount_remaining = Decimal::ZERO;

        let _ = PaymentStatusMachine::apply_reconciling(&mut invoice, status, amount, fixed_now());
        prop_assert_eq!(invoice.payment_status, PaymentStatus::Overpaid);
        prop_assert_eq!(invoice.amount_remaining, Decimal::ZERO);
    }

    /// Rejected absolute updates never leave a partial write.
    #[test]
    fn prop_absolute_all_or_nothing(
        start in arb_status(),
        status in arb_status(),
        amount in arb_amount(),
        blocked in any::<bool>(),
    ) {
        let mut invoice = pending_invoice(Decimal::ONE_HUNDRED);
        invoice.payment_status = start;
        if start.is_settled() {
            invoice.amount_paid = Decimal::ONE_HUNDRED;
            invoice.amount_remaining = Decimal::ZERO;
        }
        let before = invoice.clone();

        match PaymentStatusMachine::apply_absolute(&mut invoice, status, amount, blocked, fixed_now()) {
            Ok(()) => {
                prop_assert!(!blocked);
                prop_assert_eq!(invoice.payment_status, status);
                prop_assert!(InvoiceValidator::validate(&invoice).is_ok());
            }
            Err(_) => prop_assert_eq!(invoice, before),
        }
    }
}
