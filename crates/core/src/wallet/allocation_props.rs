//! Property-based tests for `WalletAllocator`.

use proptest::prelude::*;
use quill_shared::CustomerId;
use rust_decimal::Decimal;

use crate::invoice::test_support::{fixed_now, pending_invoice};
use crate::invoice::{InvoiceValidator, PaymentStatus};
use crate::wallet::allocation::{AllocationOptions, WalletAllocator};
use crate::wallet::ledger::WalletLedger;
use crate::wallet::strategy::{WalletPaymentStrategy, WalletSelector};
use crate::wallet::test_support::wallet;
use crate::wallet::types::{Wallet, WalletType};

/// Strategy for amounts in cents, including zero.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (0i64..50_000).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for wallet payment strategies.
fn arb_strategy() -> impl Strategy<Value = WalletPaymentStrategy> {
    prop_oneof![
        Just(WalletPaymentStrategy::PromotionalFirst),
        Just(WalletPaymentStrategy::PrepaidFirst),
        Just(WalletPaymentStrategy::BalanceOptimized),
    ]
}

/// Strategy for a customer's wallet set as (is_promotional, balance) pairs.
fn arb_wallets() -> impl Strategy<Value = Vec<(bool, Decimal)>> {
    prop::collection::vec((any::<bool>(), arb_amount()), 0..6)
}

fn build(customer: CustomerId, specs: &[(bool, Decimal)]) -> Vec<Wallet> {
    specs
        .iter()
        .map(|(promotional, balance)| {
            let wallet_type = if *promotional {
                WalletType::Promotional
            } else {
                WalletType::PrePaid
            };
            wallet(customer, wallet_type, *balance)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Allocation never pays more than is due and keeps the invoice valid.
    #[test]
    fn prop_allocation_never_overpays(
        due in arb_amount(),
        specs in arb_wallets(),
        strategy in arb_strategy(),
        cap in 0usize..4,
    ) {
        let customer = CustomerId::new();
        let mut invoice = pending_invoice(due);
        invoice.customer_id = customer;
        let mut wallets = WalletSelector::wallets_for_payment(
            &build(customer, &specs), customer, "usd", strategy,
        );
        let total_before: Decimal = wallets.iter().map(|w| w.balance).sum();
        let options = AllocationOptions { max_wallets_to_use: cap, ..AllocationOptions::default() };

        let outcome = WalletAllocator::allocate(Some(&mut invoice), &mut wallets, &options, fixed_now()).unwrap();

        prop_assert!(invoice.amount_paid <= invoice.amount_due);
        prop_assert_ne!(invoice.payment_status, PaymentStatus::Overpaid);
        prop_assert!(InvoiceValidator::validate(&invoice).is_ok());
        prop_assert_eq!(outcome.amount_paid, invoice.amount_paid);

        let total_after: Decimal = wallets.iter().map(|w| w.balance).sum();
        prop_assert_eq!(total_before - total_after, outcome.amount_paid);
        prop_assert!(wallets.iter().all(|w| !w.balance.is_sign_negative() || w.balance.is_zero()));
        if cap > 0 {
            prop_assert!(outcome.debits.len() <= cap);
        }
        prop_assert!(outcome.debits.iter().all(|d| d.amount > Decimal::ZERO));
    }

    /// Each debit's ledger entry agrees with the balance it left behind.
    #[test]
    fn prop_every_debit_is_ledgered(
        due in arb_amount(),
        specs in arb_wallets(),
    ) {
        let customer = CustomerId::new();
        let mut invoice = pending_invoice(due);
        invoice.customer_id = customer;
        let mut wallets = build(customer, &specs);

        let outcome = WalletAllocator::allocate(
            Some(&mut invoice), &mut wallets, &AllocationOptions::default(), fixed_now(),
        ).unwrap();

        for debit in &outcome.debits {
            let wallet = wallets.iter().find(|w| w.id == debit.wallet_id).unwrap();
            prop_assert_eq!(debit.transaction.balance_after, wallet.balance);
            prop_assert_eq!(debit.payment.amount, debit.amount);
            prop_assert_eq!(WalletLedger::balance_from(std::slice::from_ref(&debit.transaction)), -debit.amount);
        }
    }

    /// A second run against the same invoice after full settlement is a no-op.
    #[test]
    fn prop_rerun_after_settlement_is_noop(
        due in arb_amount(),
        specs in arb_wallets(),
    ) {
        let customer = CustomerId::new();
        let mut invoice = pending_invoice(due);
        invoice.customer_id = customer;
        let mut wallets = build(customer, &specs);
        let options = AllocationOptions::default();

        WalletAllocator::allocate(Some(&mut invoice), &mut wallets, &options, fixed_now()).unwrap();
        if invoice.amount_remaining.is_zero() {
            let snapshot = wallets.clone();
            let again = WalletAllocator::allocate(Some(&mut invoice), &mut wallets, &options, fixed_now()).unwrap();
            prop_assert_eq!(again.amount_paid, Decimal::ZERO);
            prop_assert!(again.debits.is_empty());
            prop_assert_eq!(wallets, snapshot);
        }
    }

    /// The same snapshot and strategy always yield the same order.
    #[test]
    fn prop_ordering_is_deterministic(
        specs in arb_wallets(),
        strategy in arb_strategy(),
    ) {
        let customer = CustomerId::new();
        let wallets = build(customer, &specs);
        let mut reversed = wallets.clone();
        reversed.reverse();

        let a: Vec<_> = WalletSelector::wallets_for_payment(&wallets, customer, "usd", strategy)
            .into_iter().map(|w| w.id).collect();
        let b: Vec<_> = WalletSelector::wallets_for_payment(&reversed, customer, "usd", strategy)
            .into_iter().map(|w| w.id).collect();
        prop_assert_eq!(a, b);
    }
}
