//! Wallet selection and ordering.
//!
//! Eligible wallets are split into a preferred and a fallback group. The
//! preferred group is drained largest-first; the fallback group
//! smallest-first. Ties break on wallet ID so the order is reproducible.

use std::cmp::Ordering;

use quill_shared::CustomerId;

use super::types::{Wallet, WalletType};

pub use quill_shared::WalletPaymentStrategy;

/// Wallet type drained first, if the strategy has one.
fn preferred_type(strategy: WalletPaymentStrategy) -> Option<WalletType> {
    match strategy {
        WalletPaymentStrategy::PromotionalFirst => Some(WalletType::Promotional),
        WalletPaymentStrategy::PrepaidFirst => Some(WalletType::PrePaid),
        WalletPaymentStrategy::BalanceOptimized => None,
    }
}

/// Stateless wallet selector.
pub struct WalletSelector;

impl WalletSelector {
    /// Keeps the customer's active wallets in `currency` (case-insensitive).
    #[must_use]
    pub fn select_eligible(wallets: &[Wallet], customer_id: CustomerId, currency: &str) -> Vec<Wallet> {
        wallets
            .iter()
            .filter(|w| w.is_eligible(customer_id, currency))
            .cloned()
            .collect()
    }

    /// Orders wallets for `strategy`.
    #[must_use]
    pub fn order(mut wallets: Vec<Wallet>, strategy: WalletPaymentStrategy) -> Vec<Wallet> {
        let Some(preferred_type) = preferred_type(strategy) else {
            wallets.sort_by(Self::ascending);
            return wallets;
        };

        let (mut preferred, mut fallback): (Vec<_>, Vec<_>) = wallets
            .into_iter()
            .partition(|w| w.wallet_type == preferred_type);
        preferred.sort_by(Self::descending);
        fallback.sort_by(Self::ascending);
        preferred.extend(fallback);
        preferred
    }

    /// Selects and orders the wallets that can pay an invoice.
    #[must_use]
    pub fn wallets_for_payment(
        wallets: &[Wallet],
        customer_id: CustomerId,
        currency: &str,
        strategy: WalletPaymentStrategy,
    ) -> Vec<Wallet> {
        Self::order(Self::select_eligible(wallets, customer_id, currency), strategy)
    }

    fn ascending(a: &Wallet, b: &Wallet) -> Ordering {
        a.balance.cmp(&b.balance).then_with(|| a.id.cmp(&b.id))
    }

    fn descending(a: &Wallet, b: &Wallet) -> Ordering {
        b.balance.cmp(&a.balance).then_with(|| a.id.cmp(&b.id))
    }
}
