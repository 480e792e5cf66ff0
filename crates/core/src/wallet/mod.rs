//! Wallets: ledger primitives, selection strategies and allocation.
//!
//! # Modules
//!
//! - `types` - Wallet and ledger entry types
//! - `error` - Wallet and allocation error types
//! - `ledger` - Balance mutations paired with ledger entries
//! - `strategy` - Eligible wallet selection and ordering
//! - `allocation` - Sequential debits against an invoice

pub mod allocation;
pub mod error;
pub mod ledger;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod allocation_props;

pub use allocation::{AllocationOptions, AllocationOutcome, WalletAllocator, WalletDebit};
pub use error::{AllocationError, WalletError};
pub use ledger::{WalletLedger, WalletOperation};
pub use strategy::{WalletPaymentStrategy, WalletSelector};
pub use types::{
    TransactionReason, TransactionStatus, TransactionType, Wallet, WalletStatus,
    WalletTransaction, WalletType,
};

#[cfg(test)]
pub(crate) mod test_support {
    use quill_shared::{Currency, CustomerId, EnvironmentId, TenantId};
    use rust_decimal::Decimal;

    use super::{Wallet, WalletType};
    use crate::invoice::test_support::fixed_now;

    /// Active usd wallet holding `balance` at a 1:1 conversion rate.
    pub(crate) fn wallet(customer_id: CustomerId, wallet_type: WalletType, balance: Decimal) -> Wallet {
        let mut wallet = Wallet::open(
            TenantId::new(),
            EnvironmentId::new(),
            customer_id,
            Currency::new("usd"),
            wallet_type,
            Decimal::ONE,
            fixed_now(),
        );
        wallet.balance = balance;
        wallet.credit_balance = balance;
        wallet
    }
}
