//! Common types used across the application.

pub mod currency;
pub mod id;
pub mod scope;
pub mod strategy;

pub use currency::Currency;
pub use id::*;
pub use scope::TenantScope;
pub use strategy::WalletPaymentStrategy;
