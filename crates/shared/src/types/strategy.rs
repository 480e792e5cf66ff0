//! Wallet payment strategy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Order in which a customer's wallets are drawn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletPaymentStrategy {
    /// Promotional wallets first, then the rest.
    #[default]
    PromotionalFirst,
    /// Prepaid wallets first, then the rest.
    PrepaidFirst,
    /// All wallets together, smallest balance first.
    BalanceOptimized,
}

impl WalletPaymentStrategy {
    /// Returns the string representation of the strategy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PromotionalFirst => "promotional_first",
            Self::PrepaidFirst => "prepaid_first",
            Self::BalanceOptimized => "balance_optimized",
        }
    }

    /// Parses a strategy from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "promotional_first" => Some(Self::PromotionalFirst),
            "prepaid_first" => Some(Self::PrepaidFirst),
            "balance_optimized" => Some(Self::BalanceOptimized),
            _ => None,
        }
    }
}

impl fmt::Display for WalletPaymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
