//! ISO 4217 currency codes.
//!
//! CRITICAL: amounts are never stored next to a float. This type only carries
//! the code; amounts are `rust_decimal::Decimal` wherever they appear.

use serde::{Deserialize, Serialize};

/// A currency code, normalized to lowercase.
///
/// Codes compare case-insensitively: `Currency::new("USD") == Currency::new("usd")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Creates a currency code, trimming whitespace and lowercasing it.
    #[must_use]
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_lowercase())
    }

    /// Returns the normalized code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `other` names the same currency, ignoring case.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }

    /// Returns true if the code is a three-letter alphabetic code.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0.len() == 3 && self.0.chars().all(|c| c.is_ascii_alphabetic())
    }
}

impl From<String> for Currency {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for Currency {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_normalized() {
        assert_eq!(Currency::new("USD"), Currency::new("usd"));
        assert_eq!(Currency::new(" eur ").as_str(), "eur");
    }

    #[test]
    fn test_currency_matches_ignores_case() {
        let usd = Currency::new("usd");
        assert!(usd.matches("USD"));
        assert!(usd.matches("Usd"));
        assert!(!usd.matches("eur"));
    }

    #[test]
    fn test_currency_validity() {
        assert!(Currency::new("usd").is_valid());
        assert!(!Currency::new("us").is_valid());
        assert!(!Currency::new("us1").is_valid());
        assert!(!Currency::new("").is_valid());
    }

    #[test]
    fn test_currency_display_and_serde() {
        let usd = Currency::new("usd");
        assert_eq!(format!("{usd}"), "USD");
        let json = serde_json::to_string(&usd).unwrap();
        assert_eq!(json, "\"usd\"");
        let parsed: Currency = serde_json::from_str("\"USD\"").unwrap();
        assert_eq!(parsed, usd);
    }
}
