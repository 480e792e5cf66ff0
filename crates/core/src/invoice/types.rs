//! Invoice classification types.
//!
//! Status enums for the invoice lifecycle and its payment state, plus the
//! small tagged values that classify invoices and line items.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of bill an invoice represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    /// Ad-hoc invoice not tied to a subscription.
    OneOff,
    /// Periodic invoice generated for a subscription.
    Subscription,
    /// Invoice issued to grant or purchase credits.
    Credit,
}

impl InvoiceType {
    /// Returns the string representation of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneOff => "one_off",
            Self::Subscription => "subscription",
            Self::Credit => "credit",
        }
    }
}

/// Invoice lifecycle status.
///
/// The valid transitions are:
/// - Draft → Finalized (finalize)
/// - Draft → Voided (void)
/// - Finalized → Voided (void)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Invoice is still being assembled.
    Draft,
    /// Invoice has been issued to the customer.
    Finalized,
    /// Invoice has been cancelled (terminal).
    Voided,
}

impl InvoiceStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Finalized => "finalized",
            Self::Voided => "voided",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "finalized" => Some(Self::Finalized),
            "voided" => Some(Self::Voided),
            _ => None,
        }
    }

    /// Returns true if payment and amount updates are accepted in this status.
    #[must_use]
    pub fn accepts_payment_updates(&self) -> bool {
        matches!(self, Self::Draft | Self::Finalized)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Not yet fully paid.
    Pending,
    /// Fully paid.
    Succeeded,
    /// Cumulative payments exceed the amount due; never regresses.
    Overpaid,
    /// Collection failed.
    Failed,
}

impl PaymentStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Overpaid => "overpaid",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "succeeded" => Some(Self::Succeeded),
            "overpaid" => Some(Self::Overpaid),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true if the invoice counts as settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Overpaid)
    }

    /// Returns true if the invoice may still be voided in this payment state.
    #[must_use]
    pub fn allows_void(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an invoice was issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingReason {
    /// First invoice of a newly created subscription.
    SubscriptionCreate,
    /// Regular renewal invoice.
    SubscriptionCycle,
    /// Invoice raised by a mid-period subscription change.
    SubscriptionUpdate,
    /// Invoice created by an operator or API caller.
    #[default]
    Manual,
}

impl BillingReason {
    /// Returns true for the invoice that activates an incomplete subscription once paid.
    #[must_use]
    pub fn is_subscription_start(&self) -> bool {
        matches!(self, Self::SubscriptionCreate)
    }
}

/// How a line item is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    /// Metered usage charge.
    Usage,
    /// Flat recurring or one-time charge.
    Fixed,
}

/// The billable entity a line item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineItemEntityType {
    /// A plan.
    Plan,
    /// An add-on.
    Addon,
    /// A cost sheet.
    Costsheet,
}
