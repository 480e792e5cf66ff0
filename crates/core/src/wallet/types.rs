//! Wallet domain types.

use chrono::{DateTime, Utc};
use quill_shared::{
    Currency, CustomerId, EnvironmentId, TenantId, WalletId, WalletTransactionId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wallet status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    /// Usable for payments and top-ups.
    Active,
    /// Temporarily blocked.
    Frozen,
    /// Permanently closed.
    Closed,
}

impl WalletStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Frozen => "frozen",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Funding source a wallet represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    /// Granted credits (trials, promotions).
    Promotional,
    /// Credits the customer paid for.
    #[serde(rename = "prepaid")]
    PrePaid,
}

impl WalletType {
    /// Returns the string representation of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Promotional => "promotional",
            Self::PrePaid => "prepaid",
        }
    }
}

/// A customer's prepaid balance.
///
/// `balance` is in currency units, `credit_balance` in internal credits;
/// `balance = credit_balance * conversion_rate`. Both only move through
/// [`WalletLedger`](super::ledger::WalletLedger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet ID.
    pub id: WalletId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning environment.
    pub environment_id: EnvironmentId,
    /// Wallet owner.
    pub customer_id: CustomerId,
    /// Display name.
    pub name: Option<String>,
    /// Wallet currency.
    pub currency: Currency,
    /// Spendable amount in currency units.
    pub balance: Decimal,
    /// Spendable amount in credits.
    pub credit_balance: Decimal,
    /// Currency units per credit.
    pub conversion_rate: Decimal,
    /// Wallet status.
    pub wallet_status: WalletStatus,
    /// Wallet type.
    pub wallet_type: WalletType,
    /// Optimistic concurrency version.
    pub version: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Opens an empty active wallet.
    #[must_use]
    pub fn open(
        tenant_id: TenantId,
        environment_id: EnvironmentId,
        customer_id: CustomerId,
        currency: Currency,
        wallet_type: WalletType,
        conversion_rate: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: WalletId::new(),
            tenant_id,
            environment_id,
            customer_id,
            name: None,
            currency,
            balance: Decimal::ZERO,
            credit_balance: Decimal::ZERO,
            conversion_rate,
            wallet_status: WalletStatus::Active,
            wallet_type,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the wallet can be debited or credited.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.wallet_status == WalletStatus::Active
    }

    /// Returns true if the wallet can pay `customer_id`'s invoices in `currency`.
    #[must_use]
    pub fn is_eligible(&self, customer_id: CustomerId, currency: &str) -> bool {
        self.customer_id == customer_id && self.is_active() && self.currency.matches(currency)
    }
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Adds to the balance.
    Credit,
    /// Subtracts from the balance.
    Debit,
}

/// Why a ledger entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionReason {
    /// Debit settling an invoice.
    InvoicePayment,
    /// Free credits granted to the customer.
    CreditGrant,
    /// Credits purchased by the customer.
    CreditPurchase,
    /// Operator correction.
    ManualAdjustment,
}

/// Status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Applied to the balance.
    Completed,
    /// Not applied.
    Failed,
}

/// Append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Entry ID.
    pub id: WalletTransactionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning environment.
    pub environment_id: EnvironmentId,
    /// Wallet the entry belongs to.
    pub wallet_id: WalletId,
    /// Credit or debit.
    pub transaction_type: TransactionType,
    /// Amount in currency units.
    pub amount: Decimal,
    /// Amount in credits.
    pub credit_amount: Decimal,
    /// Credit balance after the entry.
    pub credits_available: Decimal,
    /// Balance after the entry, in currency units.
    pub balance_after: Decimal,
    /// What the entry settles or funds (e.g. a payment ID).
    pub reference_id: Option<String>,
    /// Why the entry was written.
    pub reason: TransactionReason,
    /// Entry status.
    pub status: TransactionStatus,
    /// Free-form description.
    pub description: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Signed effect of the entry on the balance.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match (self.status, self.transaction_type) {
            (TransactionStatus::Failed, _) => Decimal::ZERO,
            (TransactionStatus::Completed, TransactionType::Credit) => self.amount,
            (TransactionStatus::Completed, TransactionType::Debit) => -self.amount,
        }
    }
}
