//! Payment records.
//!
//! One `Payment` per settlement: a wallet allocation run produces one per
//! wallet actually debited, never one per invoice.

use chrono::{DateTime, Utc};
use quill_shared::{Currency, EnvironmentId, InvoiceId, PaymentId, TenantId, WalletId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::invoice::{Invoice, Metadata};
use crate::wallet::Wallet;

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodType {
    /// Debited from a customer wallet.
    Credits,
    /// Card charge.
    Card,
    /// Bank transfer.
    Ach,
    /// Recorded manually (cheque, wire, cash).
    Offline,
}

impl PaymentMethodType {
    /// Returns the string representation of the method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credits => "credits",
            Self::Card => "card",
            Self::Ach => "ach",
            Self::Offline => "offline",
        }
    }
}

/// Where the money came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentSource {
    /// A customer wallet.
    Wallet {
        /// Debited wallet.
        wallet_id: WalletId,
    },
    /// A gateway or offline method.
    External {
        /// Payment method.
        method: PaymentMethodType,
        /// Gateway reference, if any.
        gateway_reference: Option<String>,
    },
}

impl PaymentSource {
    /// Returns the payment method implied by the source.
    #[must_use]
    pub fn method(&self) -> PaymentMethodType {
        match self {
            Self::Wallet { .. } => PaymentMethodType::Credits,
            Self::External { method, .. } => *method,
        }
    }
}

/// What a payment settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentDestinationType {
    /// An invoice.
    Invoice,
}

/// Status of a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    /// Awaiting confirmation.
    Pending,
    /// Funds collected.
    Succeeded,
    /// Collection failed.
    Failed,
}

/// One settlement against an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID.
    pub id: PaymentId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning environment.
    pub environment_id: EnvironmentId,
    /// Destination kind.
    pub destination_type: PaymentDestinationType,
    /// Settled invoice.
    pub destination_id: InvoiceId,
    /// Source of funds.
    pub source: PaymentSource,
    /// Payment amount.
    pub amount: Decimal,
    /// Payment currency (the invoice currency).
    pub currency: Currency,
    /// Record status.
    pub payment_status: PaymentRecordStatus,
    /// When the payment succeeded.
    pub succeeded_at: Option<DateTime<Utc>>,
    /// Annotations.
    pub metadata: Metadata,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Builds the succeeded payment for one wallet debit.
    ///
    /// Metadata carries `wallet_type` and `wallet_id` on top of `extra`.
    #[must_use]
    pub fn from_wallet(
        invoice: &Invoice,
        wallet: &Wallet,
        amount: Decimal,
        extra: &Metadata,
        now: DateTime<Utc>,
    ) -> Self {
        let mut metadata = extra.clone();
        metadata.insert("wallet_type".to_string(), wallet.wallet_type.as_str().to_string());
        metadata.insert("wallet_id".to_string(), wallet.id.to_string());

        Self {
            id: PaymentId::new(),
            tenant_id: invoice.tenant_id,
            environment_id: invoice.environment_id,
            destination_type: PaymentDestinationType::Invoice,
            destination_id: invoice.id,
            source: PaymentSource::Wallet {
                wallet_id: wallet.id,
            },
            amount,
            currency: invoice.currency.clone(),
            payment_status: PaymentRecordStatus::Succeeded,
            succeeded_at: Some(now),
            metadata,
            created_at: now,
        }
    }

    /// Builds a succeeded payment recorded from a gateway or offline method.
    #[must_use]
    pub fn external(
        invoice: &Invoice,
        method: PaymentMethodType,
        gateway_reference: Option<String>,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            tenant_id: invoice.tenant_id,
            environment_id: invoice.environment_id,
            destination_type: PaymentDestinationType::Invoice,
            destination_id: invoice.id,
            source: PaymentSource::External {
                method,
                gateway_reference,
            },
            amount,
            currency: invoice.currency.clone(),
            payment_status: PaymentRecordStatus::Succeeded,
            succeeded_at: Some(now),
            metadata: Metadata::new(),
            created_at: now,
        }
    }

    /// Returns true if the payment counts toward settlement.
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.payment_status == PaymentRecordStatus::Succeeded
    }
}
