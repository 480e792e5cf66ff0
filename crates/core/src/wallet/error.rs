//! Wallet and allocation error types.

use quill_shared::{AppError, FaultKind, WalletId};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::WalletStatus;
use crate::invoice::InvoiceError;

/// Errors raised by the wallet ledger.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Ledger operations need an active wallet.
    #[error("Wallet {wallet_id} is {status}")]
    NotActive {
        /// Wallet ID.
        wallet_id: WalletId,
        /// Current status.
        status: WalletStatus,
    },

    /// Ledger amounts must be positive.
    #[error("Wallet transaction amount must be positive: {0}")]
    InvalidAmount(Decimal),

    /// Conversion rate must be positive.
    #[error("Wallet conversion rate must be positive: {0}")]
    InvalidConversionRate(Decimal),

    /// Debit larger than the balance.
    #[error("Insufficient balance in wallet {wallet_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Wallet ID.
        wallet_id: WalletId,
        /// Current balance.
        available: Decimal,
        /// Requested debit.
        requested: Decimal,
    },
}

impl WalletError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotActive { .. } => "WALLET_NOT_ACTIVE",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidConversionRate(_) => "INVALID_CONVERSION_RATE",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
        }
    }

    /// Returns the fault classification.
    #[must_use]
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            Self::NotActive { .. } => FaultKind::State,
            Self::InvalidAmount(_)
            | Self::InvalidConversionRate(_)
            | Self::InsufficientBalance { .. } => FaultKind::Validation,
        }
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        Self::from_kind(err.fault_kind(), err.to_string())
    }
}

/// Errors raised by a wallet allocation run.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// No invoice was given to allocate against.
    #[error("Invoice is required for wallet payment")]
    MissingInvoice,

    /// The invoice rejected a payment update.
    #[error(transparent)]
    Invoice(#[from] InvoiceError),

    /// A wallet rejected a debit.
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

impl AllocationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingInvoice => "MISSING_INVOICE",
            Self::Invoice(err) => err.error_code(),
            Self::Wallet(err) => err.error_code(),
        }
    }

    /// Returns the fault classification.
    #[must_use]
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            Self::MissingInvoice => FaultKind::Validation,
            Self::Invoice(err) => err.fault_kind(),
            Self::Wallet(err) => err.fault_kind(),
        }
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        Self::from_kind(err.fault_kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::InvoiceStatus;

    #[test]
    fn test_missing_invoice_is_validation() {
        let err = AllocationError::MissingInvoice;
        assert_eq!(err.fault_kind(), FaultKind::Validation);
        assert_eq!(err.error_code(), "MISSING_INVOICE");
        assert!(err.to_string().contains("Invoice is required"));
    }

    #[test]
    fn test_wrapped_errors_keep_classification() {
        let err: AllocationError = InvoiceError::PaymentUpdateNotAllowed(InvoiceStatus::Voided).into();
        assert_eq!(err.fault_kind(), FaultKind::State);
        assert_eq!(err.error_code(), "PAYMENT_UPDATE_NOT_ALLOWED");

        let err: AllocationError = WalletError::InvalidAmount(Decimal::ZERO).into();
        assert_eq!(err.fault_kind(), FaultKind::Validation);
    }

    #[test]
    fn test_not_active_display() {
        let id = WalletId::new();
        let err = WalletError::NotActive {
            wallet_id: id,
            status: WalletStatus::Closed,
        };
        assert_eq!(err.to_string(), format!("Wallet {id} is closed"));
        assert_eq!(AppError::from(err).kind(), FaultKind::State);
    }
}
