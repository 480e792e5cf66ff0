//! Engine error types.

use quill_core::invoice::InvoiceError;
use quill_core::wallet::AllocationError;
use quill_shared::{AppError, FaultKind, InvoiceId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::collaborators::CollaboratorError;
use crate::store::StoreError;

/// Errors raised by engine services.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invoice rule violated.
    #[error(transparent)]
    Invoice(#[from] InvoiceError),

    /// Wallet allocation failed.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invoice does not exist in the scope.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// A create request collided with an existing invoice.
    #[error("Duplicate invoice: {0}")]
    Duplicate(String),

    /// The discount resolver rejected the request.
    #[error("Discount resolution failed: {0}")]
    Discount(CollaboratorError),

    /// The tax resolver failed.
    #[error("Tax resolution failed: {0}")]
    Tax(CollaboratorError),

    /// A recorded payment must carry a positive amount.
    #[error("Payment amount must be positive, got {0}")]
    InvalidPaymentAmount(Decimal),
}

impl EngineError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Invoice(e) => e.error_code(),
            Self::Allocation(e) => e.error_code(),
            Self::Store(StoreError::VersionConflict { .. }) => "VERSION_CONFLICT",
            Self::Store(StoreError::UniqueViolation(_)) | Self::Duplicate(_) => "DUPLICATE_INVOICE",
            Self::Store(StoreError::NotFound { .. }) => "NOT_FOUND",
            Self::Store(StoreError::Backend(_)) => "STORAGE_ERROR",
            Self::InvoiceNotFound(_) => "INVOICE_NOT_FOUND",
            Self::Discount(_) => "DISCOUNT_FAILED",
            Self::Tax(_) => "TAX_FAILED",
            Self::InvalidPaymentAmount(_) => "INVALID_PAYMENT_AMOUNT",
        }
    }

    /// Returns the fault classification.
    #[must_use]
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            Self::Invoice(e) => e.fault_kind(),
            Self::Allocation(e) => e.fault_kind(),
            Self::Store(e) => e.fault_kind(),
            Self::InvoiceNotFound(_) => FaultKind::NotFound,
            Self::Duplicate(_) => FaultKind::Duplicate,
            Self::Discount(_) | Self::InvalidPaymentAmount(_) => FaultKind::Validation,
            Self::Tax(_) => FaultKind::System,
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        Self::from_kind(err.fault_kind(), err.to_string())
    }
}
