//! Invoice error types for validation and state errors.
//!
//! Covers the invoice aggregate, the computation pipeline and the
//! payment-status state machine, since all three guard the same record.

use quill_shared::{AppError, Currency, FaultKind};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{InvoiceStatus, PaymentStatus};

/// Errors that can occur while building or mutating an invoice.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ========== Validation Errors ==========
    /// A monetary field or argument is negative.
    #[error("Amount {field} cannot be negative: {amount}")]
    NegativeAmount {
        /// The offending field or argument.
        field: &'static str,
        /// The rejected value.
        amount: Decimal,
    },

    /// Discount larger than the subtotal it applies to.
    #[error("Discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal {
        /// Total discount.
        discount: Decimal,
        /// Invoice subtotal.
        subtotal: Decimal,
    },

    /// Remaining amount disagrees with due and paid amounts.
    #[error("Amount remaining {actual} does not match expected {expected}")]
    RemainingMismatch {
        /// Value derived from due/paid and payment status.
        expected: Decimal,
        /// Value on the invoice.
        actual: Decimal,
    },

    /// More was paid than is due outside of the overpaid state.
    #[error("Amount paid {paid} exceeds amount due {due}")]
    AmountPaidExceedsDue {
        /// Amount paid.
        paid: Decimal,
        /// Amount due.
        due: Decimal,
    },

    /// Marking an invoice overpaid needs an amount above what is due.
    #[error("Overpaid status requires an amount above {due}, got {amount}")]
    OverpaidAmountRequired {
        /// Amount supplied.
        amount: Decimal,
        /// Amount due.
        due: Decimal,
    },

    /// Currency code is malformed.
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    /// A line item is priced in a different currency than the invoice.
    #[error("Line item currency {found} does not match invoice currency {expected}")]
    CurrencyMismatch {
        /// Invoice currency.
        expected: Currency,
        /// Line item currency.
        found: Currency,
    },

    /// A line item quantity is negative.
    #[error("Line item quantity cannot be negative: {0}")]
    NegativeQuantity(Decimal),

    /// Subscription invoices need a billing period.
    #[error("Subscription invoices require a billing period")]
    MissingPeriod,

    /// Period end is not after period start.
    #[error("Billing period end must be after its start")]
    InvalidPeriod,

    // ========== State Errors ==========
    /// Invoice lifecycle transition not allowed.
    #[error("Invalid invoice status transition from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: InvoiceStatus,
        /// Requested status.
        to: InvoiceStatus,
    },

    /// Payment or amount updates on an invoice that no longer accepts them.
    #[error("Invoice status {0} does not accept payment updates")]
    PaymentUpdateNotAllowed(InvoiceStatus),

    /// Payment status transition not in the transition table.
    #[error("Invalid payment status transition from {from} to {to}")]
    InvalidPaymentTransition {
        /// Current payment status.
        from: PaymentStatus,
        /// Requested payment status.
        to: PaymentStatus,
    },

    /// Voiding an invoice that has been paid.
    #[error("Cannot void invoice with payment status {0}")]
    VoidNotAllowed(PaymentStatus),

    /// Credit-note adjustments apply only to finalized invoices.
    #[error("Invoice status {0} does not accept credit-note adjustments")]
    AdjustmentNotAllowed(InvoiceStatus),

    /// Credit-note adjustment larger than the unpaid part of the invoice.
    #[error("Adjustment of {requested} exceeds the creditable amount {creditable}")]
    AdjustmentExceedsCreditable {
        /// Additional adjustment requested.
        requested: Decimal,
        /// `max(total - adjustment_amount - amount_paid, 0)` before the request.
        creditable: Decimal,
    },

    /// Manual correction attempted after payment-based settlement.
    #[error("Manual payment status updates are disabled once payments exist")]
    ManualUpdateBlocked,
}

impl InvoiceError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::DiscountExceedsSubtotal { .. } => "DISCOUNT_EXCEEDS_SUBTOTAL",
            Self::RemainingMismatch { .. } => "REMAINING_MISMATCH",
            Self::AmountPaidExceedsDue { .. } => "AMOUNT_PAID_EXCEEDS_DUE",
            Self::OverpaidAmountRequired { .. } => "OVERPAID_AMOUNT_REQUIRED",
            Self::InvalidCurrency(_) => "INVALID_CURRENCY",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::NegativeQuantity(_) => "NEGATIVE_QUANTITY",
            Self::MissingPeriod => "MISSING_PERIOD",
            Self::InvalidPeriod => "INVALID_PERIOD",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::PaymentUpdateNotAllowed(_) => "PAYMENT_UPDATE_NOT_ALLOWED",
            Self::InvalidPaymentTransition { .. } => "INVALID_PAYMENT_TRANSITION",
            Self::VoidNotAllowed(_) => "VOID_NOT_ALLOWED",
            Self::AdjustmentNotAllowed(_) => "ADJUSTMENT_NOT_ALLOWED",
            Self::AdjustmentExceedsCreditable { .. } => "ADJUSTMENT_EXCEEDS_CREDITABLE",
            Self::ManualUpdateBlocked => "MANUAL_UPDATE_BLOCKED",
        }
    }

    /// Returns the fault classification.
    #[must_use]
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            Self::NegativeAmount { .. }
            | Self::DiscountExceedsSubtotal { .. }
            | Self::RemainingMismatch { .. }
            | Self::AmountPaidExceedsDue { .. }
            | Self::OverpaidAmountRequired { .. }
            | Self::InvalidCurrency(_)
            | Self::CurrencyMismatch { .. }
            | Self::NegativeQuantity(_)
            | Self::MissingPeriod
            | Self::InvalidPeriod
            | Self::AdjustmentExceedsCreditable { .. } => FaultKind::Validation,

            Self::InvalidStatusTransition { .. }
            | Self::PaymentUpdateNotAllowed(_)
            | Self::InvalidPaymentTransition { .. }
            | Self::VoidNotAllowed(_)
            | Self::AdjustmentNotAllowed(_)
            | Self::ManualUpdateBlocked => FaultKind::State,
        }
    }
}

impl From<InvoiceError> for AppError {
    fn from(err: InvoiceError) -> Self {
        Self::from_kind(err.fault_kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            InvoiceError::NegativeAmount {
                field: "amount",
                amount: Decimal::NEGATIVE_ONE,
            }
            .error_code(),
            "NEGATIVE_AMOUNT"
        );
        assert_eq!(
            InvoiceError::ManualUpdateBlocked.error_code(),
            "MANUAL_UPDATE_BLOCKED"
        );
    }

    #[test]
    fn test_fault_kinds() {
        assert_eq!(InvoiceError::MissingPeriod.fault_kind(), FaultKind::Validation);
        assert_eq!(
            InvoiceError::InvalidPaymentTransition {
                from: PaymentStatus::Overpaid,
                to: PaymentStatus::Pending,
            }
            .fault_kind(),
            FaultKind::State
        );
    }

    #[test]
    fn test_error_display_names_the_illegal_pair() {
        let err = InvoiceError::InvalidPaymentTransition {
            from: PaymentStatus::Succeeded,
            to: PaymentStatus::Failed,
        };
        assert_eq!(
            err.to_string(),
            "Invalid payment status transition from succeeded to failed"
        );
    }

    #[test]
    fn test_into_app_error() {
        let app: AppError = InvoiceError::VoidNotAllowed(PaymentStatus::Succeeded).into();
        assert_eq!(app.kind(), FaultKind::State);
        assert_eq!(app.status_code(), 422);
    }
}
