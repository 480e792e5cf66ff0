//! Invoice lifecycle transitions.
//!
//! Draft → Finalized → Voided, with voiding also allowed straight from draft
//! as long as nothing has been paid.

use chrono::{DateTime, Utc};

use super::error::InvoiceError;
use super::model::{Invoice, Metadata};
use super::types::InvoiceStatus;

/// Stateless service for invoice lifecycle transitions.
pub struct InvoiceLifecycle;

impl InvoiceLifecycle {
    /// Checks if a lifecycle transition is valid.
    #[must_use]
    pub fn is_valid_transition(from: InvoiceStatus, to: InvoiceStatus) -> bool {
        matches!(
            (from, to),
            (InvoiceStatus::Draft, InvoiceStatus::Finalized | InvoiceStatus::Voided)
                | (InvoiceStatus::Finalized, InvoiceStatus::Voided)
        )
    }

    /// Finalize a draft invoice.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatusTransition` unless the invoice is a draft.
    pub fn finalize(invoice: &mut Invoice, now: DateTime<Utc>) -> Result<(), InvoiceError> {
        Self::check(invoice.invoice_status, InvoiceStatus::Finalized)?;

        invoice.invoice_status = InvoiceStatus::Finalized;
        invoice.finalized_at = Some(now);
        invoice.updated_at = now;
        Ok(())
    }

    /// Void an unpaid draft or finalized invoice, merging `metadata` into its annotations.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatusTransition` if the invoice is already voided, or
    /// `VoidNotAllowed` if its payment status is succeeded or overpaid.
    pub fn void(
        invoice: &mut Invoice,
        metadata: Metadata,
        now: DateTime<Utc>,
    ) -> Result<(), InvoiceError> {
        Self::check(invoice.invoice_status, InvoiceStatus::Voided)?;
        if !invoice.payment_status.allows_void() {
            return Err(InvoiceError::VoidNotAllowed(invoice.payment_status));
        }

        invoice.invoice_status = InvoiceStatus::Voided;
        invoice.voided_at = Some(now);
        invoice.metadata.extend(metadata);
        invoice.updated_at = now;
        Ok(())
    }

    fn check(from: InvoiceStatus, to: InvoiceStatus) -> Result<(), InvoiceError> {
        if Self::is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(InvoiceError::InvalidStatusTransition { from, to })
        }
    }
}
