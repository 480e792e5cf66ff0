//! Sequential wallet allocation against one invoice.

use chrono::{DateTime, Utc};
use quill_shared::WalletId;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::error::AllocationError;
use super::ledger::{WalletLedger, WalletOperation};
use super::types::{TransactionReason, Wallet, WalletTransaction};
use crate::invoice::{Invoice, InvoiceError, Metadata};
use crate::payment::{Payment, PaymentStatusMachine};

/// Options for one allocation run.
#[derive(Debug, Clone, Default)]
pub struct AllocationOptions {
    /// Maximum number of wallets debited (0 = unbounded).
    pub max_wallets_to_use: usize,
    /// Extra metadata copied onto every payment.
    pub metadata: Metadata,
}

/// One wallet debit produced by an allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletDebit {
    /// Debited wallet.
    pub wallet_id: WalletId,
    /// Debited amount.
    pub amount: Decimal,
    /// Ledger entry for the debit.
    pub transaction: WalletTransaction,
    /// Payment recording the debit.
    pub payment: Payment,
}

/// Result of an allocation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationOutcome {
    /// Total amount paid across all wallets.
    pub amount_paid: Decimal,
    /// Debits in the order they were made.
    pub debits: Vec<WalletDebit>,
    /// True if the run settled the first invoice of an incomplete subscription.
    pub activate_subscription: bool,
}

/// Stateless allocator.
pub struct WalletAllocator;

impl WalletAllocator {
    /// Pays down `invoice` from `wallets`, in the given order.
    ///
    /// Each wallet contributes `min(amount_remaining, balance)`. Empty
    /// wallets are skipped and do not count toward `max_wallets_to_use`.
    /// Running out of wallets before the invoice is settled is not an error.
    /// Because no debit exceeds the remaining amount, allocation alone never
    /// makes an invoice overpaid.
    ///
    /// On error, wallets and invoice may be partially mutated; callers must
    /// discard them along with the enclosing unit of work.
    ///
    /// # Errors
    ///
    /// Returns `MissingInvoice` without an invoice, or the invoice or wallet
    /// error that stopped the run.
    pub fn allocate(
        invoice: Option<&mut Invoice>,
        wallets: &mut [Wallet],
        options: &AllocationOptions,
        now: DateTime<Utc>,
    ) -> Result<AllocationOutcome, AllocationError> {
        let invoice = invoice.ok_or(AllocationError::MissingInvoice)?;
        let mut outcome = AllocationOutcome::default();

        if invoice.amount_remaining <= Decimal::ZERO {
            return Ok(outcome);
        }
        if !invoice.invoice_status.accepts_payment_updates() {
            return Err(InvoiceError::PaymentUpdateNotAllowed(invoice.invoice_status).into());
        }

        for wallet in wallets.iter_mut() {
            let budget_spent =
                options.max_wallets_to_use > 0 && outcome.debits.len() >= options.max_wallets_to_use;
            if invoice.amount_remaining <= Decimal::ZERO || budget_spent {
                break;
            }

            let take = invoice.amount_remaining.min(wallet.balance);
            if take <= Decimal::ZERO {
                debug!(wallet_id = %wallet.id, "skipping empty wallet");
                continue;
            }

            let payment = Payment::from_wallet(invoice, wallet, take, &options.metadata, now);
            let op = WalletOperation::new(take, TransactionReason::InvoicePayment)
                .with_reference(payment.id.to_string());
            let transaction = WalletLedger::debit(wallet, &op, now)?;

            let status = PaymentStatusMachine::settlement_status(invoice, take);
            let reconciled =
                PaymentStatusMachine::apply_reconciling(invoice, status, Some(take), now)?;
            outcome.activate_subscription |= reconciled.activate_subscription;

            debug!(
                invoice_id = %invoice.id,
                wallet_id = %wallet.id,
                amount = %take,
                remaining = %invoice.amount_remaining,
                "wallet debited"
            );

            outcome.amount_paid += take;
            outcome.debits.push(WalletDebit {
                wallet_id: wallet.id,
                amount: take,
                transaction,
                payment,
            });
        }

        Ok(outcome)
    }
}
