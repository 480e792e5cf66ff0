//! Per-customer receivables summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use quill_shared::{Currency, CustomerId};
use rust_decimal::Decimal;
use serde::Serialize;

use super::model::Invoice;
use super::types::{InvoiceStatus, PriceType};

/// Revenue and outstanding balances for one customer in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerInvoiceSummary {
    /// Customer the figures belong to.
    pub customer_id: CustomerId,
    /// Currency the figures are expressed in.
    pub currency: Currency,
    /// Sum of `amount_due` over non-voided invoices.
    pub total_revenue_amount: Decimal,
    /// Sum of `amount_remaining` over unpaid invoices.
    pub total_unpaid_amount: Decimal,
    /// Sum of `amount_remaining` over unpaid invoices past their due date.
    pub total_overdue_amount: Decimal,
    /// Number of non-voided invoices.
    pub total_invoice_count: u32,
    /// Number of unpaid invoices.
    pub unpaid_invoice_count: u32,
    /// Number of overdue invoices.
    pub overdue_invoice_count: u32,
    /// Usage line-item charges on unpaid invoices.
    pub unpaid_usage_charges: Decimal,
    /// Fixed line-item charges on unpaid invoices.
    pub unpaid_fixed_charges: Decimal,
}

impl CustomerInvoiceSummary {
    fn empty(customer_id: CustomerId, currency: Currency) -> Self {
        Self {
            customer_id,
            currency,
            total_revenue_amount: Decimal::ZERO,
            total_unpaid_amount: Decimal::ZERO,
            total_overdue_amount: Decimal::ZERO,
            total_invoice_count: 0,
            unpaid_invoice_count: 0,
            overdue_invoice_count: 0,
            unpaid_usage_charges: Decimal::ZERO,
            unpaid_fixed_charges: Decimal::ZERO,
        }
    }

    /// Summarizes a customer's invoices in `currency`.
    ///
    /// Voided invoices, other customers' invoices and other currencies are ignored.
    #[must_use]
    pub fn build(
        customer_id: CustomerId,
        currency: &Currency,
        invoices: &[Invoice],
        now: DateTime<Utc>,
    ) -> Self {
        let mut summary = Self::empty(customer_id, currency.clone());
        for invoice in invoices.iter().filter(|inv| {
            inv.customer_id == customer_id && currency.matches(inv.currency.as_str())
        }) {
            summary.add(invoice, now);
        }
        summary
    }

    /// Summarizes a customer's invoices, one entry per currency.
    #[must_use]
    pub fn build_per_currency(
        customer_id: CustomerId,
        invoices: &[Invoice],
        now: DateTime<Utc>,
    ) -> Vec<Self> {
        let mut by_currency: BTreeMap<Currency, Self> = BTreeMap::new();
        for invoice in invoices.iter().filter(|inv| inv.customer_id == customer_id) {
            by_currency
                .entry(invoice.currency.clone())
                .or_insert_with(|| Self::empty(customer_id, invoice.currency.clone()))
                .add(invoice, now);
        }
        by_currency.into_values().collect()
    }

    fn add(&mut self, invoice: &Invoice, now: DateTime<Utc>) {
        if invoice.invoice_status == InvoiceStatus::Voided {
            return;
        }

        self.total_revenue_amount += invoice.amount_due;
        self.total_invoice_count += 1;

        if invoice.payment_status.is_settled() {
            return;
        }

        self.total_unpaid_amount += invoice.amount_remaining;
        self.unpaid_invoice_count += 1;

        if invoice.due_date.is_some_and(|due| due < now) {
            self.total_overdue_amount += invoice.amount_remaining;
            self.overdue_invoice_count += 1;
        }

        for item in &invoice.line_items {
            match item.price_type {
                PriceType::Usage => self.unpaid_usage_charges += item.amount,
                PriceType::Fixed => self.unpaid_fixed_charges += item.amount,
            }
        }
    }
}
