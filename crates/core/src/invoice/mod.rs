//! Invoice aggregate for Quill.
//!
//! # Modules
//!
//! - `types` - Invoice classification and status enums
//! - `error` - Invoice-specific error types
//! - `model` - The `Invoice` aggregate and its line items
//! - `validation` - Monetary invariant checks
//! - `lifecycle` - Draft/finalized/voided transitions
//! - `idempotency` - Deterministic create-request keys
//! - `summary` - Per-customer receivables summary

pub mod error;
pub mod idempotency;
pub mod lifecycle;
pub mod model;
pub mod summary;
pub mod types;
pub mod validation;

pub use error::InvoiceError;
pub use idempotency::{IdempotencyKeyGenerator, IdempotencyScope};
pub use lifecycle::InvoiceLifecycle;
pub use model::{CreateInvoiceInput, Invoice, InvoiceLineItem, LineItemInput, Metadata};
pub use summary::CustomerInvoiceSummary;
pub use types::{
    BillingReason, InvoiceStatus, InvoiceType, LineItemEntityType, PaymentStatus, PriceType,
};
pub use validation::InvoiceValidator;
