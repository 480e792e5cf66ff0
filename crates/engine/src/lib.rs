//! Transactional billing services for Quill.
//!
//! Each public operation is one unit of work: it begins a store transaction
//! bound to the caller's [`TenantScope`](quill_shared::TenantScope), locks the
//! records it mutates, applies the pure rules from `quill-core`, and commits.
//! Webhooks and subscription activation run after commit and never fail the
//! operation.
//!
//! # Modules
//!
//! - `store` - Persistence contract and transaction trait
//! - `memory` - In-memory store
//! - `collaborators` - Discount, tax, activation and notification contracts
//! - `events` - Webhook events and the post-commit outbox
//! - `invoice_service` - Invoice creation, lifecycle and payment status
//! - `wallet_payment` - Wallet selection and settlement

pub mod collaborators;
pub mod error;
pub mod events;
pub mod invoice_service;
pub mod memory;
pub mod store;
pub mod wallet_payment;

pub use collaborators::{
    CollaboratorError, Collaborators, DiscountResolver, SubscriptionActivator, TaxResolver,
    WebhookNotifier,
};
pub use error::EngineError;
pub use events::{Outbox, SideEffect, WebhookEvent, WebhookEventName};
pub use invoice_service::InvoiceService;
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use store::{BillingStore, StoreError, StoreTransaction};
pub use wallet_payment::{WalletPaymentOptions, WalletPaymentService};
