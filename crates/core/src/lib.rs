//! Core billing logic for Quill.
//!
//! This crate contains pure financial logic with ZERO I/O.
//! Every monetary field is a `rust_decimal::Decimal`.
//!
//! # Modules
//!
//! - `invoice` - Invoice aggregate, invariants, lifecycle and idempotency keys
//! - `pipeline` - Discount, tax and credit-note folding
//! - `payment` - Payment-status state machine and payment records
//! - `wallet` - Wallet ledger, selection strategies and allocation

pub mod invoice;
pub mod payment;
pub mod pipeline;
pub mod wallet;
