//! Invoice computation pipeline.
//!
//! Folds externally computed discount, tax and credit-note amounts into the
//! invoice aggregate, discount first.

pub mod service;

#[cfg(test)]
mod service_props;

pub use service::InvoiceCalculator;
