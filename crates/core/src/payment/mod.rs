//! Payment status and payment records.
//!
//! # Modules
//!
//! - `status` - Payment-status state machine (absolute and reconciling updates)
//! - `record` - Settlement records

pub mod record;
pub mod status;

#[cfg(test)]
mod status_props;

pub use record::{
    Payment, PaymentDestinationType, PaymentMethodType, PaymentRecordStatus, PaymentSource,
};
pub use status::{PaymentStatusMachine, ReconcileOutcome};
