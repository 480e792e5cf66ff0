//! Shared types, errors, and configuration for Quill.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Currency codes with case-insensitive matching
//! - The explicit tenant scope threaded through every engine call
//! - Application-wide error taxonomy
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult, FaultKind};
pub use types::*;
