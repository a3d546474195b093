//! # Rollbook Core
//!
//! Core types, errors, and utilities for the rollbook school records core.
//!
//! - [`errors`]: typed application errors ([`AppError`], [`ErrorKind`])
//! - [`pagination`]: pagination parameters and metadata for list queries

pub mod errors;
pub mod pagination;

// Re-export commonly used types at crate root
pub use errors::{AppError, ErrorKind, is_foreign_key_violation, is_unique_violation};
pub use pagination::{PaginationMeta, PaginationParams};
