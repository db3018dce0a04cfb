//! hostcheck common types and errors.
//!
//! This crate provides foundational types shared across hostcheck crates:
//! - The unified error type with stable codes and remediation hints
//! - Immutable command execution results
//! - Operating system family classification
//! - Output format selection

pub mod error;
pub mod os;
pub mod output;
pub mod result;

pub use error::{Error, ErrorCategory, Result, StructuredError, SuggestedAction};
pub use os::OsFamily;
pub use output::OutputFormat;
pub use result::CommandResult;
