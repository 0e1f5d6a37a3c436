//! # pt-core
//!
//! Shared error type, identifiers and the validator seam for the PEtab
//! conformance suite.

#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::ProblemLinter;
pub use types::{CaseId, FormatVersion, LintIssue, LintLevel, ModelFormat};

/// Suite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
