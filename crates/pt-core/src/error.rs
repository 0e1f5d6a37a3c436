//! Error types for the PEtab conformance suite

use std::path::PathBuf;

use thiserror::Error;

use crate::types::LintIssue;

/// Suite error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// TSV reading/writing error
    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Validation error (malformed table, unresolved reference, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Two simulation tables cannot be aligned row by row
    #[error("Comparison error: {0}")]
    Comparison(String),

    /// The problem written to `path` did not pass validation
    #[error("Invalid PEtab problem {}: {} issue(s), first: {}", path.display(), issues.len(), first_issue(issues))]
    Lint {
        /// Manifest that was validated
        path: PathBuf,
        /// Every issue reported by the linters
        issues: Vec<LintIssue>,
    },
}

fn first_issue(issues: &[LintIssue]) -> String {
    issues.first().map(|i| i.to_string()).unwrap_or_default()
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
