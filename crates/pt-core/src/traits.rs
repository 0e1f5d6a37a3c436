//! Core traits for the PEtab conformance suite
//!
//! Validation of a written problem is delegated to a [`ProblemLinter`], so the
//! materializer does not depend on any concrete validator.

use std::path::Path;

use crate::Result;
use crate::types::LintIssue;

/// Validator run against a freshly written problem manifest.
pub trait ProblemLinter {
    /// Lint the problem described by the manifest at `manifest`.
    ///
    /// `Err` means the linter itself could not run; problems with the PEtab
    /// files are reported as issues.
    fn lint(&self, manifest: &Path) -> Result<Vec<LintIssue>>;

    /// Linter name for log messages
    fn name(&self) -> &str;
}
