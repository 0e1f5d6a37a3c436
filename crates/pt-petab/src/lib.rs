//! # pt-petab
//!
//! PEtab problem handling for the conformance suite: typed TSV tables,
//! YAML manifests for format versions 1 and 2, a built-in linter, the
//! formula engine, and chi2/log-likelihood calculation.

#![warn(clippy::all)]

pub mod analytical;
pub mod calculate;
pub mod columns;
pub mod expr;
pub mod lint;
pub mod manifest;
pub mod problem;
pub mod table;

pub use calculate::{calculate_chi2, calculate_llh};
pub use expr::CompiledExpr;
pub use lint::{BuiltinLinter, CommandLinter, lint_problem, lint_tables};
pub use manifest::{ModelFile, ProblemFiles, ProblemManifest};
pub use problem::{Problem, ProblemTables};
pub use table::{Cell, Table};
