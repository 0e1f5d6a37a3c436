//! # pt-suite
//!
//! The PEtab conformance suite: declarative test cases, their
//! materialization into PEtab problems and reference solutions, evaluation
//! of a tool's results against those solutions, and the driver that runs
//! all of it over the `cases/` tree.

#![warn(clippy::all)]

pub mod case;
pub mod config;
pub mod driver;
pub mod evaluate;
pub mod materialize;

pub use case::{ModelSource, TestCase};
pub use config::{FailurePolicy, SuiteConfig};
pub use driver::{CaseFailure, CaseRef, CreateReport, Driver};
pub use evaluate::{
    Candidate, EvaluationReport, evaluate_case, evaluate_chi2, evaluate_llh, evaluate_simulations,
    simulations_distance,
};
pub use materialize::{Materializer, Solution};
