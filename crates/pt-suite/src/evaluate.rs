//! Case Evaluator: compares a tool's results with a reference solution.

use std::cmp::Ordering;
use std::path::Path;

use pt_core::{Error, Result};
use pt_petab::Table;
use pt_petab::columns::{
    EXPERIMENT_ID, OBSERVABLE_ID, PREEQUILIBRATION_CONDITION_ID, SIMULATION,
    SIMULATION_CONDITION_ID, TIME,
};
use serde::{Deserialize, Serialize};

use crate::materialize::Solution;

/// Grouping columns compared as exact strings.
const STRING_KEYS: [&str; 4] =
    [OBSERVABLE_ID, SIMULATION_CONDITION_ID, PREEQUILIBRATION_CONDITION_ID, EXPERIMENT_ID];

const TIME_ATOL: f64 = 1e-8;
const TIME_RTOL: f64 = 1e-5;

/// True iff `candidate` is present and within `tol` (strictly) of `reference`.
pub fn evaluate_chi2(candidate: Option<f64>, reference: f64, tol: f64) -> bool {
    within(candidate, reference, tol)
}

/// Same contract as [`evaluate_chi2`].
pub fn evaluate_llh(candidate: Option<f64>, reference: f64, tol: f64) -> bool {
    within(candidate, reference, tol)
}

fn within(candidate: Option<f64>, reference: f64, tol: f64) -> bool {
    candidate.is_some_and(|c| (c - reference).abs() < tol)
}

/// True iff [`simulations_distance`] is below `tol`.
pub fn evaluate_simulations(candidate: &[Table], reference: &[Table], tol: f64) -> Result<bool> {
    Ok(simulations_distance(candidate, reference)? < tol)
}

/// Mean over table pairs of the per-table mean absolute error.
///
/// Tables are paired by position. Rows are aligned by sorting both tables on
/// the grouping key (observable, condition ids, experiment, time); a single
/// table is passed as a one-element slice.
pub fn simulations_distance(candidate: &[Table], reference: &[Table]) -> Result<f64> {
    if candidate.len() != reference.len() {
        return Err(Error::Comparison(format!(
            "{} candidate simulation table(s) for {} reference table(s)",
            candidate.len(),
            reference.len()
        )));
    }
    if candidate.is_empty() {
        return Err(Error::Comparison("no simulation tables to compare".to_string()));
    }
    let mut total = 0.0;
    for (i, (c, r)) in candidate.iter().zip(reference).enumerate() {
        total += table_distance(c, r)
            .map_err(|e| Error::Comparison(format!("simulation table {i}: {e}")))?;
    }
    Ok(total / candidate.len() as f64)
}

#[derive(Debug)]
struct KeyedRow {
    keys: Vec<String>,
    time: f64,
    value: f64,
}

impl KeyedRow {
    fn cmp(&self, other: &Self) -> Ordering {
        self.keys
            .cmp(&other.keys)
            .then(self.time.total_cmp(&other.time))
            .then(self.value.total_cmp(&other.value))
    }
}

fn keyed_rows(table: &Table, keys: &[&str]) -> std::result::Result<Vec<KeyedRow>, String> {
    let mut rows = Vec::with_capacity(table.n_rows());
    for row in 0..table.n_rows() {
        let number = |col: &str| {
            table
                .cell(row, col)
                .and_then(|c| c.as_f64())
                .ok_or_else(|| format!("row {row}: missing or non-numeric '{col}'"))
        };
        rows.push(KeyedRow {
            keys: keys
                .iter()
                .map(|k| table.cell(row, k).map(|c| c.to_key()).unwrap_or_default())
                .collect(),
            time: number(TIME)?,
            value: number(SIMULATION)?,
        });
    }
    rows.sort_by(KeyedRow::cmp);
    Ok(rows)
}

fn time_close(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= TIME_ATOL + TIME_RTOL * b.abs()
}

fn table_distance(candidate: &Table, reference: &Table) -> std::result::Result<f64, String> {
    // optional key columns count when either side has them; absent means empty
    let keys: Vec<&str> = STRING_KEYS
        .iter()
        .copied()
        .filter(|k| *k == OBSERVABLE_ID || candidate.has_column(k) || reference.has_column(k))
        .collect();

    let c = keyed_rows(candidate, &keys).map_err(|e| format!("candidate {e}"))?;
    let r = keyed_rows(reference, &keys).map_err(|e| format!("reference {e}"))?;
    if c.len() != r.len() {
        return Err(format!("{} candidate rows for {} reference rows", c.len(), r.len()));
    }
    if c.is_empty() {
        return Err("empty simulation table".to_string());
    }

    let mut sum = 0.0;
    for (i, (a, b)) in c.iter().zip(&r).enumerate() {
        if a.keys != b.keys || !time_close(a.time, b.time) {
            return Err(format!(
                "grouping keys differ at sorted row {i}: {:?} @ {} vs {:?} @ {}",
                a.keys, a.time, b.keys, b.time
            ));
        }
        sum += (a.value - b.value).abs();
    }
    Ok(sum / c.len() as f64)
}

/// A tool's results for one case, in the solution-manifest shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateManifest {
    #[serde(default)]
    pub chi2: Option<f64>,
    #[serde(default)]
    pub llh: Option<f64>,
    #[serde(default)]
    pub simulation_files: Vec<String>,
}

/// Loaded candidate results.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub chi2: Option<f64>,
    pub llh: Option<f64>,
    pub simulations: Vec<Table>,
}

impl Candidate {
    /// Read a result manifest; simulation files are relative to it.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let manifest: CandidateManifest = serde_yaml_ng::from_slice(&bytes)?;
        let base = path.parent().unwrap_or(Path::new(""));
        let simulations = manifest
            .simulation_files
            .iter()
            .map(|f| Table::read_tsv(&base.join(f)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { chi2: manifest.chi2, llh: manifest.llh, simulations })
    }
}

/// Verdicts of one candidate against one reference solution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub chi2: bool,
    pub llh: bool,
    pub simulations: bool,
    /// `None` when no simulation tables were supplied
    pub simulation_distance: Option<f64>,
    pub tol_chi2: f64,
    pub tol_llh: f64,
    pub tol_simulations: f64,
}

impl EvaluationReport {
    pub fn passed(&self) -> bool {
        self.chi2 && self.llh && self.simulations
    }
}

/// Judge `candidate` with the tolerances of `reference`.
///
/// Missing candidate values fail their verdict. A reference without chi2 or
/// llh has nothing to compare against and fails too. Grouping-key
/// mismatches are errors.
pub fn evaluate_case(candidate: &Candidate, reference: &Solution) -> Result<EvaluationReport> {
    let chi2 = reference.chi2.is_some_and(|r| evaluate_chi2(candidate.chi2, r, reference.tol_chi2));
    let llh = reference.llh.is_some_and(|r| evaluate_llh(candidate.llh, r, reference.tol_llh));
    let simulation_distance = if candidate.simulations.is_empty() {
        None
    } else {
        Some(simulations_distance(&candidate.simulations, &reference.simulations)?)
    };
    Ok(EvaluationReport {
        chi2,
        llh,
        simulations: simulation_distance.is_some_and(|d| d < reference.tol_simulations),
        simulation_distance,
        tol_chi2: reference.tol_chi2,
        tol_llh: reference.tol_llh,
        tol_simulations: reference.tol_simulations,
    })
}
