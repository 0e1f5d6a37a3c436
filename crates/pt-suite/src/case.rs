//! Case Definition and its declarative `case.yaml` file.
//!
//! A case file lists every table group as a sequence of `{columns, rows}`
//! records and gives the expected simulation values as formula-engine
//! expressions over the row time `t` and the parameters' nominal values.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pt_core::{CaseId, Error, FormatVersion, LintIssue, ModelFormat, Result};
use pt_petab::columns::{
    EXPERIMENT_ID, MEASUREMENT, NOMINAL_VALUE, OBSERVABLE_ID, PARAMETER_ID,
    PREEQUILIBRATION_CONDITION_ID, SIMULATION, SIMULATION_CONDITION_ID, TIME,
};
use pt_petab::{Cell, CompiledExpr, ProblemTables, Table, lint_tables};
use serde::Deserialize;
use serde_yaml_ng::Value;

/// Name of the case definition file inside a case directory.
pub const CASE_FILE: &str = "case.yaml";

/// Where a case's model description comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// The suite's conversion-reaction model for the target format
    Default,
    /// A file, already resolved against the case directory
    Path(PathBuf),
    /// Model text embedded in the case file
    Inline(String),
}

/// One test scenario.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub id: CaseId,
    pub brief: String,
    pub description: String,
    pub model: ModelSource,
    pub tables: ProblemTables,
    /// Expected simulation output, aligned with `tables.measurements`
    pub simulations: Vec<Table>,
    pub chi2: Option<f64>,
    pub llh: Option<f64>,
}

// ── File shape ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaseFile {
    id: u32,
    brief: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_model")]
    model: RawModel,
    #[serde(default)]
    conditions: Vec<TableSpec>,
    observables: Vec<TableSpec>,
    measurements: Vec<TableSpec>,
    #[serde(default)]
    experiments: Vec<TableSpec>,
    parameters: TableSpec,
    #[serde(default)]
    mapping: Option<TableSpec>,
    simulations: Vec<SimulationSpec>,
    #[serde(default)]
    chi2: Option<f64>,
    #[serde(default)]
    llh: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawModel {
    Named(String),
    Inline { inline: String },
}

fn default_model() -> RawModel {
    RawModel::Named("default".to_string())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableSpec {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SimulationSpec {
    /// Index of the measurement table this simulates
    #[serde(default)]
    measurements: usize,
    #[serde(default)]
    formula: Option<String>,
    #[serde(default)]
    values: Option<Vec<Value>>,
}

fn cell_from_yaml(v: &Value) -> Result<Cell> {
    Ok(match v {
        Value::Null => Cell::Empty,
        Value::Bool(b) => Cell::text(b.to_string()),
        Value::Number(n) => Cell::Number(
            n.as_f64().ok_or_else(|| Error::Validation(format!("unrepresentable number {n}")))?,
        ),
        Value::String(s) => Cell::parse(s),
        other => {
            return Err(Error::Validation(format!("unsupported table value {other:?}")));
        }
    })
}

fn expr_text(v: &Value) -> Result<String> {
    match v {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        other => Err(Error::Validation(format!("expected an expression, got {other:?}"))),
    }
}

impl TableSpec {
    fn to_table(&self) -> Result<Table> {
        let rows = self
            .rows
            .iter()
            .map(|r| r.iter().map(cell_from_yaml).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        Table::from_rows(self.columns.iter().cloned(), rows)
    }
}

fn to_tables(specs: &[TableSpec]) -> Result<Vec<Table>> {
    specs.iter().map(TableSpec::to_table).collect()
}

/// Copy of a measurement table with its `measurement` column replaced by
/// `simulation` values.
pub fn simulation_table(measurements: &Table, values: &[f64]) -> Result<Table> {
    let col = measurements.require_column(MEASUREMENT)?;
    if values.len() != measurements.n_rows() {
        return Err(Error::Validation(format!(
            "{} simulated values for {} measurements",
            values.len(),
            measurements.n_rows()
        )));
    }
    let columns = measurements
        .columns()
        .iter()
        .map(|c| if c == MEASUREMENT { SIMULATION.to_string() } else { c.clone() });
    let rows = measurements
        .rows()
        .iter()
        .zip(values)
        .map(|(row, v)| {
            let mut row = row.clone();
            row[col] = Cell::Number(*v);
            row
        })
        .collect();
    Table::from_rows(columns, rows)
}

fn nominal_values(parameters: &Table) -> HashMap<String, f64> {
    (0..parameters.n_rows())
        .filter_map(|row| {
            let id = parameters.cell(row, PARAMETER_ID)?.to_key();
            let v = parameters.cell(row, NOMINAL_VALUE)?.as_f64()?;
            Some((id, v))
        })
        .collect()
}

impl SimulationSpec {
    fn evaluate(&self, measurements: &Table, nominal: &HashMap<String, f64>) -> Result<Table> {
        let times: Vec<f64> = (0..measurements.n_rows())
            .map(|row| {
                measurements.cell(row, TIME).and_then(Cell::as_f64).ok_or_else(|| {
                    Error::Validation(format!("measurement row {row}: non-numeric time"))
                })
            })
            .collect::<Result<_>>()?;

        let eval = |expr: &CompiledExpr, t: f64| {
            expr.eval_with(|s| if s == "t" { Some(t) } else { nominal.get(s).copied() })
        };

        let values = match (&self.formula, &self.values) {
            (Some(formula), None) => {
                let expr = CompiledExpr::compile(formula)?;
                times.iter().map(|t| eval(&expr, *t)).collect::<Result<Vec<_>>>()?
            }
            (None, Some(values)) => {
                if values.len() != times.len() {
                    return Err(Error::Validation(format!(
                        "{} simulation values for {} measurements",
                        values.len(),
                        times.len()
                    )));
                }
                values
                    .iter()
                    .zip(&times)
                    .map(|(v, t)| eval(&CompiledExpr::compile(&expr_text(v)?)?, *t))
                    .collect::<Result<Vec<_>>>()?
            }
            _ => {
                return Err(Error::Validation(
                    "simulation needs exactly one of 'formula' or 'values'".to_string(),
                ));
            }
        };
        simulation_table(measurements, &values)
    }
}

// ── Loading ────────────────────────────────────────────────────

impl TestCase {
    /// Load `case.yaml` from a case directory.
    pub fn load(case_dir: &Path) -> Result<Self> {
        let path = case_dir.join(CASE_FILE);
        let bytes = std::fs::read(&path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display())))
        })?;
        Self::from_yaml_slice(&bytes, case_dir)
    }

    /// Parse a case file; relative model paths resolve against `case_dir`.
    pub fn from_yaml_slice(bytes: &[u8], case_dir: &Path) -> Result<Self> {
        let file: CaseFile = serde_yaml_ng::from_slice(bytes)?;

        let model = match file.model {
            RawModel::Named(name) if name == "default" => ModelSource::Default,
            RawModel::Named(path) => ModelSource::Path(case_dir.join(path)),
            RawModel::Inline { inline } => ModelSource::Inline(inline),
        };

        let tables = ProblemTables {
            conditions: to_tables(&file.conditions)?,
            observables: to_tables(&file.observables)?,
            measurements: to_tables(&file.measurements)?,
            experiments: to_tables(&file.experiments)?,
            parameters: file.parameters.to_table()?,
            mapping: file.mapping.as_ref().map(TableSpec::to_table).transpose()?,
        };

        let nominal = nominal_values(&tables.parameters);
        let simulations = file
            .simulations
            .iter()
            .map(|spec| {
                let meas = tables.measurements.get(spec.measurements).ok_or_else(|| {
                    Error::Validation(format!("no measurement table {}", spec.measurements))
                })?;
                spec.evaluate(meas, &nominal)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: CaseId::new(file.id)?,
            brief: file.brief,
            description: file.description,
            model,
            tables,
            simulations,
            chi2: file.chi2,
            llh: file.llh,
        })
    }

    /// Check the case before anything is written for `version`/`format`.
    ///
    /// Returns every finding; the case is usable iff none is an error.
    pub fn validate(&self, version: FormatVersion, format: ModelFormat) -> Vec<LintIssue> {
        let mut issues = Vec::new();
        if version == FormatVersion::V1 && format != ModelFormat::Sbml {
            issues.push(LintIssue::error(format!(
                "PEtab v1 manifests can only reference SBML models, not {format}"
            )));
        }
        if let ModelSource::Path(p) = &self.model
            && !p.is_file()
        {
            issues.push(LintIssue::error(format!("model file not found: {}", p.display())));
        }
        issues.extend(lint_tables(version, &self.tables));
        issues.extend(self.check_simulations());
        issues
    }

    /// Simulation tables must cover exactly the measurement rows.
    fn check_simulations(&self) -> Vec<LintIssue> {
        let meas = &self.tables.measurements;
        if self.simulations.len() != meas.len() {
            return vec![LintIssue::error(format!(
                "{} simulation table(s) for {} measurement table(s)",
                self.simulations.len(),
                meas.len()
            ))];
        }
        let mut issues = Vec::new();
        for (i, (m, s)) in meas.iter().zip(&self.simulations).enumerate() {
            if row_keys(m) != row_keys(s) {
                issues.push(LintIssue::error(format!(
                    "simulation table {i} rows do not match measurement table {i}"
                )));
            }
        }
        issues
    }
}

/// Sorted grouping keys of a table's rows.
fn row_keys(table: &Table) -> Vec<Vec<String>> {
    const KEYS: [&str; 5] =
        [OBSERVABLE_ID, SIMULATION_CONDITION_ID, PREEQUILIBRATION_CONDITION_ID, EXPERIMENT_ID, TIME];
    let mut keys: Vec<Vec<String>> = (0..table.n_rows())
        .map(|row| {
            KEYS.iter()
                .map(|k| table.cell(row, k).map(Cell::to_key).unwrap_or_default())
                .collect()
        })
        .collect();
    keys.sort();
    keys
}
