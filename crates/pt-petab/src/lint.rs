//! Problem validation.
//!
//! [`lint_tables`] checks the tabular part of a problem; [`lint_problem`]
//! adds the checks that need the on-disk layout. [`BuiltinLinter`] and
//! [`CommandLinter`] implement [`ProblemLinter`] for the materializer.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;

use pt_core::{Error, FormatVersion, LintIssue, ProblemLinter, Result};

use crate::columns::*;
use crate::expr::CompiledExpr;
use crate::problem::{Problem, ProblemTables};
use crate::table::{Cell, Table};

/// Number of parameters a prior family takes, `None` for unknown families.
pub fn prior_parameter_count(version: FormatVersion, family: &str) -> Option<usize> {
    match version {
        FormatVersion::V1 => match family {
            "uniform" | "normal" | "laplace" | "logNormal" | "logLaplace"
            | "parameterScaleUniform" | "parameterScaleNormal" | "parameterScaleLaplace" => Some(2),
            _ => None,
        },
        FormatVersion::V2 => match family {
            "uniform" | "normal" | "log-normal" | "cauchy" | "gamma" | "laplace"
            | "log-laplace" | "log-uniform" => Some(2),
            "chisquare" | "exponential" | "rayleigh" => Some(1),
            _ => None,
        },
    }
}

/// Parse an `estimate` cell: `0`/`1` in v1, `true`/`false` in v2.
pub fn parse_estimate(version: FormatVersion, cell: &Cell) -> Option<bool> {
    match (version, cell) {
        (FormatVersion::V1, Cell::Number(v)) if *v == 0.0 => Some(false),
        (FormatVersion::V1, Cell::Number(v)) if *v == 1.0 => Some(true),
        (FormatVersion::V2, Cell::Text(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Split a `;`-separated override or prior-parameter cell.
pub fn split_entries(cell: &Cell) -> Vec<Cell> {
    match cell {
        Cell::Empty => Vec::new(),
        Cell::Number(v) if v.is_nan() => Vec::new(),
        Cell::Number(v) => vec![Cell::Number(*v)],
        Cell::Text(s) => s.split(PARAMETER_SEPARATOR).map(Cell::parse).collect(),
    }
}

/// Highest `k` among `{prefix}{k}_{observable_id}` symbols of a formula.
pub fn max_placeholder(symbols: &[String], prefix: &str, observable_id: &str) -> usize {
    symbols
        .iter()
        .filter_map(|s| placeholder_index(s, prefix, observable_id))
        .max()
        .unwrap_or(0)
}

/// `k` if `symbol` is `{prefix}{k}_{observable_id}`.
pub fn placeholder_index(symbol: &str, prefix: &str, observable_id: &str) -> Option<usize> {
    let rest = symbol.strip_prefix(prefix)?;
    let (k, obs) = rest.split_once('_')?;
    if obs != observable_id {
        return None;
    }
    k.parse::<usize>().ok().filter(|k| *k > 0)
}

fn formula_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Number(v) if v.is_nan() => None,
        other => Some(other.to_key()),
    }
}

struct Linter<'a> {
    version: FormatVersion,
    tables: &'a ProblemTables,
    issues: Vec<LintIssue>,
}

impl<'a> Linter<'a> {
    fn error(&mut self, msg: String) {
        self.issues.push(LintIssue::error(msg));
    }

    fn warn(&mut self, msg: String) {
        self.issues.push(LintIssue::warning(msg));
    }

    /// Returns false (and records issues) if any required column is missing.
    fn require(&mut self, group: &str, idx: usize, table: &Table, cols: &[&str]) -> bool {
        let mut ok = true;
        for col in cols {
            if !table.has_column(col) {
                self.error(format!("{group} table {idx}: missing required column '{col}'"));
                ok = false;
            }
        }
        ok
    }

    fn parameter_ids(&self) -> HashSet<String> {
        let mut ids: HashSet<String> = self
            .tables
            .parameters
            .column(PARAMETER_ID)
            .map(|c| c.iter().map(|v| v.to_key()).collect())
            .unwrap_or_default();
        if let Some(mapping) = &self.tables.mapping
            && let Some(aliases) = mapping.column(PETAB_ENTITY_ID)
        {
            ids.extend(aliases.iter().map(|v| v.to_key()));
        }
        ids
    }

    fn condition_ids(&self) -> HashSet<String> {
        self.tables
            .conditions
            .iter()
            .filter_map(|t| t.column(CONDITION_ID))
            .flat_map(|c| c.into_iter().map(|v| v.to_key()))
            .collect()
    }

    fn experiment_ids(&self) -> HashSet<String> {
        self.tables
            .experiments
            .iter()
            .filter_map(|t| t.column(EXPERIMENT_ID))
            .flat_map(|c| c.into_iter().map(|v| v.to_key()))
            .collect()
    }

    fn check_observables(&mut self) -> HashMap<String, (usize, usize)> {
        let tables = self.tables;
        // observable id -> (max noise placeholder, max observable placeholder)
        let mut placeholders = HashMap::new();
        if tables.observables.is_empty() {
            self.error("no observable table".to_string());
        }
        let allowed_noise: &[&str] = match self.version {
            FormatVersion::V1 => &NOISE_DISTRIBUTIONS_V1,
            FormatVersion::V2 => &NOISE_DISTRIBUTIONS_V2,
        };

        for (idx, table) in tables.observables.iter().enumerate() {
            if !self.require(
                "observable",
                idx,
                table,
                &[OBSERVABLE_ID, OBSERVABLE_FORMULA, NOISE_FORMULA],
            ) {
                continue;
            }
            if self.version == FormatVersion::V2 && table.has_column(OBSERVABLE_TRANSFORMATION) {
                self.warn(format!(
                    "observable table {idx}: '{OBSERVABLE_TRANSFORMATION}' is not part of PEtab v2"
                ));
            }
            for row in 0..table.n_rows() {
                let id = table.cell(row, OBSERVABLE_ID).map(Cell::to_key).unwrap_or_default();
                if id.is_empty() {
                    self.error(format!("observable table {idx}, row {row}: empty observableId"));
                    continue;
                }
                if placeholders.contains_key(&id) {
                    self.error(format!("duplicate observableId '{id}'"));
                    continue;
                }

                let mut obs_max = 0;
                match table.cell(row, OBSERVABLE_FORMULA).and_then(formula_text) {
                    None => self.error(format!("observable '{id}': empty observableFormula")),
                    Some(f) => match CompiledExpr::compile(&f) {
                        Ok(e) => obs_max = max_placeholder(&e.symbols, "observableParameter", &id),
                        Err(e) => self.error(format!("observable '{id}': observableFormula: {e}")),
                    },
                }

                let mut noise_max = 0;
                match table.cell(row, NOISE_FORMULA).and_then(formula_text) {
                    None => self.error(format!("observable '{id}': empty noiseFormula")),
                    Some(f) => match CompiledExpr::compile(&f) {
                        Ok(e) => noise_max = max_placeholder(&e.symbols, "noiseParameter", &id),
                        Err(e) => self.error(format!("observable '{id}': noiseFormula: {e}")),
                    },
                }

                if let Some(cell) = table.cell(row, NOISE_DISTRIBUTION)
                    && !cell.is_missing()
                    && !allowed_noise.contains(&cell.to_key().as_str())
                {
                    self.error(format!(
                        "observable '{id}': invalid noiseDistribution '{}'",
                        cell.to_key()
                    ));
                }
                if let Some(cell) = table.cell(row, OBSERVABLE_TRANSFORMATION)
                    && !cell.is_missing()
                    && !OBSERVABLE_TRANSFORMATIONS.contains(&cell.to_key().as_str())
                {
                    self.error(format!(
                        "observable '{id}': invalid observableTransformation '{}'",
                        cell.to_key()
                    ));
                }

                placeholders.insert(id, (noise_max, obs_max));
            }
        }
        placeholders
    }

    fn check_conditions(&mut self) {
        let tables = self.tables;
        let mut seen = HashSet::new();
        for (idx, table) in tables.conditions.iter().enumerate() {
            match self.version {
                FormatVersion::V1 => {
                    if !self.require("condition", idx, table, &[CONDITION_ID]) {
                        continue;
                    }
                    for row in 0..table.n_rows() {
                        let id = table.cell(row, CONDITION_ID).map(Cell::to_key).unwrap_or_default();
                        if id.is_empty() {
                            self.error(format!("condition table {idx}, row {row}: empty conditionId"));
                        } else if !seen.insert(id.clone()) {
                            self.error(format!("duplicate conditionId '{id}'"));
                        }
                    }
                }
                FormatVersion::V2 => {
                    if !self.require("condition", idx, table, &[CONDITION_ID, TARGET_ID, TARGET_VALUE])
                    {
                        continue;
                    }
                    for row in 0..table.n_rows() {
                        let id = table.cell(row, CONDITION_ID).map(Cell::to_key).unwrap_or_default();
                        let target = table.cell(row, TARGET_ID).map(Cell::to_key).unwrap_or_default();
                        if id.is_empty() || target.is_empty() {
                            self.error(format!(
                                "condition table {idx}, row {row}: empty conditionId or targetId"
                            ));
                            continue;
                        }
                        if !seen.insert(format!("{id}\u{0}{target}")) {
                            self.error(format!("condition '{id}' sets '{target}' more than once"));
                        }
                        if table.cell(row, TARGET_VALUE).is_none_or(Cell::is_missing) {
                            self.error(format!("condition '{id}': empty targetValue for '{target}'"));
                        }
                    }
                }
            }
        }
    }

    fn check_experiments(&mut self) {
        let tables = self.tables;
        if self.version == FormatVersion::V1 {
            if !tables.experiments.is_empty() {
                self.error("PEtab v1 has no experiment tables".to_string());
            }
            return;
        }
        let conditions = self.condition_ids();
        for (idx, table) in tables.experiments.iter().enumerate() {
            if !self.require("experiment", idx, table, &[EXPERIMENT_ID, TIME, CONDITION_ID]) {
                continue;
            }
            for row in 0..table.n_rows() {
                let id = table.cell(row, EXPERIMENT_ID).map(Cell::to_key).unwrap_or_default();
                if id.is_empty() {
                    self.error(format!("experiment table {idx}, row {row}: empty experimentId"));
                }
                match table.cell(row, TIME).and_then(Cell::as_f64) {
                    Some(t) if !t.is_nan() && t != f64::INFINITY => {}
                    _ => self.error(format!("experiment '{id}', row {row}: invalid time")),
                }
                let cond = table.cell(row, CONDITION_ID).map(Cell::to_key).unwrap_or_default();
                if !cond.is_empty() && !conditions.contains(&cond) {
                    self.error(format!("experiment '{id}': unknown conditionId '{cond}'"));
                }
            }
        }
    }

    fn check_overrides(
        &mut self,
        obs_id: &str,
        cell: Option<&Cell>,
        expected: usize,
        kind: &str,
        params: &HashSet<String>,
    ) {
        let entries = cell.map(split_entries).unwrap_or_default();
        if entries.len() != expected {
            self.error(format!(
                "measurement for '{obs_id}': {} {kind} override(s) given, formula has {expected}",
                entries.len()
            ));
        }
        for e in entries {
            if let Cell::Text(s) = &e
                && !params.contains(s)
            {
                self.error(format!(
                    "measurement for '{obs_id}': {kind} override '{s}' is neither numeric nor a parameter"
                ));
            }
        }
    }

    fn check_measurements(&mut self, placeholders: &HashMap<String, (usize, usize)>) {
        let tables = self.tables;
        if tables.measurements.is_empty() {
            self.error("no measurement table".to_string());
        }
        let conditions = self.condition_ids();
        let experiments = self.experiment_ids();
        let params = self.parameter_ids();

        let required: &[&str] = match self.version {
            FormatVersion::V1 => &[OBSERVABLE_ID, SIMULATION_CONDITION_ID, TIME, MEASUREMENT],
            FormatVersion::V2 => &[OBSERVABLE_ID, TIME, MEASUREMENT],
        };

        for (idx, table) in tables.measurements.iter().enumerate() {
            if !self.require("measurement", idx, table, required) {
                continue;
            }
            if self.version == FormatVersion::V2 && table.has_column(SIMULATION_CONDITION_ID) {
                self.error(format!(
                    "measurement table {idx}: PEtab v2 uses '{EXPERIMENT_ID}', not '{SIMULATION_CONDITION_ID}'"
                ));
            }
            for row in 0..table.n_rows() {
                let obs = table.cell(row, OBSERVABLE_ID).map(Cell::to_key).unwrap_or_default();
                let Some(&(noise_max, obs_max)) = placeholders.get(&obs) else {
                    self.error(format!("measurement table {idx}, row {row}: unknown observableId '{obs}'"));
                    continue;
                };

                match table.cell(row, TIME).and_then(Cell::as_f64) {
                    Some(t) if !t.is_nan() && t != f64::NEG_INFINITY => {}
                    _ => self.error(format!("measurement table {idx}, row {row}: invalid time")),
                }
                match table.cell(row, MEASUREMENT).and_then(Cell::as_f64) {
                    Some(m) if m.is_finite() => {}
                    _ => self.error(format!("measurement table {idx}, row {row}: non-numeric measurement")),
                }

                match self.version {
                    FormatVersion::V1 => {
                        let sim = table
                            .cell(row, SIMULATION_CONDITION_ID)
                            .map(Cell::to_key)
                            .unwrap_or_default();
                        if !conditions.contains(&sim) {
                            self.error(format!(
                                "measurement table {idx}, row {row}: unknown simulationConditionId '{sim}'"
                            ));
                        }
                        let preeq = table
                            .cell(row, PREEQUILIBRATION_CONDITION_ID)
                            .map(Cell::to_key)
                            .unwrap_or_default();
                        if !preeq.is_empty() && !conditions.contains(&preeq) {
                            self.error(format!(
                                "measurement table {idx}, row {row}: unknown preequilibrationConditionId '{preeq}'"
                            ));
                        }
                    }
                    FormatVersion::V2 => {
                        let exp =
                            table.cell(row, EXPERIMENT_ID).map(Cell::to_key).unwrap_or_default();
                        if !exp.is_empty() && !experiments.contains(&exp) {
                            self.error(format!(
                                "measurement table {idx}, row {row}: unknown experimentId '{exp}'"
                            ));
                        }
                    }
                }

                self.check_overrides(&obs, table.cell(row, NOISE_PARAMETERS), noise_max, "noise", &params);
                self.check_overrides(
                    &obs,
                    table.cell(row, OBSERVABLE_PARAMETERS),
                    obs_max,
                    "observable",
                    &params,
                );
            }
        }
    }

    fn check_parameters(&mut self) {
        let tables = self.tables;
        let table = &tables.parameters;
        let required: &[&str] = match self.version {
            FormatVersion::V1 => {
                &[PARAMETER_ID, PARAMETER_SCALE, LOWER_BOUND, UPPER_BOUND, NOMINAL_VALUE, ESTIMATE]
            }
            FormatVersion::V2 => &[PARAMETER_ID, ESTIMATE],
        };
        if !self.require("parameter", 0, table, required) {
            return;
        }

        let prior_columns: &[(&str, &str)] = match self.version {
            FormatVersion::V1 => &[
                (INITIALIZATION_PRIOR_TYPE, INITIALIZATION_PRIOR_PARAMETERS),
                (OBJECTIVE_PRIOR_TYPE, OBJECTIVE_PRIOR_PARAMETERS),
            ],
            FormatVersion::V2 => &[(PRIOR_DISTRIBUTION, PRIOR_PARAMETERS)],
        };

        let mut seen = HashSet::new();
        for row in 0..table.n_rows() {
            let id = table.cell(row, PARAMETER_ID).map(Cell::to_key).unwrap_or_default();
            if id.is_empty() {
                self.error(format!("parameter table, row {row}: empty parameterId"));
                continue;
            }
            if !seen.insert(id.clone()) {
                self.error(format!("duplicate parameterId '{id}'"));
                continue;
            }

            let scale = table.cell(row, PARAMETER_SCALE).map(Cell::to_key).unwrap_or_default();
            if self.version == FormatVersion::V1 && !PARAMETER_SCALES.contains(&scale.as_str()) {
                self.error(format!("parameter '{id}': invalid parameterScale '{scale}'"));
            }

            let Some(estimate) = table.cell(row, ESTIMATE).and_then(|c| parse_estimate(self.version, c))
            else {
                self.error(format!("parameter '{id}': invalid estimate flag"));
                continue;
            };

            let nominal = table.cell(row, NOMINAL_VALUE).filter(|c| !c.is_missing());
            if !estimate && nominal.is_none() {
                self.error(format!("parameter '{id}': fixed parameter without nominalValue"));
            }

            let lb = table.cell(row, LOWER_BOUND).and_then(Cell::as_f64).filter(|v| !v.is_nan());
            let ub = table.cell(row, UPPER_BOUND).and_then(Cell::as_f64).filter(|v| !v.is_nan());
            if estimate {
                match (lb, ub) {
                    (Some(lb), Some(ub)) => {
                        if lb > ub {
                            self.error(format!("parameter '{id}': lowerBound > upperBound"));
                        }
                        if (scale == LOG || scale == LOG10) && lb <= 0.0 {
                            self.error(format!(
                                "parameter '{id}': bounds must be positive on {scale} scale"
                            ));
                        }
                        if let Some(v) = nominal.and_then(Cell::as_f64)
                            && (v < lb || v > ub)
                        {
                            self.warn(format!("parameter '{id}': nominalValue outside bounds"));
                        }
                    }
                    _ => self.error(format!("parameter '{id}': estimated parameter without bounds")),
                }
            }

            for (type_col, params_col) in prior_columns {
                let Some(family) = table.cell(row, type_col).filter(|c| !c.is_missing()) else {
                    continue;
                };
                let family = family.to_key();
                let Some(expected) = prior_parameter_count(self.version, &family) else {
                    self.error(format!("parameter '{id}': unknown prior '{family}'"));
                    continue;
                };
                let given = table.cell(row, params_col).map(split_entries).unwrap_or_default();
                if given.len() != expected {
                    self.error(format!(
                        "parameter '{id}': prior '{family}' takes {expected} parameter(s), got {}",
                        given.len()
                    ));
                } else if given.iter().any(|c| c.as_f64().is_none()) {
                    self.error(format!("parameter '{id}': non-numeric prior parameters"));
                }
            }
        }
    }

    fn check_mapping(&mut self) {
        let tables = self.tables;
        let Some(mapping) = tables.mapping.as_ref() else {
            return;
        };
        if self.version == FormatVersion::V1 {
            self.error("PEtab v1 has no mapping table".to_string());
            return;
        }
        if !self.require("mapping", 0, mapping, &[PETAB_ENTITY_ID, MODEL_ENTITY_ID]) {
            return;
        }
        let mut seen = HashSet::new();
        for row in 0..mapping.n_rows() {
            let id = mapping.cell(row, PETAB_ENTITY_ID).map(Cell::to_key).unwrap_or_default();
            if id.is_empty() {
                self.error(format!("mapping table, row {row}: empty petabEntityId"));
            } else if !seen.insert(id.clone()) {
                self.error(format!("duplicate petabEntityId '{id}'"));
            }
        }
    }
}

/// Check the tables of a problem against the rules of `version`.
pub fn lint_tables(version: FormatVersion, tables: &ProblemTables) -> Vec<LintIssue> {
    let mut linter = Linter { version, tables, issues: Vec::new() };
    let placeholders = linter.check_observables();
    linter.check_conditions();
    linter.check_experiments();
    linter.check_measurements(&placeholders);
    linter.check_parameters();
    linter.check_mapping();
    linter.issues
}

/// Check a loaded problem, including its model files.
pub fn lint_problem(problem: &Problem) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    if problem.models.is_empty() {
        issues.push(LintIssue::error("no model file"));
    }
    if problem.version == FormatVersion::V1 && problem.models.len() > 1 {
        issues.push(LintIssue::error("PEtab v1 allows a single SBML model"));
    }
    for model in &problem.models {
        let path = problem.model_path(model);
        if !path.is_file() {
            issues.push(LintIssue::error(format!("model file not found: {}", path.display())));
        } else if !model.location.ends_with(model.language.extension()) {
            issues.push(LintIssue::warning(format!(
                "model '{}' ({}) has unexpected extension: {}",
                model.id, model.language, model.location
            )));
        }
    }
    issues.extend(lint_tables(problem.version, &problem.tables));
    issues
}

/// Validator that reloads the written problem and runs [`lint_problem`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLinter;

impl ProblemLinter for BuiltinLinter {
    fn lint(&self, manifest: &Path) -> Result<Vec<LintIssue>> {
        match Problem::from_manifest(manifest) {
            Ok(problem) => Ok(lint_problem(&problem)),
            Err(e) => Ok(vec![LintIssue::error(format!("could not load problem: {e}"))]),
        }
    }

    fn name(&self) -> &str {
        "builtin"
    }
}

/// Validator that runs an external command with the manifest path appended.
///
/// A non-zero exit status is reported as one issue carrying the command's
/// stderr.
#[derive(Debug, Clone)]
pub struct CommandLinter {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandLinter {
    /// Linter from an argv; the first element is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Validation("empty linter command".to_string()))?;
        Ok(Self { program: PathBuf::from(program), args: args.to_vec() })
    }
}

impl ProblemLinter for CommandLinter {
    fn lint(&self, manifest: &Path) -> Result<Vec<LintIssue>> {
        let output = Command::new(&self.program).args(&self.args).arg(manifest).output()?;
        if output.status.success() {
            return Ok(Vec::new());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() { stdout } else { stderr };
        Ok(vec![LintIssue::error(format!(
            "{} exited with {}: {}",
            self.program.display(),
            output.status,
            detail.trim()
        ))])
    }

    fn name(&self) -> &str {
        self.program.to_str().unwrap_or("external")
    }
}

#[cfg(test)]
mod tests;
