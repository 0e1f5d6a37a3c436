//! chi2 and log-likelihood of simulated values against measurements.
//!
//! Simulation tables are aligned row by row with the measurement tables of
//! the problem: table `i` row `j` simulates measurement table `i` row `j`.

use std::collections::HashMap;
use std::f64::consts::{LN_10, PI};

use pt_core::{Error, FormatVersion, Result};

use crate::columns::*;
use crate::expr::CompiledExpr;
use crate::lint::{placeholder_index, split_entries};
use crate::problem::ProblemTables;
use crate::table::{Cell, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scale {
    Lin,
    Log,
    Log10,
}

impl Scale {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "" | LIN => Ok(Scale::Lin),
            LOG => Ok(Scale::Log),
            LOG10 => Ok(Scale::Log10),
            other => Err(Error::Validation(format!("unknown transformation '{other}'"))),
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Scale::Lin => x,
            Scale::Log => x.ln(),
            Scale::Log10 => x.log10(),
        }
    }

    /// Derivative of the transformation's inverse, at the measurement.
    fn jacobian(self, m: f64) -> f64 {
        match self {
            Scale::Lin => 1.0,
            Scale::Log => m,
            Scale::Log10 => m * LN_10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Noise {
    Normal,
    Laplace,
}

struct ObservableModel {
    noise_formula: CompiledExpr,
    noise: Noise,
    scale: Scale,
}

/// One measurement/simulation pair after noise evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Residual {
    /// Weighted residual on the transformed scale
    r: f64,
    sigma: f64,
    jacobian: f64,
    noise: Noise,
}

impl Residual {
    fn llh(&self) -> f64 {
        match self.noise {
            Noise::Normal => {
                -0.5 * (2.0 * PI * (self.sigma * self.jacobian).powi(2)).ln() - 0.5 * self.r * self.r
            }
            Noise::Laplace => -(2.0 * self.sigma * self.jacobian).ln() - self.r.abs(),
        }
    }
}

fn observable_model(version: FormatVersion, table: &Table, row: usize) -> Result<ObservableModel> {
    let text = |col: &str| table.cell(row, col).filter(|c| !c.is_missing()).map(Cell::to_key);

    let noise_formula = text(NOISE_FORMULA)
        .ok_or_else(|| Error::Validation("observable without noiseFormula".to_string()))?;
    let noise_formula = CompiledExpr::compile(&noise_formula)?;

    let distribution = text(NOISE_DISTRIBUTION).unwrap_or_else(|| NORMAL.to_string());
    let (noise, scale) = match version {
        FormatVersion::V1 => {
            let scale = Scale::parse(&text(OBSERVABLE_TRANSFORMATION).unwrap_or_default())?;
            let noise = match distribution.as_str() {
                NORMAL => Noise::Normal,
                LAPLACE => Noise::Laplace,
                other => {
                    return Err(Error::Validation(format!("unknown noiseDistribution '{other}'")));
                }
            };
            (noise, scale)
        }
        FormatVersion::V2 => match distribution.as_str() {
            NORMAL => (Noise::Normal, Scale::Lin),
            LAPLACE => (Noise::Laplace, Scale::Lin),
            LOG_NORMAL => (Noise::Normal, Scale::Log),
            LOG_LAPLACE => (Noise::Laplace, Scale::Log),
            other => {
                return Err(Error::Validation(format!("unknown noiseDistribution '{other}'")));
            }
        },
    };
    Ok(ObservableModel { noise_formula, noise, scale })
}

struct Evaluator {
    version: FormatVersion,
    observables: HashMap<String, ObservableModel>,
    nominal: HashMap<String, f64>,
    aliases: HashMap<String, String>,
}

impl Evaluator {
    fn new(version: FormatVersion, tables: &ProblemTables) -> Result<Self> {
        let mut observables = HashMap::new();
        for table in &tables.observables {
            for row in 0..table.n_rows() {
                let id = table
                    .cell(row, OBSERVABLE_ID)
                    .map(Cell::to_key)
                    .ok_or_else(|| Error::Validation("observable table without observableId".to_string()))?;
                observables.insert(id, observable_model(version, table, row)?);
            }
        }

        let mut nominal = HashMap::new();
        let params = &tables.parameters;
        for row in 0..params.n_rows() {
            if let (Some(id), Some(v)) = (
                params.cell(row, PARAMETER_ID).map(Cell::to_key),
                params.cell(row, NOMINAL_VALUE).and_then(Cell::as_f64),
            ) {
                nominal.insert(id, v);
            }
        }

        let mut aliases = HashMap::new();
        if let Some(mapping) = &tables.mapping {
            for row in 0..mapping.n_rows() {
                if let (Some(alias), Some(target)) = (
                    mapping.cell(row, PETAB_ENTITY_ID).map(Cell::to_key),
                    mapping.cell(row, MODEL_ENTITY_ID).map(Cell::to_key),
                ) {
                    aliases.insert(alias, target);
                }
            }
        }

        Ok(Self { version, observables, nominal, aliases })
    }

    fn parameter_value(&self, id: &str) -> Option<f64> {
        self.nominal
            .get(id)
            .or_else(|| self.aliases.get(id).and_then(|target| self.nominal.get(target)))
            .copied()
    }

    fn resolve_override(&self, cell: &Cell) -> Option<f64> {
        match cell {
            Cell::Number(v) => Some(*v),
            Cell::Text(id) => self.parameter_value(id),
            Cell::Empty => None,
        }
    }

    fn residual(&self, measurements: &Table, row: usize, simulation: f64) -> Result<Residual> {
        let obs_id = measurements.cell(row, OBSERVABLE_ID).map(Cell::to_key).unwrap_or_default();
        let model = self
            .observables
            .get(&obs_id)
            .ok_or_else(|| Error::Validation(format!("unknown observableId '{obs_id}'")))?;
        let measurement = measurements
            .cell(row, MEASUREMENT)
            .and_then(Cell::as_f64)
            .ok_or_else(|| Error::Validation(format!("row {row}: non-numeric measurement")))?;

        let noise_overrides =
            measurements.cell(row, NOISE_PARAMETERS).map(split_entries).unwrap_or_default();
        let observable_overrides =
            measurements.cell(row, OBSERVABLE_PARAMETERS).map(split_entries).unwrap_or_default();

        let lookup = |symbol: &str| -> Option<f64> {
            if let Some(k) = placeholder_index(symbol, "noiseParameter", &obs_id) {
                return noise_overrides.get(k - 1).and_then(|c| self.resolve_override(c));
            }
            if let Some(k) = placeholder_index(symbol, "observableParameter", &obs_id) {
                return observable_overrides.get(k - 1).and_then(|c| self.resolve_override(c));
            }
            if symbol == obs_id {
                return Some(simulation);
            }
            self.parameter_value(symbol)
        };
        let sigma = model.noise_formula.eval_with(lookup)?;
        if sigma.is_nan() || sigma <= 0.0 {
            return Err(Error::Computation(format!(
                "observable '{obs_id}', row {row}: noise must be positive, got {sigma}"
            )));
        }

        let r = (model.scale.apply(measurement) - model.scale.apply(simulation)) / sigma;
        Ok(Residual { r, sigma, jacobian: model.scale.jacobian(measurement), noise: model.noise })
    }

    fn residuals(&self, tables: &ProblemTables, simulations: &[Table]) -> Result<Vec<Residual>> {
        if simulations.len() != tables.measurements.len() {
            return Err(Error::Validation(format!(
                "{} simulation table(s) for {} measurement table(s)",
                simulations.len(),
                tables.measurements.len()
            )));
        }
        let mut out = Vec::new();
        for (i, (meas, sim)) in tables.measurements.iter().zip(simulations).enumerate() {
            if meas.n_rows() != sim.n_rows() {
                return Err(Error::Validation(format!(
                    "simulation table {i} has {} rows, measurement table has {}",
                    sim.n_rows(),
                    meas.n_rows()
                )));
            }
            let col = sim.require_column(SIMULATION)?;
            check_keys(i, meas, sim)?;
            for (row, sim_row) in sim.rows().iter().enumerate() {
                let s = sim_row[col].as_f64().ok_or_else(|| {
                    Error::Validation(format!("simulation table {i}, row {row}: non-numeric simulation"))
                })?;
                out.push(self.residual(meas, row, s)?);
            }
        }
        tracing::trace!(version = %self.version, n = out.len(), "residuals evaluated");
        Ok(out)
    }
}

/// Key columns shared by a measurement and its simulation table must agree.
fn check_keys(index: usize, meas: &Table, sim: &Table) -> Result<()> {
    const KEYS: [&str; 5] =
        [OBSERVABLE_ID, TIME, SIMULATION_CONDITION_ID, PREEQUILIBRATION_CONDITION_ID, EXPERIMENT_ID];
    for key in KEYS {
        if !(meas.has_column(key) && sim.has_column(key)) {
            continue;
        }
        for row in 0..meas.n_rows() {
            let (a, b) = (meas.cell(row, key), sim.cell(row, key));
            let same = match (a.and_then(Cell::as_f64), b.and_then(Cell::as_f64)) {
                (Some(x), Some(y)) => x == y || (x - y).abs() <= 1e-8 + 1e-5 * y.abs(),
                _ => a.map(Cell::to_key) == b.map(Cell::to_key),
            };
            if !same {
                return Err(Error::Validation(format!(
                    "simulation table {index}, row {row}: '{key}' does not match the measurement"
                )));
            }
        }
    }
    Ok(())
}

/// Sum of squared weighted residuals.
pub fn calculate_chi2(
    version: FormatVersion,
    tables: &ProblemTables,
    simulations: &[Table],
) -> Result<f64> {
    let residuals = Evaluator::new(version, tables)?.residuals(tables, simulations)?;
    Ok(residuals.iter().map(|r| r.r * r.r).sum())
}

/// Log-likelihood of the measurements given the simulations.
pub fn calculate_llh(
    version: FormatVersion,
    tables: &ProblemTables,
    simulations: &[Table],
) -> Result<f64> {
    let residuals = Evaluator::new(version, tables)?.residuals(tables, simulations)?;
    Ok(residuals.iter().map(Residual::llh).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_rows(
            columns.iter().copied(),
            rows.iter().map(|r| r.iter().map(|v| Cell::parse(v)).collect()).collect(),
        )
        .unwrap()
    }

    fn simulation(values: &[f64]) -> Table {
        Table::from_rows([SIMULATION], values.iter().map(|v| vec![Cell::Number(*v)]).collect())
            .unwrap()
    }

    fn problem(noise_formula: &str, distribution: &str, noise_params: &str) -> ProblemTables {
        ProblemTables {
            conditions: vec![table(&[CONDITION_ID, TARGET_ID, TARGET_VALUE], &[&["c0", "k1", "1"]])],
            observables: vec![table(
                &[OBSERVABLE_ID, OBSERVABLE_FORMULA, NOISE_FORMULA, NOISE_DISTRIBUTION],
                &[&["obs_a", "A", noise_formula, distribution]],
            )],
            measurements: vec![table(
                &[OBSERVABLE_ID, TIME, MEASUREMENT, NOISE_PARAMETERS],
                &[&["obs_a", "0", "1.0", noise_params], &["obs_a", "1", "2.0", noise_params]],
            )],
            experiments: Vec::new(),
            parameters: table(
                &[PARAMETER_ID, NOMINAL_VALUE, ESTIMATE],
                &[&["sd", "0.5", "false"]],
            ),
            mapping: None,
        }
    }

    #[test]
    fn normal_noise() {
        let p = problem("0.5", "normal", "");
        let sims = [simulation(&[1.5, 1.0])];
        // r = (1 - 1.5)/0.5 = -1, (2 - 1)/0.5 = 2
        assert_relative_eq!(calculate_chi2(FormatVersion::V2, &p, &sims).unwrap(), 5.0);
        let expected = 2.0 * (-0.5 * (2.0 * PI * 0.25).ln()) - 0.5 * 5.0;
        assert_relative_eq!(calculate_llh(FormatVersion::V2, &p, &sims).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn laplace_noise() {
        let p = problem("2", "laplace", "");
        let sims = [simulation(&[0.0, 0.0])];
        // |r| = 0.5, 1.0
        let expected = 2.0 * -(4.0f64).ln() - 1.5;
        assert_relative_eq!(calculate_llh(FormatVersion::V2, &p, &sims).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn log_normal_noise() {
        let p = problem("1", "log-normal", "");
        let sims = [simulation(&[1.0, 1.0])];
        // residuals on log scale: 0, ln 2; jacobian = measurement
        let r2 = 2f64.ln().powi(2);
        assert_relative_eq!(calculate_chi2(FormatVersion::V2, &p, &sims).unwrap(), r2, epsilon = 1e-12);
        let expected = -0.5 * (2.0 * PI).ln() - 0.5 * (2.0 * PI * 4.0).ln() - 0.5 * r2;
        assert_relative_eq!(calculate_llh(FormatVersion::V2, &p, &sims).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn noise_placeholders_from_overrides() {
        let numeric = problem("noiseParameter1_obs_a", "normal", "0.5");
        let by_name = problem("noiseParameter1_obs_a", "normal", "sd");
        let sims = [simulation(&[1.5, 1.0])];
        let a = calculate_chi2(FormatVersion::V2, &numeric, &sims).unwrap();
        let b = calculate_chi2(FormatVersion::V2, &by_name, &sims).unwrap();
        assert_relative_eq!(a, 5.0);
        assert_relative_eq!(a, b);
    }

    #[test]
    fn noise_formula_may_use_simulation() {
        // sigma = 0.5 * obs_a
        let p = problem("0.5 * obs_a", "normal", "");
        let sims = [simulation(&[2.0, 4.0])];
        // r = (1-2)/1 = -1, (2-4)/2 = -1
        assert_relative_eq!(calculate_chi2(FormatVersion::V2, &p, &sims).unwrap(), 2.0);
    }

    #[test]
    fn mapping_alias_resolves_to_parameter() {
        let mut p = problem("noiseParameter1_obs_a", "normal", "sigma");
        p.mapping = Some(table(&[PETAB_ENTITY_ID, MODEL_ENTITY_ID], &[&["sigma", "sd"]]));
        let sims = [simulation(&[1.5, 1.0])];
        assert_relative_eq!(calculate_chi2(FormatVersion::V2, &p, &sims).unwrap(), 5.0);
    }

    #[test]
    fn v1_observable_transformation() {
        let p = ProblemTables {
            conditions: vec![table(&[CONDITION_ID], &[&["c0"]])],
            observables: vec![table(
                &[OBSERVABLE_ID, OBSERVABLE_FORMULA, NOISE_FORMULA, OBSERVABLE_TRANSFORMATION],
                &[&["obs_a", "A", "1", "log10"]],
            )],
            measurements: vec![table(
                &[OBSERVABLE_ID, SIMULATION_CONDITION_ID, TIME, MEASUREMENT],
                &[&["obs_a", "c0", "0", "10"]],
            )],
            experiments: Vec::new(),
            parameters: Table::new([PARAMETER_ID]),
            mapping: None,
        };
        let sims = [simulation(&[100.0])];
        assert_relative_eq!(calculate_chi2(FormatVersion::V1, &p, &sims).unwrap(), 1.0, epsilon = 1e-12);
        let expected = -0.5 * (2.0 * PI * (10.0 * LN_10).powi(2)).ln() - 0.5;
        assert_relative_eq!(calculate_llh(FormatVersion::V1, &p, &sims).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn mismatched_simulation_shape() {
        let p = problem("1", "normal", "");
        assert!(calculate_chi2(FormatVersion::V2, &p, &[simulation(&[1.0])]).is_err());
        assert!(calculate_chi2(FormatVersion::V2, &p, &[]).is_err());
    }

    #[test]
    fn key_columns_must_agree() {
        let p = problem("1", "normal", "");
        let mut sim = table(&[OBSERVABLE_ID, TIME], &[&["obs_a", "0"], &["obs_a", "1"]]);
        sim.add_column(SIMULATION, vec![Cell::Number(1.0), Cell::Number(2.0)]).unwrap();
        assert_relative_eq!(calculate_chi2(FormatVersion::V2, &p, &[sim.clone()]).unwrap(), 0.0);

        let mut swapped = table(&[OBSERVABLE_ID, TIME], &[&["obs_a", "1"], &["obs_a", "0"]]);
        swapped.add_column(SIMULATION, vec![Cell::Number(2.0), Cell::Number(1.0)]).unwrap();
        assert!(calculate_chi2(FormatVersion::V2, &p, &[swapped]).is_err());
    }

    #[test]
    fn unresolved_noise_symbol() {
        let p = problem("unknown_sigma", "normal", "");
        let err = calculate_chi2(FormatVersion::V2, &p, &[simulation(&[1.0, 1.0])]).unwrap_err();
        assert!(matches!(err, Error::Computation(_)));
    }
}
