//! Case Materializer: projects a [`TestCase`] onto the on-disk layout.
//!
//! ```text
//! cases/<version>/<format>/<id>/
//!   _model.<ext>  _parameters.tsv  _conditions[n].tsv  _observables[n].tsv
//!   _measurements[n].tsv  _experiments[n].tsv  _mapping.tsv
//!   _<id>.yaml  _<id>_solution.yaml  _simulations[n].tsv  README.md
//! ```

use std::path::{Path, PathBuf};

use pt_core::{CaseId, Error, FormatVersion, LintIssue, ModelFormat, ProblemLinter, Result};
use pt_petab::{BuiltinLinter, CommandLinter, ModelFile, ProblemFiles, ProblemManifest, Table};
use serde::{Deserialize, Serialize};

use crate::case::{ModelSource, TestCase};
use crate::config::SuiteConfig;

/// Default absolute tolerance for simulations, chi2 and llh.
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

/// Significant digits kept for chi2/llh in solution manifests.
const SOLUTION_DIGITS: usize = 14;

/// `_<group><index>.tsv`, where the index is omitted when `count == 1`.
pub fn table_file_name(group: &str, index: usize, count: usize) -> String {
    numbered_file_name(group, index, count, ".tsv")
}

fn numbered_file_name(stem: &str, index: usize, count: usize, ext: &str) -> String {
    if count == 1 { format!("_{stem}{ext}") } else { format!("_{stem}{index}{ext}") }
}

/// `_0001.yaml`
pub fn problem_yaml_name(id: CaseId) -> String {
    format!("_{id}.yaml")
}

/// `_0001_solution.yaml`
pub fn solution_yaml_name(id: CaseId) -> String {
    format!("_{id}_solution.yaml")
}

/// Round to `digits` significant digits.
pub fn round_significant(x: f64, digits: usize) -> f64 {
    if !x.is_finite() || x == 0.0 || digits == 0 {
        return x;
    }
    format!("{:.*e}", digits - 1, x).parse().unwrap_or(x)
}

/// Expected-outputs manifest, keys in file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionManifest {
    pub chi2: Option<f64>,
    pub llh: Option<f64>,
    pub simulation_files: Vec<String>,
    #[serde(default = "default_tolerance")]
    pub tol_chi2: f64,
    #[serde(default = "default_tolerance")]
    pub tol_llh: f64,
    #[serde(default = "default_tolerance")]
    pub tol_simulations: f64,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

/// A solution manifest with its simulation tables loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub chi2: Option<f64>,
    pub llh: Option<f64>,
    pub simulations: Vec<Table>,
    pub tol_chi2: f64,
    pub tol_llh: f64,
    pub tol_simulations: f64,
}

impl Solution {
    /// Read a solution manifest and the tables it lists (relative to it).
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display())))
        })?;
        let manifest: SolutionManifest = serde_yaml_ng::from_slice(&bytes)?;
        let base = path.parent().unwrap_or(Path::new(""));
        let simulations = manifest
            .simulation_files
            .iter()
            .map(|f| Table::read_tsv(&base.join(f)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            chi2: manifest.chi2,
            llh: manifest.llh,
            simulations,
            tol_chi2: manifest.tol_chi2,
            tol_llh: manifest.tol_llh,
            tol_simulations: manifest.tol_simulations,
        })
    }
}

/// Writes cases to disk and validates what it wrote.
pub struct Materializer {
    config: SuiteConfig,
    linters: Vec<Box<dyn ProblemLinter>>,
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.linters.iter().map(|l| l.name()).collect();
        f.debug_struct("Materializer").field("config", &self.config).field("linters", &names).finish()
    }
}

impl Materializer {
    /// Built-in linter, plus the configured external command if any.
    pub fn new(config: SuiteConfig) -> Result<Self> {
        let mut linters: Vec<Box<dyn ProblemLinter>> = vec![Box::new(BuiltinLinter)];
        if let Some(argv) = &config.linter_command {
            linters.push(Box::new(CommandLinter::from_argv(argv)?));
        }
        Ok(Self { config, linters })
    }

    pub fn with_linters(config: SuiteConfig, linters: Vec<Box<dyn ProblemLinter>>) -> Self {
        Self { config, linters }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// `cases/<version>/<format>/<id>`, without creating it.
    pub fn case_dir(&self, id: CaseId, format: ModelFormat, version: FormatVersion) -> PathBuf {
        self.config.format_dir(version, format).join(id.to_string())
    }

    fn ensure_case_dir(&self, id: CaseId, format: ModelFormat, version: FormatVersion) -> Result<PathBuf> {
        let dir = self.case_dir(id, format, version);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Write `case`'s model, tables and problem manifest, then lint them.
    ///
    /// Any lint error is fatal; files already written stay on disk.
    pub fn write_problem(
        &self,
        case: &TestCase,
        format: ModelFormat,
        version: FormatVersion,
    ) -> Result<PathBuf> {
        let dir = self.ensure_case_dir(case.id, format, version)?;

        let model_name = numbered_file_name("model", 0, 1, format.extension());
        self.copy_model(&case.model, format, &dir.join(&model_name))?;

        let tables = &case.tables;
        let parameter_file = "_parameters.tsv".to_string();
        tables.parameters.write_tsv(&dir.join(&parameter_file))?;

        let mapping_files = match &tables.mapping {
            Some(mapping) => write_group(&dir, "mapping", std::slice::from_ref(mapping))?,
            None => Vec::new(),
        };

        let files = ProblemFiles {
            models: vec![ModelFile { id: "model_0".to_string(), language: format, location: model_name }],
            parameter_file,
            condition_files: write_group(&dir, "conditions", &tables.conditions)?,
            observable_files: write_group(&dir, "observables", &tables.observables)?,
            measurement_files: write_group(&dir, "measurements", &tables.measurements)?,
            experiment_files: write_group(&dir, "experiments", &tables.experiments)?,
            mapping_files,
        };

        let manifest_path = dir.join(problem_yaml_name(case.id));
        ProblemManifest::from_files(version, &files)?.write(&manifest_path)?;
        tracing::debug!(path = %manifest_path.display(), "problem manifest written");

        self.lint(&manifest_path)?;
        Ok(manifest_path)
    }

    fn copy_model(&self, source: &ModelSource, format: ModelFormat, dest: &Path) -> Result<()> {
        let src = match source {
            ModelSource::Inline(text) => {
                std::fs::write(dest, text)?;
                return Ok(());
            }
            ModelSource::Default => self.config.default_model(format),
            ModelSource::Path(p) => p.clone(),
        };
        if let (Ok(a), Ok(b)) = (src.canonicalize(), dest.canonicalize())
            && a == b
        {
            return Ok(());
        }
        std::fs::copy(&src, dest).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("model {}: {e}", src.display())))
        })?;
        Ok(())
    }

    fn lint(&self, manifest: &Path) -> Result<()> {
        let mut issues: Vec<LintIssue> = Vec::new();
        for linter in &self.linters {
            let found = linter.lint(manifest)?;
            for issue in &found {
                if issue.is_error() {
                    tracing::error!(linter = linter.name(), "{issue}");
                } else {
                    tracing::warn!(linter = linter.name(), "{issue}");
                }
            }
            issues.extend(found);
        }
        if issues.iter().any(LintIssue::is_error) {
            issues.retain(LintIssue::is_error);
            return Err(Error::Lint { path: manifest.to_path_buf(), issues });
        }
        Ok(())
    }

    /// Write the simulation tables and the solution manifest.
    ///
    /// chi2 and llh are rounded to 14 significant digits.
    pub fn write_solution(
        &self,
        case: &TestCase,
        format: ModelFormat,
        version: FormatVersion,
        chi2: f64,
        llh: f64,
    ) -> Result<PathBuf> {
        let dir = self.ensure_case_dir(case.id, format, version)?;
        let manifest = SolutionManifest {
            chi2: Some(round_significant(chi2, SOLUTION_DIGITS)),
            llh: Some(round_significant(llh, SOLUTION_DIGITS)),
            simulation_files: write_group(&dir, "simulations", &case.simulations)?,
            tol_chi2: DEFAULT_TOLERANCE,
            tol_llh: DEFAULT_TOLERANCE,
            tol_simulations: DEFAULT_TOLERANCE,
        };
        let path = dir.join(solution_yaml_name(case.id));
        std::fs::write(&path, serde_yaml_ng::to_string(&manifest)?)?;
        Ok(path)
    }

    /// Load the reference solution of a case.
    pub fn load_solution(
        &self,
        id: CaseId,
        format: ModelFormat,
        version: FormatVersion,
    ) -> Result<Solution> {
        Solution::read(&self.case_dir(id, format, version).join(solution_yaml_name(id)))
    }

    /// Write the case's `README.md`.
    pub fn write_info(&self, case: &TestCase, format: ModelFormat, version: FormatVersion) -> Result<()> {
        let dir = self.ensure_case_dir(case.id, format, version)?;
        let text = format!("# PEtab test case {}\n\n{}\n", case.id, case.description.trim_end());
        std::fs::write(dir.join("README.md"), text)?;
        Ok(())
    }
}

fn write_group(dir: &Path, group: &str, tables: &[Table]) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(tables.len());
    for (idx, table) in tables.iter().enumerate() {
        let name = table_file_name(group, idx, tables.len());
        table.write_tsv(&dir.join(&name))?;
        names.push(name);
    }
    Ok(names)
}
