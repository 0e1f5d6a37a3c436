//! Driver: enumerates case directories and runs the materializer on each.

use std::path::{Path, PathBuf};
use std::process::Command;

use pt_core::{CaseId, Error, FormatVersion, LintIssue, ModelFormat, Result};
use pt_petab::{calculate_chi2, calculate_llh};
use serde::Serialize;

use crate::case::{CASE_FILE, TestCase};
use crate::config::{FailurePolicy, SuiteConfig};
use crate::materialize::Materializer;

/// Name of the per-case description and per-suite table of contents.
pub const README: &str = "README.md";

/// Coordinates of one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaseRef {
    pub version: FormatVersion,
    pub format: ModelFormat,
    pub id: CaseId,
}

/// A case that could not be generated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseFailure {
    #[serde(flatten)]
    pub case: CaseRef,
    pub error: String,
}

/// Outcome of [`Driver::create`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateReport {
    pub created: Vec<CaseRef>,
    pub failed: Vec<CaseFailure>,
}

impl CreateReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct Driver {
    materializer: Materializer,
}

impl Driver {
    pub fn new(config: SuiteConfig) -> Result<Self> {
        Ok(Self { materializer: Materializer::new(config)? })
    }

    pub fn from_materializer(materializer: Materializer) -> Self {
        Self { materializer }
    }

    pub fn config(&self) -> &SuiteConfig {
        self.materializer.config()
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    /// `cases/<version>/<format>`
    pub fn get_cases_dir(&self, version: FormatVersion, format: ModelFormat) -> PathBuf {
        self.config().format_dir(version, format)
    }

    /// Ids of the case directories for `(version, format)`, ascending.
    ///
    /// Only all-digit directory names count; a missing directory yields no
    /// cases. Names that are not a valid id (`0000`, out of range) are
    /// skipped with a warning.
    pub fn list_cases(&self, version: FormatVersion, format: ModelFormat) -> Result<Vec<CaseId>> {
        let dir = self.get_cases_dir(version, format);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
                names.push(name);
            }
        }
        names.sort();
        let ids = names
            .iter()
            .filter_map(|name| match name.parse::<CaseId>() {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(%version, %format, dir = %name, "skipping case directory: {e}");
                    None
                }
            })
            .collect();
        Ok(ids)
    }

    /// Load a case definition; its `id` must match the directory name.
    pub fn load_case(
        &self,
        version: FormatVersion,
        format: ModelFormat,
        id: CaseId,
    ) -> Result<TestCase> {
        let dir = self.materializer.case_dir(id, format, version);
        let case = TestCase::load(&dir)?;
        if case.id != id {
            return Err(Error::Validation(format!(
                "{}: case id {} does not match directory {id}",
                dir.join(CASE_FILE).display(),
                case.id
            )));
        }
        Ok(case)
    }

    /// Validate and write one case: README, problem, solution.
    pub fn create_case(
        &self,
        version: FormatVersion,
        format: ModelFormat,
        id: CaseId,
    ) -> Result<TestCase> {
        let case = self.load_case(version, format, id)?;
        tracing::info!(%version, %format, case = %id, "writing case");

        let issues = case.validate(version, format);
        for issue in &issues {
            if issue.is_error() {
                tracing::error!(case = %id, "{issue}");
            } else {
                tracing::warn!(case = %id, "{issue}");
            }
        }
        if issues.iter().any(LintIssue::is_error) {
            return Err(Error::Lint {
                path: self.materializer.case_dir(id, format, version).join(CASE_FILE),
                issues: issues.into_iter().filter(LintIssue::is_error).collect(),
            });
        }

        self.materializer.write_info(&case, format, version)?;
        self.materializer.write_problem(&case, format, version)?;

        let chi2 = match case.chi2 {
            Some(v) => v,
            None => calculate_chi2(version, &case.tables, &case.simulations)?,
        };
        let llh = match case.llh {
            Some(v) => v,
            None => calculate_llh(version, &case.tables, &case.simulations)?,
        };
        self.materializer.write_solution(&case, format, version, chi2, llh)?;
        Ok(case)
    }

    /// Generate every configured `(version, format)` suite.
    ///
    /// Under [`FailurePolicy::Isolate`] failing cases are recorded and left
    /// out of the table of contents; under [`FailurePolicy::Abort`] the first
    /// failure is returned and the current table of contents is not written.
    pub fn create(&self) -> Result<CreateReport> {
        let mut report = CreateReport::default();
        for &version in &self.config().versions {
            for &format in &self.config().formats {
                let ids = self.list_cases(version, format)?;
                if ids.is_empty() {
                    continue;
                }
                let mut toc = String::new();
                for id in ids {
                    let case_ref = CaseRef { version, format, id };
                    match self.create_case(version, format, id) {
                        Ok(case) => {
                            toc.push_str(&format!("# [{id}]({id}/)\n\n{}\n\n", case.brief));
                            report.created.push(case_ref);
                        }
                        Err(e) => match self.config().failure_policy {
                            FailurePolicy::Abort => return Err(e),
                            FailurePolicy::Isolate => {
                                tracing::warn!(%version, %format, case = %id, "case failed: {e}");
                                report.failed.push(CaseFailure { case: case_ref, error: e.to_string() });
                            }
                        },
                    }
                }
                std::fs::write(self.get_cases_dir(version, format).join(README), toc)?;
            }
        }
        tracing::info!(
            created = report.created.len(),
            failed = report.failed.len(),
            "case generation finished"
        );
        Ok(report)
    }

    /// Delete generated (`_`-prefixed) files from every case directory.
    ///
    /// Returns the number of files removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for &version in &self.config().versions {
            for &format in &self.config().formats {
                for id in self.list_cases(version, format)? {
                    removed += clear_dir(&self.materializer.case_dir(id, format, version))?;
                }
            }
        }
        tracing::info!(removed, "generated files cleared");
        Ok(removed)
    }

    /// Whether the generated fixtures match what git has committed.
    pub fn check_up_to_date(&self) -> Result<bool> {
        git_unchanged(&self.config().cases_dir)
    }
}

fn clear_dir(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && entry.file_name().to_string_lossy().starts_with('_') {
            std::fs::remove_file(entry.path())?;
            tracing::debug!(path = %entry.path().display(), "removed");
            removed += 1;
        }
    }
    Ok(removed)
}

/// `git diff --quiet -- <path>`: exit 0 is clean, 1 is dirty.
fn git_unchanged(path: &Path) -> Result<bool> {
    let status = Command::new("git").args(["diff", "--quiet", "--"]).arg(path).status()?;
    match status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(Error::Computation(format!("git diff failed ({status}) for {}", path.display()))),
    }
}
