//! A PEtab problem: the manifest plus every table it references.

use std::path::{Path, PathBuf};

use pt_core::{FormatVersion, Result};

use crate::manifest::{ModelFile, ProblemManifest};
use crate::table::Table;

/// The tabular part of a problem, one list per table group.
///
/// Every group is an ordered sequence of tables, possibly of length one
/// (or zero for optional groups).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProblemTables {
    pub conditions: Vec<Table>,
    pub observables: Vec<Table>,
    pub measurements: Vec<Table>,
    /// v2 only
    pub experiments: Vec<Table>,
    pub parameters: Table,
    /// v2 only
    pub mapping: Option<Table>,
}

/// A problem loaded back from its manifest.
#[derive(Debug, Clone)]
pub struct Problem {
    pub version: FormatVersion,
    /// Directory the manifest's relative paths resolve against
    pub base_dir: PathBuf,
    pub models: Vec<ModelFile>,
    pub tables: ProblemTables,
}

impl Problem {
    /// Load the manifest at `path` and every table it lists.
    pub fn from_manifest(path: &Path) -> Result<Self> {
        let manifest = ProblemManifest::read(path)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let files = manifest.files()?;

        let read_all = |names: &[String]| -> Result<Vec<Table>> {
            names.iter().map(|n| Table::read_tsv(&base_dir.join(n))).collect()
        };

        let mapping = match files.mapping_files.as_slice() {
            [] => None,
            names => {
                let mut tables = read_all(names)?;
                let mut merged = tables.remove(0);
                for t in tables {
                    for row in t.rows() {
                        merged.push_row(row.clone())?;
                    }
                }
                Some(merged)
            }
        };

        let tables = ProblemTables {
            conditions: read_all(&files.condition_files)?,
            observables: read_all(&files.observable_files)?,
            measurements: read_all(&files.measurement_files)?,
            experiments: read_all(&files.experiment_files)?,
            parameters: Table::read_tsv(&base_dir.join(&files.parameter_file))?,
            mapping,
        };

        tracing::debug!(
            path = %path.display(),
            version = %manifest.version(),
            measurement_tables = tables.measurements.len(),
            "problem loaded"
        );

        Ok(Self { version: manifest.version(), base_dir, models: files.models, tables })
    }

    /// Absolute path of a model file.
    pub fn model_path(&self, model: &ModelFile) -> PathBuf {
        self.base_dir.join(&model.location)
    }
}
