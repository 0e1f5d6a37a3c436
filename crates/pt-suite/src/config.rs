//! Suite configuration.

use std::path::{Path, PathBuf};

use pt_core::{FormatVersion, ModelFormat, Result};
use serde::{Deserialize, Serialize};

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "petabtests.yaml";

/// What the driver does when one case fails to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure, skip the case, keep going; the run fails at the end.
    #[default]
    Isolate,
    /// Stop at the first failing case.
    Abort,
}

/// Paths and selections shared by the materializer and the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfig {
    /// Root of the `cases/<version>/<format>/<id>/` tree.
    #[serde(default = "default_cases_dir")]
    pub cases_dir: PathBuf,

    /// Directory holding the default models (`conversion_reaction.<ext>`).
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    #[serde(default = "default_formats")]
    pub formats: Vec<ModelFormat>,

    #[serde(default = "default_versions")]
    pub versions: Vec<FormatVersion>,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// External validator argv; the manifest path is appended.
    #[serde(default)]
    pub linter_command: Option<Vec<String>>,
}

fn default_cases_dir() -> PathBuf {
    PathBuf::from("cases")
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_formats() -> Vec<ModelFormat> {
    ModelFormat::ALL.to_vec()
}

fn default_versions() -> Vec<FormatVersion> {
    FormatVersion::ALL.to_vec()
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            cases_dir: default_cases_dir(),
            models_dir: default_models_dir(),
            formats: default_formats(),
            versions: default_versions(),
            failure_policy: FailurePolicy::default(),
            linter_command: None,
        }
    }
}

impl SuiteConfig {
    /// Read a YAML config; relative paths resolve against its directory.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut cfg: SuiteConfig = serde_yaml_ng::from_slice(&bytes)?;
        if let Some(base) = path.parent() {
            cfg.cases_dir = base.join(&cfg.cases_dir);
            cfg.models_dir = base.join(&cfg.models_dir);
        }
        tracing::debug!(path = %path.display(), "loaded suite config");
        Ok(cfg)
    }

    /// `path` if given, else [`DEFAULT_CONFIG_FILE`] if it exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_path(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() { Self::from_path(default) } else { Ok(Self::default()) }
            }
        }
    }

    /// Default model file for `format`.
    pub fn default_model(&self, format: ModelFormat) -> PathBuf {
        self.models_dir.join(format!("conversion_reaction{}", format.extension()))
    }

    /// `cases/<version>/<format>`
    pub fn format_dir(&self, version: FormatVersion, format: ModelFormat) -> PathBuf {
        self.cases_dir.join(version.dir_name()).join(format.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SuiteConfig::default();
        assert_eq!(cfg.cases_dir, PathBuf::from("cases"));
        assert_eq!(cfg.failure_policy, FailurePolicy::Isolate);
        assert_eq!(cfg.formats, vec![ModelFormat::Sbml, ModelFormat::Pysb]);
        assert_eq!(
            cfg.format_dir(FormatVersion::V2, ModelFormat::Pysb),
            PathBuf::from("cases/v2.0.0/pysb")
        );
        assert_eq!(cfg.default_model(ModelFormat::Sbml), PathBuf::from("models/conversion_reaction.xml"));
    }

    #[test]
    fn partial_yaml() {
        let cfg: SuiteConfig = serde_yaml_ng::from_str(
            "versions: [v2.0.0]\nfailure_policy: abort\nlinter_command: [petablint, -v]\n",
        )
        .unwrap();
        assert_eq!(cfg.versions, vec![FormatVersion::V2]);
        assert_eq!(cfg.failure_policy, FailurePolicy::Abort);
        assert_eq!(cfg.formats.len(), 2);
        assert_eq!(cfg.linter_command.as_deref().map(<[String]>::len), Some(2));
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(serde_yaml_ng::from_str::<SuiteConfig>("case_dir: x\n").is_err());
    }
}
