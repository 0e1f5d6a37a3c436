//! PEtab problem manifests (the problem YAML file).
//!
//! The two major versions describe models differently: v1 lists SBML files,
//! v2 maps model ids to a language and location. [`ProblemManifest`] is a
//! closed union over both shapes; callers pick the shape once and use
//! [`ProblemManifest::files`] for a version-independent view.
//!
//! Struct fields are declared in alphabetical order so written manifests
//! keep a stable key order.

use std::collections::BTreeMap;
use std::path::Path;

use pt_core::{Error, FormatVersion, ModelFormat, Result};
use serde::{Deserialize, Serialize};

/// `format_version` written into v2 manifests.
pub const FORMAT_VERSION_V2: &str = "2.0.0";

/// PEtab v1 manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemManifestV1 {
    pub format_version: u32,
    pub parameter_file: String,
    pub problems: Vec<ProblemFilesV1>,
}

/// File lists of one v1 problem block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemFilesV1 {
    #[serde(default)]
    pub condition_files: Vec<String>,
    #[serde(default)]
    pub measurement_files: Vec<String>,
    #[serde(default)]
    pub observable_files: Vec<String>,
    pub sbml_files: Vec<String>,
}

/// PEtab v2 manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemManifestV2 {
    pub format_version: String,
    pub parameter_file: String,
    pub problems: Vec<ProblemFilesV2>,
}

/// File lists of one v2 problem block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemFilesV2 {
    #[serde(default)]
    pub condition_files: Vec<String>,
    #[serde(default)]
    pub experiment_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapping_files: Vec<String>,
    #[serde(default)]
    pub measurement_files: Vec<String>,
    pub model_files: BTreeMap<String, ModelFileV2>,
    #[serde(default)]
    pub observable_files: Vec<String>,
}

/// Model entry of a v2 manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFileV2 {
    pub language: String,
    pub location: String,
}

/// A model file named by a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFile {
    /// Model id (`model_0`, ... for v2; synthesized for v1)
    pub id: String,
    pub language: ModelFormat,
    /// Location relative to the manifest directory
    pub location: String,
}

/// Version-independent view of the files a manifest references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProblemFiles {
    pub models: Vec<ModelFile>,
    pub parameter_file: String,
    pub condition_files: Vec<String>,
    pub observable_files: Vec<String>,
    pub measurement_files: Vec<String>,
    pub experiment_files: Vec<String>,
    pub mapping_files: Vec<String>,
}

/// A problem manifest of either supported shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ProblemManifest {
    V1(ProblemManifestV1),
    V2(ProblemManifestV2),
}

impl ProblemManifest {
    /// Build the manifest shape for `version` from a file listing.
    pub fn from_files(version: FormatVersion, files: &ProblemFiles) -> Result<Self> {
        match version {
            FormatVersion::V1 => {
                if !files.experiment_files.is_empty() || !files.mapping_files.is_empty() {
                    return Err(Error::Validation(
                        "PEtab v1 has no experiment or mapping tables".to_string(),
                    ));
                }
                let mut sbml_files = Vec::with_capacity(files.models.len());
                for m in &files.models {
                    if m.language != ModelFormat::Sbml {
                        return Err(Error::Validation(format!(
                            "PEtab v1 supports only SBML models, got {}",
                            m.language
                        )));
                    }
                    sbml_files.push(m.location.clone());
                }
                Ok(ProblemManifest::V1(ProblemManifestV1 {
                    format_version: 1,
                    parameter_file: files.parameter_file.clone(),
                    problems: vec![ProblemFilesV1 {
                        condition_files: files.condition_files.clone(),
                        measurement_files: files.measurement_files.clone(),
                        observable_files: files.observable_files.clone(),
                        sbml_files,
                    }],
                }))
            }
            FormatVersion::V2 => {
                let model_files = files
                    .models
                    .iter()
                    .map(|m| {
                        (
                            m.id.clone(),
                            ModelFileV2 {
                                language: m.language.as_str().to_string(),
                                location: m.location.clone(),
                            },
                        )
                    })
                    .collect();
                Ok(ProblemManifest::V2(ProblemManifestV2 {
                    format_version: FORMAT_VERSION_V2.to_string(),
                    parameter_file: files.parameter_file.clone(),
                    problems: vec![ProblemFilesV2 {
                        condition_files: files.condition_files.clone(),
                        experiment_files: files.experiment_files.clone(),
                        mapping_files: files.mapping_files.clone(),
                        measurement_files: files.measurement_files.clone(),
                        model_files,
                        observable_files: files.observable_files.clone(),
                    }],
                }))
            }
        }
    }

    pub fn version(&self) -> FormatVersion {
        match self {
            ProblemManifest::V1(_) => FormatVersion::V1,
            ProblemManifest::V2(_) => FormatVersion::V2,
        }
    }

    /// Number of problem blocks (PEtab allows exactly one).
    pub fn n_problems(&self) -> usize {
        match self {
            ProblemManifest::V1(m) => m.problems.len(),
            ProblemManifest::V2(m) => m.problems.len(),
        }
    }

    /// Files of the first problem block.
    pub fn files(&self) -> Result<ProblemFiles> {
        match self {
            ProblemManifest::V1(m) => {
                let p = m
                    .problems
                    .first()
                    .ok_or_else(|| Error::Validation("manifest lists no problems".to_string()))?;
                Ok(ProblemFiles {
                    models: p
                        .sbml_files
                        .iter()
                        .enumerate()
                        .map(|(i, f)| ModelFile {
                            id: format!("model_{i}"),
                            language: ModelFormat::Sbml,
                            location: f.clone(),
                        })
                        .collect(),
                    parameter_file: m.parameter_file.clone(),
                    condition_files: p.condition_files.clone(),
                    observable_files: p.observable_files.clone(),
                    measurement_files: p.measurement_files.clone(),
                    experiment_files: Vec::new(),
                    mapping_files: Vec::new(),
                })
            }
            ProblemManifest::V2(m) => {
                let p = m
                    .problems
                    .first()
                    .ok_or_else(|| Error::Validation("manifest lists no problems".to_string()))?;
                let mut models = Vec::with_capacity(p.model_files.len());
                for (id, entry) in &p.model_files {
                    models.push(ModelFile {
                        id: id.clone(),
                        language: entry.language.parse()?,
                        location: entry.location.clone(),
                    });
                }
                Ok(ProblemFiles {
                    models,
                    parameter_file: m.parameter_file.clone(),
                    condition_files: p.condition_files.clone(),
                    observable_files: p.observable_files.clone(),
                    measurement_files: p.measurement_files.clone(),
                    experiment_files: p.experiment_files.clone(),
                    mapping_files: p.mapping_files.clone(),
                })
            }
        }
    }

    /// Read a manifest, choosing the shape from its `format_version`.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_yaml_slice(&bytes)
    }

    pub fn from_yaml_slice(bytes: &[u8]) -> Result<Self> {
        let probe: serde_yaml_ng::Value = serde_yaml_ng::from_slice(bytes)?;
        let raw_version = match probe.get("format_version") {
            Some(serde_yaml_ng::Value::Number(n)) => n.to_string(),
            Some(serde_yaml_ng::Value::String(s)) => s.clone(),
            _ => {
                return Err(Error::Validation(
                    "manifest has no usable format_version".to_string(),
                ));
            }
        };
        match raw_version.parse::<FormatVersion>()? {
            FormatVersion::V1 => Ok(ProblemManifest::V1(serde_yaml_ng::from_slice(bytes)?)),
            FormatVersion::V2 => Ok(ProblemManifest::V2(serde_yaml_ng::from_slice(bytes)?)),
        }
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(match self {
            ProblemManifest::V1(m) => serde_yaml_ng::to_string(m)?,
            ProblemManifest::V2(m) => serde_yaml_ng::to_string(m)?,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_yaml_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(language: ModelFormat) -> ProblemFiles {
        ProblemFiles {
            models: vec![ModelFile {
                id: "model_0".to_string(),
                language,
                location: format!("_model{}", language.extension()),
            }],
            parameter_file: "_parameters.tsv".to_string(),
            condition_files: vec!["_conditions.tsv".to_string()],
            observable_files: vec!["_observables.tsv".to_string()],
            measurement_files: vec!["_measurements.tsv".to_string()],
            experiment_files: Vec::new(),
            mapping_files: Vec::new(),
        }
    }

    #[test]
    fn test_v1_shape() {
        let m = ProblemManifest::from_files(FormatVersion::V1, &listing(ModelFormat::Sbml)).unwrap();
        let yaml = m.to_yaml_string().unwrap();
        assert!(yaml.starts_with("format_version: 1\n"));
        assert!(yaml.contains("sbml_files:"));
        assert!(yaml.contains("_model.xml"));
        assert!(!yaml.contains("model_files"));

        let back = ProblemManifest::from_yaml_slice(yaml.as_bytes()).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_v1_rejects_pysb() {
        assert!(ProblemManifest::from_files(FormatVersion::V1, &listing(ModelFormat::Pysb)).is_err());
    }

    #[test]
    fn test_v2_shape() {
        let mut files = listing(ModelFormat::Pysb);
        files.mapping_files = vec!["_mapping.tsv".to_string()];
        let m = ProblemManifest::from_files(FormatVersion::V2, &files).unwrap();
        let yaml = m.to_yaml_string().unwrap();
        assert!(yaml.contains("format_version:"));
        assert!(yaml.contains("2.0.0"));
        assert!(yaml.contains("language: pysb"));
        assert!(yaml.contains("location: _model.py"));
        assert!(yaml.contains("experiment_files: []"));

        let back = ProblemManifest::from_yaml_slice(yaml.as_bytes()).unwrap();
        assert_eq!(back.version(), FormatVersion::V2);
        let files_back = back.files().unwrap();
        assert_eq!(files_back.models[0].language, ModelFormat::Pysb);
        assert_eq!(files_back.mapping_files, vec!["_mapping.tsv"]);
    }

    #[test]
    fn test_v2_omits_empty_mapping() {
        let m = ProblemManifest::from_files(FormatVersion::V2, &listing(ModelFormat::Sbml)).unwrap();
        assert!(!m.to_yaml_string().unwrap().contains("mapping_files"));
    }

    #[test]
    fn test_missing_version_rejected() {
        let err = ProblemManifest::from_yaml_slice(b"parameter_file: p.tsv\n").unwrap_err();
        assert!(err.to_string().contains("format_version"));
    }
}
