//! Common data types for the PEtab conformance suite

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Model description format of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// SBML (XML)
    Sbml,
    /// PySB (Python module)
    Pysb,
}

impl ModelFormat {
    /// All supported formats, in generation order.
    pub const ALL: [ModelFormat; 2] = [ModelFormat::Sbml, ModelFormat::Pysb];

    /// Directory name and manifest `language` tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::Sbml => "sbml",
            ModelFormat::Pysb => "pysb",
        }
    }

    /// File extension (with the dot) of a copied model file.
    pub fn extension(&self) -> &'static str {
        match self {
            ModelFormat::Sbml => ".xml",
            ModelFormat::Pysb => ".py",
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sbml" => Ok(ModelFormat::Sbml),
            "pysb" => Ok(ModelFormat::Pysb),
            other => Err(Error::Validation(format!("unknown model format '{other}'"))),
        }
    }
}

/// PEtab major version a test case is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FormatVersion {
    /// PEtab 1.0.0
    #[serde(rename = "v1.0.0")]
    V1,
    /// PEtab 2.0.0
    #[serde(rename = "v2.0.0")]
    V2,
}

impl FormatVersion {
    /// All supported versions, in generation order.
    pub const ALL: [FormatVersion; 2] = [FormatVersion::V1, FormatVersion::V2];

    /// Directory name, e.g. `v1.0.0`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            FormatVersion::V1 => "v1.0.0",
            FormatVersion::V2 => "v2.0.0",
        }
    }

    /// Major version number.
    pub fn major(&self) -> u32 {
        match self {
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for FormatVersion {
    type Err = Error;

    /// Accepts `v1.0.0`, `1.0.0`, `1`, `v1` (and the same for 2).
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('v');
        match trimmed.split('.').next() {
            Some("1") => Ok(FormatVersion::V1),
            Some("2") => Ok(FormatVersion::V2),
            _ => Err(Error::Validation(format!("unsupported PEtab version '{s}'"))),
        }
    }
}

/// Test case identifier, unique within a (format, version) namespace.
///
/// Displays zero-padded to four digits; directory iteration order and file
/// names depend on that padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(u32);

impl CaseId {
    /// Create a case id. Ids are positive.
    pub fn new(id: u32) -> Result<Self> {
        if id == 0 {
            return Err(Error::Validation("case id must be positive".to_string()));
        }
        Ok(Self(id))
    }

    /// Numeric value.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0>4}", self.0)
    }
}

impl FromStr for CaseId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id: u32 = s
            .trim()
            .parse()
            .map_err(|_| Error::Validation(format!("invalid case id '{s}'")))?;
        CaseId::new(id)
    }
}

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintLevel {
    /// Problem is not a valid instance of the format
    Error,
    /// Suspicious but accepted
    Warning,
}

/// One finding of a problem linter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintIssue {
    /// Severity
    pub level: LintLevel,
    /// Human-readable message
    pub message: String,
}

impl LintIssue {
    /// Error-level issue
    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LintLevel::Error, message: message.into() }
    }

    /// Warning-level issue
    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LintLevel::Warning, message: message.into() }
    }

    /// Whether this issue invalidates the problem.
    pub fn is_error(&self) -> bool {
        self.level == LintLevel::Error
    }
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            LintLevel::Error => "error",
            LintLevel::Warning => "warning",
        };
        write!(f, "[{level}] {}", self.message)
    }
}
