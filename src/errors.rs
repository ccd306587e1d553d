//! Error types for lingrules.
//!
//! Load-time problems (unreadable or malformed rule files, bad parameters)
//! are errors. Run-time ambiguity gaps (no parse, no match, no applicable
//! constraint) are not: they surface through the data instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostics::LoadReport;

/// Result type for lingrules operations.
pub type Result<T> = std::result::Result<T, LingError>;

/// Error type for lingrules operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LingError {
    /// A rule or data file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rule file was read but rejected. The report lists every finding.
    #[error("{origin}: {report}")]
    Config { origin: String, report: LoadReport },

    /// A regular expression in a rule file or configuration does not compile.
    #[error("invalid regular expression in {origin}: {source}")]
    Regex {
        origin: String,
        #[source]
        source: regex::Error,
    },

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Runtime parameters out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input that violates an engine precondition.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl LingError {
    /// Create an I/O error for the given path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a regex error.
    #[must_use]
    pub fn regex(origin: impl Into<String>, source: regex::Error) -> Self {
        Self::Regex {
            origin: origin.into(),
            source,
        }
    }

    /// The diagnostic report, if this error came from a rejected rule file.
    pub fn report(&self) -> Option<&LoadReport> {
        match self {
            Self::Config { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Read a whole rule file, mapping failures to [`LingError::Io`].
pub(crate) fn read_to_string(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| LingError::io(path, e))
}
