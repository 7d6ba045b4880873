//! Error taxonomy for the pocket analysis pipeline.
//!
//! Local computational failures (one pocket's shape, one ligand lookup) are never
//! represented here: they degrade to `None` in the affected row.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PocketError {
    /// Bad chain id, invalid ligand code, mutually exclusive options both set.
    #[error("Configuration error: {message}\n{hint}")]
    Configuration { message: String, hint: String },

    /// Input that could not be parsed (after the one documented repair attempt).
    #[error("Malformed input {}: {message}", path.display())]
    MalformedInput { path: PathBuf, message: String },

    /// A required pocket-finder output or structure file is missing or unreadable.
    #[error("Unable to access/find a valid {kind} file: {}\n{hint}", path.display())]
    MissingFile {
        kind: String,
        path: PathBuf,
        hint: String,
    },

    /// The model count of a multi-state structure cannot be determined.
    #[error("Unable to perform multistate analysis: {}: {message}", path.display())]
    StateDiscovery { path: PathBuf, message: String },

    /// The external pocket finder could not be run or failed.
    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl PocketError {
    pub fn config(message: impl Into<String>, hint: impl Into<String>) -> Self {
        PocketError::Configuration {
            message: message.into(),
            hint: hint.into(),
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PocketError::MalformedInput {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn missing(kind: impl Into<String>, path: impl Into<PathBuf>, hint: impl Into<String>) -> Self {
        PocketError::MissingFile {
            kind: kind.into(),
            path: path.into(),
            hint: hint.into(),
        }
    }

    pub fn state_discovery(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PocketError::StateDiscovery {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        PocketError::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// True when the error came from caller-supplied options rather than input files.
    pub fn is_configuration(&self) -> bool {
        matches!(self, PocketError::Configuration { .. })
    }
}

pub type PocketResult<T> = Result<T, PocketError>;
