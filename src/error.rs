//! Error types for codevault
//!
//! Component operations return [`Result`] rather than panicking. The
//! ingestion pipeline collects per-file failures into its report, so only
//! store-wide failures escape a batch.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::types::ParseDiagnostic;

/// Main error type for codevault operations
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {}", .path.display(), summarize(.diagnostics))]
    Parse {
        path: PathBuf,
        diagnostics: Vec<ParseDiagnostic>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("schema integrity violation: {0}")]
    SchemaIntegrity(String),

    #[error("no files matched under {}", .base_dir.display())]
    NoFilesMatched { base_dir: PathBuf },

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid content hash '{0}'")]
    InvalidHash(String),

    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl VaultError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VaultError::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a parse error carrying a single diagnostic
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        VaultError::Parse {
            path: path.into(),
            diagnostics: vec![ParseDiagnostic {
                message: message.into(),
                start: 0,
                end: 0,
            }],
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::NotFound(_))
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self, VaultError::Parse { .. })
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
                VaultError::SchemaIntegrity(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            _ => VaultError::Database(err),
        }
    }
}

fn summarize(diagnostics: &[ParseDiagnostic]) -> String {
    match diagnostics.first() {
        None => "parser produced no declaration tree".to_string(),
        Some(first) if diagnostics.len() == 1 => first.to_string(),
        Some(first) => format!("{} (and {} more)", first, diagnostics.len() - 1),
    }
}

/// Result type alias for codevault operations
pub type Result<T> = std::result::Result<T, VaultError>;
