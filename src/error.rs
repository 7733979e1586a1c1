//! Typed errors for the core and the workbook layer. `main` wraps them in `anyhow`.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvolutionError {
    #[error("invalid {kind} transaction on {date}: {reason}")]
    InvalidInput {
        date: NaiveDate,
        kind: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("sheet '{name}' not found at {path}")]
    MissingSheet { name: String, path: PathBuf },

    #[error("sheet '{sheet}' row {row}, column {column}: cannot read '{value}'")]
    InvalidCell {
        sheet: String,
        row: u64,
        column: &'static str,
        value: String,
    },
}

impl WorkbookError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WorkbookError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        WorkbookError::Csv {
            path: path.into(),
            source,
        }
    }
}
