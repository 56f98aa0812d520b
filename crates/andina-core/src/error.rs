use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or reshaping tables.
///
/// Computations that can merely come up empty use typed "no result" values
/// further up instead; these variants are for inputs that cannot be used.
#[derive(Error, Debug)]
pub enum AndinaError {
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    /// E.g. a snapshot requested from a table without any parseable date.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Column '{column}' has {found} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        found: usize,
        expected: usize,
    },

    #[error("Cannot read export {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Message carries the offending path.
    #[error("Malformed CSV export {0}")]
    CsvParse(String),

    #[error("Malformed JSON export: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Data directory does not exist: {0}")]
    DataPathNotFound(PathBuf),

    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

pub type Result<T> = std::result::Result<T, AndinaError>;
