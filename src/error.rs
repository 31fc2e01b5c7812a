// ❗ Error types
// Only a workbook that cannot be read at all surfaces to the user; everything
// else in an import degrades to counted drops or null matches

use thiserror::Error;

/// Failure talking to a taxonomy source.
///
/// The resolver never propagates these: a failing call abandons the current
/// tier and resolution continues with the next one.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("taxonomy storage error: {0}")]
    Storage(String),

    #[error("taxonomy source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed taxonomy data: {0}")]
    Malformed(String),
}

impl From<rusqlite::Error> for TaxonomyError {
    fn from(e: rusqlite::Error) -> Self {
        TaxonomyError::Storage(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    /// The file could not be parsed into a workbook at all.
    #[error("file could not be parsed: {0}")]
    InvalidWorkbook(String),

    #[error("unsupported workbook format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Xlsx(#[from] calamine::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),
}

pub type Result<T> = std::result::Result<T, ImportError>;
