//! Error types shared by every pipeline stage

use thiserror::Error;

/// Everything that can stop a promotion run (or a single SKU group within it).
#[derive(Debug, Error)]
pub enum PromoteError {
    #[error("Missing sheet '{sheet}' (looked in {path})")]
    MissingSheet { sheet: String, path: String },

    #[error("Sheet '{sheet}' is missing required column '{column}'")]
    MissingColumn { sheet: String, column: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in '{sheet}': {source}")]
    Csv {
        sheet: String,
        #[source]
        source: csv::Error,
    },

    #[error("Excel error in '{path}': {source}")]
    Xlsx {
        path: String,
        #[source]
        source: calamine::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    XlsxWrite {
        path: String,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A SKU group whose linked portfolios have no budget-table entry at all.
    #[error("Data integrity violation for SKU '{sku}': none of the linked portfolios {portfolios:?} has an average daily budget entry")]
    DataIntegrity { sku: String, portfolios: Vec<String> },
}

impl PromoteError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        PromoteError::Io { path: path.into(), source }
    }

    pub fn csv(sheet: impl Into<String>, source: csv::Error) -> Self {
        PromoteError::Csv { sheet: sheet.into(), source }
    }

    pub fn xlsx(path: impl Into<String>, source: impl Into<calamine::Error>) -> Self {
        PromoteError::Xlsx { path: path.into(), source: source.into() }
    }

    /// True for failures scoped to one SKU group rather than the whole run.
    pub fn is_group_scoped(&self) -> bool {
        matches!(self, PromoteError::DataIntegrity { .. })
    }
}

pub type Result<T> = std::result::Result<T, PromoteError>;
