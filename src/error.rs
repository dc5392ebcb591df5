//! Error types for quantile_deg

use thiserror::Error;

/// Main error type for the stratified differential expression workflow
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid expression matrix: {reason}")]
    InvalidExpressionMatrix { reason: String },

    #[error("Invalid clinical table: {reason}")]
    InvalidClinical { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Sample alignment failed: {reason}")]
    SampleAlignment { reason: String },

    #[error("Gene '{gene_id}' not found in expression matrix")]
    GeneNotFound { gene_id: String },

    #[error("Invalid quantile split: {reason}")]
    InvalidSplit { reason: String },

    #[error("Invalid design matrix: {reason}")]
    InvalidDesignMatrix { reason: String },

    #[error("Invalid contrast specification: {reason}")]
    InvalidContrast { reason: String },

    #[error("Numerical instability in {operation}: {details}")]
    NumericalInstability { operation: String, details: String },

    #[error("Enrichment service error: {reason}")]
    Enrichment { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Workbook error: {reason}")]
    Workbook { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("XLSX writing error: {0}")]
    XlsxWriteError(#[from] rust_xlsxwriter::XlsxError),

    #[error("XLSX reading error: {0}")]
    XlsxReadError(#[from] calamine::XlsxError),

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
