//! Error types for the benchfig figure pipeline.
//!
//! One error enum per pipeline stage:
//!
//! - [`LoadError`] - reading and decoding input tables
//! - [`CleanError`] - sentinel removal and type coercion
//! - [`TransformError`] - derived columns, pivots and grouping
//! - [`RegressionError`] - log-log polynomial fits
//! - [`RenderError`] - drawing and writing figures
//! - [`ConfigError`] - figure job files
//! - [`PipelineError`] - top-level orchestration
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across stage boundaries.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Loader Errors
// =============================================================================

/// Errors while loading an input table.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File missing or unreadable.
    #[error("Cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content cannot be decoded as the declared format.
    #[error("Cannot parse '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

impl LoadError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        LoadError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Cleaner Errors
// =============================================================================

/// Errors while cleaning a raw table.
#[derive(Debug, Error)]
pub enum CleanError {
    /// A configured column does not exist in the table.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A locale-formatted decimal could not be parsed (policy `error`).
    #[error("Row {row}, column '{column}': cannot parse '{value}' as a decimal")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },

    /// A value cannot be cast to an integer.
    #[error("Row {row}, column '{column}': '{value}' is not an integer")]
    Type {
        row: usize,
        column: String,
        value: String,
    },

    /// A label mapping key is not a valid regular expression.
    #[error("Invalid label pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors while deriving columns or aggregating.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A referenced column does not exist.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A cell that must be numeric is not.
    #[error("Row {row}, column '{column}': value is not numeric")]
    NotNumeric { row: usize, column: String },

    /// An aggregation produced no usable rows.
    #[error("{0} produced no usable rows")]
    EmptyResult(String),
}

// =============================================================================
// Regression Errors
// =============================================================================

/// Errors from the log-log regression.
#[derive(Debug, Error)]
pub enum RegressionError {
    /// Fewer distinct groups than coefficients to fit.
    #[error("Insufficient data: {groups} distinct groups, a degree {degree} fit needs {required}")]
    InsufficientData {
        groups: usize,
        degree: usize,
        required: usize,
    },

    /// A group mean cannot be log-transformed.
    #[error("Group {key} has non-positive mean {mean}")]
    NonPositiveMean { key: f64, mean: f64 },

    /// The normal equations are not positive definite.
    #[error("Least-squares system is singular")]
    Singular,
}

// =============================================================================
// Render Errors
// =============================================================================

/// Errors while drawing or writing a figure.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Drawing backend failure.
    #[error("Drawing failed: {0}")]
    Draw(String),

    /// Nothing to draw.
    #[error("Nothing to draw: {0}")]
    Empty(String),

    /// Output could not be written.
    #[error("Cannot write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while reading figure job files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Cannot read job file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Schema validation failed.
    #[error("Invalid job file: {}", errors.join("; "))]
    Schema { errors: Vec<String> },

    /// JSON serialization/deserialization error.
    #[error("Job JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run_job`].
/// It wraps every stage error; [`PipelineError::stage`] names the stage that
/// failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loader error.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Cleaner error.
    #[error("Clean error: {0}")]
    Clean(#[from] CleanError),

    /// Transformation error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Regression error.
    #[error("Regression error: {0}")]
    Regression(#[from] RegressionError),

    /// Render error.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Name of the stage that failed, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Load(_) => "load",
            PipelineError::Clean(_) => "clean",
            PipelineError::Transform(_) => "transform",
            PipelineError::Regression(_) => "regression",
            PipelineError::Render(_) => "render",
            PipelineError::Config(_) => "config",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loader operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for cleaner operations.
pub type CleanResult<T> = Result<T, CleanError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for regression operations.
pub type RegressionResult<T> = Result<T, RegressionError>;

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
