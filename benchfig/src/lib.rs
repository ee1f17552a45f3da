//! # Benchfig - benchmark tables to paper figures
//!
//! Benchfig reads benchmark result tables (JMH CSV exports, harness CSVs,
//! spreadsheets), cleans and aggregates them, and renders heatmaps, min-max
//! range bands with log-log regressions, and faceted comparison figures.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / XLSX  │────▶│   Parser    │────▶│  Transform  │────▶│    SVG      │
//! │ (any enc.)  │     │ (auto-delim)│     │ (clean+agg) │     │  (atomic)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                            ▲                                       ▲
//!                            └────────── FigureJob (JSON) ───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use benchfig::{load_jobs, run_job, SvgRenderer};
//!
//! for job in load_jobs(Path::new("figures.json")).unwrap() {
//!     let report = run_job(&job, &SvgRenderer).unwrap();
//!     println!("{}: {} file(s)", report.name, report.outputs.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Per-stage error types
//! - [`models`] - Cells, tables, pivots and figure data
//! - [`logs`] - Pipeline diagnostics
//! - [`parser`] - Delimited text and spreadsheet loading
//! - [`transform`] - Cleaning, derivation, aggregation, regression, pipeline
//! - [`render`] - Figure rendering
//! - [`config`] - Figure job files
//! - [`validation`] - Job file schema validation

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Loading
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod render;

// Configuration
pub mod config;
pub mod validation;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CleanError,
    ConfigError,
    LoadError,
    PipelineError,
    RegressionError,
    RenderError,
    TransformError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Cell,
    Facet,
    GroupedStat,
    PivotTable,
    Point,
    RegressionCurve,
    Series,
    SizeClass,
    Table,
};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use parser::{
    detect_delimiter,
    detect_encoding,
    load_table,
    InputFormat,
    InputSpec,
    ParseResult,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    build_facets,
    clean,
    derive,
    group_min_max_mean,
    log_log_regression,
    pivot_mean,
    pivot_mean_split,
    polyfit,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{load_source, prepare_job, run_job, run_jobs, JobReport};

// =============================================================================
// Re-exports - Rendering and configuration
// =============================================================================

pub use render::{Figure, RenderStyle, Renderer, SvgRenderer};
pub use config::{example_jobs, load_jobs, FigureJob, FigureSpec};
pub use validation::{is_valid_job, validate_job};
