//! Transformation module.
//!
//! This module turns loaded tables into figure data:
//! - Clean: sentinel removal, locale decimals, integer casts, labels
//! - Derive: scaled, converted and complexity columns
//! - Pivot: (row key, column key) means for heatmaps
//! - Grouper: exact-key min/max/mean groups
//! - Regression: log-log polynomial fits
//! - Facets: multi-panel comparison series
//! - Pipeline: job orchestration

pub mod clean;
pub mod derive;
pub mod facets;
pub mod grouper;
pub mod pipeline;
pub mod pivot;
pub mod regression;

pub use clean::{clean, CleanSpec, LabelMapping, MatchMode, OnParseFailure};
pub use derive::{derive, DeriveStep, UnitConversion};
pub use facets::{build_facets, FacetLayout, FacetSource};
pub use grouper::{at_least, group_min_max_mean};
pub use pipeline::{load_source, prepare_job, run_job, run_jobs, JobReport};
pub use pivot::{pivot_mean, pivot_mean_split};
pub use regression::{linspace, log_log_regression, polyfit, polyval, RegressionOptions};
