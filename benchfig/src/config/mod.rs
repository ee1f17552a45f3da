//! Figure job configuration.
//!
//! A job file describes one figure (or a list of them): where the input
//! tables live, how to clean and derive them, what to aggregate and where to
//! write the result.
//!
//! ```json
//! {
//!   "name": "storage-use",
//!   "output": "Results/RQ1b/Figure6.svg",
//!   "figure": {
//!     "type": "range_regression",
//!     "series": [ ... ],
//!     "regression": { "degree": 1, "lower_bound": 1.0 }
//!   }
//! }
//! ```
//!
//! Job files are checked against the embedded JSON Schema before they are
//! deserialized (see [`crate::validation`]). Relative paths inside a job file
//! resolve against the directory containing it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::parser::{InputFormat, InputSpec};
use crate::render::{AxisLabels, RenderStyle};
use crate::transform::clean::{CleanSpec, LabelMapping};
use crate::transform::derive::{DeriveStep, UnitConversion};
use crate::transform::facets::FacetLayout;
use crate::transform::regression::RegressionOptions;
use crate::validation::validate_job;

// =============================================================================
// Sources
// =============================================================================

/// One input table and how to prepare it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub input: InputSpec,
    #[serde(default)]
    pub clean: CleanSpec,
    #[serde(default)]
    pub derive: Vec<DeriveStep>,
}

// =============================================================================
// Figures
// =============================================================================

/// Pivot heatmap: mean of `value` per (`row_key`, `column_key`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapSpec {
    pub source: SourceSpec,
    pub row_key: String,
    pub column_key: String,
    pub value: String,
    /// One heatmap per distinct value of this column.
    #[serde(default)]
    pub split_by: Option<String>,
    #[serde(default)]
    pub labels: AxisLabels,
}

/// One min-max band of a range figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSeriesSpec {
    pub label: String,
    pub source: SourceSpec,
    /// Exact grouping key, typically a derived `log_complexity`
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRegressionSpec {
    pub series: Vec<RangeSeriesSpec>,
    #[serde(default)]
    pub regression: RegressionOptions,
    #[serde(default)]
    pub labels: AxisLabels,
}

/// One source of a faceted comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetSourceSpec {
    pub label: String,
    pub source: SourceSpec,
    pub category_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetedSpec {
    pub sources: Vec<FacetSourceSpec>,
    pub layout: FacetLayout,
    #[serde(default)]
    pub labels: AxisLabels,
}

/// What to compute, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FigureSpec {
    Heatmap(HeatmapSpec),
    RangeRegression(RangeRegressionSpec),
    FacetedComparison(FacetedSpec),
}

impl FigureSpec {
    pub fn sources(&self) -> Vec<&SourceSpec> {
        match self {
            FigureSpec::Heatmap(h) => vec![&h.source],
            FigureSpec::RangeRegression(r) => r.series.iter().map(|s| &s.source).collect(),
            FigureSpec::FacetedComparison(f) => f.sources.iter().map(|s| &s.source).collect(),
        }
    }

    fn sources_mut(&mut self) -> Vec<&mut SourceSpec> {
        match self {
            FigureSpec::Heatmap(h) => vec![&mut h.source],
            FigureSpec::RangeRegression(r) => r.series.iter_mut().map(|s| &mut s.source).collect(),
            FigureSpec::FacetedComparison(f) => f.sources.iter_mut().map(|s| &mut s.source).collect(),
        }
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// A complete figure job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureJob {
    pub name: String,
    /// Output file; `{split}` is replaced for split heatmaps.
    pub output: PathBuf,
    #[serde(default)]
    pub style: RenderStyle,
    pub figure: FigureSpec,
}

impl FigureJob {
    /// Parse and validate a single job from JSON text.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> ConfigResult<Self> {
        validate_job(&value).map_err(|errors| ConfigError::Schema { errors })?;
        Ok(serde_json::from_value(value)?)
    }

    /// Load a file holding exactly one job.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let mut job = Self::from_json(&read_job_file(path)?)?;
        job.resolve_paths(path.parent().unwrap_or_else(|| Path::new("")));
        Ok(job)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Make relative input and output paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.output);
        for source in self.figure.sources_mut() {
            resolve(&mut source.input.path);
        }
    }
}

fn read_job_file(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load every job from a file holding one job object or an array of them.
pub fn load_jobs(path: &Path) -> ConfigResult<Vec<FigureJob>> {
    let value: Value = serde_json::from_str(&read_job_file(path)?)?;
    let values = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    values
        .into_iter()
        .map(|v| {
            let mut job = FigureJob::from_value(v)?;
            job.resolve_paths(base);
            Ok(job)
        })
        .collect()
}

// =============================================================================
// Bundled examples
// =============================================================================

const SCORE: &str = "Score";
const SCORE_ERROR: &str = "Score Error (99,9%)";
const FILE_PATH_FM: &str = "Param: _FilePathFM";
const MAX_REQUIREMENTS: &str = "Param: _MaxRequirements";

fn edge_index_mapping() -> LabelMapping {
    LabelMapping::exact(
        "Param: _EdgeIndex",
        &[
            ("1", "Country Side"),
            ("2", "Small City"),
            ("3", "Highway"),
            ("4", "Medium City"),
            ("5", "Full"),
        ],
    )
}

fn edge_nodes_mapping() -> LabelMapping {
    LabelMapping::exact(
        "Param: _FilePathEdgeNodes",
        &[
            ("EdgeNodes_CountrySide.json", "Country Side"),
            ("EdgeNodes_SmallCity.json", "Small City"),
            ("EdgeNodes_Highway.json", "Highway"),
            ("EdgeNodes_MediumCity.json", "Medium City"),
            ("EdgeNodes_Full.json", "Full"),
        ],
    )
}

fn feature_model_mapping() -> LabelMapping {
    LabelMapping::file_name_contains(
        FILE_PATH_FM,
        &[
            ("FM_BenchmarkGraph_6_Services_NoExcludes_4.096_configs.json", "Tiny"),
            ("FM_BenchmarkGraph_6_Services_NoExcludes_57.344_configs.json", "Small"),
            ("FM_BenchmarkGraph_18_Services_NoExcludes_139.968_configs.json", "Medium"),
            ("FM_BenchmarkGraph_16_Services_Excludes_1.520.640_configs.json", "Big"),
            ("FM_BenchmarkGraph_16_Services_NoExcludes_14.348.907_configs.json", "Huge"),
        ],
    )
}

fn edge_order() -> Vec<String> {
    ["Country Side", "Small City", "Highway", "Medium City", "Full"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// JMH spreadsheet export with comma-decimal scores.
fn jmh_source(path: &str, integer: &[&str], labels: Vec<LabelMapping>) -> SourceSpec {
    SourceSpec {
        input: InputSpec::new(path),
        clean: CleanSpec {
            locale_decimal: vec![SCORE.into(), SCORE_ERROR.into()],
            integer: integer.iter().map(|s| s.to_string()).collect(),
            labels,
            ..CleanSpec::default()
        },
        derive: Vec::new(),
    }
}

/// Harness CSV with configuration counts and storage size.
fn storage_source(path: &str) -> SourceSpec {
    let columns = ["amountOfAlternativesPerTask", "amountOfTasks", "fileSizeInByte"];
    SourceSpec {
        input: InputSpec::new(path).with_format(InputFormat::Delimited { delimiter: Some(';') }),
        clean: CleanSpec {
            positive: columns.iter().map(|s| s.to_string()).collect(),
            ..CleanSpec::default()
        },
        derive: vec![
            DeriveStep::Power {
                base: columns[0].into(),
                exponent: columns[1].into(),
                target: "complexity".into(),
            },
            DeriveStep::Log10 {
                column: "complexity".into(),
                target: "log_complexity".into(),
            },
            DeriveStep::Convert {
                column: columns[2].into(),
                target: Some("storage_MB".into()),
                unit: UnitConversion::BytesToMebibytes,
            },
        ],
    }
}

fn comparison_layout(category_order: Vec<String>, max_facets: Option<usize>, min_facets: usize) -> FacetLayout {
    FacetLayout {
        facet_column: FILE_PATH_FM.into(),
        x_column: MAX_REQUIREMENTS.into(),
        y_column: SCORE.into(),
        error_column: SCORE_ERROR.into(),
        facet_order: crate::models::SizeClass::labels(),
        category_order,
        max_facets,
        min_facets,
    }
}

fn comparison_labels() -> AxisLabels {
    AxisLabels {
        x: "Requirements".into(),
        y: "Ø Exec. Time (ms)".into(),
        value: String::new(),
    }
}

/// The evaluation figures of the FM4MC paper, as job definitions.
pub fn example_jobs() -> Vec<FigureJob> {
    let heatmap_labels = |value: &str| AxisLabels {
        x: "Tasks".into(),
        y: "Alternatives".into(),
        value: value.into(),
    };

    let mut threshold_source = jmh_source(
        "Storage_Slicing/2024_06_05_Slicing_JMH/result_comma_seperated.csv",
        &["Param: _Thresholds"],
        Vec::new(),
    );
    threshold_source.input.format = InputFormat::Delimited { delimiter: Some(',') };
    threshold_source.derive = vec![
        DeriveStep::Convert {
            column: SCORE.into(),
            target: None,
            unit: UnitConversion::MicrosToMillis,
        },
        DeriveStep::Convert {
            column: SCORE_ERROR.into(),
            target: None,
            unit: UnitConversion::MicrosToMillis,
        },
    ];

    let no_slicing_time = "timeCalculatingConfigurations";
    let no_slicing_source = SourceSpec {
        input: InputSpec::new("Storage_Slicing/2024_05_19_Measurement_Linear_FM_No_Slicing/benchmark_results.csv")
            .with_format(InputFormat::Delimited { delimiter: Some(';') }),
        clean: CleanSpec {
            sentinel_columns: Some(vec![no_slicing_time.into()]),
            ..CleanSpec::default()
        },
        derive: vec![DeriveStep::Scale {
            column: no_slicing_time.into(),
            target: None,
            multiply: 1.0,
            divide: 1000.0 * 1000.0 * 60.0 * 60.0,
        }],
    };

    vec![
        FigureJob {
            name: "heatmap-threshold".into(),
            output: "Results/RQ1a/Figure5/Heatmap-Threshold_{split}.svg".into(),
            style: RenderStyle::default(),
            figure: FigureSpec::Heatmap(HeatmapSpec {
                source: threshold_source,
                row_key: "Param: _Alternatives".into(),
                column_key: "Param: _Tasks".into(),
                value: SCORE.into(),
                split_by: Some("Param: _Thresholds".into()),
                labels: heatmap_labels("Processing time (ms)"),
            }),
        },
        FigureJob {
            name: "heatmap-no-slicing".into(),
            output: "Results/RQ1a/Figure5/Heatmap-Threshold_NoSlicing.svg".into(),
            style: RenderStyle::default(),
            figure: FigureSpec::Heatmap(HeatmapSpec {
                source: no_slicing_source,
                row_key: "amountOfAlternativesPerTask".into(),
                column_key: "amountOfTasks".into(),
                value: no_slicing_time.into(),
                split_by: None,
                labels: heatmap_labels("Processing time (h)"),
            }),
        },
        FigureJob {
            name: "storage-use".into(),
            output: "Results/RQ1b/Figure6.svg".into(),
            style: RenderStyle::default(),
            figure: FigureSpec::RangeRegression(RangeRegressionSpec {
                series: vec![
                    RangeSeriesSpec {
                        label: "No-Slicing".into(),
                        source: storage_source(
                            "Storage_Slicing/2024_05_19_Measurement_Linear_FM_No_Slicing/benchmark_results.csv",
                        ),
                        key: "log_complexity".into(),
                        value: "storage_MB".into(),
                    },
                    RangeSeriesSpec {
                        label: "Slicing".into(),
                        source: storage_source(
                            "Storage_Slicing/2025_03_11_Measurement_Linear_FM_Slicing/benchmark_results.csv",
                        ),
                        key: "log_complexity".into(),
                        value: "storage_MB".into(),
                    },
                ],
                regression: RegressionOptions::default(),
                labels: AxisLabels {
                    x: "# Valid Configurations (log scale)".into(),
                    y: "Storage Consumption in MB (log scale)".into(),
                    value: String::new(),
                },
            }),
        },
        FigureJob {
            name: "online-fm4mc".into(),
            output: "Results/RQ2/Figure7.svg".into(),
            style: RenderStyle {
                width: 2000,
                height: 500,
                label_size: 16,
                tick_size: 12,
                ..RenderStyle::default()
            },
            figure: FigureSpec::FacetedComparison(FacetedSpec {
                sources: vec![FacetSourceSpec {
                    label: "FM4MC".into(),
                    source: jmh_source(
                        "Online/2025_03_12_FM4MC/onlineBenchmark_complete.xlsx",
                        &["Param: _EdgeIndex", MAX_REQUIREMENTS],
                        vec![edge_index_mapping(), feature_model_mapping()],
                    ),
                    category_column: "Param: _EdgeIndex".into(),
                }],
                layout: comparison_layout(edge_order(), None, 1),
                labels: comparison_labels(),
            }),
        },
        FigureJob {
            name: "online-canete".into(),
            output: "Results/RQ2/Figure8.svg".into(),
            style: RenderStyle {
                width: 1500,
                height: 500,
                label_size: 16,
                tick_size: 12,
                ..RenderStyle::default()
            },
            figure: FigureSpec::FacetedComparison(FacetedSpec {
                sources: vec![FacetSourceSpec {
                    label: "Canete".into(),
                    source: jmh_source(
                        "Online/2025_03_13_Canete/jmh-result_complete.xlsx",
                        &[MAX_REQUIREMENTS],
                        vec![edge_nodes_mapping(), feature_model_mapping()],
                    ),
                    category_column: "Param: _FilePathEdgeNodes".into(),
                }],
                layout: comparison_layout(edge_order(), Some(3), 2),
                labels: comparison_labels(),
            }),
        },
    ]
}
