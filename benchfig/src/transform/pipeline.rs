//! High-level pipeline API: figure job in, image files out.
//!
//! ```text
//! FigureJob
//!    │
//!    ├─ load_source (per input) ── load_table → clean → derive
//!    │
//!    ├─ prepare_job ── heatmap:          pivot_mean (per split value)
//!    │                 range_regression: group_min_max_mean → log_log_regression
//!    │                 faceted:          build_facets
//!    │
//!    └─ run_job ────── render every figure in memory, then write_atomic
//! ```
//!
//! A job either writes all of its files or none of them: when a later write
//! fails, the files this run already wrote are removed again. [`run_jobs`]
//! keeps going after a failed job and reports each outcome.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use benchfig::config::load_jobs;
//! use benchfig::render::SvgRenderer;
//! use benchfig::transform::pipeline::run_jobs;
//!
//! let jobs = load_jobs(Path::new("figures.json")).unwrap();
//! for (name, result) in run_jobs(&jobs, &SvgRenderer) {
//!     println!("{}: {}", name, if result.is_ok() { "ok" } else { "failed" });
//! }
//! ```

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{FacetedSpec, FigureJob, FigureSpec, HeatmapSpec, RangeRegressionSpec, SourceSpec};
use crate::error::{PipelineResult, RenderResult};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_success_indent};
use crate::models::{Cell, Table};
use crate::parser::load_table;
use crate::render::{write_atomic, Figure, RangeBand, Renderer};

use super::clean::clean;
use super::derive::derive;
use super::facets::{build_facets, FacetSource};
use super::grouper::{at_least, group_min_max_mean};
use super::pivot::{pivot_mean, pivot_mean_split};
use super::regression::log_log_regression;

/// Placeholder in an output path replaced by the split value.
pub const SPLIT_PLACEHOLDER: &str = "{split}";

/// Outcome of one successful job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub name: String,
    /// Files written, in figure order
    pub outputs: Vec<PathBuf>,
}

/// Load, clean and derive one input table.
pub fn load_source(source: &SourceSpec) -> PipelineResult<Table> {
    log_info_indent(format!("📖 Reading {}", source.input.path.display()), 1);
    let raw = load_table(&source.input)?;
    log_success_indent(format!("Read {} rows, {} columns", raw.len(), raw.headers.len()), 2);

    let cleaned = clean(&raw, &source.clean)?;
    let dropped = raw.len().saturating_sub(cleaned.len());
    if dropped > 0 {
        log_info_indent(format!("Dropped {} rows while cleaning", dropped), 2);
    }

    if source.derive.is_empty() {
        return Ok(cleaned);
    }
    let before = cleaned.len();
    let table = derive(cleaned, &source.derive)?;
    log_success_indent(
        format!(
            "Derived {} column(s), {} rows kept",
            source.derive.len(),
            table.len()
        ),
        2,
    );
    if table.len() < before {
        log_info_indent(format!("Dropped {} rows with non-finite results", before - table.len()), 2);
    }
    Ok(table)
}

/// Compute every figure of a job together with its output path.
///
/// Nothing is written; the result can be rendered by any [`Renderer`].
pub fn prepare_job(job: &FigureJob) -> PipelineResult<Vec<(PathBuf, Figure)>> {
    match &job.figure {
        FigureSpec::Heatmap(spec) => prepare_heatmap(&job.output, spec),
        FigureSpec::RangeRegression(spec) => prepare_range(&job.output, spec),
        FigureSpec::FacetedComparison(spec) => prepare_faceted(&job.output, spec),
    }
}

fn prepare_heatmap(output: &Path, spec: &HeatmapSpec) -> PipelineResult<Vec<(PathBuf, Figure)>> {
    let table = load_source(&spec.source)?;

    let pivots = match &spec.split_by {
        Some(split_by) => pivot_mean_split(&table, split_by, &spec.row_key, &spec.column_key, &spec.value)?
            .into_iter()
            .map(|(split, pivot)| (split_output(output, &split), pivot))
            .collect(),
        None => vec![(
            output.to_path_buf(),
            pivot_mean(&table, &spec.row_key, &spec.column_key, &spec.value)?,
        )],
    };

    for (path, pivot) in &pivots {
        log_success_indent(
            format!(
                "Pivot {}x{} for {}",
                pivot.rows.len(),
                pivot.columns.len(),
                path.display()
            ),
            1,
        );
    }

    Ok(pivots
        .into_iter()
        .map(|(path, pivot)| {
            let figure = Figure::Heatmap {
                pivot,
                labels: spec.labels.clone(),
            };
            (path, figure)
        })
        .collect())
}

fn prepare_range(output: &Path, spec: &RangeRegressionSpec) -> PipelineResult<Vec<(PathBuf, Figure)>> {
    let mut bands = Vec::with_capacity(spec.series.len());

    for series in &spec.series {
        let table = load_source(&series.source)?;
        let stats = at_least(
            &group_min_max_mean(&table, &series.key, &series.value)?,
            spec.regression.lower_bound,
        );
        let curve = log_log_regression(&stats, &spec.regression)?;
        log_success_indent(
            format!(
                "{}: {} groups, log-log coefficients {:?}",
                series.label,
                stats.len(),
                curve.coefficients
            ),
            1,
        );
        bands.push(RangeBand {
            label: series.label.clone(),
            stats,
            curve,
        });
    }

    let figure = Figure::RangeRegression {
        bands,
        labels: spec.labels.clone(),
    };
    Ok(vec![(output.to_path_buf(), figure)])
}

fn prepare_faceted(output: &Path, spec: &FacetedSpec) -> PipelineResult<Vec<(PathBuf, Figure)>> {
    let tables = spec
        .sources
        .iter()
        .map(|s| load_source(&s.source))
        .collect::<PipelineResult<Vec<_>>>()?;

    let sources: Vec<FacetSource<'_>> = spec
        .sources
        .iter()
        .zip(&tables)
        .map(|(s, table)| FacetSource {
            label: &s.label,
            table,
            category_column: &s.category_column,
        })
        .collect();

    let facets = build_facets(&sources, &spec.layout)?;
    let labels: Vec<&str> = facets.iter().map(|f| f.label.as_str()).collect();
    log_success_indent(format!("{} facet(s): {}", facets.len(), labels.join(", ")), 1);

    let figure = Figure::FacetedComparison {
        facets,
        labels: spec.labels.clone(),
    };
    Ok(vec![(output.to_path_buf(), figure)])
}

/// Output path for one split of a heatmap.
///
/// Replaces [`SPLIT_PLACEHOLDER`] when present, otherwise appends
/// `_<split>` to the file stem.
pub fn split_output(output: &Path, split: &Cell) -> PathBuf {
    let split = split.to_string();
    let text = output.to_string_lossy();
    if text.contains(SPLIT_PLACEHOLDER) {
        return PathBuf::from(text.replace(SPLIT_PLACEHOLDER, &split));
    }

    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{}_{}.{}", stem, split, ext.to_string_lossy()),
        None => format!("{}_{}", stem, split),
    };
    output.with_file_name(name)
}

/// Run one job: compute, render everything, then write every file.
pub fn run_job(job: &FigureJob, renderer: &dyn Renderer) -> PipelineResult<JobReport> {
    log_info(format!("🎨 Job \"{}\" ({})", job.name, figure_kind(&job.figure)));

    let figures = prepare_job(job)?;
    let rendered = figures
        .iter()
        .map(|(path, figure)| {
            let path = with_default_extension(path, renderer.extension());
            Ok((path, renderer.render(figure, &job.style)?))
        })
        .collect::<RenderResult<Vec<_>>>()?;

    let mut outputs = Vec::with_capacity(rendered.len());
    for (path, contents) in rendered {
        if let Err(e) = write_atomic(&path, &contents) {
            for written in &outputs {
                // The write error is what gets reported
                let _ = fs::remove_file(written);
            }
            return Err(e.into());
        }
        log_success_indent(format!("Wrote {}", path.display()), 1);
        outputs.push(path);
    }

    Ok(JobReport {
        name: job.name.clone(),
        outputs,
    })
}

/// Run every job, continuing after failures.
pub fn run_jobs(jobs: &[FigureJob], renderer: &dyn Renderer) -> Vec<(String, PipelineResult<JobReport>)> {
    let results: Vec<_> = jobs
        .iter()
        .map(|job| {
            let result = run_job(job, renderer);
            if let Err(e) = &result {
                log_error(format!("Job \"{}\" failed in {} stage: {}", job.name, e.stage(), e));
            }
            (job.name.clone(), result)
        })
        .collect();

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    log_success(format!("{} of {} job(s) completed", jobs.len() - failed, jobs.len()));
    results
}

fn figure_kind(spec: &FigureSpec) -> &'static str {
    match spec {
        FigureSpec::Heatmap(_) => "heatmap",
        FigureSpec::RangeRegression(_) => "range_regression",
        FigureSpec::FacetedComparison(_) => "faceted_comparison",
    }
}

fn with_default_extension(path: &Path, extension: &str) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::LOG_SINK;
    use crate::render::SvgRenderer;
    use serde_json::json;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const THRESHOLD_CSV: &str = "\
Param: _Alternatives,Param: _Tasks,Param: _Thresholds,Score
2,10,1,\"1000,0\"
2,10,1,\"3000,0\"
4,10,1,\"500,0\"
2,20,1,-1
2,10,2,\"800,0\"
";

    const STORAGE_CSV: &str = "\
amountOfAlternativesPerTask;amountOfTasks;fileSizeInByte
10;1;1048576
10;1;2097152
10;2;10485760
10;2;12582912
10;3;104857600
";

    fn write(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn heatmap_job(dir: &TempDir) -> FigureJob {
        let input = write(dir, "result.csv", THRESHOLD_CSV);
        let output = dir.path().join("out").join("Heatmap_{split}.svg");
        let job = json!({
            "name": "threshold",
            "output": output.to_string_lossy(),
            "figure": {
                "type": "heatmap",
                "source": {
                    "input": { "path": input, "format": { "type": "delimited", "delimiter": "," } },
                    "clean": { "locale_decimal": ["Score"], "integer": ["Param: _Thresholds"] },
                    "derive": [{ "type": "convert", "column": "Score", "unit": "micros_to_millis" }]
                },
                "row_key": "Param: _Alternatives",
                "column_key": "Param: _Tasks",
                "value": "Score",
                "split_by": "Param: _Thresholds",
                "labels": { "x": "Tasks", "y": "Alternatives", "value": "Ø Exec. Time (ms)" }
            }
        });
        FigureJob::from_json(&job.to_string()).unwrap()
    }

    fn storage_job(dir: &TempDir) -> FigureJob {
        let input = write(dir, "storage.csv", STORAGE_CSV);
        let job = json!({
            "name": "storage",
            "output": dir.path().join("Figure6.svg").to_string_lossy(),
            "figure": {
                "type": "range_regression",
                "series": [{
                    "label": "No-Slicing",
                    "source": {
                        "input": { "path": input },
                        "clean": { "positive": ["amountOfAlternativesPerTask", "amountOfTasks", "fileSizeInByte"] },
                        "derive": [
                            { "type": "power", "base": "amountOfAlternativesPerTask", "exponent": "amountOfTasks", "target": "complexity" },
                            { "type": "log10", "column": "complexity", "target": "log_complexity" },
                            { "type": "convert", "column": "fileSizeInByte", "target": "storage_MB", "unit": "bytes_to_mebibytes" }
                        ]
                    },
                    "key": "log_complexity",
                    "value": "storage_MB"
                }],
                "labels": { "x": "Complexity", "y": "Storage (MB)" }
            }
        });
        FigureJob::from_json(&job.to_string()).unwrap()
    }

    #[test]
    fn test_split_output() {
        let split = Cell::Int(3);
        assert_eq!(
            split_output(Path::new("out/Heatmap_{split}.svg"), &split),
            PathBuf::from("out/Heatmap_3.svg")
        );
        assert_eq!(
            split_output(Path::new("out/Heatmap.svg"), &split),
            PathBuf::from("out/Heatmap_3.svg")
        );
        assert_eq!(split_output(Path::new("Heatmap"), &split), PathBuf::from("Heatmap_3"));
    }

    #[test]
    fn test_prepare_heatmap_split() {
        LOG_SINK.set_quiet(true);
        let dir = tempdir().unwrap();
        let job = heatmap_job(&dir);

        let figures = prepare_job(&job).unwrap();
        assert_eq!(figures.len(), 2);
        assert!(figures[0].0.ends_with("Heatmap_1.svg"));
        assert!(figures[1].0.ends_with("Heatmap_2.svg"));

        let Figure::Heatmap { pivot, .. } = &figures[0].1 else {
            panic!("expected heatmap");
        };
        // Sentinel row (-1) is gone, so Tasks=20 never appears
        assert_eq!(pivot.columns, vec![Cell::Int(10)]);
        assert_eq!(pivot.get(&Cell::Int(2), &Cell::Int(10)), Some(2.0));
        assert_eq!(pivot.get(&Cell::Int(4), &Cell::Int(10)), Some(0.5));
    }

    #[test]
    fn test_run_heatmap_writes_all_splits() {
        LOG_SINK.set_quiet(true);
        let dir = tempdir().unwrap();
        let job = heatmap_job(&dir);

        let report = run_job(&job, &SvgRenderer).unwrap();
        assert_eq!(report.name, "threshold");
        assert_eq!(report.outputs.len(), 2);
        for path in &report.outputs {
            let svg = fs::read_to_string(path).unwrap();
            assert!(svg.contains("<svg"));
        }
    }

    #[test]
    fn test_failed_write_removes_earlier_splits() {
        LOG_SINK.set_quiet(true);
        let dir = tempdir().unwrap();
        let job = heatmap_job(&dir);
        // A directory where the second split's file should go
        fs::create_dir_all(dir.path().join("out").join("Heatmap_2.svg")).unwrap();

        let err = run_job(&job, &SvgRenderer).unwrap_err();
        assert_eq!(err.stage(), "render");
        assert!(!dir.path().join("out").join("Heatmap_1.svg").exists());
        assert!(dir.path().join("out").join("Heatmap_2.svg").is_dir());
    }

    #[test]
    fn test_prepare_range_regression() {
        LOG_SINK.set_quiet(true);
        let dir = tempdir().unwrap();
        let job = storage_job(&dir);

        let figures = prepare_job(&job).unwrap();
        assert_eq!(figures.len(), 1);
        let Figure::RangeRegression { bands, .. } = &figures[0].1 else {
            panic!("expected range figure");
        };
        let band = &bands[0];
        assert_eq!(band.label, "No-Slicing");
        assert_eq!(band.stats.len(), 3);
        for (stat, expected) in band.stats.iter().zip([1.0, 2.0, 3.0]) {
            assert!((stat.key - expected).abs() < 1e-9);
        }
        assert!((band.stats[0].mean - 1.5).abs() < 1e-9);
        assert!((band.stats[1].min - 10.0).abs() < 1e-9);
        assert!((band.stats[1].max - 12.0).abs() < 1e-9);
        assert_eq!(band.curve.coefficients.len(), 2);
        assert!(band.curve.coefficients[0] > 0.0);
    }

    #[test]
    fn test_reruns_are_identical() {
        LOG_SINK.set_quiet(true);
        let dir = tempdir().unwrap();
        let job = storage_job(&dir);

        let first = run_job(&job, &SvgRenderer).unwrap();
        let first_svg = fs::read_to_string(&first.outputs[0]).unwrap();
        let first_table = load_source(job.figure.sources()[0]).unwrap();

        let second = run_job(&job, &SvgRenderer).unwrap();
        let second_svg = fs::read_to_string(&second.outputs[0]).unwrap();
        let second_table = load_source(job.figure.sources()[0]).unwrap();

        assert_eq!(first, second);
        assert_eq!(first_svg, second_svg);
        assert_eq!(first_table, second_table);
    }

    #[test]
    fn test_missing_input_fails_in_load_stage() {
        LOG_SINK.set_quiet(true);
        let dir = tempdir().unwrap();
        let mut job = storage_job(&dir);
        if let FigureSpec::RangeRegression(spec) = &mut job.figure {
            spec.series[0].source.input.path = dir.path().join("missing.csv");
        }

        let err = run_job(&job, &SvgRenderer).unwrap_err();
        assert_eq!(err.stage(), "load");
        assert!(!dir.path().join("Figure6.svg").exists());
    }

    #[test]
    fn test_run_jobs_continues_after_failure() {
        LOG_SINK.set_quiet(true);
        let dir = tempdir().unwrap();
        let good = storage_job(&dir);
        let mut bad = heatmap_job(&dir);
        bad.name = "broken".into();
        if let FigureSpec::Heatmap(spec) = &mut bad.figure {
            spec.value = "Nope".into();
        }

        let results = run_jobs(&[bad, good], &SvgRenderer);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "broken");
        assert_eq!(results[0].1.as_ref().unwrap_err().stage(), "transform");
        assert!(results[1].1.is_ok());
        assert!(!dir.path().join("out").exists());
    }
}
