//! Figure rendering.
//!
//! The pipeline hands a fully computed [`Figure`] to a [`Renderer`] together
//! with an immutable [`RenderStyle`]. Renderers draw into memory; the
//! pipeline then writes the result with [`write_atomic`] so a failed job
//! never leaves a partial file behind.

pub mod svg;

pub use svg::SvgRenderer;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{RenderError, RenderResult};
use crate::models::{Facet, GroupedStat, PivotTable, RegressionCurve};

// =============================================================================
// Style
// =============================================================================

/// Global figure styling, passed by value to every render call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    pub width: u32,
    pub height: u32,
    pub font_family: String,
    /// Axis descriptions and captions
    pub label_size: u32,
    /// Tick labels and legend entries
    pub tick_size: u32,
    pub line_width: u32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            font_family: "serif".to_string(),
            label_size: 22,
            tick_size: 20,
            line_width: 2,
        }
    }
}

// =============================================================================
// Figures
// =============================================================================

/// Axis descriptions of a figure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisLabels {
    #[serde(default)]
    pub x: String,
    #[serde(default)]
    pub y: String,
    /// Color bar description (heatmaps)
    #[serde(default)]
    pub value: String,
}

/// One min-max band with its regression curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeBand {
    pub label: String,
    pub stats: Vec<GroupedStat>,
    pub curve: RegressionCurve,
}

/// Renderer input: everything needed to draw, nothing left to compute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Figure {
    Heatmap {
        pivot: PivotTable,
        labels: AxisLabels,
    },
    RangeRegression {
        bands: Vec<RangeBand>,
        labels: AxisLabels,
    },
    FacetedComparison {
        facets: Vec<Facet>,
        labels: AxisLabels,
    },
}

impl Figure {
    pub fn kind(&self) -> &'static str {
        match self {
            Figure::Heatmap { .. } => "heatmap",
            Figure::RangeRegression { .. } => "range_regression",
            Figure::FacetedComparison { .. } => "faceted_comparison",
        }
    }
}

// =============================================================================
// Renderer
// =============================================================================

/// Turns a figure into the bytes of an image file.
pub trait Renderer {
    fn render(&self, figure: &Figure, style: &RenderStyle) -> RenderResult<String>;

    /// File extension of the produced format, without the dot.
    fn extension(&self) -> &'static str;
}

/// Write `contents` to `path` through a temp file in the same directory.
pub fn write_atomic(path: &Path, contents: &str) -> RenderResult<()> {
    let io_err = |source: std::io::Error| RenderError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(contents.as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
