//! Multi-series comparison builder.
//!
//! Splits one or two cleaned sources into panels (facets) by a facet column,
//! and within each panel into one point series per (source, category).
//! Points are passed through as measured; there is no further aggregation.

use serde::{Deserialize, Serialize};

use crate::error::{TransformError, TransformResult};
use crate::models::{Cell, Facet, Point, Series, SizeClass, Table};

/// X-domain used for a facet without any points.
pub const EMPTY_X_DOMAIN: (f64, f64) = (0.0, 10.0);

/// Column roles and ordering shared by all sources of a faceted figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetLayout {
    pub facet_column: String,
    pub x_column: String,
    pub y_column: String,
    pub error_column: String,

    /// Known facet labels in panel order; unknown labels follow.
    #[serde(default = "SizeClass::labels")]
    pub facet_order: Vec<String>,

    /// Category labels in legend order. When non-empty, only these
    /// categories are plotted and they alone determine the x-domain.
    #[serde(default)]
    pub category_order: Vec<String>,

    /// Keep only the first N facets.
    #[serde(default)]
    pub max_facets: Option<usize>,

    #[serde(default = "default_min_facets")]
    pub min_facets: usize,
}

fn default_min_facets() -> usize {
    1
}

/// One cleaned input of a faceted figure.
#[derive(Debug, Clone, Copy)]
pub struct FacetSource<'a> {
    pub label: &'a str,
    pub table: &'a Table,
    pub category_column: &'a str,
}

/// Build the panels of a faceted comparison.
pub fn build_facets(sources: &[FacetSource<'_>], layout: &FacetLayout) -> TransformResult<Vec<Facet>> {
    for source in sources {
        for column in [
            layout.facet_column.as_str(),
            layout.x_column.as_str(),
            layout.y_column.as_str(),
            layout.error_column.as_str(),
            source.category_column,
        ] {
            if !source.table.has_column(column) {
                return Err(TransformError::MissingColumn(column.to_string()));
            }
        }
    }

    let mut labels = facet_labels(sources, layout);
    if let Some(max) = layout.max_facets {
        labels.truncate(max);
    }
    if labels.len() < layout.min_facets {
        return Err(TransformError::EmptyResult(format!(
            "Faceting by '{}' ({} of {} required facets)",
            layout.facet_column,
            labels.len(),
            layout.min_facets
        )));
    }

    labels
        .into_iter()
        .map(|label| build_facet(sources, layout, label))
        .collect()
}

/// Distinct facet labels across sources: known order first, then first-seen.
fn facet_labels(sources: &[FacetSource<'_>], layout: &FacetLayout) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for source in sources {
        for row in &source.table.rows {
            if let Some(label) = cell_label(row.get(&layout.facet_column)) {
                if !seen.contains(&label) {
                    seen.push(label);
                }
            }
        }
    }
    order_labels(seen, &layout.facet_order)
}

/// Stable reorder: labels listed in `order` first (in that order), the rest
/// keep their relative position.
fn order_labels(mut labels: Vec<String>, order: &[String]) -> Vec<String> {
    labels.sort_by_key(|l| order.iter().position(|o| o == l).unwrap_or(order.len()));
    labels
}

fn cell_label(cell: Option<&Cell>) -> Option<String> {
    cell.filter(|c| !c.is_missing()).map(Cell::to_string)
}

fn build_facet(sources: &[FacetSource<'_>], layout: &FacetLayout, label: String) -> TransformResult<Facet> {
    let mut series = Vec::new();
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);

    for source in sources {
        // Facet labels are stringified cells, so compare the same way
        let panel = Table {
            headers: source.table.headers.clone(),
            rows: source
                .table
                .rows
                .iter()
                .filter(|r| cell_label(r.get(&layout.facet_column)).as_deref() == Some(label.as_str()))
                .cloned()
                .collect(),
        };

        let categories: Vec<String> = panel
            .distinct(source.category_column)
            .iter()
            .filter(|c| !c.is_missing())
            .map(Cell::to_string)
            .filter(|c| layout.category_order.is_empty() || layout.category_order.contains(c))
            .collect();

        for category in order_labels(categories, &layout.category_order) {
            let mut points = Vec::new();
            for (idx, row) in panel.rows.iter().enumerate() {
                if cell_label(row.get(source.category_column)).as_deref() != Some(category.as_str()) {
                    continue;
                }
                let numeric = |column: &str| {
                    row.get(column)
                        .and_then(Cell::as_f64)
                        .ok_or_else(|| TransformError::NotNumeric {
                            row: idx + 1,
                            column: column.to_string(),
                        })
                };
                let point = Point {
                    x: numeric(&layout.x_column)?,
                    y: numeric(&layout.y_column)?,
                    err: numeric(&layout.error_column)?,
                };
                lo = lo.min(point.x);
                hi = hi.max(point.x);
                points.push(point);
            }

            if points.is_empty() {
                continue;
            }
            points.sort_by(|a, b| a.x.total_cmp(&b.x));
            series.push(Series {
                source: source.label.to_string(),
                category,
                points,
            });
        }
    }

    let x_domain = if lo <= hi { (lo, hi) } else { EMPTY_X_DOMAIN };
    Ok(Facet {
        label,
        x_domain,
        series,
    })
}
