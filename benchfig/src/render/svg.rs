//! SVG rendering with plotters.

use plotters::coord::Shift;
use plotters::prelude::*;

use super::{AxisLabels, Figure, RangeBand, RenderStyle, Renderer};
use crate::error::{RenderError, RenderResult};
use crate::models::{Cell, Facet, PivotTable};

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

const COLOR_BAR_WIDTH: u32 = 180;
const COLOR_BAR_STEPS: usize = 100;

/// Heatmap cells without data.
const MISSING_COLOR: RGBColor = RGBColor(139, 0, 0);

const BAND_FILLS: [RGBColor; 3] = [
    RGBColor(211, 211, 211),
    RGBColor(255, 255, 255),
    RGBColor(170, 170, 170),
];

const SERIES_COLORS: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

/// Renders figures as standalone SVG documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgRenderer;

impl Renderer for SvgRenderer {
    fn render(&self, figure: &Figure, style: &RenderStyle) -> RenderResult<String> {
        let mut buffer = String::new();
        {
            let root = SVGBackend::with_string(&mut buffer, (style.width, style.height)).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;

            match figure {
                Figure::Heatmap { pivot, labels } => draw_heatmap(&root, pivot, labels, style)?,
                Figure::RangeRegression { bands, labels } => draw_bands(&root, bands, labels, style)?,
                Figure::FacetedComparison { facets, labels } => draw_facets(&root, facets, labels, style)?,
            }

            root.present().map_err(draw_err)?;
        }
        Ok(buffer)
    }

    fn extension(&self) -> &'static str {
        "svg"
    }
}

fn draw_err<E: std::fmt::Debug>(err: E) -> RenderError {
    RenderError::Draw(format!("{:?}", err))
}

fn font(style: &RenderStyle, size: u32) -> FontDesc<'_> {
    (style.font_family.as_str(), size as f64).into_font()
}

// =============================================================================
// Heatmap
// =============================================================================

/// Diverging blue-grey-red ramp over `t` in [0, 1].
fn coolwarm(t: f64) -> RGBColor {
    const COOL: (f64, f64, f64) = (59.0, 76.0, 192.0);
    const MID: (f64, f64, f64) = (221.0, 221.0, 221.0);
    const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);

    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
    let (from, to, u) = if t < 0.5 {
        (COOL, MID, t * 2.0)
    } else {
        (MID, WARM, (t - 0.5) * 2.0)
    };
    let lerp = |a: f64, b: f64| (a + (b - a) * u).round() as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

fn normalize(value: f64, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        (value - lo) / (hi - lo)
    } else {
        0.5
    }
}

/// Tick label for a cell centre; empty between cells.
fn key_label(keys: &[Cell], position: f64) -> String {
    let idx = position.round();
    if (position - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    keys.get(idx as usize).map(Cell::to_string).unwrap_or_default()
}

fn draw_heatmap(root: &Area<'_>, pivot: &PivotTable, labels: &AxisLabels, style: &RenderStyle) -> RenderResult<()> {
    let (lo, hi) = pivot
        .value_range()
        .ok_or_else(|| RenderError::Empty(format!("heatmap of '{}' has no cells", pivot.value)))?;
    let has_missing = pivot.cells.iter().flatten().any(Option::is_none);

    let (main, bar) = root.split_horizontally(style.width.saturating_sub(COLOR_BAR_WIDTH));
    let ncols = pivot.columns.len() as f64;
    let nrows = pivot.rows.len() as f64;

    // Row keys ascend upwards
    let mut chart = ChartBuilder::on(&main)
        .margin(20)
        .margin_top(40)
        .x_label_area_size(style.label_size * 3)
        .y_label_area_size(style.label_size * 4)
        .build_cartesian_2d(-0.5..ncols - 0.5, -0.5..nrows - 0.5)
        .map_err(draw_err)?;

    let column_label = |x: &f64| key_label(&pivot.columns, *x);
    let row_label = |y: &f64| key_label(&pivot.rows, *y);
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(pivot.columns.len())
        .y_labels(pivot.rows.len())
        .x_label_formatter(&column_label)
        .y_label_formatter(&row_label)
        .x_desc(labels.x.as_str())
        .y_desc(labels.y.as_str())
        .label_style(font(style, style.tick_size))
        .axis_desc_style(font(style, style.label_size))
        .draw()
        .map_err(draw_err)?;

    let mut cells = Vec::with_capacity(pivot.rows.len() * pivot.columns.len());
    for (r, row) in pivot.cells.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            let color = match value {
                Some(v) => coolwarm(normalize(*v, lo, hi)),
                None => MISSING_COLOR,
            };
            let (x, y) = (c as f64, r as f64);
            cells.push(Rectangle::new(
                [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                color.filled(),
            ));
        }
    }
    chart.draw_series(cells).map_err(draw_err)?;

    // Color bar
    let (bar_lo, bar_hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
    let mut scale = ChartBuilder::on(&bar)
        .margin(20)
        .margin_top(40)
        .margin_left(10)
        .x_label_area_size(style.label_size * 3)
        .right_y_label_area_size(style.tick_size * 5)
        .build_cartesian_2d(0f64..1f64, bar_lo..bar_hi)
        .map_err(draw_err)?;

    scale
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc(labels.value.as_str())
        .label_style(font(style, style.tick_size))
        .axis_desc_style(font(style, style.label_size))
        .draw()
        .map_err(draw_err)?;

    let step = (bar_hi - bar_lo) / COLOR_BAR_STEPS as f64;
    scale
        .draw_series((0..COLOR_BAR_STEPS).map(|i| {
            let y = bar_lo + step * i as f64;
            let t = (i as f64 + 0.5) / COLOR_BAR_STEPS as f64;
            Rectangle::new([(0.0, y), (1.0, y + step)], coolwarm(t).filled())
        }))
        .map_err(draw_err)?;

    if has_missing {
        bar.draw(&Rectangle::new([(10, 8), (30, 28)], MISSING_COLOR.filled()))
            .map_err(draw_err)?;
        bar.draw(&Text::new("no data", (36, 10), font(style, style.tick_size)))
            .map_err(draw_err)?;
    }
    Ok(())
}

// =============================================================================
// Range bands
// =============================================================================

fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn pad_linear(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        (lo - 1.0, hi + 1.0)
    }
}

/// Log-axis range with some headroom; values must be positive.
fn pad_log(extent: Option<(f64, f64)>) -> (f64, f64) {
    match extent {
        Some((lo, hi)) if lo > 0.0 => (lo / 1.5, hi * 1.5),
        _ => (0.1, 10.0),
    }
}

/// `10^n` at integer positions of a log10 axis.
fn power_of_ten_label(x: &f64) -> String {
    if (x - x.round()).abs() < 1e-6 {
        format!("10^{}", x.round() as i64)
    } else {
        String::new()
    }
}

fn draw_bands(root: &Area<'_>, bands: &[RangeBand], labels: &AxisLabels, style: &RenderStyle) -> RenderResult<()> {
    if bands.iter().all(|b| b.stats.is_empty()) {
        return Err(RenderError::Empty("range figure has no groups".into()));
    }

    let xs = bands.iter().flat_map(|b| {
        b.stats
            .iter()
            .map(|s| s.key)
            .chain(b.curve.points.iter().map(|p| p.0))
    });
    let (x_lo, x_hi) = extent(xs).map(|(lo, hi)| pad_linear(lo, hi)).unwrap_or((0.0, 1.0));

    let ys = bands.iter().flat_map(|b| {
        b.stats
            .iter()
            .flat_map(|s| [s.min, s.max])
            .chain(b.curve.points.iter().map(|p| p.1))
    });
    let (y_lo, y_hi) = pad_log(extent(ys.filter(|y| *y > 0.0)));

    let mut chart = ChartBuilder::on(root)
        .margin(20)
        .x_label_area_size(style.label_size * 3)
        .y_label_area_size(style.label_size * 5)
        .build_cartesian_2d(x_lo..x_hi, (y_lo..y_hi).log_scale())
        .map_err(draw_err)?;

    let ticks = ((x_hi - x_lo).ceil() as usize + 1).max(2);
    chart
        .configure_mesh()
        .x_labels(ticks)
        .x_label_formatter(&power_of_ten_label)
        .x_desc(labels.x.as_str())
        .y_desc(labels.y.as_str())
        .light_line_style(WHITE)
        .label_style(font(style, style.tick_size))
        .axis_desc_style(font(style, style.label_size))
        .draw()
        .map_err(draw_err)?;

    for (i, band) in bands.iter().enumerate() {
        let fill = BAND_FILLS[i % BAND_FILLS.len()];
        let line = SERIES_COLORS[i % SERIES_COLORS.len()];

        let mut outline: Vec<(f64, f64)> = band.stats.iter().map(|s| (s.key, s.min.max(y_lo))).collect();
        outline.extend(band.stats.iter().rev().map(|s| (s.key, s.max.max(y_lo))));

        chart
            .draw_series(std::iter::once(Polygon::new(outline.clone(), fill.mix(0.7).filled())))
            .map_err(draw_err)?
            .label(format!("{} Min-Max Range", band.label))
            .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 20, y + 6)], fill.filled()));

        if let Some(first) = outline.first().copied() {
            outline.push(first);
        }
        chart
            .draw_series(std::iter::once(PathElement::new(outline, BLACK.stroke_width(1))))
            .map_err(draw_err)?;

        let width = style.line_width;
        chart
            .draw_series(LineSeries::new(
                band.curve.points.iter().copied(),
                line.stroke_width(width),
            ))
            .map_err(draw_err)?
            .label(format!("{} (log-log Regression)", band.label))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line.stroke_width(width)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(font(style, style.tick_size))
        .draw()
        .map_err(draw_err)?;
    Ok(())
}

// =============================================================================
// Faceted comparison
// =============================================================================

fn first_seen<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for v in values {
        if !seen.contains(&v) {
            seen.push(v);
        }
    }
    seen
}

fn draw_facets(root: &Area<'_>, facets: &[Facet], labels: &AxisLabels, style: &RenderStyle) -> RenderResult<()> {
    if facets.is_empty() {
        return Err(RenderError::Empty("comparison has no facets".into()));
    }

    let series = || facets.iter().flat_map(|f| f.series.iter());
    let sources = first_seen(series().map(|s| s.source.as_str()));
    let categories = first_seen(series().map(|s| s.category.as_str()));

    // Shared log y range across all panels
    let ys = series().flat_map(|s| s.points.iter().flat_map(|p| [p.y - p.err, p.y, p.y + p.err]));
    let (y_lo, y_hi) = pad_log(extent(ys.filter(|y| *y > 0.0)));

    let (legend_area, body) = root.split_vertically(style.tick_size * 3);
    draw_category_legend(&legend_area, &categories, style)?;

    let rows = sources.len().max(1);
    let panels = body.split_evenly((rows, facets.len()));

    for row in 0..rows {
        for (col, facet) in facets.iter().enumerate() {
            let index = row * facets.len() + col;
            let letter = (b'a' + (index % 26) as u8) as char;
            let (x_lo, x_hi) = pad_linear(facet.x_domain.0, facet.x_domain.1);

            let mut chart = ChartBuilder::on(&panels[index])
                .margin(10)
                .caption(format!("({}) {}", letter, facet.label), font(style, style.label_size))
                .x_label_area_size(style.label_size * 3)
                .y_label_area_size(style.label_size * 4)
                .build_cartesian_2d(x_lo..x_hi, (y_lo..y_hi).log_scale())
                .map_err(draw_err)?;

            let mut mesh = chart.configure_mesh();
            mesh.disable_x_mesh()
                .x_desc(labels.x.as_str())
                .label_style(font(style, style.tick_size))
                .axis_desc_style(font(style, style.label_size));
            if col == 0 {
                mesh.y_desc(labels.y.as_str());
            }
            mesh.draw().map_err(draw_err)?;

            let Some(source) = sources.get(row) else {
                continue;
            };
            for s in facet.series.iter().filter(|s| s.source == *source) {
                let idx = categories.iter().position(|c| *c == s.category).unwrap_or(0);
                let color = SERIES_COLORS[idx % SERIES_COLORS.len()];
                let clamp = |y: f64| y.max(y_lo);

                chart
                    .draw_series(LineSeries::new(
                        s.points.iter().map(|p| (p.x, clamp(p.y))),
                        color.stroke_width(style.line_width),
                    ))
                    .map_err(draw_err)?;
                chart
                    .draw_series(s.points.iter().map(|p| {
                        ErrorBar::new_vertical(
                            p.x,
                            clamp(p.y - p.err),
                            clamp(p.y),
                            clamp(p.y + p.err),
                            color.filled(),
                            6,
                        )
                    }))
                    .map_err(draw_err)?;
                chart
                    .draw_series(s.points.iter().map(|p| Circle::new((p.x, clamp(p.y)), 4, color.filled())))
                    .map_err(draw_err)?;
            }
        }
    }
    Ok(())
}

/// One legend row above all panels.
fn draw_category_legend(area: &Area<'_>, categories: &[&str], style: &RenderStyle) -> RenderResult<()> {
    if categories.is_empty() {
        return Ok(());
    }
    let slot = (style.width / categories.len() as u32).max(1) as i32;
    let y = (style.tick_size * 3 / 2) as i32;

    for (i, category) in categories.iter().enumerate() {
        let color = SERIES_COLORS[i % SERIES_COLORS.len()];
        let x = slot * i as i32 + slot / 4;
        area.draw(&PathElement::new(vec![(x, y), (x + 30, y)], color.stroke_width(style.line_width)))
            .map_err(draw_err)?;
        area.draw(&Circle::new((x + 15, y), 4, color.filled()))
            .map_err(draw_err)?;
        area.draw(&Text::new(
            category.to_string(),
            (x + 40, y - style.tick_size as i32 / 2),
            font(style, style.tick_size),
        ))
        .map_err(draw_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupedStat, Point, RegressionCurve, Series};

    fn labels(x: &str, y: &str, value: &str) -> AxisLabels {
        AxisLabels {
            x: x.into(),
            y: y.into(),
            value: value.into(),
        }
    }

    fn pivot() -> PivotTable {
        PivotTable {
            row_key: "Param: _Alternatives".into(),
            column_key: "Param: _Tasks".into(),
            value: "Score".into(),
            rows: vec![Cell::Int(2), Cell::Int(3)],
            columns: vec![Cell::Int(4), Cell::Int(8)],
            cells: vec![vec![Some(1.0), Some(2.0)], vec![None, Some(4.0)]],
        }
    }

    #[test]
    fn test_coolwarm_endpoints() {
        assert_eq!(coolwarm(0.0), RGBColor(59, 76, 192));
        assert_eq!(coolwarm(0.5), RGBColor(221, 221, 221));
        assert_eq!(coolwarm(1.0), RGBColor(180, 4, 38));
        assert_eq!(coolwarm(f64::NAN), coolwarm(0.5));
        assert_eq!(normalize(3.0, 3.0, 3.0), 0.5);
    }

    #[test]
    fn test_tick_labels() {
        let keys = vec![Cell::Int(4), Cell::Int(8)];
        assert_eq!(key_label(&keys, 1.0), "8");
        assert_eq!(key_label(&keys, 0.5), "");
        assert_eq!(key_label(&keys, 7.0), "");
        assert_eq!(power_of_ten_label(&3.0), "10^3");
        assert_eq!(power_of_ten_label(&2.5), "");
    }

    #[test]
    fn test_render_heatmap() {
        let figure = Figure::Heatmap {
            pivot: pivot(),
            labels: labels("Tasks", "Alternatives", "Processing time (ms)"),
        };
        let svg = SvgRenderer.render(&figure, &RenderStyle::default()).unwrap();

        assert!(svg.contains("<svg"));
        assert!(svg.contains("Tasks"));
        assert!(svg.contains("no data"));
    }

    #[test]
    fn test_render_bands() {
        let stats: Vec<GroupedStat> = (1..=4)
            .map(|k| GroupedStat {
                key: k as f64,
                min: k as f64,
                max: 3.0 * k as f64,
                mean: 2.0 * k as f64,
                count: 2,
            })
            .collect();
        let figure = Figure::RangeRegression {
            bands: vec![RangeBand {
                label: "No-Slicing".into(),
                stats,
                curve: RegressionCurve {
                    coefficients: vec![0.1, 0.2],
                    points: vec![(1.0, 2.0), (4.0, 8.0)],
                },
            }],
            labels: labels("# Valid Configurations (log scale)", "Storage Consumption in MB", ""),
        };
        let svg = SvgRenderer.render(&figure, &RenderStyle::default()).unwrap();
        assert!(svg.contains("No-Slicing Min-Max Range"));
    }

    #[test]
    fn test_render_facets() {
        let facet = Facet {
            label: "Tiny".into(),
            x_domain: (1.0, 3.0),
            series: vec![Series {
                source: "FM4MC".into(),
                category: "Highway".into(),
                points: vec![
                    Point { x: 1.0, y: 5.0, err: 0.5 },
                    Point { x: 3.0, y: 9.0, err: 20.0 },
                ],
            }],
        };
        let figure = Figure::FacetedComparison {
            facets: vec![facet],
            labels: labels("Requirements", "Exec. Time (ms)", ""),
        };
        let svg = SvgRenderer.render(&figure, &RenderStyle::default()).unwrap();
        assert!(svg.contains("(a) Tiny"));
        assert!(svg.contains("Highway"));
    }

    #[test]
    fn test_empty_figures_rejected() {
        let figure = Figure::FacetedComparison {
            facets: vec![],
            labels: AxisLabels::default(),
        };
        assert!(matches!(
            SvgRenderer.render(&figure, &RenderStyle::default()),
            Err(RenderError::Empty(_))
        ));

        let mut empty = pivot();
        empty.cells = vec![vec![None, None], vec![None, None]];
        let figure = Figure::Heatmap {
            pivot: empty,
            labels: AxisLabels::default(),
        };
        assert!(matches!(
            SvgRenderer.render(&figure, &RenderStyle::default()),
            Err(RenderError::Empty(_))
        ));
    }
}
