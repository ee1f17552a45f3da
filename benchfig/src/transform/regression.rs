//! Log-log polynomial regression over grouped means.
//!
//! Fits `log10(mean) ≈ p(key)` by ordinary least squares and evaluates the
//! fit back in linear space as `(x, 10^p(x))`. With `key = log10(complexity)`
//! the curve is a power law drawn on a log y axis.
//!
//! # Example
//!
//! ```rust
//! use benchfig::transform::regression::polyfit;
//!
//! let xs = [0.0, 1.0, 2.0, 3.0];
//! let ys = [1.0, 3.0, 5.0, 7.0];
//! let coefficients = polyfit(&xs, &ys, 1).unwrap();
//! assert!((coefficients[0] - 2.0).abs() < 1e-9);
//! assert!((coefficients[1] - 1.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RegressionError, RegressionResult};
use crate::models::{GroupedStat, RegressionCurve};

/// Regression settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionOptions {
    /// Polynomial degree in log space.
    #[serde(default = "default_degree")]
    pub degree: usize,
    /// Groups with a key below this are excluded from the fit.
    #[serde(default = "default_lower_bound")]
    pub lower_bound: f64,
    /// Number of evaluation points.
    #[serde(default = "default_num_points")]
    pub num_points: usize,
}

fn default_degree() -> usize {
    1
}

fn default_lower_bound() -> f64 {
    1.0
}

fn default_num_points() -> usize {
    300
}

impl Default for RegressionOptions {
    fn default() -> Self {
        Self {
            degree: default_degree(),
            lower_bound: default_lower_bound(),
            num_points: default_num_points(),
        }
    }
}

/// Fit and evaluate the log-log regression of group means.
pub fn log_log_regression(
    stats: &[GroupedStat],
    options: &RegressionOptions,
) -> RegressionResult<RegressionCurve> {
    let fitted: Vec<&GroupedStat> = stats
        .iter()
        .filter(|s| s.key >= options.lower_bound)
        .collect();

    let required = options.degree + 1;
    if fitted.len() < required {
        return Err(RegressionError::InsufficientData {
            groups: fitted.len(),
            degree: options.degree,
            required,
        });
    }

    if let Some(bad) = fitted.iter().find(|s| s.mean <= 0.0 || s.mean.is_nan()) {
        return Err(RegressionError::NonPositiveMean {
            key: bad.key,
            mean: bad.mean,
        });
    }

    let xs: Vec<f64> = fitted.iter().map(|s| s.key).collect();
    let ys: Vec<f64> = fitted.iter().map(|s| s.mean.log10()).collect();
    let coefficients = polyfit(&xs, &ys, options.degree)?;

    let (lo, hi) = xs
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));

    let points = linspace(lo, hi, options.num_points)
        .into_iter()
        .map(|x| (x, 10f64.powf(polyval(&coefficients, x))))
        .collect();

    Ok(RegressionCurve {
        coefficients,
        points,
    })
}

/// Least-squares polynomial fit, coefficients highest power first.
///
/// Solves the normal equations `(VᵀV) c = Vᵀy` of the Vandermonde matrix `V`
/// by Cholesky decomposition.
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> RegressionResult<Vec<f64>> {
    let n = degree + 1;
    let mut distinct: Vec<f64> = xs.to_vec();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    if distinct.len() < n || xs.len() != ys.len() {
        return Err(RegressionError::InsufficientData {
            groups: distinct.len(),
            degree,
            required: n,
        });
    }

    // Normal equations in ascending powers: a[i][j] = Σ x^(i+j), b[i] = Σ y·x^i
    let mut a = vec![vec![0.0; n]; n];
    let mut b = vec![0.0; n];
    for (&x, &y) in xs.iter().zip(ys) {
        let powers: Vec<f64> = (0..2 * n - 1).map(|p| x.powi(p as i32)).collect();
        for i in 0..n {
            for j in 0..n {
                a[i][j] += powers[i + j];
            }
            b[i] += y * powers[i];
        }
    }

    let mut ascending = cholesky_solve(&a, &b)?;
    ascending.reverse();
    Ok(ascending)
}

/// Solve `A x = b` for symmetric positive definite `A`.
fn cholesky_solve(a: &[Vec<f64>], b: &[f64]) -> RegressionResult<Vec<f64>> {
    let n = b.len();

    // A = L * Lᵀ
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let diag = a[j][j] - sum;
                if !diag.is_finite() || diag <= f64::EPSILON * a[j][j].abs() {
                    return Err(RegressionError::Singular);
                }
                l[j][j] = diag.sqrt();
            } else {
                l[i][j] = (a[i][j] - sum) / l[j][j];
            }
        }
    }

    // L * y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[i][j] * y[j]).sum();
        y[i] = (b[i] - sum) / l[i][i];
    }

    // Lᵀ * x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|j| l[j][i] * x[j]).sum();
        x[i] = (y[i] - sum) / l[i][i];
    }

    Ok(x)
}

/// Evaluate a polynomial (highest power first) by Horner's rule.
pub fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().fold(0.0, |acc, c| acc * x + c)
}

/// `num` evenly spaced values over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| if i == num - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(key: f64, mean: f64) -> GroupedStat {
        GroupedStat {
            key,
            min: mean,
            max: mean,
            mean,
            count: 1,
        }
    }

    #[test]
    fn test_polyfit_linear() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + 1.0).collect();
        let c = polyfit(&xs, &ys, 1).unwrap();

        assert_eq!(c.len(), 2);
        assert!((c[0] - 2.0).abs() < 1e-9);
        assert!((c[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_polyfit_quadratic() {
        let xs = [-2.0, -1.0, 0.0, 1.0, 2.0, 3.0];
        let ys: Vec<f64> = xs.iter().map(|x| 0.5 * x * x - x + 3.0).collect();
        let c = polyfit(&xs, &ys, 2).unwrap();

        for (got, want) in c.iter().zip([0.5, -1.0, 3.0]) {
            assert!((got - want).abs() < 1e-8, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_polyfit_underdetermined() {
        let err = polyfit(&[1.0, 1.0, 1.0], &[2.0, 3.0, 4.0], 1).unwrap_err();
        assert!(matches!(
            err,
            RegressionError::InsufficientData {
                groups: 1,
                required: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_single_group_is_insufficient() {
        let err = log_log_regression(&[stat(2.0, 100.0)], &RegressionOptions::default()).unwrap_err();
        assert!(matches!(err, RegressionError::InsufficientData { groups: 1, .. }));
    }

    #[test]
    fn test_lower_bound_excludes_groups() {
        let stats = [stat(0.5, 1.0), stat(2.0, 10.0)];
        let err = log_log_regression(&stats, &RegressionOptions::default()).unwrap_err();
        assert!(matches!(err, RegressionError::InsufficientData { groups: 1, .. }));
    }

    #[test]
    fn test_non_positive_mean() {
        let stats = [stat(1.0, 10.0), stat(2.0, 0.0)];
        let err = log_log_regression(&stats, &RegressionOptions::default()).unwrap_err();
        assert!(matches!(err, RegressionError::NonPositiveMean { key, .. } if key == 2.0));
    }

    #[test]
    fn test_power_law_curve() {
        // mean = 10^(0.5 k + 1)
        let stats: Vec<GroupedStat> = (1..=6)
            .map(|k| stat(k as f64, 10f64.powf(0.5 * k as f64 + 1.0)))
            .collect();
        let curve = log_log_regression(&stats, &RegressionOptions::default()).unwrap();

        assert_eq!(curve.points.len(), 300);
        assert_eq!(curve.points[0].0, 1.0);
        assert_eq!(curve.points[299].0, 6.0);
        assert!((curve.coefficients[0] - 0.5).abs() < 1e-9);

        let (x, y) = curve.points[299];
        assert!((y.log10() - (0.5 * x + 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_linear_log_means_recovered_at_every_point() {
        // log10(mean) = 2 k + 1
        let stats: Vec<GroupedStat> = (1..=5)
            .map(|k| stat(k as f64, 10f64.powf(2.0 * k as f64 + 1.0)))
            .collect();
        let curve = log_log_regression(&stats, &RegressionOptions::default()).unwrap();

        assert_eq!(curve.coefficients.len(), 2);
        assert!((curve.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((curve.coefficients[1] - 1.0).abs() < 1e-9);

        assert_eq!(curve.points.len(), 300);
        for (x, y) in &curve.points {
            assert!((1.0..=5.0).contains(x));
            let expected = 10f64.powf(2.0 * x + 1.0);
            assert!((y / expected - 1.0).abs() < 1e-9, "x = {}: {} vs {}", x, y, expected);
        }
    }

    #[test]
    fn test_linspace_and_polyval() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 3.0, 1), vec![3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(polyval(&[2.0, 1.0], 3.0), 7.0);
        assert_eq!(polyval(&[1.0, 0.0, -4.0], 2.0), 0.0);
    }

    #[test]
    fn test_options_serde_defaults() {
        let options: RegressionOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, RegressionOptions::default());
    }
}
