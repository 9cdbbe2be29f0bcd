//! Driver regression — what explains balance-ratio variance?
//!
//! Ordinary least squares of balance_ratio on a fixed feature set, built
//! from first principles: normal equations, Gauss-Jordan inverse, classical
//! standard errors. Each feature is also reported with its bivariate
//! Spearman rank correlation so that a feature that looks predictive on its
//! own but collapses under controls is visible as exactly that contrast.
//! The fit carries a fixed caveat instead of a causal claim: lifetime
//! volume is only a proxy for the book depth that plausibly drives both
//! fill count and balance.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::{DurationClass, MarketMeta, MarketSummary};

/// Feature names, in design-matrix column order (after the intercept).
pub const FEATURE_NAMES: [&str; 5] = [
    "log_fills",
    "is_hourly",
    "is_major_asset",
    "seq_gap",
    "log_volume",
];

/// Caveat attached to every fit.
pub const DEPTH_PROXY_CAVEAT: &str = "lifetime volume is an imperfect proxy for instantaneous \
     book depth; a fill-count effect that survives this control can still be confounded with \
     unmeasured depth";

/// Errors from fitting.
#[derive(Debug, Clone, Error)]
pub enum RegressionError {
    #[error("need at least {required} complete rows, have {actual}")]
    InsufficientData { actual: usize, required: usize },
    #[error("design matrix is singular")]
    SingularDesign,
}

/// One complete observation: target plus the five features.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriverRow {
    pub balance_ratio: f64,
    pub log_fills: f64,
    pub is_hourly: f64,
    pub is_major_asset: f64,
    pub seq_gap: f64,
    pub log_volume: f64,
}

impl DriverRow {
    /// Build a row from a summary and its metadata. `None` when the ratio
    /// or the sequencing gap is undefined — those markets are dropped from
    /// the fit with a counted exclusion, never imputed.
    pub fn from_summary(summary: &MarketSummary, meta: &MarketMeta) -> Option<Self> {
        let balance_ratio = summary.balance_ratio?;
        let seq_gap = summary.sequencing_gap_secs?;
        Some(Self {
            balance_ratio,
            log_fills: (summary.total_fills() as f64).ln_1p(),
            is_hourly: match meta.duration_class() {
                DurationClass::Hourly => 1.0,
                DurationClass::FifteenMin => 0.0,
            },
            is_major_asset: if meta.is_major_asset() { 1.0 } else { 0.0 },
            seq_gap,
            log_volume: meta.lifetime_volume.max(0.0).ln_1p(),
        })
    }

    fn features(&self) -> [f64; 5] {
        [
            self.log_fills,
            self.is_hourly,
            self.is_major_asset,
            self.seq_gap,
            self.log_volume,
        ]
    }
}

/// Per-feature effect: multivariate coefficient with its bivariate
/// correlation alongside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEffect {
    pub name: String,
    pub coefficient: f64,
    pub std_error: f64,
    pub t_stat: f64,
    /// Spearman rank correlation with the target, ignoring the other
    /// features. Divergence from the multivariate view marks confounding.
    pub bivariate_spearman: f64,
}

/// Complete OLS fit of balance_ratio on the driver features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionFit {
    pub intercept: f64,
    pub features: Vec<FeatureEffect>,
    pub r_squared: f64,
    pub n: usize,
    pub caveat: String,
}

const K: usize = FEATURE_NAMES.len() + 1; // columns incl. intercept

/// Fit the driver regression.
pub fn fit_drivers(rows: &[DriverRow]) -> Result<RegressionFit, RegressionError> {
    let n = rows.len();
    // A few more rows than columns, or the error variance is meaningless.
    let required = K + 2;
    if n < required {
        return Err(RegressionError::InsufficientData {
            actual: n,
            required,
        });
    }

    // Normal equations: xtx = X'X (K x K), xty = X'y.
    let mut xtx = [[0.0_f64; K]; K];
    let mut xty = [0.0_f64; K];
    for row in rows {
        let mut x = [0.0_f64; K];
        x[0] = 1.0;
        x[1..].copy_from_slice(&row.features());
        for i in 0..K {
            xty[i] += x[i] * row.balance_ratio;
            for j in 0..K {
                xtx[i][j] += x[i] * x[j];
            }
        }
    }

    let inverse = invert(xtx).ok_or(RegressionError::SingularDesign)?;
    let mut beta = [0.0_f64; K];
    for i in 0..K {
        for j in 0..K {
            beta[i] += inverse[i][j] * xty[j];
        }
    }

    // Residual and total sums of squares.
    let mean_y = rows.iter().map(|r| r.balance_ratio).sum::<f64>() / n as f64;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for row in rows {
        let mut x = [0.0_f64; K];
        x[0] = 1.0;
        x[1..].copy_from_slice(&row.features());
        let predicted: f64 = (0..K).map(|i| beta[i] * x[i]).sum();
        ss_res += (row.balance_ratio - predicted).powi(2);
        ss_tot += (row.balance_ratio - mean_y).powi(2);
    }
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    };

    let sigma_sq = ss_res / (n - K) as f64;
    let target: Vec<f64> = rows.iter().map(|r| r.balance_ratio).collect();

    let features = FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(f, name)| {
            let coefficient = beta[f + 1];
            let variance = sigma_sq * inverse[f + 1][f + 1];
            let std_error = variance.max(0.0).sqrt();
            let t_stat = if std_error > 0.0 {
                coefficient / std_error
            } else {
                0.0
            };
            let column: Vec<f64> = rows.iter().map(|r| r.features()[f]).collect();
            FeatureEffect {
                name: (*name).to_string(),
                coefficient,
                std_error,
                t_stat,
                bivariate_spearman: spearman(&column, &target),
            }
        })
        .collect();

    Ok(RegressionFit {
        intercept: beta[0],
        features,
        r_squared,
        n,
        caveat: DEPTH_PROXY_CAVEAT.to_string(),
    })
}

// ─── Numerics ────────────────────────────────────────────────────────

/// Invert a K x K matrix by Gauss-Jordan elimination with partial pivoting.
/// Returns `None` when a pivot collapses (singular design).
fn invert(mut a: [[f64; K]; K]) -> Option<[[f64; K]; K]> {
    let mut inv = [[0.0_f64; K]; K];
    for (i, row) in inv.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for col in 0..K {
        // Partial pivot: largest magnitude in this column.
        let pivot_row = (col..K)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot_row][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = a[col][col];
        for j in 0..K {
            a[col][j] /= pivot;
            inv[col][j] /= pivot;
        }
        for i in 0..K {
            if i != col {
                let factor = a[i][col];
                for j in 0..K {
                    a[i][j] -= factor * a[col][j];
                    inv[i][j] -= factor * inv[col][j];
                }
            }
        }
    }
    Some(inv)
}

/// Spearman rank correlation: Pearson on mid-ranks (average ties).
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }
    pearson(&ranks(x), &ranks(y))
}

fn ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        values[i]
            .partial_cmp(&values[j])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        // Tie group [i, j): all get the mid-rank.
        let mut j = i + 1;
        while j < n && values[order[j]] == values[order[i]] {
            j += 1;
        }
        let mid_rank = (i + j - 1) as f64 / 2.0 + 1.0;
        for &idx in &order[i..j] {
            ranks[idx] = mid_rank;
        }
        i = j;
    }
    ranks
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&a, &b) in x.iter().zip(y.iter()) {
        cov += (a - mean_x) * (b - mean_y);
        var_x += (a - mean_x).powi(2);
        var_y += (b - mean_y).powi(2);
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return 0.0;
    }
    cov / (var_x * var_y).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(balance: f64, log_fills: f64, seq_gap: f64) -> DriverRow {
        DriverRow {
            balance_ratio: balance,
            log_fills,
            is_hourly: 0.0,
            is_major_asset: 0.0,
            seq_gap,
            log_volume: 10.0,
        }
    }

    // ─── Spearman ────────────────────────────────────────────────

    #[test]
    fn spearman_perfect_monotone() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![2.0, 4.0, 9.0, 16.0, 100.0]; // nonlinear but monotone
        assert!((spearman(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn spearman_perfect_inverse() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y = vec![8.0, 6.0, 4.0, 2.0];
        assert!((spearman(&x, &y) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn spearman_handles_ties() {
        let x = vec![1.0, 1.0, 2.0, 3.0];
        let y = vec![1.0, 1.0, 2.0, 3.0];
        assert!((spearman(&x, &y) - 1.0).abs() < 1e-12);
    }

    // ─── OLS ─────────────────────────────────────────────────────

    #[test]
    fn recovers_planted_coefficients() {
        // balance = 0.1 + 0.05 * log_fills - 0.002 * seq_gap, noise-free;
        // the other features vary so the design stays full-rank.
        let mut rows = Vec::new();
        for i in 0..60 {
            let log_fills = 1.0 + (i % 10) as f64 * 0.3;
            let seq_gap = (i % 7) as f64 * 5.0;
            let is_hourly = (i % 2) as f64;
            let is_major = (i % 3 == 0) as u8 as f64;
            let log_volume = 8.0 + (i % 5) as f64;
            rows.push(DriverRow {
                balance_ratio: 0.1 + 0.05 * log_fills - 0.002 * seq_gap,
                log_fills,
                is_hourly,
                is_major_asset: is_major,
                seq_gap,
                log_volume,
            });
        }
        let fit = fit_drivers(&rows).unwrap();
        assert!((fit.intercept - 0.1).abs() < 1e-8, "intercept {}", fit.intercept);
        let by_name = |name: &str| {
            fit.features
                .iter()
                .find(|f| f.name == name)
                .map(|f| f.coefficient)
                .unwrap()
        };
        assert!((by_name("log_fills") - 0.05).abs() < 1e-8);
        assert!((by_name("seq_gap") + 0.002).abs() < 1e-8);
        assert!(by_name("is_hourly").abs() < 1e-8);
        assert!(fit.r_squared > 0.999_999);
        assert_eq!(fit.n, 60);
        assert_eq!(fit.caveat, DEPTH_PROXY_CAVEAT);
    }

    #[test]
    fn t_stats_flag_the_real_driver() {
        // Strong log_fills effect plus noise from a deterministic wobble;
        // seq_gap is pure noise.
        let mut rows = Vec::new();
        for i in 0..120 {
            let log_fills = 1.0 + (i % 12) as f64 * 0.25;
            let wobble = ((i * 37) % 100) as f64 / 1000.0;
            rows.push(DriverRow {
                balance_ratio: (0.2 + 0.15 * log_fills + wobble).min(1.0),
                log_fills,
                is_hourly: (i % 2) as f64,
                is_major_asset: (i % 5 == 0) as u8 as f64,
                seq_gap: ((i * 13) % 50) as f64,
                log_volume: 9.0 + (i % 4) as f64,
            });
        }
        let fit = fit_drivers(&rows).unwrap();
        let fills = fit.features.iter().find(|f| f.name == "log_fills").unwrap();
        let gap = fit.features.iter().find(|f| f.name == "seq_gap").unwrap();
        assert!(fills.t_stat.abs() > 5.0, "t = {}", fills.t_stat);
        assert!(fills.t_stat.abs() > gap.t_stat.abs());
        assert!(fills.bivariate_spearman > 0.8);
    }

    #[test]
    fn too_few_rows_is_an_explicit_error() {
        let rows: Vec<DriverRow> = (0..4).map(|i| row(0.5, i as f64, 1.0)).collect();
        assert!(matches!(
            fit_drivers(&rows),
            Err(RegressionError::InsufficientData { actual: 4, .. })
        ));
    }

    #[test]
    fn constant_column_is_singular() {
        // log_fills, seq_gap, volume all constant alongside the intercept.
        let rows: Vec<DriverRow> = (0..20).map(|_| row(0.5, 2.0, 3.0)).collect();
        assert!(matches!(
            fit_drivers(&rows),
            Err(RegressionError::SingularDesign)
        ));
    }
}
