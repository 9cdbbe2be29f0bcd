//! Stratified permutation test for allocation skill.
//!
//! Statistic: the mean dollar allocation gap toward the eventual winner
//! across all both-sided resolved markets. The null distribution is built
//! by reshuffling WINNER labels only within quantile strata of the
//! price-implied win probability, preserving each stratum's observed win
//! count. The stratification is load-bearing: a global unconstrained
//! shuffle would destroy the real price-outcome correlation and make an
//! unskilled price-follower look predictive.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AnalysisConfig;
use crate::table::ResolvedMarket;

/// Errors from the permutation test.
#[derive(Debug, Clone, Error)]
pub enum PermutationError {
    #[error("no stratum met the minimum size {min_stratum_size}")]
    NoUsableStrata { min_stratum_size: usize },
}

/// Result of the stratified permutation test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratifiedPermutationResult {
    /// Mean allocation-toward-winner gap over the markets used.
    pub observed_gap: f64,
    /// Two-sided empirical p-value against the stratified null.
    pub p_value: f64,
    pub trials: usize,
    /// Mean and standard deviation of the null distribution, for context.
    pub null_mean: f64,
    pub null_std: f64,
    pub strata_used: usize,
    /// Strata dropped for being thinner than the configured minimum.
    pub strata_excluded: usize,
    pub markets_used: usize,
    /// Markets dropped before stratification (one-sided or unpriced).
    pub markets_excluded: usize,
}

/// One market inside a stratum: Up-dollar fraction and whether Up won.
#[derive(Debug, Clone, Copy)]
struct StratumRow {
    up_fraction: f64,
    up_won: bool,
}

impl StratumRow {
    fn gap(&self, up_won: bool) -> f64 {
        if up_won {
            2.0 * self.up_fraction - 1.0
        } else {
            1.0 - 2.0 * self.up_fraction
        }
    }
}

/// Run the stratified permutation test over the resolved table.
pub fn stratified_permutation_test(
    markets: &[ResolvedMarket],
    config: &AnalysisConfig,
) -> Result<StratifiedPermutationResult, PermutationError> {
    // Rows need a price-implied probability and a dollar allocation.
    let mut rows: Vec<(f64, StratumRow)> = markets
        .iter()
        .filter_map(|m| {
            let implied = m.implied_up_prob()?;
            let up_fraction = m.summary.up_dollar_fraction()?;
            Some((
                implied,
                StratumRow {
                    up_fraction,
                    up_won: m.winner == edgelab_core::Outcome::Up,
                },
            ))
        })
        .collect();
    let markets_excluded = markets.len() - rows.len();

    // Quantile strata: sort by implied probability, chunk into equal counts.
    rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let strata = partition_into_strata(&rows, config.strata);

    let mut used: Vec<Vec<StratumRow>> = Vec::new();
    let mut strata_excluded = 0;
    for stratum in strata {
        if stratum.len() < config.min_stratum_size {
            strata_excluded += 1;
        } else {
            used.push(stratum);
        }
    }
    if used.is_empty() {
        return Err(PermutationError::NoUsableStrata {
            min_stratum_size: config.min_stratum_size,
        });
    }

    let markets_used: usize = used.iter().map(Vec::len).sum();
    let observed = used
        .iter()
        .flat_map(|stratum| stratum.iter().map(|row| row.gap(row.up_won)))
        .sum::<f64>()
        / markets_used as f64;

    // Empirical null: within each stratum, reassign which markets are
    // labeled Up-wins while preserving the stratum's Up-win count.
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut labels: Vec<Vec<bool>> = used
        .iter()
        .map(|stratum| stratum.iter().map(|row| row.up_won).collect())
        .collect();

    let mut null_stats = Vec::with_capacity(config.permutation_trials);
    for _ in 0..config.permutation_trials {
        let mut total = 0.0;
        for (stratum, stratum_labels) in used.iter().zip(labels.iter_mut()) {
            shuffle_preserving_count(stratum_labels, &mut rng);
            for (row, &up_won) in stratum.iter().zip(stratum_labels.iter()) {
                total += row.gap(up_won);
            }
        }
        null_stats.push(total / markets_used as f64);
    }

    let trials = null_stats.len();
    let null_mean = null_stats.iter().sum::<f64>() / trials as f64;
    let null_var = null_stats
        .iter()
        .map(|s| (s - null_mean).powi(2))
        .sum::<f64>()
        / trials as f64;

    // Two-sided empirical p with the add-one correction.
    let ge = null_stats.iter().filter(|&&s| s >= observed).count();
    let le = null_stats.iter().filter(|&&s| s <= observed).count();
    let p_value = (2.0 * (ge.min(le) + 1) as f64 / (trials + 1) as f64).min(1.0);

    Ok(StratifiedPermutationResult {
        observed_gap: observed,
        p_value,
        trials,
        null_mean,
        null_std: null_var.sqrt(),
        strata_used: used.len(),
        strata_excluded,
        markets_used,
        markets_excluded,
    })
}

/// Split sorted rows into `count` near-equal contiguous chunks.
fn partition_into_strata(rows: &[(f64, StratumRow)], count: usize) -> Vec<Vec<StratumRow>> {
    let n = rows.len();
    let count = count.max(1);
    let mut strata = Vec::with_capacity(count);
    for i in 0..count {
        let start = i * n / count;
        let end = (i + 1) * n / count;
        if start < end {
            strata.push(rows[start..end].iter().map(|(_, row)| *row).collect());
        }
    }
    strata
}

/// Fisher-Yates shuffle of winner labels. A permutation of the slice can
/// never change how many `true` labels it holds — that is the constraint
/// the stratified null depends on.
pub fn shuffle_preserving_count(labels: &mut [bool], rng: &mut StdRng) {
    for i in (1..labels.len()).rev() {
        let j = rng.gen_range(0..=i);
        labels.swap(i, j);
    }
}
