//! Directional tilt testing — does allocation predict the winner beyond
//! what prices already imply?
//!
//! The structural trap: price is correlated with outcome (the cheaper side
//! does not win half the time), so comparing any raw agreement rate against
//! 50% manufactures a signal. Two defenses, reported together:
//!
//! - The symmetric-subset test restricts to markets where the two outcomes
//!   were bought at nearly equal prices, which minimizes the price-outcome
//!   correlation, and calibrates its null to the subset's own win-rate
//!   asymmetry rather than to 50%.
//! - The raw share- and dollar-weighted agreement rates are still computed,
//!   but only as explicitly biased reference numbers: share-weighted is
//!   biased down (the cheaper side yields more shares per dollar),
//!   dollar-weighted is biased up (the expensive side costs more).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::Outcome;

use crate::config::AnalysisConfig;
use crate::normal::two_sided_p;
use crate::table::ResolvedMarket;

/// Outcome of a tilt significance test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TiltVerdict {
    /// Allocation agrees with winners significantly more than the null.
    Predictive,
    /// Significantly less than the null — worse than no-skill.
    AntiPredictive,
    /// Within noise of the null.
    NoSignal,
}

/// Errors from the symmetric-subset test.
#[derive(Debug, Clone, Error)]
pub enum TiltTestError {
    #[error("symmetric subset has {actual} markets, need at least {required}")]
    InsufficientSubset { actual: usize, required: usize },
    #[error("degenerate null: calibrated agreement rate has zero variance")]
    DegenerateNull,
}

/// Result of the symmetric-subset z-test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymmetricSubsetResult {
    /// Markets with both VWAPs within the gap threshold of each other.
    pub subset_size: usize,
    /// Fraction of the subset where the larger-allocation outcome won.
    pub observed_agreement: f64,
    /// No-skill agreement rate calibrated to the subset's own excess-side
    /// and win-rate asymmetries (NOT 50%).
    pub null_agreement: f64,
    /// Binomial standard deviation of the agreement rate under the null.
    pub null_std: f64,
    pub z: f64,
    pub p_value: f64,
    pub verdict: TiltVerdict,
    pub gap_threshold: f64,
}

/// Run the symmetric-subset test over the resolved table.
///
/// Only both-sided markets with a defined excess outcome participate; the
/// subset keeps those whose VWAP gap is below the configured threshold.
pub fn symmetric_subset_test(
    markets: &[ResolvedMarket],
    config: &AnalysisConfig,
) -> Result<SymmetricSubsetResult, TiltTestError> {
    let subset: Vec<(Outcome, Outcome)> = markets
        .iter()
        .filter_map(|m| {
            let gap = m.vwap_gap()?;
            let excess = m.summary.excess_outcome?;
            (gap < config.symmetric_gap_threshold).then_some((excess, m.winner))
        })
        .collect();

    let n = subset.len();
    if n < config.min_subset_size {
        return Err(TiltTestError::InsufficientSubset {
            actual: n,
            required: config.min_subset_size,
        });
    }

    let n_f = n as f64;
    let observed = count(&subset, |(excess, winner)| excess == winner) / n_f;
    let p_excess_up = count(&subset, |(excess, _)| *excess == Outcome::Up) / n_f;
    let p_win_up = count(&subset, |(_, winner)| *winner == Outcome::Up) / n_f;

    // Under no skill, the excess side is independent of the winner; agreement
    // is then a function of the two marginal rates alone.
    let null = p_excess_up * p_win_up + (1.0 - p_excess_up) * (1.0 - p_win_up);
    let null_var = null * (1.0 - null) / n_f;
    if null_var <= 0.0 {
        return Err(TiltTestError::DegenerateNull);
    }
    let null_std = null_var.sqrt();

    let z = (observed - null) / null_std;
    let verdict = if z > config.z_cutoff {
        TiltVerdict::Predictive
    } else if z < -config.z_cutoff {
        TiltVerdict::AntiPredictive
    } else {
        TiltVerdict::NoSignal
    };

    Ok(SymmetricSubsetResult {
        subset_size: n,
        observed_agreement: observed,
        null_agreement: null,
        null_std,
        z,
        p_value: two_sided_p(z),
        verdict,
        gap_threshold: config.symmetric_gap_threshold,
    })
}

fn count<T>(items: &[T], predicate: impl Fn(&T) -> bool) -> f64 {
    items.iter().filter(|&item| predicate(item)).count() as f64
}

// ─── Naive reference rates ───────────────────────────────────────────

/// Raw agreement rates between allocation excess and winner.
///
/// Biased reference numbers only — each inherits the price-outcome
/// correlation in a different direction and neither is evidence of skill.
/// The symmetric-subset and stratified permutation tests carry the
/// conclusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaiveAgreement {
    /// Agreement of the share-excess side (biased DOWN: the cheaper side
    /// yields more shares per dollar).
    pub share_weighted: Option<f64>,
    /// Agreement of the dollar-excess side (biased UP: the expensive side
    /// costs more per share).
    pub dollar_weighted: Option<f64>,
    pub n: usize,
}

/// Compute both naive agreement rates over the resolved table.
pub fn naive_agreement(markets: &[ResolvedMarket]) -> NaiveAgreement {
    let share: Vec<bool> = markets
        .iter()
        .filter_map(|m| m.summary.excess_outcome.map(|e| e == m.winner))
        .collect();
    let dollar: Vec<bool> = markets
        .iter()
        .filter_map(|m| m.dollar_excess().map(|e| e == m.winner))
        .collect();

    let rate = |hits: &[bool]| {
        if hits.is_empty() {
            None
        } else {
            Some(hits.iter().filter(|&&h| h).count() as f64 / hits.len() as f64)
        }
    };

    NaiveAgreement {
        share_weighted: rate(&share),
        dollar_weighted: rate(&dollar),
        n: markets.len(),
    }
}
