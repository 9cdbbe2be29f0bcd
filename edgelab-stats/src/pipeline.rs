//! End-to-end analysis pipeline — wires aggregation output through the
//! accounting engines and statistical stages into one serializable report.
//!
//! Ordering: the statistical stages need the complete summary table and
//! start only after every market is summarized and resolved. Per-market
//! accounting (decomposition, counterfactual) is independent across markets
//! and fans out on rayon. Per-market data problems never abort the batch;
//! they land in `Coverage` as counts, and statistical stages that decline
//! to run (too little data) leave a named warning instead of a result.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use edgelab_core::{
    decompose_market, hold_to_settlement, DecomposeError, DecompositionTotals,
    DisciplineSummary, HoldComparison, MarketId, MarketMeta, MarketSummary, PnlDecomposition,
    ResolutionTable,
};

use crate::config::AnalysisConfig;
use crate::permutation::{stratified_permutation_test, StratifiedPermutationResult};
use crate::regression::{fit_drivers, DriverRow, RegressionFit};
use crate::table::ResolvedMarket;
use crate::tilt::{naive_agreement, symmetric_subset_test, NaiveAgreement, SymmetricSubsetResult};

/// Everything the pipeline consumes. The collection layer (out of process)
/// produces summaries via `FillAggregator` plus the resolution table and
/// optional metadata.
#[derive(Debug, Clone, Default)]
pub struct AnalysisInput {
    pub summaries: Vec<MarketSummary>,
    pub resolutions: ResolutionTable,
    pub metas: HashMap<MarketId, MarketMeta>,
    /// blake3 fingerprint of the raw fill input, when known.
    pub dataset_hash: Option<String>,
    /// Maker rebates tallied at ingest; reported beside, never inside,
    /// per-market trade P&L.
    pub rebate_total: f64,
    /// Malformed input rows skipped at the ingestion boundary.
    pub skipped_input_records: usize,
}

/// Data coverage and quality tallies for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Coverage {
    pub markets_seen: usize,
    pub markets_resolved: usize,
    /// Markets holding shares with no usable resolution record.
    pub markets_unresolved: usize,
    /// Markets whose resolution records disagree with each other.
    pub markets_conflicting: usize,
    pub undefined_combined_vwap: usize,
    pub undefined_balance_ratio: usize,
    /// Markets whose decomposition residual blew tolerance. Fatal for
    /// their inclusion in totals; each is named here.
    pub invariant_violations: Vec<String>,
    /// Markets lacking the metadata or defined fields the regression needs.
    pub regression_rows_dropped: usize,
    pub skipped_input_records: usize,
}

/// Complete typed output of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub dataset_hash: Option<String>,
    pub coverage: Coverage,
    pub summaries: Vec<MarketSummary>,
    pub decompositions: Vec<PnlDecomposition>,
    pub decomposition_totals: DecompositionTotals,
    pub comparisons: Vec<HoldComparison>,
    pub discipline: DisciplineSummary,
    pub naive_agreement: NaiveAgreement,
    pub symmetric_subset: Option<SymmetricSubsetResult>,
    pub permutation: Option<StratifiedPermutationResult>,
    pub regression: Option<RegressionFit>,
    /// Win rate of one-sided markets' bought outcome, when any resolved.
    pub one_sided_accuracy: Option<f64>,
    pub rebate_total: f64,
    /// Named conditions for stages that declined to run.
    pub warnings: Vec<String>,
}

/// Run the full analysis over a prepared input.
pub fn run_analysis(input: AnalysisInput, config: &AnalysisConfig) -> AnalysisReport {
    let AnalysisInput {
        summaries,
        resolutions,
        metas,
        dataset_hash,
        rebate_total,
        skipped_input_records,
    } = input;

    let mut coverage = Coverage {
        markets_seen: summaries.len(),
        skipped_input_records,
        ..Coverage::default()
    };
    let mut warnings = Vec::new();

    // ── Resolve ──
    let mut resolved: Vec<ResolvedMarket> = Vec::new();
    for summary in &summaries {
        if summary.combined_vwap.is_none() {
            coverage.undefined_combined_vwap += 1;
        }
        if summary.balance_ratio.is_none() {
            coverage.undefined_balance_ratio += 1;
        }
        match resolutions.winner(&summary.market_id) {
            Some(winner) => resolved.push(ResolvedMarket {
                summary: summary.clone(),
                winner,
            }),
            None => {
                if resolutions.is_conflicting(&summary.market_id) {
                    coverage.markets_conflicting += 1;
                } else {
                    coverage.markets_unresolved += 1;
                }
            }
        }
    }
    coverage.markets_resolved = resolved.len();
    info!(
        seen = coverage.markets_seen,
        resolved = coverage.markets_resolved,
        unresolved = coverage.markets_unresolved,
        conflicting = coverage.markets_conflicting,
        "market coverage"
    );

    // ── Decompose + counterfactual (independent per market) ──
    let accounting: Vec<(Result<PnlDecomposition, DecomposeError>, HoldComparison)> = resolved
        .par_iter()
        .map(|m| {
            (
                decompose_market(&m.summary, m.winner, config.residual_tolerance),
                hold_to_settlement(&m.summary, m.winner),
            )
        })
        .collect();

    let mut decompositions = Vec::with_capacity(accounting.len());
    let mut comparisons = Vec::with_capacity(accounting.len());
    for (decomposition, comparison) in accounting {
        match decomposition {
            Ok(d) => decompositions.push(d),
            Err(e) => {
                warn!(error = %e, "decomposition invariant violated");
                coverage.invariant_violations.push(e.to_string());
            }
        }
        comparisons.push(comparison);
    }
    let decomposition_totals = DecompositionTotals::from_decompositions(&decompositions);
    let discipline = DisciplineSummary::from_comparisons(&comparisons);
    debug!(
        spread = decomposition_totals.spread,
        drag = decomposition_totals.drag,
        sell_pnl = decomposition_totals.sell_pnl,
        realized = decomposition_totals.realized_pnl,
        "decomposition totals"
    );

    // ── One-sided directional accuracy ──
    let one_sided: Vec<bool> = resolved
        .iter()
        .filter_map(|m| m.summary.bet_outcome().map(|bet| bet == m.winner))
        .collect();
    let one_sided_accuracy = if one_sided.is_empty() {
        None
    } else {
        Some(one_sided.iter().filter(|&&hit| hit).count() as f64 / one_sided.len() as f64)
    };

    // ── Statistical stages (need the complete resolved table) ──
    let naive = naive_agreement(&resolved);

    let symmetric_subset = match symmetric_subset_test(&resolved, config) {
        Ok(result) => Some(result),
        Err(e) => {
            warnings.push(format!("symmetric subset test skipped: {e}"));
            None
        }
    };

    let permutation = match stratified_permutation_test(&resolved, config) {
        Ok(result) => Some(result),
        Err(e) => {
            warnings.push(format!("stratified permutation test skipped: {e}"));
            None
        }
    };

    // ── Driver regression ──
    let rows: Vec<DriverRow> = summaries
        .iter()
        .filter_map(|s| {
            let meta = metas.get(&s.market_id)?;
            DriverRow::from_summary(s, meta)
        })
        .collect();
    coverage.regression_rows_dropped = summaries.len() - rows.len();
    let regression = match fit_drivers(&rows) {
        Ok(fit) => Some(fit),
        Err(e) => {
            warnings.push(format!("driver regression skipped: {e}"));
            None
        }
    };

    info!(warnings = warnings.len(), "analysis complete");

    AnalysisReport {
        dataset_hash,
        coverage,
        summaries,
        decompositions,
        decomposition_totals,
        comparisons,
        discipline,
        naive_agreement: naive,
        symmetric_subset,
        permutation,
        regression,
        one_sided_accuracy,
        rebate_total,
        warnings,
    }
}
