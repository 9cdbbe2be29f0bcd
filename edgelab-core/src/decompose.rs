//! Exact P&L decomposition for resolved markets.
//!
//! Realized profit partitions into three components that sum to the
//! independently computed ground truth with zero algebraic residual:
//!
//! 1. spread   — matched_pairs x (1 - combined VWAP): profit locked in by
//!    holding both outcomes below $1 per pair.
//! 2. drag     — unmatched_shares x (settled price of the excess outcome -
//!    its buy VWAP): the cost (or windfall) of the directionally exposed
//!    excess. Execution noise, not a speculative bet.
//! 3. sell_pnl — sell proceeds minus sold shares valued at that outcome's
//!    buy VWAP: the gain/loss of exiting before settlement relative to
//!    average entry cost.
//!
//! Ground truth: settlement payout on net winner shares + sell proceeds -
//! total buy cost. Any residual beyond tolerance is a modeling bug and is
//! surfaced as an error for that market, never averaged away.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::MarketSummary;
use crate::balance::BalanceTier;
use crate::domain::{MarketId, Outcome};

/// Default absolute tolerance on the reconciliation residual.
pub const RESIDUAL_TOLERANCE: f64 = 1e-6;

/// Errors from decomposition.
#[derive(Debug, Clone, Error)]
pub enum DecomposeError {
    #[error(
        "decomposition residual {residual:+.3e} exceeds tolerance {tolerance:.1e} \
         for market {market_id}"
    )]
    ResidualExceedsTolerance {
        market_id: MarketId,
        residual: f64,
        tolerance: f64,
    },
}

/// Exact three-component partition of one resolved market's realized P&L.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlDecomposition {
    pub market_id: MarketId,
    pub spread: f64,
    pub drag: f64,
    pub sell_pnl: f64,
    /// Ground truth: payout on net winner shares + sell proceeds - buy cost.
    pub realized_pnl: f64,
    /// (spread + drag + sell_pnl) - realized_pnl. Audited, within tolerance.
    pub reconciliation_residual: f64,
    /// Whether the excess outcome won; `None` when there is no excess.
    pub excess_won: Option<bool>,
    pub tier: Option<BalanceTier>,
}

/// Decompose one market against its winning outcome.
///
/// The summary's invariants make every branch total: matched pairs above
/// zero imply both buy VWAPs exist, and a nonzero excess implies the excess
/// outcome was bought, so its VWAP exists.
pub fn decompose_market(
    summary: &MarketSummary,
    winner: Outcome,
    tolerance: f64,
) -> Result<PnlDecomposition, DecomposeError> {
    let spread = match summary.combined_vwap {
        Some(combined) if summary.matched_pairs > 0.0 => {
            summary.matched_pairs * (1.0 - combined)
        }
        _ => 0.0,
    };

    let (drag, excess_won) = match summary.excess_outcome {
        Some(excess) => {
            // net > 0 on the excess outcome implies buy volume there.
            let vwap = summary.totals(excess).buy_vwap().unwrap_or(0.0);
            let settled = if excess == winner { 1.0 } else { 0.0 };
            (
                summary.unmatched_shares * (settled - vwap),
                Some(excess == winner),
            )
        }
        None => (0.0, None),
    };

    let sell_pnl = [Outcome::Up, Outcome::Down]
        .iter()
        .map(|&outcome| {
            let totals = summary.totals(outcome);
            if totals.sell_shares > 0.0 {
                totals.sell_proceeds - totals.sell_shares * totals.buy_vwap().unwrap_or(0.0)
            } else {
                0.0
            }
        })
        .sum::<f64>();

    let payout = summary.totals(winner).net_shares();
    let realized_pnl = payout + summary.total_sell_proceeds() - summary.total_buy_cost();

    let residual = (spread + drag + sell_pnl) - realized_pnl;
    if residual.abs() > tolerance {
        return Err(DecomposeError::ResidualExceedsTolerance {
            market_id: summary.market_id.clone(),
            residual,
            tolerance,
        });
    }

    Ok(PnlDecomposition {
        market_id: summary.market_id.clone(),
        spread,
        drag,
        sell_pnl,
        realized_pnl,
        reconciliation_residual: residual,
        excess_won,
        tier: summary.tier,
    })
}

// ─── Portfolio rollups ───────────────────────────────────────────────

/// Component totals across a set of decompositions, with the drag split by
/// excess-outcome result and per-tier sub-totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecompositionTotals {
    pub market_count: usize,
    pub spread: f64,
    pub drag: f64,
    pub sell_pnl: f64,
    pub realized_pnl: f64,
    /// Drag contributed by markets whose excess outcome won.
    pub drag_excess_won: f64,
    /// Drag contributed by markets whose excess outcome lost.
    pub drag_excess_lost: f64,
    pub by_tier: HashMap<String, TierTotals>,
}

/// Per-tier decomposition sub-totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierTotals {
    pub market_count: usize,
    pub spread: f64,
    pub drag: f64,
    pub sell_pnl: f64,
    pub realized_pnl: f64,
}

impl DecompositionTotals {
    pub fn from_decompositions(decompositions: &[PnlDecomposition]) -> Self {
        let mut totals = Self::default();
        for d in decompositions {
            totals.market_count += 1;
            totals.spread += d.spread;
            totals.drag += d.drag;
            totals.sell_pnl += d.sell_pnl;
            totals.realized_pnl += d.realized_pnl;
            match d.excess_won {
                Some(true) => totals.drag_excess_won += d.drag,
                Some(false) => totals.drag_excess_lost += d.drag,
                None => {}
            }
            if let Some(tier) = d.tier {
                let entry = totals.by_tier.entry(tier.as_str().to_string()).or_default();
                entry.market_count += 1;
                entry.spread += d.spread;
                entry.drag += d.drag;
                entry.sell_pnl += d.sell_pnl;
                entry.realized_pnl += d.realized_pnl;
            }
        }
        totals
    }

    /// Fraction of the theoretical spread actually captured.
    pub fn capture_rate(&self) -> Option<f64> {
        if self.spread > 0.0 {
            Some(self.realized_pnl / self.spread)
        } else {
            None
        }
    }
}
