//! The resolved per-market table handed to the statistical stages.
//!
//! Built once, after aggregation completes; the tilt test, permutation test,
//! and regression all read from it and never touch the raw fill log.

use edgelab_core::{MarketSummary, Outcome};
use serde::{Deserialize, Serialize};

/// One resolved market: its summary plus the winning outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedMarket {
    pub summary: MarketSummary,
    pub winner: Outcome,
}

impl ResolvedMarket {
    /// Price-implied probability that Up wins, from buy VWAPs. `None`
    /// unless both outcomes are priced.
    pub fn implied_up_prob(&self) -> Option<f64> {
        match (self.summary.vwap_up, self.summary.vwap_down) {
            (Some(up), Some(down)) if up + down > 0.0 => Some(up / (up + down)),
            _ => None,
        }
    }

    /// |vwap_up - vwap_down|, the pricing gap the symmetric subset filters
    /// on. `None` unless both outcomes are priced.
    pub fn vwap_gap(&self) -> Option<f64> {
        match (self.summary.vwap_up, self.summary.vwap_down) {
            (Some(up), Some(down)) => Some((up - down).abs()),
            _ => None,
        }
    }

    /// Outcome with the larger buy-dollar allocation. `None` when nothing
    /// was bought; ties go to Up, mirroring the share-side convention.
    pub fn dollar_excess(&self) -> Option<Outcome> {
        if self.summary.total_buy_cost() <= 0.0 {
            return None;
        }
        if self.summary.up.buy_cost >= self.summary.down.buy_cost {
            Some(Outcome::Up)
        } else {
            Some(Outcome::Down)
        }
    }

    /// Fraction of buy dollars allocated to the eventual winner.
    pub fn winner_dollar_fraction(&self) -> Option<f64> {
        let total = self.summary.total_buy_cost();
        if total > 0.0 {
            Some(self.summary.totals(self.winner).buy_cost / total)
        } else {
            None
        }
    }

    /// Dollar allocation gap toward the winner: fraction on winner minus
    /// fraction on loser, in [-1, 1]. Positive means the trader leaned the
    /// right way.
    pub fn alloc_winner_gap(&self) -> Option<f64> {
        self.winner_dollar_fraction().map(|f| 2.0 * f - 1.0)
    }
}
