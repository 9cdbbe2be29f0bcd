//! Hold-to-settlement counterfactual — what the book would have earned had
//! no position ever been exited early.
//!
//! Every sell's proceeds are replaced by the sold quantity valued at that
//! outcome's settled price; buy costs are untouched. The difference between
//! actual and counterfactual P&L is the sell discipline value: positive
//! means exiting early was, in net, the right call.

use serde::{Deserialize, Serialize};

use crate::aggregate::MarketSummary;
use crate::domain::{MarketId, Outcome};

/// Actual vs hold-to-settlement P&L for one resolved market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldComparison {
    pub market_id: MarketId,
    pub actual_pnl: f64,
    /// P&L with every sell replaced by settlement value of the sold shares.
    pub hold_pnl: f64,
    /// actual - hold. Positive: selling beat holding.
    pub discipline_value: f64,
    pub had_sells: bool,
    /// Shares of the eventual winner sold (each forfeited a $1 payout).
    pub winning_shares_sold: f64,
    /// Shares of the eventual loser sold (each avoided a worthless hold).
    pub losing_shares_sold: f64,
}

/// Compare one market's actual P&L with the never-sell counterfactual.
///
/// For a market with zero sells the two are computed from identical terms
/// and are exactly equal, not merely within tolerance.
pub fn hold_to_settlement(summary: &MarketSummary, winner: Outcome) -> HoldComparison {
    let buy_cost = summary.total_buy_cost();
    let actual_pnl =
        summary.totals(winner).net_shares() + summary.total_sell_proceeds() - buy_cost;

    // Never selling means holding every bought share of the winner to its
    // $1 payout (and of the loser to zero).
    let hold_pnl = summary.totals(winner).buy_shares - buy_cost;

    HoldComparison {
        market_id: summary.market_id.clone(),
        actual_pnl,
        hold_pnl,
        discipline_value: actual_pnl - hold_pnl,
        had_sells: summary.has_sells(),
        winning_shares_sold: summary.totals(winner).sell_shares,
        losing_shares_sold: summary.totals(winner.other()).sell_shares,
    }
}

/// Portfolio-level rollup of the counterfactual.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisciplineSummary {
    pub market_count: usize,
    pub markets_with_sells: usize,
    pub actual_total_pnl: f64,
    pub counterfactual_total_pnl: f64,
    /// actual_total_pnl - counterfactual_total_pnl.
    pub sell_discipline_value: f64,
    /// Markets with sells where exiting improved P&L.
    pub sells_helped: usize,
    /// Markets with sells where exiting reduced (or did not change) P&L.
    pub sells_hurt: usize,
    pub winning_shares_sold: f64,
    pub losing_shares_sold: f64,
}

impl DisciplineSummary {
    pub fn from_comparisons(comparisons: &[HoldComparison]) -> Self {
        let mut summary = Self::default();
        for c in comparisons {
            summary.market_count += 1;
            summary.actual_total_pnl += c.actual_pnl;
            summary.counterfactual_total_pnl += c.hold_pnl;
            if c.had_sells {
                summary.markets_with_sells += 1;
                if c.discipline_value > 0.0 {
                    summary.sells_helped += 1;
                } else {
                    summary.sells_hurt += 1;
                }
                summary.winning_shares_sold += c.winning_shares_sold;
                summary.losing_shares_sold += c.losing_shares_sold;
            }
        }
        summary.sell_discipline_value =
            summary.actual_total_pnl - summary.counterfactual_total_pnl;
        summary
    }

    /// Fraction of sell-markets where exiting helped.
    pub fn helped_fraction(&self) -> Option<f64> {
        if self.markets_with_sells > 0 {
            Some(self.sells_helped as f64 / self.markets_with_sells as f64)
        } else {
            None
        }
    }
}
