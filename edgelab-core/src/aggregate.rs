//! Streaming fill aggregation — raw fill log to per-market summaries.
//!
//! The aggregator holds one small fixed-size accumulator per market and
//! folds fills in one at a time, so the full log never has to be resident.
//! Every accumulated quantity is a sum, count, or min/max of timestamps,
//! which makes `merge` commutative and associative: any partition of the
//! input into chunks, aggregated independently and merged, produces
//! identical summaries. VWAPs are computed once at summary time as
//! total value over total quantity — never incrementally averaged, which
//! would make the result depend on fill order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::balance::{balance_ratio, classify, BalanceTier};
use crate::domain::{Fill, MarketId, Outcome, Side};

// ─── Accumulators ────────────────────────────────────────────────────

/// Running totals for one outcome of one market.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OutcomeTotals {
    pub buy_shares: f64,
    pub buy_cost: f64,
    pub buy_fills: usize,
    pub sell_shares: f64,
    pub sell_proceeds: f64,
    pub sell_fills: usize,
    pub first_buy_ts: Option<DateTime<Utc>>,
}

impl OutcomeTotals {
    fn record(&mut self, fill: &Fill) {
        match fill.side {
            Side::Buy => {
                self.buy_shares += fill.quantity;
                self.buy_cost += fill.value();
                self.buy_fills += 1;
                self.first_buy_ts = match self.first_buy_ts {
                    Some(ts) => Some(ts.min(fill.timestamp)),
                    None => Some(fill.timestamp),
                };
            }
            Side::Sell => {
                self.sell_shares += fill.quantity;
                self.sell_proceeds += fill.value();
                self.sell_fills += 1;
            }
        }
    }

    fn merge(&mut self, other: &OutcomeTotals) {
        self.buy_shares += other.buy_shares;
        self.buy_cost += other.buy_cost;
        self.buy_fills += other.buy_fills;
        self.sell_shares += other.sell_shares;
        self.sell_proceeds += other.sell_proceeds;
        self.sell_fills += other.sell_fills;
        self.first_buy_ts = match (self.first_buy_ts, other.first_buy_ts) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    /// Volume-weighted average buy price, `None` when nothing was bought.
    pub fn buy_vwap(&self) -> Option<f64> {
        if self.buy_shares > 0.0 {
            Some(self.buy_cost / self.buy_shares)
        } else {
            None
        }
    }

    /// Shares still held: buys minus sells, floored at zero.
    pub fn net_shares(&self) -> f64 {
        (self.buy_shares - self.sell_shares).max(0.0)
    }
}

/// Per-market accumulator: one `OutcomeTotals` per outcome plus fill-window
/// timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketAccumulator {
    pub up: OutcomeTotals,
    pub down: OutcomeTotals,
    pub first_fill_ts: Option<DateTime<Utc>>,
    pub last_fill_ts: Option<DateTime<Utc>>,
}

impl MarketAccumulator {
    fn record(&mut self, fill: &Fill) {
        match fill.outcome {
            Outcome::Up => self.up.record(fill),
            Outcome::Down => self.down.record(fill),
        }
        self.first_fill_ts = match self.first_fill_ts {
            Some(ts) => Some(ts.min(fill.timestamp)),
            None => Some(fill.timestamp),
        };
        self.last_fill_ts = match self.last_fill_ts {
            Some(ts) => Some(ts.max(fill.timestamp)),
            None => Some(fill.timestamp),
        };
    }

    fn merge(&mut self, other: &MarketAccumulator) {
        self.up.merge(&other.up);
        self.down.merge(&other.down);
        self.first_fill_ts = match (self.first_fill_ts, other.first_fill_ts) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.last_fill_ts = match (self.last_fill_ts, other.last_fill_ts) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

// ─── Aggregator ──────────────────────────────────────────────────────

/// Streaming aggregator over the raw fill log.
#[derive(Debug, Clone, Default)]
pub struct FillAggregator {
    markets: HashMap<MarketId, MarketAccumulator>,
}

impl FillAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fill into its market's accumulator.
    pub fn record(&mut self, fill: &Fill) {
        self.markets
            .entry(fill.market_id.clone())
            .or_default()
            .record(fill);
    }

    /// Fold an entire chunk produced by an independent aggregator.
    pub fn merge(&mut self, other: FillAggregator) {
        for (market_id, acc) in other.markets {
            match self.markets.get_mut(&market_id) {
                Some(existing) => existing.merge(&acc),
                None => {
                    self.markets.insert(market_id, acc);
                }
            }
        }
    }

    pub fn market_count(&self) -> usize {
        self.markets.len()
    }

    /// Finalize into per-market summaries, sorted by market id for
    /// deterministic output.
    pub fn finish(self) -> Vec<MarketSummary> {
        let mut summaries: Vec<MarketSummary> = self
            .markets
            .into_iter()
            .map(|(id, acc)| MarketSummary::from_accumulator(id, acc))
            .collect();
        summaries.sort_by(|a, b| a.market_id.cmp(&b.market_id));
        summaries
    }
}

// ─── Summary ─────────────────────────────────────────────────────────

/// Derived per-market summary. One row per distinct market seen in the log.
///
/// VWAP fields are `None` (undefined) rather than zero when the denominator
/// is zero; downstream consumers must exclude undefined values from
/// aggregate statistics, never coerce them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub market_id: MarketId,
    pub up: OutcomeTotals,
    pub down: OutcomeTotals,
    pub first_fill_ts: Option<DateTime<Utc>>,
    pub last_fill_ts: Option<DateTime<Utc>>,
    pub vwap_up: Option<f64>,
    pub vwap_down: Option<f64>,
    /// Cost of one matched Up/Down pair: vwap_up + vwap_down. Defined only
    /// when both outcomes have nonzero buy volume.
    pub combined_vwap: Option<f64>,
    pub net_up: f64,
    pub net_down: f64,
    /// min(net_up, net_down) — the guaranteed-payout portion.
    pub matched_pairs: f64,
    /// |net_up - net_down| — the directionally exposed excess.
    pub unmatched_shares: f64,
    /// Outcome holding the excess, `None` when the nets are equal.
    pub excess_outcome: Option<Outcome>,
    /// min(net)/max(net); `None` when nothing is held on either outcome.
    pub balance_ratio: Option<f64>,
    /// Tier of `balance_ratio`; `None` exactly when the ratio is undefined.
    pub tier: Option<BalanceTier>,
    /// Seconds between the first Up buy and first Down buy; `None` unless
    /// both outcomes were bought.
    pub sequencing_gap_secs: Option<f64>,
}

impl MarketSummary {
    fn from_accumulator(market_id: MarketId, acc: MarketAccumulator) -> Self {
        let vwap_up = acc.up.buy_vwap();
        let vwap_down = acc.down.buy_vwap();
        let combined_vwap = match (vwap_up, vwap_down) {
            (Some(u), Some(d)) => Some(u + d),
            _ => None,
        };

        let net_up = acc.up.net_shares();
        let net_down = acc.down.net_shares();
        let matched_pairs = net_up.min(net_down);
        let unmatched_shares = (net_up - net_down).abs();
        let excess_outcome = if net_up > net_down {
            Some(Outcome::Up)
        } else if net_down > net_up {
            Some(Outcome::Down)
        } else {
            None
        };

        let ratio = balance_ratio(net_up, net_down);
        let tier = ratio.map(classify);

        let sequencing_gap_secs = match (acc.up.first_buy_ts, acc.down.first_buy_ts) {
            (Some(u), Some(d)) => Some((u - d).num_milliseconds().abs() as f64 / 1000.0),
            _ => None,
        };

        Self {
            market_id,
            up: acc.up,
            down: acc.down,
            first_fill_ts: acc.first_fill_ts,
            last_fill_ts: acc.last_fill_ts,
            vwap_up,
            vwap_down,
            combined_vwap,
            net_up,
            net_down,
            matched_pairs,
            unmatched_shares,
            excess_outcome,
            balance_ratio: ratio,
            tier,
            sequencing_gap_secs,
        }
    }

    pub fn totals(&self, outcome: Outcome) -> &OutcomeTotals {
        match outcome {
            Outcome::Up => &self.up,
            Outcome::Down => &self.down,
        }
    }

    pub fn total_buy_cost(&self) -> f64 {
        self.up.buy_cost + self.down.buy_cost
    }

    pub fn total_sell_proceeds(&self) -> f64 {
        self.up.sell_proceeds + self.down.sell_proceeds
    }

    pub fn total_fills(&self) -> usize {
        self.up.buy_fills + self.up.sell_fills + self.down.buy_fills + self.down.sell_fills
    }

    pub fn has_sells(&self) -> bool {
        self.up.sell_fills > 0 || self.down.sell_fills > 0
    }

    /// Bought on both outcomes?
    pub fn is_both_sided(&self) -> bool {
        self.up.buy_shares > 0.0 && self.down.buy_shares > 0.0
    }

    /// For a one-sided market, the single outcome that was bought.
    pub fn bet_outcome(&self) -> Option<Outcome> {
        match (self.up.buy_shares > 0.0, self.down.buy_shares > 0.0) {
            (true, false) => Some(Outcome::Up),
            (false, true) => Some(Outcome::Down),
            _ => None,
        }
    }

    /// 1 - combined_vwap: the per-pair profit locked in at entry.
    pub fn entry_spread(&self) -> Option<f64> {
        self.combined_vwap.map(|c| 1.0 - c)
    }

    /// Fraction of buy dollars spent on Up. `None` when nothing was bought.
    pub fn up_dollar_fraction(&self) -> Option<f64> {
        let total = self.total_buy_cost();
        if total > 0.0 {
            Some(self.up.buy_cost / total)
        } else {
            None
        }
    }
}
