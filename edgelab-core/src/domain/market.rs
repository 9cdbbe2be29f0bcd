//! Per-market context metadata used by the driver regression.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::MarketId;

/// Coarse market window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationClass {
    FifteenMin,
    Hourly,
}

/// Static metadata about one market, supplied by the collection layer.
///
/// Optional context: markets without metadata still aggregate and decompose;
/// they are only dropped (with a counted exclusion) from the regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMeta {
    pub market_id: MarketId,
    /// Underlying asset name, e.g. "Bitcoin", "Solana".
    pub asset: String,
    /// Market window length in seconds (900 or 3600 in the source data).
    pub duration_secs: i64,
    /// Lifetime traded volume across all participants, in dollars.
    pub lifetime_volume: f64,
    pub open_ts: Option<DateTime<Utc>>,
    pub close_ts: Option<DateTime<Utc>>,
}

impl MarketMeta {
    pub fn duration_class(&self) -> DurationClass {
        if self.duration_secs <= 900 {
            DurationClass::FifteenMin
        } else {
            DurationClass::Hourly
        }
    }

    /// Whether the underlying is one of the two deepest-book assets.
    pub fn is_major_asset(&self) -> bool {
        matches!(self.asset.as_str(), "Bitcoin" | "Ethereum")
    }
}
