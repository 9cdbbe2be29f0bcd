//! Balance ratio and tier classification.
//!
//! The balance ratio (smaller net share count over larger) is the proxy for
//! execution quality: a ratio of 1.0 means every held share is part of a
//! matched Up/Down pair, a ratio of 0.0 means a purely one-sided book.
//! A market holding nothing on either outcome has NO ratio — that is
//! distinct from the valid, fully-imbalanced 0.0.

use serde::{Deserialize, Serialize};

/// Discrete bucket of balance ratio.
///
/// Boundaries are right-closed: 0.80 is Moderate, 0.50 is Imbalanced,
/// 0.33 is VeryImbalanced. Exhaustive and non-overlapping over [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceTier {
    /// ratio > 0.80
    WellBalanced,
    /// 0.50 < ratio <= 0.80
    Moderate,
    /// 0.33 < ratio <= 0.50
    Imbalanced,
    /// ratio <= 0.33
    VeryImbalanced,
}

impl BalanceTier {
    /// All tiers, best-balanced first. Used for ordered rollups.
    pub const ALL: [BalanceTier; 4] = [
        BalanceTier::WellBalanced,
        BalanceTier::Moderate,
        BalanceTier::Imbalanced,
        BalanceTier::VeryImbalanced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BalanceTier::WellBalanced => "well_balanced",
            BalanceTier::Moderate => "moderate",
            BalanceTier::Imbalanced => "imbalanced",
            BalanceTier::VeryImbalanced => "very_imbalanced",
        }
    }
}

/// Balance ratio from net share counts: min/max, or `None` when both are zero.
pub fn balance_ratio(net_up: f64, net_down: f64) -> Option<f64> {
    let max = net_up.max(net_down);
    if max <= 0.0 {
        return None;
    }
    Some(net_up.min(net_down) / max)
}

/// Tier for a defined balance ratio.
pub fn classify(ratio: f64) -> BalanceTier {
    if ratio > 0.80 {
        BalanceTier::WellBalanced
    } else if ratio > 0.50 {
        BalanceTier::Moderate
    } else if ratio > 0.33 {
        BalanceTier::Imbalanced
    } else {
        BalanceTier::VeryImbalanced
    }
}
