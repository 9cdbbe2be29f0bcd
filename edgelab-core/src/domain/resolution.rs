//! Resolution records and winner derivation.
//!
//! A market has up to two resolution records, one per outcome, each carrying
//! a settled price of 0 or 1. Either polarity determines the winner on its
//! own: `settled_price == 1` means the record's outcome won, `settled_price
//! == 0` means the opposite outcome won. This matters for one-sided
//! holdings — the "lost" record is often the only settlement evidence a
//! market has, and it must count.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{MarketId, Outcome};

/// Settlement record for one outcome of a market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub market_id: MarketId,
    pub outcome: Outcome,
    /// Terminal price of this outcome: 1.0 (won) or 0.0 (lost).
    pub settled_price: f64,
}

impl Resolution {
    /// The winning outcome implied by this record alone.
    ///
    /// Returns `None` when the settled price is neither 0 nor 1 (an
    /// unsettled or malformed record).
    pub fn implied_winner(&self) -> Option<Outcome> {
        if self.settled_price == 1.0 {
            Some(self.outcome)
        } else if self.settled_price == 0.0 {
            Some(self.outcome.other())
        } else {
            None
        }
    }
}

/// Settlement status of one market after folding in all of its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStatus {
    Resolved(Outcome),
    /// Records for the two outcomes imply different winners.
    Conflicting,
}

/// Winner lookup built from a stream of resolution records.
///
/// Conflicting records (both outcomes claiming the win, or both losing) mark
/// the market `Conflicting`; it is then excluded from resolved totals rather
/// than coerced to either outcome. Records with a settled price outside
/// {0, 1} are dropped and counted.
#[derive(Debug, Clone, Default)]
pub struct ResolutionTable {
    statuses: HashMap<MarketId, ResolutionStatus>,
    invalid_records: usize,
}

impl ResolutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Resolution>,
    {
        let mut table = Self::new();
        for record in records {
            table.insert(record);
        }
        table
    }

    /// Fold one record into the table.
    pub fn insert(&mut self, record: Resolution) {
        let Some(winner) = record.implied_winner() else {
            self.invalid_records += 1;
            return;
        };
        match self.statuses.entry(record.market_id) {
            Entry::Vacant(slot) => {
                slot.insert(ResolutionStatus::Resolved(winner));
            }
            Entry::Occupied(mut slot) => {
                if let ResolutionStatus::Resolved(existing) = *slot.get() {
                    if existing != winner {
                        slot.insert(ResolutionStatus::Conflicting);
                    }
                }
            }
        }
    }

    /// Winning outcome for a market, or `None` if unresolved or conflicting.
    pub fn winner(&self, market_id: &str) -> Option<Outcome> {
        match self.statuses.get(market_id) {
            Some(ResolutionStatus::Resolved(winner)) => Some(*winner),
            _ => None,
        }
    }

    pub fn is_conflicting(&self, market_id: &str) -> bool {
        matches!(
            self.statuses.get(market_id),
            Some(ResolutionStatus::Conflicting)
        )
    }

    pub fn resolved_count(&self) -> usize {
        self.statuses
            .values()
            .filter(|s| matches!(s, ResolutionStatus::Resolved(_)))
            .count()
    }

    pub fn conflicting_count(&self) -> usize {
        self.statuses
            .values()
            .filter(|s| matches!(s, ResolutionStatus::Conflicting))
            .count()
    }

    pub fn invalid_record_count(&self) -> usize {
        self.invalid_records
    }
}
