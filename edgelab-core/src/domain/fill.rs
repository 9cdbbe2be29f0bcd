use crate::domain::MarketId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the two mutually exclusive outcomes of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Up,
    Down,
}

impl Outcome {
    /// The opposite outcome.
    pub fn other(self) -> Self {
        match self {
            Outcome::Up => Outcome::Down,
            Outcome::Down => Outcome::Up,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Up => "Up",
            Outcome::Down => "Down",
        }
    }
}

/// Trade side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// A single executed order fill.
///
/// Prices are in dollars per share and live in (0, 1]; a share of the winning
/// outcome pays exactly $1 at settlement. Fills are append-only inputs: once
/// ingested they are never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub market_id: MarketId,
    pub side: Side,
    pub outcome: Outcome,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    /// Dollar value of the fill (price x quantity).
    pub fn value(&self) -> f64 {
        self.price * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_other_flips() {
        assert_eq!(Outcome::Up.other(), Outcome::Down);
        assert_eq!(Outcome::Down.other(), Outcome::Up);
    }

    #[test]
    fn fill_value() {
        let fill = Fill {
            market_id: "0xabc".into(),
            side: Side::Buy,
            outcome: Outcome::Up,
            price: 0.45,
            quantity: 100.0,
            timestamp: Utc::now(),
        };
        assert!((fill.value() - 45.0).abs() < 1e-12);
    }
}
