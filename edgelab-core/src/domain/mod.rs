//! Domain types for EdgeLab

pub mod fill;
pub mod market;
pub mod resolution;

pub use fill::{Fill, Outcome, Side};
pub use market::{DurationClass, MarketMeta};
pub use resolution::{Resolution, ResolutionStatus, ResolutionTable};

/// Market identifier (condition id) type alias
pub type MarketId = String;
