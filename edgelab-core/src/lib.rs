//! EdgeLab Core — domain types, fill aggregation, and P&L accounting.
//!
//! This crate contains the accounting heart of the analysis:
//! - Domain types (fills, resolutions, market metadata)
//! - Ingestion boundary (loose API records to the strict schema)
//! - Streaming per-market fill aggregation with commutative merge
//! - Balance ratio and tier classification
//! - Exact three-component P&L decomposition with residual audit
//! - Hold-to-settlement counterfactual and sell discipline value

pub mod aggregate;
pub mod balance;
pub mod counterfactual;
pub mod decompose;
pub mod domain;
pub mod ingest;

pub use aggregate::{FillAggregator, MarketAccumulator, MarketSummary, OutcomeTotals};
pub use balance::{balance_ratio, classify, BalanceTier};
pub use counterfactual::{hold_to_settlement, DisciplineSummary, HoldComparison};
pub use decompose::{
    decompose_market, DecomposeError, DecompositionTotals, PnlDecomposition, TierTotals,
    RESIDUAL_TOLERANCE,
};
pub use domain::{
    DurationClass, Fill, MarketId, MarketMeta, Outcome, Resolution, ResolutionStatus,
    ResolutionTable, Side,
};
pub use ingest::{
    hash_file, read_markets_csv, read_resolutions_csv, stream_trades_csv, stream_trades_jsonl,
    ApiMarketRecord, ApiPositionRecord, ApiTradeRecord, IngestError, IngestStats, MarketIngest,
    ResolutionIngest, TradeEvent,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn domain_types_are_send_sync() {
        assert_send::<Fill>();
        assert_sync::<Fill>();
        assert_send::<Resolution>();
        assert_sync::<Resolution>();
        assert_send::<ResolutionTable>();
        assert_sync::<ResolutionTable>();
        assert_send::<MarketMeta>();
        assert_sync::<MarketMeta>();
    }

    #[test]
    fn summary_types_are_send_sync() {
        assert_send::<MarketSummary>();
        assert_sync::<MarketSummary>();
        assert_send::<FillAggregator>();
        assert_sync::<FillAggregator>();
        assert_send::<BalanceTier>();
        assert_sync::<BalanceTier>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<PnlDecomposition>();
        assert_sync::<PnlDecomposition>();
        assert_send::<DecompositionTotals>();
        assert_sync::<DecompositionTotals>();
        assert_send::<HoldComparison>();
        assert_sync::<HoldComparison>();
        assert_send::<DisciplineSummary>();
        assert_sync::<DisciplineSummary>();
    }
}
