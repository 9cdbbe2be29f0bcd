//! End-to-end pipeline scenarios over hand-built fill logs.
//!
//! The four canonical market shapes (balanced, one-sided, loss-cutting
//! sell, calibrated-null tilt) run through the full pipeline, and the
//! report's accounting, coverage, and inference sections are checked
//! against values computed by hand.

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use edgelab_core::{
    Fill, FillAggregator, MarketMeta, Outcome, Resolution, ResolutionTable, Side,
};
use edgelab_stats::{run_analysis, AnalysisConfig, AnalysisInput, TiltVerdict};

fn fill(market: &str, side: Side, outcome: Outcome, price: f64, qty: f64, t: i64) -> Fill {
    Fill {
        market_id: market.into(),
        side,
        outcome,
        price,
        quantity: qty,
        timestamp: Utc.timestamp_opt(1_700_000_000 + t, 0).unwrap(),
    }
}

fn resolution(market: &str, outcome: Outcome, settled_price: f64) -> Resolution {
    Resolution {
        market_id: market.into(),
        outcome,
        settled_price,
    }
}

fn summarize(fills: &[Fill]) -> Vec<edgelab_core::MarketSummary> {
    let mut agg = FillAggregator::new();
    for f in fills {
        agg.record(f);
    }
    agg.finish()
}

fn input(fills: &[Fill], resolutions: Vec<Resolution>) -> AnalysisInput {
    AnalysisInput {
        summaries: summarize(fills),
        resolutions: ResolutionTable::from_records(resolutions),
        metas: HashMap::new(),
        dataset_hash: None,
        rebate_total: 0.0,
        skipped_input_records: 0,
    }
}

// ─── Canonical accounting scenarios ──────────────────────────────────

#[test]
fn canonical_portfolio_decomposes_exactly() {
    let fills = vec![
        // Balanced, no sells: 100 Up @0.45 + 100 Down @0.47, Up wins.
        fill("a", Side::Buy, Outcome::Up, 0.45, 100.0, 0),
        fill("a", Side::Buy, Outcome::Down, 0.47, 100.0, 1),
        // One-sided: 50 Up @0.50, Up loses.
        fill("b", Side::Buy, Outcome::Up, 0.50, 50.0, 2),
        // Loss-cutting sell: Up 100 @0.40 minus 20 sold @0.25; Down 100
        // @0.45; Down wins.
        fill("c", Side::Buy, Outcome::Up, 0.40, 100.0, 3),
        fill("c", Side::Sell, Outcome::Up, 0.25, 20.0, 4),
        fill("c", Side::Buy, Outcome::Down, 0.45, 100.0, 5),
    ];
    let resolutions = vec![
        resolution("a", Outcome::Up, 1.0),
        // The one-sided loser is evidenced only by its lost record.
        resolution("b", Outcome::Up, 0.0),
        resolution("c", Outcome::Down, 1.0),
    ];

    let report = run_analysis(input(&fills, resolutions), &AnalysisConfig::default());

    assert_eq!(report.coverage.markets_seen, 3);
    assert_eq!(report.coverage.markets_resolved, 3);
    assert_eq!(report.coverage.markets_unresolved, 0);
    assert!(report.coverage.invariant_violations.is_empty());
    // Market b has no Down leg: combined VWAP undefined there only.
    assert_eq!(report.coverage.undefined_combined_vwap, 1);

    let by_id = |id: &str| {
        report
            .decompositions
            .iter()
            .find(|d| d.market_id == id)
            .unwrap()
    };
    let a = by_id("a");
    assert!((a.spread - 8.0).abs() < 1e-9);
    assert!(a.drag.abs() < 1e-9);
    assert!(a.sell_pnl.abs() < 1e-9);
    let b = by_id("b");
    assert!((b.drag - -25.0).abs() < 1e-9);
    let c = by_id("c");
    assert!((c.spread - 12.0).abs() < 1e-9);
    assert!((c.drag - 11.0).abs() < 1e-9);
    assert!((c.sell_pnl - -3.0).abs() < 1e-9);
    assert!((c.realized_pnl - 20.0).abs() < 1e-9);

    // Portfolio totals: 8 - 25 + 20.
    assert!((report.decomposition_totals.realized_pnl - 3.0).abs() < 1e-9);

    // Counterfactual: only c sold anything; selling 20 eventual losers
    // @0.25 beat holding them to zero by $5.
    assert_eq!(report.discipline.markets_with_sells, 1);
    assert_eq!(report.discipline.sells_helped, 1);
    assert!((report.discipline.sell_discipline_value - 5.0).abs() < 1e-9);

    // One-sided market b bet Up and lost.
    assert_eq!(report.one_sided_accuracy, Some(0.0));

    // Three markets is far below every inferential minimum: the tests must
    // decline loudly, not run degenerate.
    assert!(report.symmetric_subset.is_none());
    assert!(report.permutation.is_none());
    assert!(report.regression.is_none());
    assert_eq!(report.warnings.len(), 3);
}

#[test]
fn unresolved_and_conflicting_markets_are_counted_not_dropped_silently() {
    let fills = vec![
        fill("resolved", Side::Buy, Outcome::Up, 0.45, 10.0, 0),
        fill("unresolved", Side::Buy, Outcome::Up, 0.45, 10.0, 1),
        fill("conflicting", Side::Buy, Outcome::Down, 0.55, 10.0, 2),
    ];
    let resolutions = vec![
        resolution("resolved", Outcome::Up, 1.0),
        resolution("conflicting", Outcome::Up, 1.0),
        resolution("conflicting", Outcome::Down, 1.0),
    ];

    let report = run_analysis(input(&fills, resolutions), &AnalysisConfig::default());
    assert_eq!(report.coverage.markets_resolved, 1);
    assert_eq!(report.coverage.markets_unresolved, 1);
    assert_eq!(report.coverage.markets_conflicting, 1);
    assert_eq!(report.decompositions.len(), 1);
    // Excluded markets contribute nothing to totals.
    assert!((report.decomposition_totals.realized_pnl - 5.5).abs() < 1e-9);
}

// ─── Calibrated-null tilt scenario ───────────────────────────────────

/// Both-sided market with equal VWAPs, a chosen excess side, and a winner.
fn symmetric_market(id: &str, excess: Outcome, winner: Outcome) -> Vec<Fill> {
    let (up_qty, down_qty) = match excess {
        Outcome::Up => (110.0, 100.0),
        Outcome::Down => (100.0, 110.0),
    };
    vec![
        fill(id, Side::Buy, Outcome::Up, 0.50, up_qty, 0),
        fill(id, Side::Buy, Outcome::Down, 0.50, down_qty, 1),
    ]
}

#[test]
fn calibrated_null_agreement_reports_no_signal() {
    // 8 copies of each (excess, winner) combination: the observed agreement
    // equals the null calibrated from the subset itself, so z ~ 0.
    let mut fills = Vec::new();
    let mut resolutions = Vec::new();
    let combos = [
        (Outcome::Up, Outcome::Up),
        (Outcome::Up, Outcome::Down),
        (Outcome::Down, Outcome::Up),
        (Outcome::Down, Outcome::Down),
    ];
    for i in 0..8 {
        for (j, (excess, winner)) in combos.into_iter().enumerate() {
            let id = format!("m{i}_{j}");
            fills.extend(symmetric_market(&id, excess, winner));
            resolutions.push(resolution(&id, winner, 1.0));
        }
    }

    let report = run_analysis(input(&fills, resolutions), &AnalysisConfig::default());
    let subset = report.symmetric_subset.expect("subset test should run on 32 markets");
    assert_eq!(subset.subset_size, 32);
    assert!(subset.z.abs() < 1e-9, "z = {}", subset.z);
    assert_eq!(subset.verdict, TiltVerdict::NoSignal);
    assert!((subset.null_agreement - 0.5).abs() < 1e-12);

    // Naive rates are present alongside as reference numbers.
    assert!(report.naive_agreement.share_weighted.is_some());
    assert!(report.naive_agreement.dollar_weighted.is_some());
}

// ─── Permutation at scale ────────────────────────────────────────────

#[test]
fn permutation_runs_on_a_wide_priced_universe() {
    // 200 markets across the price spectrum; winners follow the implied
    // probability deterministically (favorite always wins), and allocation
    // follows price. Real structure, no skill beyond price.
    let mut fills = Vec::new();
    let mut resolutions = Vec::new();
    for i in 0..200 {
        let p = 0.30 + 0.40 * (i as f64 / 199.0); // 0.30..0.70
        let id = format!("m{i}");
        let up_dollars = 100.0 * p;
        fills.push(fill(&id, Side::Buy, Outcome::Up, p, up_dollars / p, 0));
        fills.push(fill(
            &id,
            Side::Buy,
            Outcome::Down,
            1.0 - p,
            (100.0 - up_dollars) / (1.0 - p),
            1,
        ));
        let winner = if p >= 0.5 { Outcome::Up } else { Outcome::Down };
        resolutions.push(resolution(&id, winner, 1.0));
    }

    let config = AnalysisConfig {
        permutation_trials: 1_000,
        ..AnalysisConfig::default()
    };
    let report = run_analysis(input(&fills, resolutions), &config);
    let permutation = report.permutation.expect("permutation should run on 200 markets");
    assert_eq!(permutation.trials, 1_000);
    assert_eq!(permutation.markets_used, 200);
    assert_eq!(permutation.strata_excluded, 0);
    // Price-following allocation must not read as skill under the
    // stratified null.
    assert!(permutation.p_value > 0.05, "p = {}", permutation.p_value);
    assert!(permutation.p_value <= 1.0);
}

// ─── Regression through the pipeline ─────────────────────────────────

#[test]
fn regression_runs_when_metadata_is_present() {
    let mut fills = Vec::new();
    let mut resolutions = Vec::new();
    let mut metas = HashMap::new();
    for i in 0..40 {
        let id = format!("m{i}");
        // Vary fill count per market by splitting the Up buy.
        let chunks = 1 + (i % 5);
        for c in 0..chunks {
            fills.push(fill(&id, Side::Buy, Outcome::Up, 0.48, 100.0 / chunks as f64, c as i64));
        }
        fills.push(fill(&id, Side::Buy, Outcome::Down, 0.48, 60.0 + 8.0 * (i % 5) as f64, 10 + i as i64));
        resolutions.push(resolution(&id, Outcome::Up, 1.0));
        metas.insert(
            id.clone(),
            MarketMeta {
                market_id: id,
                asset: if i % 3 == 0 { "Bitcoin" } else { "Solana" }.into(),
                duration_secs: if i % 2 == 0 { 900 } else { 3600 },
                lifetime_volume: 10_000.0 + 1_000.0 * i as f64,
                open_ts: None,
                close_ts: None,
            },
        );
    }

    let mut analysis_input = input(&fills, resolutions);
    analysis_input.metas = metas;
    let report = run_analysis(analysis_input, &AnalysisConfig::default());

    let fit = report.regression.expect("regression should run with metadata");
    assert_eq!(fit.n, 40);
    assert_eq!(fit.features.len(), 5);
    assert!(!fit.caveat.is_empty());
    assert_eq!(report.coverage.regression_rows_dropped, 0);
}

#[test]
fn markets_without_metadata_are_dropped_with_a_count() {
    let fills = vec![
        fill("m1", Side::Buy, Outcome::Up, 0.45, 10.0, 0),
        fill("m1", Side::Buy, Outcome::Down, 0.45, 10.0, 1),
    ];
    let report = run_analysis(
        input(&fills, vec![resolution("m1", Outcome::Up, 1.0)]),
        &AnalysisConfig::default(),
    );
    assert_eq!(report.coverage.regression_rows_dropped, 1);
    assert!(report.regression.is_none());
}

// ─── Report serialization ────────────────────────────────────────────

#[test]
fn report_round_trips_through_json() {
    let fills = vec![
        fill("a", Side::Buy, Outcome::Up, 0.45, 100.0, 0),
        fill("a", Side::Buy, Outcome::Down, 0.47, 100.0, 1),
    ];
    let report = run_analysis(
        input(&fills, vec![resolution("a", Outcome::Up, 1.0)]),
        &AnalysisConfig::default(),
    );
    let json = serde_json::to_string_pretty(&report).unwrap();
    let back: edgelab_stats::AnalysisReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.coverage.markets_resolved, 1);
    assert!((back.decomposition_totals.realized_pnl - 8.0).abs() < 1e-9);
}

// ─── Robustness under random inputs ──────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The pipeline never panics and its coverage tallies always add up,
    /// whatever the mix of resolved, unresolved, and one-sided markets.
    #[test]
    fn coverage_tallies_are_consistent(
        markets in prop::collection::vec(
            (
                0.05..0.95_f64,          // up price
                1.0..200.0_f64,          // up quantity
                prop::option::of(0.05..0.95_f64), // down price (one-sided when None)
                prop::bool::ANY,         // resolved?
                prop::bool::ANY,         // winner up?
            ),
            1..30,
        ),
    ) {
        let mut fills = Vec::new();
        let mut resolutions = Vec::new();
        for (i, &(up_price, up_qty, down_price, is_resolved, winner_up)) in
            markets.iter().enumerate()
        {
            let id = format!("m{i}");
            fills.push(fill(&id, Side::Buy, Outcome::Up, up_price, up_qty, i as i64));
            if let Some(down_price) = down_price {
                fills.push(fill(&id, Side::Buy, Outcome::Down, down_price, up_qty, i as i64 + 1));
            }
            if is_resolved {
                let winner = if winner_up { Outcome::Up } else { Outcome::Down };
                resolutions.push(resolution(&id, winner, 1.0));
            }
        }

        let report = run_analysis(input(&fills, resolutions), &AnalysisConfig::default());
        let c = &report.coverage;
        prop_assert_eq!(c.markets_seen, markets.len());
        prop_assert_eq!(
            c.markets_resolved + c.markets_unresolved + c.markets_conflicting,
            c.markets_seen
        );
        prop_assert_eq!(report.decompositions.len() + c.invariant_violations.len(),
            c.markets_resolved);
        // Every decomposition that survived reconciles.
        for d in &report.decompositions {
            prop_assert!(d.reconciliation_residual.abs() <= AnalysisConfig::default().residual_tolerance);
        }
    }
}
