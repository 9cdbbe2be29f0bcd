//! EdgeLab CLI — analyze a historical fill log.
//!
//! Commands:
//! - `analyze` — aggregate a fill log, decompose P&L against resolutions,
//!   run the tilt tests and driver regression, print the report sections,
//!   and optionally export the full report as JSON

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use edgelab_core::{
    hash_file, read_markets_csv, read_resolutions_csv, stream_trades_csv, stream_trades_jsonl,
    FillAggregator, ResolutionTable, TradeEvent,
};
use edgelab_stats::{run_analysis, AnalysisConfig, AnalysisInput, AnalysisReport, TiltVerdict};

#[derive(Parser)]
#[command(name = "edgelab", about = "EdgeLab — fill-log strategy analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a fill log against resolutions and market metadata.
    Analyze {
        /// Activity log: CSV, or JSON-lines when the extension is .jsonl.
        #[arg(long)]
        fills: PathBuf,

        /// Position export CSV carrying settlement evidence.
        #[arg(long)]
        resolutions: Option<PathBuf>,

        /// Market metadata CSV (enables the driver regression).
        #[arg(long)]
        markets: Option<PathBuf>,

        /// TOML config overriding analysis defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the full report as JSON to this path.
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            fills,
            resolutions,
            markets,
            config,
            json,
        } => run_analyze(fills, resolutions, markets, config, json),
    }
}

fn run_analyze(
    fills_path: PathBuf,
    resolutions_path: Option<PathBuf>,
    markets_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    json_path: Option<PathBuf>,
) -> Result<()> {
    let config = match &config_path {
        Some(path) => AnalysisConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    // ── Ingest ──
    let dataset_hash = hash_file(&fills_path)
        .with_context(|| format!("hashing {}", fills_path.display()))?;

    let mut aggregator = FillAggregator::new();
    let on_event = |event: TradeEvent| {
        if let TradeEvent::Fill(fill) = event {
            aggregator.record(&fill);
        }
    };
    let is_jsonl = fills_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));
    let stats = if is_jsonl {
        stream_trades_jsonl(&fills_path, on_event)
    } else {
        stream_trades_csv(&fills_path, on_event)
    }
    .with_context(|| format!("reading fills {}", fills_path.display()))?;
    info!(
        fills = stats.fills,
        rebates = stats.rebates,
        skipped = stats.skipped,
        markets = aggregator.market_count(),
        "fill log ingested"
    );

    let resolutions = match &resolutions_path {
        Some(path) => {
            let ingest = read_resolutions_csv(path)
                .with_context(|| format!("reading resolutions {}", path.display()))?;
            info!(
                records = ingest.resolutions.len(),
                skipped = ingest.skipped,
                "resolutions ingested"
            );
            ResolutionTable::from_records(ingest.resolutions)
        }
        None => ResolutionTable::new(),
    };

    let metas = match &markets_path {
        Some(path) => {
            let ingest = read_markets_csv(path)
                .with_context(|| format!("reading markets {}", path.display()))?;
            ingest
                .metas
                .into_iter()
                .map(|meta| (meta.market_id.clone(), meta))
                .collect()
        }
        None => HashMap::new(),
    };

    // ── Analyze ──
    let analysis_input = AnalysisInput {
        summaries: aggregator.finish(),
        resolutions,
        metas,
        dataset_hash: Some(dataset_hash),
        rebate_total: stats.rebate_total,
        skipped_input_records: stats.skipped,
    };
    let report = run_analysis(analysis_input, &config);

    print_report(&report);

    if let Some(path) = json_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing report {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn print_report(report: &AnalysisReport) {
    let c = &report.coverage;
    println!();
    println!("=== Coverage ===");
    println!("Markets seen:      {}", c.markets_seen);
    println!("Resolved:          {}", c.markets_resolved);
    println!("Unresolved:        {}", c.markets_unresolved);
    println!("Conflicting:       {}", c.markets_conflicting);
    println!("Skipped records:   {}", c.skipped_input_records);
    if !c.invariant_violations.is_empty() {
        println!("INVARIANT VIOLATIONS: {}", c.invariant_violations.len());
        for violation in &c.invariant_violations {
            println!("  {violation}");
        }
    }

    let t = &report.decomposition_totals;
    println!();
    println!("=== P&L Decomposition ({} resolved) ===", t.market_count);
    println!("Spread:            {:>+12.2}", t.spread);
    println!(
        "Drag:              {:>+12.2}  (won {:+.2} / lost {:+.2})",
        t.drag, t.drag_excess_won, t.drag_excess_lost
    );
    println!("Sell P&L:          {:>+12.2}", t.sell_pnl);
    println!("Realized:          {:>+12.2}", t.realized_pnl);
    if let Some(capture) = t.capture_rate() {
        println!("Edge capture:      {:>12.1}%", capture * 100.0);
    }
    println!(
        "Maker rebates:     {:>+12.2}  (separate from trade P&L)",
        report.rebate_total
    );

    let d = &report.discipline;
    println!();
    println!("=== Sell Discipline ===");
    println!("Actual P&L:        {:>+12.2}", d.actual_total_pnl);
    println!("Hold-to-settle:    {:>+12.2}", d.counterfactual_total_pnl);
    println!("Discipline value:  {:>+12.2}", d.sell_discipline_value);
    if let Some(helped) = d.helped_fraction() {
        println!(
            "Markets w/ sells:  {:>12}  (helped {:.1}%, hurt {:.1}%)",
            d.markets_with_sells,
            helped * 100.0,
            (1.0 - helped) * 100.0
        );
    }

    println!();
    println!("=== Directional Tilt ===");
    let n = &report.naive_agreement;
    if let Some(rate) = n.share_weighted {
        println!("Share-weighted:    {:>11.1}%  (biased reference)", rate * 100.0);
    }
    if let Some(rate) = n.dollar_weighted {
        println!("Dollar-weighted:   {:>11.1}%  (biased reference)", rate * 100.0);
    }
    match &report.symmetric_subset {
        Some(s) => {
            println!(
                "Symmetric subset:  n={}, observed {:.1}% vs null {:.1}%, z={:+.2}, p={:.4}",
                s.subset_size,
                s.observed_agreement * 100.0,
                s.null_agreement * 100.0,
                s.z,
                s.p_value
            );
            println!("Verdict:           {}", verdict_label(s.verdict));
        }
        None => println!("Symmetric subset:  skipped"),
    }
    match &report.permutation {
        Some(p) => println!(
            "Stratified perm:   gap {:+.4} vs null {:+.4}±{:.4}, p={:.4} ({} trials, {} strata, {} excluded)",
            p.observed_gap, p.null_mean, p.null_std, p.p_value, p.trials, p.strata_used,
            p.strata_excluded
        ),
        None => println!("Stratified perm:   skipped"),
    }
    if let Some(accuracy) = report.one_sided_accuracy {
        println!("One-sided bets:    {:>11.1}% correct", accuracy * 100.0);
    }

    if let Some(fit) = &report.regression {
        println!();
        println!("=== Balance Drivers (OLS, n={}, R²={:.3}) ===", fit.n, fit.r_squared);
        println!(
            "{:<16} {:>10} {:>10} {:>8} {:>10}",
            "feature", "beta", "se", "t", "spearman"
        );
        for f in &fit.features {
            println!(
                "{:<16} {:>+10.5} {:>10.5} {:>+8.2} {:>+10.3}",
                f.name, f.coefficient, f.std_error, f.t_stat, f.bivariate_spearman
            );
        }
        println!("Caveat: {}", fit.caveat);
    }

    if !report.warnings.is_empty() {
        println!();
        for warning in &report.warnings {
            println!("WARNING: {warning}");
        }
    }
    println!();
}

fn verdict_label(verdict: TiltVerdict) -> &'static str {
    match verdict {
        TiltVerdict::Predictive => "predictive",
        TiltVerdict::AntiPredictive => "anti-predictive (worse than no-skill)",
        TiltVerdict::NoSignal => "no signal",
    }
}
