//! Ingestion boundary — loosely-typed activity records to the strict domain
//! schema.
//!
//! The upstream data API ships camelCase records with string-encoded
//! numerics. Everything is normalized here: past this module the engine
//! only sees typed `Fill` / `Resolution` / `MarketMeta` values and never
//! branches on wire representation. Malformed rows are isolated and
//! counted, never allowed to abort the batch.
//!
//! Maker-rebate activity rows are not fills; they are tallied separately so
//! rebate income stays out of per-market trade P&L.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{Fill, MarketMeta, Outcome, Resolution, Side};

/// Errors from ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

// ─── Wire records ────────────────────────────────────────────────────

/// Activity record as shipped by the data API: camelCase keys, numerics as
/// strings. Matches both the trade and maker-rebate activity shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTradeRecord {
    pub condition_id: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub size: String,
    pub timestamp: String,
    #[serde(rename = "type", default)]
    pub activity_type: String,
    #[serde(default)]
    pub usdc_value: String,
}

/// Position record as shipped by the data API. A terminal `curPrice` of 1
/// or 0 doubles as the settlement evidence for that outcome.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPositionRecord {
    pub condition_id: String,
    pub outcome: String,
    #[serde(default)]
    pub cur_price: String,
    #[serde(default)]
    pub is_closed: Option<bool>,
}

/// Market metadata record as shipped by the data API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMarketRecord {
    pub condition_id: String,
    pub question: String,
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub end_date: String,
}

/// One normalized activity event.
#[derive(Debug, Clone)]
pub enum TradeEvent {
    Fill(Fill),
    MakerRebate { amount: f64 },
}

impl ApiTradeRecord {
    /// Normalize into a typed event. The error string names the defect; the
    /// readers count these and move on.
    pub fn into_event(self) -> Result<TradeEvent, String> {
        if self.activity_type == "MAKER_REBATE" {
            let amount = parse_number(&self.usdc_value)
                .ok_or_else(|| format!("rebate with bad usdcValue {:?}", self.usdc_value))?;
            return Ok(TradeEvent::MakerRebate { amount });
        }

        if self.condition_id.is_empty() {
            return Err("missing conditionId".into());
        }
        let side = match self.side.as_str() {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            other => return Err(format!("unknown side {other:?}")),
        };
        let outcome = match self.outcome.as_str() {
            "Up" => Outcome::Up,
            "Down" => Outcome::Down,
            other => return Err(format!("unknown outcome {other:?}")),
        };
        let price =
            parse_number(&self.price).ok_or_else(|| format!("bad price {:?}", self.price))?;
        if !(price > 0.0 && price <= 1.0) {
            return Err(format!("price {price} outside (0, 1]"));
        }
        let quantity =
            parse_number(&self.size).ok_or_else(|| format!("bad size {:?}", self.size))?;
        if quantity <= 0.0 {
            return Err(format!("non-positive size {quantity}"));
        }
        let timestamp = parse_epoch(&self.timestamp)
            .ok_or_else(|| format!("bad timestamp {:?}", self.timestamp))?;

        Ok(TradeEvent::Fill(Fill {
            market_id: self.condition_id,
            side,
            outcome,
            price,
            quantity,
            timestamp,
        }))
    }
}

impl ApiPositionRecord {
    /// Normalize into a settlement record, `None` when the position is
    /// still open or carries no terminal price.
    pub fn into_resolution(self) -> Result<Option<Resolution>, String> {
        if self.is_closed == Some(false) {
            return Ok(None);
        }
        let outcome = match self.outcome.as_str() {
            "Up" => Outcome::Up,
            "Down" => Outcome::Down,
            other => return Err(format!("unknown outcome {other:?}")),
        };
        if self.cur_price.is_empty() {
            return Ok(None);
        }
        let settled_price = parse_number(&self.cur_price)
            .ok_or_else(|| format!("bad curPrice {:?}", self.cur_price))?;
        Ok(Some(Resolution {
            market_id: self.condition_id,
            outcome,
            settled_price,
        }))
    }
}

impl ApiMarketRecord {
    pub fn into_meta(self) -> MarketMeta {
        let asset = parse_asset(&self.question);
        let duration_secs = parse_duration_secs(&self.question);
        let close_ts = DateTime::parse_from_rfc3339(&self.end_date)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
        let open_ts = close_ts.map(|ts| ts - chrono::Duration::seconds(duration_secs));
        MarketMeta {
            market_id: self.condition_id,
            asset,
            duration_secs,
            lifetime_volume: parse_number(&self.volume).unwrap_or(0.0),
            open_ts,
            close_ts,
        }
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

// ─── Question parsing ────────────────────────────────────────────────

/// Asset name from a question like "Solana Up or Down - January 19,
/// 7:45AM-8:00AM ET".
fn parse_asset(question: &str) -> String {
    match question.find(" Up or Down") {
        Some(idx) => question[..idx].trim().to_string(),
        None => "Unknown".to_string(),
    }
}

/// Window length from the question's time portion: two clock times
/// ("7:45AM-8:00AM") mark a 15-minute market, a single bare hour ("6PM")
/// an hourly one.
fn parse_duration_secs(question: &str) -> i64 {
    if count_clock_times(question) >= 2 {
        900
    } else {
        3600
    }
}

/// Count `H:MM(AM|PM)` tokens in a string.
fn count_clock_times(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let mut j = i + 1;
            if j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j + 2 < bytes.len()
                && bytes[j] == b':'
                && bytes[j + 1].is_ascii_digit()
                && bytes[j + 2].is_ascii_digit()
            {
                let k = j + 3;
                if k + 1 < bytes.len() && (bytes[k] == b'A' || bytes[k] == b'P') && bytes[k + 1] == b'M'
                {
                    count += 1;
                    i = k + 2;
                    continue;
                }
            }
        }
        i += 1;
    }
    count
}

// ─── Readers ─────────────────────────────────────────────────────────

/// Tallies from one streaming ingest pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestStats {
    pub fills: usize,
    pub rebates: usize,
    pub rebate_total: f64,
    pub skipped: usize,
}

/// Stream a CSV activity log, feeding each normalized event to `on_event`.
///
/// Record-by-record: the full log is never resident. Malformed rows are
/// skipped and counted in the returned stats.
pub fn stream_trades_csv<F>(path: &Path, mut on_event: F) -> Result<IngestStats, IngestError>
where
    F: FnMut(TradeEvent),
{
    let mut reader = csv::Reader::from_path(path)?;
    let mut stats = IngestStats::default();
    for row in reader.deserialize::<ApiTradeRecord>() {
        let record = match row {
            Ok(record) => record,
            Err(_) => {
                stats.skipped += 1;
                continue;
            }
        };
        dispatch_event(record, &mut stats, &mut on_event);
    }
    Ok(stats)
}

/// Stream a JSON-lines activity log (one API record per line).
pub fn stream_trades_jsonl<F>(path: &Path, mut on_event: F) -> Result<IngestStats, IngestError>
where
    F: FnMut(TradeEvent),
{
    let reader = BufReader::new(File::open(path)?);
    let mut stats = IngestStats::default();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ApiTradeRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(_) => {
                stats.skipped += 1;
                continue;
            }
        };
        dispatch_event(record, &mut stats, &mut on_event);
    }
    Ok(stats)
}

fn dispatch_event<F>(record: ApiTradeRecord, stats: &mut IngestStats, on_event: &mut F)
where
    F: FnMut(TradeEvent),
{
    match record.into_event() {
        Ok(event) => {
            match &event {
                TradeEvent::Fill(_) => stats.fills += 1,
                TradeEvent::MakerRebate { amount } => {
                    stats.rebates += 1;
                    stats.rebate_total += amount;
                }
            }
            on_event(event);
        }
        Err(_) => stats.skipped += 1,
    }
}

/// Resolutions recovered from a position export, plus skip tally.
#[derive(Debug, Clone, Default)]
pub struct ResolutionIngest {
    pub resolutions: Vec<Resolution>,
    pub skipped: usize,
}

/// Read settlement evidence from a CSV position export.
pub fn read_resolutions_csv(path: &Path) -> Result<ResolutionIngest, IngestError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut out = ResolutionIngest::default();
    for row in reader.deserialize::<ApiPositionRecord>() {
        match row {
            Ok(record) => match record.into_resolution() {
                Ok(Some(resolution)) => out.resolutions.push(resolution),
                Ok(None) => {}
                Err(_) => out.skipped += 1,
            },
            Err(_) => out.skipped += 1,
        }
    }
    Ok(out)
}

/// Market metadata recovered from a CSV export, plus skip tally.
#[derive(Debug, Clone, Default)]
pub struct MarketIngest {
    pub metas: Vec<MarketMeta>,
    pub skipped: usize,
}

/// Read market metadata from a CSV export.
pub fn read_markets_csv(path: &Path) -> Result<MarketIngest, IngestError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut out = MarketIngest::default();
    for row in reader.deserialize::<ApiMarketRecord>() {
        match row {
            Ok(record) => out.metas.push(record.into_meta()),
            Err(_) => out.skipped += 1,
        }
    }
    Ok(out)
}

/// blake3 fingerprint of a raw input file, for dataset identity on reports.
pub fn hash_file(path: &Path) -> Result<String, IngestError> {
    let mut hasher = blake3::Hasher::new();
    let mut file = File::open(path)?;
    let mut buf = [0u8; 65536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
