use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use common::{Bar, Error, MarketDataSource, Result};

#[derive(Debug, Deserialize)]
struct BarRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Bars read once from a `timestamp,open,high,low,close,volume` CSV file.
///
/// Rows are sorted by timestamp; a repeated timestamp keeps the last row.
#[derive(Debug, Clone, Default)]
pub struct CsvBarSource {
    bars: Vec<Bar>,
}

impl CsvBarSource {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let source = Self::from_reader(file)?;
        info!(path = %path.display(), bars = source.bars.len(), "Bars loaded");
        Ok(source)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut by_time: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();

        for row in reader.deserialize::<BarRecord>() {
            let record = row?;
            let timestamp = parse_timestamp(&record.timestamp)?;
            let bar = Bar {
                timestamp,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
            };
            if by_time.insert(timestamp, bar).is_some() {
                warn!(%timestamp, "Duplicate bar timestamp, keeping the later row");
            }
        }

        Ok(Self { bars: by_time.into_values().collect() })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

#[async_trait]
impl MarketDataSource for CsvBarSource {
    async fn get_bars(&self, symbol: &str, timeframe: &str, count: usize) -> Result<Vec<Bar>> {
        let start = self.bars.len().saturating_sub(count);
        debug!(symbol, timeframe, count, returned = self.bars.len() - start, "Serving bars from CSV");
        Ok(self.bars[start..].to_vec())
    }
}

/// RFC 3339 or integer unix seconds.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| Error::External(format!("unparseable bar timestamp '{raw}'")))
}

// ─── Tests ────────────────────────────────────────────────────────────────────
