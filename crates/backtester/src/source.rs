//! Collaborators of the replay loop: where bars come from and where reports go.

use crate::error::BacktestError;
use analytics::BacktestReport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::Candle;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Supplies OHLCV bars for a symbol.
#[async_trait]
pub trait PriceBarSource: Send + Sync {
    /// Bars for `symbol` with timestamps in `[from, to]`, oldest first.
    /// `Ok(None)` means the source has nothing for that symbol and range.
    async fn fetch(
        &self,
        symbol: &str,
        resolution: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Vec<Candle>>, BacktestError>;
}

/// Accepts finished reports. Saving the same session twice must be safe.
#[async_trait]
pub trait ResultsSink: Send + Sync {
    async fn save(&self, session_id: &str, report: &BacktestReport) -> Result<(), BacktestError>;
}

fn in_range(bars: &[Candle], from: DateTime<Utc>, to: DateTime<Utc>) -> Option<Vec<Candle>> {
    let mut selected: Vec<Candle> = bars
        .iter()
        .filter(|bar| bar.timestamp >= from && bar.timestamp <= to)
        .cloned()
        .collect();
    if selected.is_empty() {
        return None;
    }
    selected.sort_by_key(|bar| bar.timestamp);
    Some(selected)
}

/// File name for a symbol or session id; exchange prefixes like `NSE:` are kept
/// readable but made path-safe.
fn file_name(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}.json", stem)
}

/// Bars held in memory, keyed by symbol. Bars can be appended while a session
/// runs, which is how live polling is simulated.
#[derive(Debug, Default)]
pub struct InMemoryBarSource {
    bars: RwLock<HashMap<String, Vec<Candle>>>,
}

impl InMemoryBarSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, symbol: impl Into<String>, bars: Vec<Candle>) -> Self {
        self.bars.get_mut().entry(symbol.into()).or_default().extend(bars);
        self
    }

    pub async fn push(&self, symbol: &str, bar: Candle) {
        self.bars.write().await.entry(symbol.to_string()).or_default().push(bar);
    }
}

#[async_trait]
impl PriceBarSource for InMemoryBarSource {
    async fn fetch(
        &self,
        symbol: &str,
        _resolution: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Vec<Candle>>, BacktestError> {
        let bars = self.bars.read().await;
        Ok(bars.get(symbol).and_then(|bars| in_range(bars, from, to)))
    }
}

/// Reads `<dir>/<symbol>.json`, a JSON array of bars. The resolution is fixed
/// by whoever wrote the files.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(file_name(symbol))
    }
}

#[async_trait]
impl PriceBarSource for JsonDirSource {
    async fn fetch(
        &self,
        symbol: &str,
        _resolution: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Vec<Candle>>, BacktestError> {
        let path = self.path_for(symbol);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(symbol, path = %path.display(), "no bar file");
                return Ok(None);
            }
            Err(e) => {
                return Err(BacktestError::Source(format!("{}: {}", path.display(), e)));
            }
        };
        let bars: Vec<Candle> = serde_json::from_slice(&bytes)
            .map_err(|e| BacktestError::Source(format!("{}: {}", path.display(), e)))?;
        Ok(in_range(&bars, from, to))
    }
}

/// Keeps the latest report per session in memory.
#[derive(Debug, Default)]
pub struct InMemorySink {
    reports: RwLock<HashMap<String, BacktestReport>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> Option<BacktestReport> {
        self.reports.read().await.get(session_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }
}

#[async_trait]
impl ResultsSink for InMemorySink {
    async fn save(&self, session_id: &str, report: &BacktestReport) -> Result<(), BacktestError> {
        self.reports.write().await.insert(session_id.to_string(), report.clone());
        Ok(())
    }
}

/// Writes `<dir>/<session_id>.json`, replacing any earlier file for the session.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(file_name(session_id))
    }

    fn sink_error(path: &Path, e: impl std::fmt::Display) -> BacktestError {
        BacktestError::Sink(format!("{}: {}", path.display(), e))
    }
}

#[async_trait]
impl ResultsSink for JsonFileSink {
    async fn save(&self, session_id: &str, report: &BacktestReport) -> Result<(), BacktestError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::sink_error(&self.dir, e))?;
        let path = self.path_for(session_id);
        let json = serde_json::to_vec_pretty(report).map_err(|e| Self::sink_error(&path, e))?;

        // Write then rename so a retry never leaves a truncated file behind.
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, json)
            .await
            .map_err(|e| Self::sink_error(&staging, e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| Self::sink_error(&path, e))?;
        tracing::info!(session_id, path = %path.display(), "report saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn bar(minutes: i64) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 4, 0, 0).unwrap() + Duration::minutes(minutes),
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100.5),
            volume: dec!(1000),
        }
    }

    #[tokio::test]
    async fn test_in_memory_source_filters_and_sorts() {
        let source = InMemoryBarSource::new().with_bars("NSE:SBIN-EQ", vec![bar(10), bar(0), bar(5)]);
        let from = bar(5).timestamp;
        let to = bar(10).timestamp;

        let bars = source.fetch("NSE:SBIN-EQ", "5", from, to).await.unwrap().unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);

        assert!(source.fetch("NSE:TCS-EQ", "5", from, to).await.unwrap().is_none());
        let later = bar(60).timestamp;
        assert!(source.fetch("NSE:SBIN-EQ", "5", later, later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_dir_source_reads_symbol_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonDirSource::new(dir.path());
        let path = source.path_for("NSE:SBIN-EQ");
        assert!(path.ends_with("NSE_SBIN-EQ.json"));
        std::fs::write(&path, serde_json::to_vec(&vec![bar(0), bar(5)]).unwrap()).unwrap();

        let bars = source
            .fetch("NSE:SBIN-EQ", "5", bar(0).timestamp, bar(5).timestamp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bars, vec![bar(0), bar(5)]);
        assert!(source
            .fetch("NSE:TCS-EQ", "5", bar(0).timestamp, bar(5).timestamp)
            .await
            .unwrap()
            .is_none());

        std::fs::write(source.path_for("BROKEN"), b"not json").unwrap();
        let broken = source.fetch("BROKEN", "5", bar(0).timestamp, bar(5).timestamp).await;
        assert!(matches!(broken, Err(BacktestError::Source(_))));
    }

    fn report(session_id: &str) -> BacktestReport {
        let config = configuration::SessionConfig {
            session_id: session_id.to_string(),
            symbols: vec!["NSE:SBIN-EQ".to_string()],
            ..configuration::SessionConfig::default()
        };
        let portfolio = executor::Portfolio::from_simulation(&configuration::Simulation::default());
        let mut ledger = analytics::SessionLedger::new(330).unwrap();
        ledger.record_equity(bar(0).timestamp, &portfolio.summary());
        analytics::AnalyticsEngine::new().build_report(&config, &portfolio, &ledger)
    }

    #[tokio::test]
    async fn test_json_file_sink_overwrites_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("results"));
        let report = report("NSE run/1");

        sink.save("NSE run/1", &report).await.unwrap();
        sink.save("NSE run/1", &report).await.unwrap();

        let path = sink.path_for("NSE run/1");
        assert!(path.ends_with("NSE_run_1.json"));
        let saved: BacktestReport = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(saved, report);

        let files: Vec<_> = std::fs::read_dir(dir.path().join("results"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("NSE_run_1.json")]);
    }

    #[tokio::test]
    async fn test_json_file_sink_reports_unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, b"a file, not a directory").unwrap();

        let sink = JsonFileSink::new(&blocker);
        let result = sink.save("s1", &report("s1")).await;
        assert!(matches!(result, Err(BacktestError::Sink(_))));
    }
}
