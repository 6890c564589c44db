use crate::error::BacktestError;
use crate::market_hours::MarketHours;
use crate::source::PriceBarSource;
use crate::trader::{AutoTrader, SessionProgress};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use configuration::{BacktestSettings, ConfigError, LiveSettings};
use core_types::{Candle, TradingMode};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The historical bar sequence was exhausted.
    Completed,
    /// The cancellation signal was raised.
    Cancelled,
}

/// Bars grouped by timestamp, then by symbol.
type Timeline = BTreeMap<DateTime<Utc>, BTreeMap<String, Candle>>;

/// The main replay driver.
///
/// Feeds an `AutoTrader` from a `PriceBarSource`, either by replaying a
/// historical range or by polling for new bars, and publishes a
/// `SessionProgress` snapshot as it goes.
pub struct Backtester {
    trader: AutoTrader,
    source: Arc<dyn PriceBarSource>,
    settings: BacktestSettings,
    live: LiveSettings,
    progress: watch::Sender<SessionProgress>,
}

impl Backtester {
    pub fn new(
        trader: AutoTrader,
        source: Arc<dyn PriceBarSource>,
        settings: BacktestSettings,
        live: LiveSettings,
    ) -> (Self, watch::Receiver<SessionProgress>) {
        let (progress, receiver) = watch::channel(trader.progress(0, None));
        let backtester = Self { trader, source, settings, live, progress };
        (backtester, receiver)
    }

    pub fn trader(&self) -> &AutoTrader {
        &self.trader
    }

    pub fn into_trader(self) -> AutoTrader {
        self.trader
    }

    /// Runs in the session's configured mode until the data ends or `cancel`
    /// becomes `true`.
    pub async fn run(&mut self, cancel: watch::Receiver<bool>) -> Result<RunOutcome, BacktestError> {
        match self.trader.config().mode {
            TradingMode::Historical => self.run_historical(&cancel).await,
            TradingMode::Live => self.run_live(cancel).await,
        }
    }

    /// Replays every bar in the configured date range, oldest first.
    ///
    /// Fails with `DataUnavailable` before the first step if no symbol has data.
    pub async fn run_historical(
        &mut self,
        cancel: &watch::Receiver<bool>,
    ) -> Result<RunOutcome, BacktestError> {
        let timeline = self.load_timeline().await?;
        let total = timeline.len();
        let session_id = self.trader.config().session_id.clone();
        tracing::info!(%session_id, timestamps = total, "historical replay started");

        let log_step = self.settings.progress_log_pct.max(1);
        let mut next_log_pct = log_step;
        for (index, (at, bars)) in timeline.into_iter().enumerate() {
            if *cancel.borrow() {
                tracing::info!(%session_id, processed = index, "replay cancelled");
                self.publish(index, Some(total));
                return Ok(RunOutcome::Cancelled);
            }

            self.trader.step(at, &bars)?;

            let processed = index + 1;
            let pct = processed * 100 / total;
            if pct >= next_log_pct {
                let summary = self.trader.exchange().portfolio().summary();
                tracing::info!(
                    %session_id,
                    progress_pct = pct,
                    processed,
                    total,
                    portfolio_value = %summary.portfolio_value,
                    "replay progress"
                );
                next_log_pct = (pct / log_step + 1) * log_step;
            }
            if processed % self.settings.yield_every.max(1) == 0 {
                self.publish(processed, Some(total));
                tokio::task::yield_now().await;
            }
        }

        self.publish(total, Some(total));
        tracing::info!(%session_id, "historical replay completed");
        Ok(RunOutcome::Completed)
    }

    /// Fetches every symbol over the session's date range and merges the bars
    /// into one sorted, de-duplicated timeline.
    async fn load_timeline(&self) -> Result<Timeline, BacktestError> {
        let config = self.trader.config();
        let (Some(start), Some(end)) = (config.start_date, config.end_date) else {
            return Err(ConfigError::ValidationError(
                "start_date and end_date are required for historical mode".to_string(),
            )
            .into());
        };
        let (from, to) = day_bounds(start, end, self.live.utc_offset_minutes)?;

        let mut timeline = Timeline::new();
        for symbol in &config.symbols {
            match self.source.fetch(symbol, &config.timeframe, from, to).await? {
                Some(bars) if !bars.is_empty() => {
                    tracing::info!(symbol, bars = bars.len(), "loaded price bars");
                    for bar in bars {
                        timeline.entry(bar.timestamp).or_default().insert(symbol.clone(), bar);
                    }
                }
                _ => tracing::warn!(symbol, %start, %end, "no price bars for symbol"),
            }
        }

        if timeline.is_empty() {
            return Err(BacktestError::DataUnavailable(format!(
                "no bars for {} between {} and {}",
                config.symbols.join(", "),
                start,
                end
            )));
        }
        Ok(timeline)
    }

    /// Polls for new bars until cancelled. Outside market hours, and after a
    /// source failure, the loop waits and tries again.
    pub async fn run_live(&mut self, mut cancel: watch::Receiver<bool>) -> Result<RunOutcome, BacktestError> {
        let gate = MarketHours::from_settings(&self.live)?;
        let session_id = self.trader.config().session_id.clone();
        let mut processed = 0;
        tracing::info!(%session_id, "live polling started");

        loop {
            if *cancel.borrow() {
                break;
            }

            let now = Utc::now();
            let wait_secs = if !gate.is_open(now) {
                tracing::debug!(%session_id, "market closed; waiting");
                self.live.closed_market_poll_secs
            } else {
                match self.poll_once(now).await {
                    Ok(steps) => {
                        processed += steps;
                        self.publish(processed, None);
                        self.live.poll_interval_secs
                    }
                    Err(e @ (BacktestError::Source(_) | BacktestError::DataUnavailable(_))) => {
                        tracing::warn!(%session_id, error = %e, "live poll failed; backing off");
                        self.live.error_backoff_secs
                    }
                    Err(e) => return Err(e),
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(wait_secs)) => {}
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(%session_id, processed, "live polling stopped");
        self.publish(processed, None);
        Ok(RunOutcome::Cancelled)
    }

    /// Fetches recent bars for every symbol and steps through the new ones.
    ///
    /// The first time a symbol is seen, all but its latest bar only warm up
    /// the history, so a session never trades on stale bars.
    async fn poll_once(&mut self, now: DateTime<Utc>) -> Result<usize, BacktestError> {
        let from = now - Duration::days(self.live.lookback_days);
        let symbols = self.trader.config().symbols.clone();
        let timeframe = self.trader.config().timeframe.clone();

        let mut timeline = Timeline::new();
        for symbol in &symbols {
            let Some(mut bars) = self.source.fetch(symbol, &timeframe, from, now).await? else {
                tracing::debug!(symbol, "no live bars");
                continue;
            };
            match self.trader.last_bar_time(symbol) {
                Some(last) => bars.retain(|bar| bar.timestamp > last),
                None => {
                    let split = bars.len().saturating_sub(1);
                    self.trader.warm_up(symbol, &bars[..split]);
                    bars.drain(..split);
                }
            }
            for bar in bars {
                timeline.entry(bar.timestamp).or_default().insert(symbol.clone(), bar);
            }
        }

        let steps = timeline.len();
        for (at, bars) in timeline {
            self.trader.step(at, &bars)?;
        }
        Ok(steps)
    }

    fn publish(&self, processed: usize, total: Option<usize>) {
        self.progress.send_replace(self.trader.progress(processed, total));
    }
}

/// The UTC instants spanning whole local days `start..=end`.
fn day_bounds(
    start: NaiveDate,
    end: NaiveDate,
    utc_offset_minutes: i32,
) -> Result<(DateTime<Utc>, DateTime<Utc>), BacktestError> {
    let offset = utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or(analytics::AnalyticsError::InvalidUtcOffset(utc_offset_minutes))?;
    let local = |date: NaiveDate, time: NaiveTime| {
        offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|at| at.with_timezone(&Utc))
    };
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    match (local(start, NaiveTime::MIN), local(end, last_second)) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err(BacktestError::DataUnavailable(format!(
            "date range {} to {} cannot be resolved",
            start, end
        ))),
    }
}
