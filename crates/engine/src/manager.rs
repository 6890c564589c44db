use crate::error::SessionError;
use crate::store::{SessionEntry, SessionStore, SessionSummary};
use analytics::BacktestReport;
use backtester::{
    AutoTrader, BacktestError, Backtester, PriceBarSource, ResultsSink, RunOutcome, SessionProgress,
};
use chrono::Utc;
use configuration::{Config, SessionConfig};
use core_types::{SessionStatus, StrategyId, TradingMode};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// What `status` reports for a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub session_id: String,
    pub status: SessionStatus,
    pub mode: TradingMode,
    pub progress: SessionProgress,
    /// Set when the session FAILED.
    pub error: Option<String>,
}

/// A generator available to sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// Starts, observes and stops trading sessions.
///
/// Each session runs as its own tokio task that owns the session's trader.
/// The manager only talks to it through the store entry: a cancellation
/// channel in, progress snapshots and the final report out.
pub struct SessionManager {
    base: Config,
    source: Arc<dyn PriceBarSource>,
    sink: Arc<dyn ResultsSink>,
    store: SessionStore,
}

impl SessionManager {
    pub fn new(base: Config, source: Arc<dyn PriceBarSource>, sink: Arc<dyn ResultsSink>) -> Self {
        Self {
            base,
            source,
            sink,
            store: SessionStore::new(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Validates `config` and launches the session in the background.
    ///
    /// Invalid requests are rejected here and never create a session.
    pub async fn start(&self, config: SessionConfig) -> Result<String, SessionError> {
        // --- 1. Validate and build everything that can fail synchronously ---
        config.validate()?;
        let trader = AutoTrader::new(config.clone(), &self.base)?;
        let (mut backtester, progress) = Backtester::new(
            trader,
            Arc::clone(&self.source),
            self.base.backtest.clone(),
            self.base.live.clone(),
        );
        let (cancel_tx, cancel_rx) = watch::channel(false);

        // --- 2. Register the session ---
        let session_id = config.session_id.clone();
        let mode = config.mode;
        self.store
            .create(SessionEntry::new(config, progress.clone(), cancel_tx))
            .await?;
        self.store
            .update(&session_id, |entry| entry.status = SessionStatus::Running)
            .await;
        tracing::info!(%session_id, ?mode, "session started");

        // --- 3. Run it ---
        let store = self.store.clone();
        let sink = Arc::clone(&self.sink);
        let task_id = session_id.clone();
        let task = tokio::spawn(async move {
            let outcome = backtester.run(cancel_rx).await;
            let trader = backtester.into_trader();
            finalize(&store, sink.as_ref(), &task_id, trader, &progress, outcome).await;
        });
        self.store
            .update(&session_id, |entry| entry.task = Some(task))
            .await;

        Ok(session_id)
    }

    pub async fn status(&self, session_id: &str) -> Result<SessionState, SessionError> {
        self.store
            .get(session_id, |entry| SessionState {
                session_id: entry.session_id().to_string(),
                status: entry.status,
                mode: entry.config.mode,
                progress: entry.current_progress(),
                error: entry.error.clone(),
            })
            .await
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// The final report of a finished session.
    ///
    /// Reports are built once when the session ends, so repeated calls
    /// return identical reports.
    pub async fn results(&self, session_id: &str) -> Result<BacktestReport, SessionError> {
        let found = self
            .store
            .get(session_id, |entry| (entry.status, entry.report.clone()))
            .await;
        match found {
            None => Err(SessionError::NotFound(session_id.to_string())),
            Some((_, Some(report))) => Ok(report),
            Some((status, None)) => Err(SessionError::NotFinished {
                session_id: session_id.to_string(),
                status,
            }),
        }
    }

    /// Cancels the session, liquidates its open positions at their last mark
    /// and returns the final report. Stopping a finished session returns its
    /// existing report unchanged.
    pub async fn stop(&self, session_id: &str) -> Result<BacktestReport, SessionError> {
        let task = self
            .store
            .update(session_id, |entry| {
                if !entry.status.is_finished() {
                    // The receiver is gone once the task has ended.
                    let _ = entry.cancel.send(true);
                }
                entry.task.take()
            })
            .await
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if let Some(task) = task {
            tracing::info!(%session_id, "stopping session");
            if let Err(e) = task.await {
                tracing::error!(%session_id, error = %e, "session task did not finish cleanly");
            }
        }
        self.results(session_id).await
    }

    /// Stops the session if it is still running and removes it from the store.
    pub async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let running = self
            .store
            .get(session_id, |entry| !entry.status.is_finished())
            .await
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        if running {
            match self.stop(session_id).await {
                Ok(_) | Err(SessionError::NotFinished { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        self.store.delete(session_id).await;
        tracing::info!(%session_id, "session deleted");
        Ok(())
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        self.store.list().await
    }

    pub fn strategies() -> Vec<StrategyInfo> {
        StrategyId::ALL
            .iter()
            .map(|id| StrategyInfo {
                name: id.as_str(),
                description: id.description(),
            })
            .collect()
    }
}

/// Settles a session after its run returns: liquidates a cancelled session,
/// builds the report, hands it to the sink and records the final state.
async fn finalize(
    store: &SessionStore,
    sink: &dyn ResultsSink,
    session_id: &str,
    mut trader: AutoTrader,
    progress: &watch::Receiver<SessionProgress>,
    outcome: Result<RunOutcome, BacktestError>,
) {
    let (status, error) = match outcome {
        Ok(RunOutcome::Completed) => (SessionStatus::Completed, None),
        Ok(RunOutcome::Cancelled) => {
            let at = trader.last_timestamp().unwrap_or_else(Utc::now);
            match trader.liquidate(at) {
                Ok(closed) => {
                    tracing::info!(%session_id, closed, "open positions liquidated");
                    (SessionStatus::Stopped, None)
                }
                Err(e) => {
                    tracing::error!(%session_id, error = %e, "liquidation failed");
                    (SessionStatus::Failed, Some(e.to_string()))
                }
            }
        }
        Err(e) => {
            tracing::error!(%session_id, error = %e, "session failed");
            (SessionStatus::Failed, Some(e.to_string()))
        }
    };

    let report = trader.report();
    let last = progress.borrow().clone();
    let final_progress = trader.progress(last.processed, last.total);

    if matches!(status, SessionStatus::Completed | SessionStatus::Stopped) {
        if let Err(e) = sink.save(session_id, &report).await {
            tracing::warn!(%session_id, error = %e, "failed to save session results");
        }
    }

    tracing::info!(
        %session_id,
        ?status,
        final_value = %report.portfolio.final_value,
        trades = report.trades_executed,
        "session finished"
    );
    store
        .update(session_id, |entry| {
            entry.status = status;
            entry.error = error;
            entry.report = Some(report);
            entry.final_progress = Some(final_progress);
        })
        .await;
}
