use core_types::SessionStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session '{0}' not found")]
    NotFound(String),

    #[error("Session '{0}' already exists")]
    AlreadyExists(String),

    #[error("Session '{session_id}' has no results yet (status {status:?})")]
    NotFinished {
        session_id: String,
        status: SessionStatus,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] configuration::ConfigError),

    #[error("Backtest error: {0}")]
    Backtest(#[from] backtester::BacktestError),
}
