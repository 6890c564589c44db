use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("No price data available: {0}")]
    DataUnavailable(String),

    #[error("Price-bar source error: {0}")]
    Source(String),

    #[error("Results sink error: {0}")]
    Sink(String),

    #[error("Configuration error: {0}")]
    Config(#[from] configuration::ConfigError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] strategies::StrategyError),

    #[error("Risk management error: {0}")]
    Risk(#[from] risk::RiskError),

    #[error("Execution simulation error: {0}")]
    Executor(#[from] executor::ExecutorError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),
}
