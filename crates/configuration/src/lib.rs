//! # Tradesim Configuration
//!
//! Strongly-typed settings for the simulator and the validated request that
//! starts a trading session.
//!
//! ## Public API
//!
//! - `load_config`: layers `config.toml` and `TRADESIM__*` environment variables into a `Config`.
//! - `Config` and its sections (`Simulation`, `BacktestSettings`, `LiveSettings`,
//!   `Strategies`, `Logging`).
//! - `RiskManagement`: per-session sizing and stop/target distances.
//! - `SessionConfig`: the start request, with `validate()` enforcing accepted ranges.
//! - `ConfigError`

// Declare the modules that make up this crate.
pub mod error;
pub mod session;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use session::SessionConfig;
pub use settings::{
    AdxParams, AtrParams, BacktestSettings, BollingerParams, Config, LiveSettings, Logging,
    MacdParams, RenkoParams, RiskManagement, RsiParams, Simulation, Strategies, SuperTrendParams,
};

/// Loads the application configuration.
///
/// The file at `path` is optional; every field has a default. Environment
/// variables such as `TRADESIM__SIMULATION__BROKERAGE_PER_TRADE=15` override it.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("TRADESIM").separator("__"))
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    tracing::debug!(path, "configuration loaded");
    Ok(config)
}
