use analytics::BacktestReport;
use backtester::{JsonDirSource, JsonFileSink};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use configuration::{Config, Logging, SessionConfig};
use core_types::{SessionStatus, TradingMode};
use engine::SessionManager;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The main entry point for the tradesim application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; it only carries optional overrides.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = configuration::load_config(&cli.config)?;
    let _guard = init_tracing(&config.logging)?;

    match cli.command {
        Commands::Run(args) => handle_run(args, config).await,
        Commands::Live(args) => handle_live(args, config).await,
        Commands::Strategies => {
            print_strategies();
            Ok(())
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A paper-trading simulator: replays price bars through signal generators,
/// a risk manager and a simulated exchange.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file; missing files fall back to defaults.
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest over a historical date range.
    Run(RunArgs),
    /// Poll for new bars and trade them until Ctrl-C.
    Live(SessionArgs),
    /// List the available signal generators.
    Strategies,
}

#[derive(Args)]
struct SessionArgs {
    /// Symbols to trade, comma separated (e.g. "NSE:SBIN-EQ,NSE:TCS-EQ").
    #[arg(long, value_delimiter = ',', required = true)]
    symbols: Vec<String>,

    /// Directory of `<symbol>.json` bar files.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory the final report is written to.
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,

    /// Session id; a UUID is generated when omitted.
    #[arg(long)]
    session_id: Option<String>,

    /// Strategies to enable, comma separated. Defaults to all of them.
    #[arg(long, value_delimiter = ',')]
    strategies: Vec<String>,

    #[arg(long)]
    capital: Option<Decimal>,

    #[arg(long)]
    stop_loss_pct: Option<Decimal>,

    #[arg(long)]
    target_pct: Option<Decimal>,

    #[arg(long)]
    max_positions: Option<usize>,

    #[arg(long)]
    position_size_pct: Option<Decimal>,

    /// Bar resolution passed to the data source (e.g. "5" for 5 minutes).
    #[arg(long, default_value = "5")]
    timeframe: String,

    /// Print the full report as JSON instead of the summary tables.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// First trading day (format: YYYY-MM-DD).
    #[arg(long)]
    from: NaiveDate,

    /// Last trading day, inclusive (format: YYYY-MM-DD).
    #[arg(long)]
    to: NaiveDate,
}

impl SessionArgs {
    fn session_config(&self, config: &Config, mode: TradingMode) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            session_id: self
                .session_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            symbols: self.symbols.clone(),
            initial_capital: self.capital.unwrap_or(config.simulation.initial_capital),
            stop_loss_pct: self.stop_loss_pct.unwrap_or(defaults.stop_loss_pct),
            target_pct: self.target_pct.unwrap_or(defaults.target_pct),
            max_positions: self.max_positions.unwrap_or(defaults.max_positions),
            position_size_pct: self.position_size_pct.unwrap_or(defaults.position_size_pct),
            strategies: if self.strategies.is_empty() {
                defaults.strategies
            } else {
                self.strategies.clone()
            },
            mode,
            start_date: None,
            end_date: None,
            timeframe: self.timeframe.clone(),
        }
    }

    fn manager(&self, config: Config) -> SessionManager {
        SessionManager::new(
            config,
            Arc::new(JsonDirSource::new(&self.data_dir)),
            Arc::new(JsonFileSink::new(&self.results_dir)),
        )
    }
}

// ==============================================================================
// Command Logic
// ==============================================================================

/// Runs a historical session to completion, showing progress along the way.
/// Ctrl-C stops the session early and still prints its report.
async fn handle_run(args: RunArgs, config: Config) -> anyhow::Result<()> {
    let mut session = args.session.session_config(&config, TradingMode::Historical);
    session.start_date = Some(args.from);
    session.end_date = Some(args.to);

    let manager = args.session.manager(config);
    let session_id = manager.start(session).await?;

    let progress_bar = ProgressBar::new(0);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    let state = loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                progress_bar.set_message("stopping...");
                manager.stop(&session_id).await?;
            }
        }
        let state = manager.status(&session_id).await?;
        if let Some(total) = state.progress.total {
            progress_bar.set_length(total as u64);
        }
        progress_bar.set_position(state.progress.processed as u64);
        progress_bar.set_message(format!("value {}", state.progress.portfolio_value.round_dp(2)));
        if state.status.is_finished() {
            break state;
        }
    };
    progress_bar.finish_and_clear();

    if state.status == SessionStatus::Failed {
        anyhow::bail!(
            "session {} failed: {}",
            session_id,
            state.error.unwrap_or_default()
        );
    }
    let report = manager.results(&session_id).await?;
    print_report(&report, args.session.json)?;
    Ok(())
}

/// Runs a live session until Ctrl-C, then liquidates and prints the report.
async fn handle_live(args: SessionArgs, config: Config) -> anyhow::Result<()> {
    let session = args.session_config(&config, TradingMode::Live);
    let manager = args.manager(config);
    let session_id = manager.start(session).await?;
    tracing::info!(%session_id, "live session running; press Ctrl-C to stop");

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(120));
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let state = manager.status(&session_id).await?;
                if state.status.is_finished() {
                    break;
                }
                spinner.set_message(format!(
                    "bars {} | value {} | open {} | trades {}",
                    state.progress.processed,
                    state.progress.portfolio_value.round_dp(2),
                    state.progress.open_positions,
                    state.progress.trades_executed,
                ));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    spinner.finish_and_clear();

    let report = manager.stop(&session_id).await?;
    let state = manager.status(&session_id).await?;
    if let Some(error) = state.error {
        tracing::error!(%session_id, %error, "live session ended with an error");
    }
    print_report(&report, args.json)?;
    Ok(())
}

fn print_strategies() {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Strategy", "Description"]);
    for info in SessionManager::strategies() {
        table.add_row(vec![info.name, info.description]);
    }
    println!("{table}");
}

fn print_report(report: &BacktestReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let portfolio = &report.portfolio;
    let stats = &report.statistics;
    let optional = |value: Option<Decimal>| value.map_or("-".to_string(), |v| v.round_dp(2).to_string());

    let mut summary = Table::new();
    summary.load_preset(UTF8_FULL).set_header(vec!["Metric", "Value"]);
    let rows: Vec<(&str, String)> = vec![
        ("Session", report.session_id.clone()),
        ("Symbols", report.symbols.join(", ")),
        ("Initial Capital", portfolio.initial_capital.round_dp(2).to_string()),
        ("Final Value", portfolio.final_value.round_dp(2).to_string()),
        ("Total P&L", portfolio.total_pnl.round_dp(2).to_string()),
        ("Return %", portfolio.returns_pct.round_dp(2).to_string()),
        ("Realized P&L", portfolio.realized_pnl.round_dp(2).to_string()),
        ("Unrealized P&L", portfolio.unrealized_pnl.round_dp(2).to_string()),
        ("Charges", portfolio.total_charges.round_dp(2).to_string()),
        ("Max Drawdown", report.drawdown.max_drawdown.round_dp(2).to_string()),
        ("Max Drawdown %", report.drawdown.max_drawdown_pct.round_dp(2).to_string()),
        ("Closed Trades", stats.total_trades.to_string()),
        ("Win Rate %", optional(stats.win_rate_pct)),
        ("Profit Factor", optional(stats.profit_factor)),
        ("Signals", report.signals_generated.to_string()),
        ("Orders Executed", report.trades_executed.to_string()),
        ("Orders Rejected", report.orders_rejected.to_string()),
        ("Consistent", report.consistency.is_consistent.to_string()),
    ];
    for (metric, value) in rows {
        summary.add_row(vec![metric.to_string(), value]);
    }
    println!("{summary}");

    if !report.signal_breakdown.is_empty() {
        let mut breakdown = Table::new();
        breakdown
            .load_preset(UTF8_FULL)
            .set_header(vec!["Strategy", "Buy", "Sell", "Total"]);
        for (strategy, counts) in &report.signal_breakdown {
            breakdown.add_row(vec![
                strategy.to_string(),
                counts.buy.to_string(),
                counts.sell.to_string(),
                counts.total.to_string(),
            ]);
        }
        println!("{breakdown}");
    }

    for issue in &report.consistency.issues {
        tracing::warn!(%issue, "report flagged an accounting inconsistency");
    }
    Ok(())
}

// ==============================================================================
// Logging
// ==============================================================================

/// Installs the global subscriber. `RUST_LOG` wins over `logging.level`.
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(logging: &Logging) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))?;
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            registry.try_init()?;
            Ok(None)
        }
    }
}
