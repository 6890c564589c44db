use chrono::{DateTime, NaiveDate, Utc};
use configuration::SessionConfig;
use core_types::{ExitReason, Position, PositionSide, StrategyId, TradingMode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The full results of one session.
///
/// Built once when the session finishes and cached by the caller, so repeated
/// reads return the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub session_id: String,
    pub mode: TradingMode,
    pub symbols: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Timestamp of the last processed bar.
    pub as_of: Option<DateTime<Utc>>,
    pub portfolio: PortfolioReport,
    pub consistency: ReportConsistency,
    pub statistics: TradeStatistics,
    pub drawdown: DrawdownReport,
    pub trades: Vec<TradeRecord>,
    pub open_positions: Vec<Position>,
    pub equity_curve: Vec<EquityPoint>,
    /// Change in total P&L per calendar day.
    pub daily_pnl: BTreeMap<NaiveDate, Decimal>,
    /// Aggregated decisions, whether or not they led to an order.
    pub signals_generated: usize,
    /// Executed orders, entries and exits alike.
    pub trades_executed: usize,
    pub orders_rejected: usize,
    /// Individual generator votes per strategy.
    pub signal_breakdown: BTreeMap<StrategyId, StrategyBreakdown>,
    pub config: SessionConfig,
}

/// Final ledger snapshot.
///
/// `final_value == initial_capital + realized_pnl + unrealized_pnl - total_charges`
/// and `total_pnl == final_value - initial_capital`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub initial_capital: Decimal,
    pub final_value: Decimal,
    pub cash: Decimal,
    pub invested_capital: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_charges: Decimal,
    pub total_pnl: Decimal,
    pub returns_pct: Decimal,
    pub open_positions: usize,
    pub closed_positions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConsistency {
    pub is_consistent: bool,
    pub issues: Vec<String>,
}

/// Statistics over closed positions, using P&L net of both brokerage legs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    pub win_rate_pct: Option<Decimal>,
    pub gross_profit: Decimal,
    /// Sum of losing trades, as a positive amount.
    pub gross_loss: Decimal,
    pub net_profit: Decimal,
    pub average_win: Decimal,
    /// Average losing trade, as a positive amount.
    pub average_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    /// `|average_win / average_loss|`; `None` without losing trades.
    pub profit_factor: Option<Decimal>,
    pub average_holding_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawdownReport {
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
}

/// A closed position with its entry and exit paired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub position_id: Uuid,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_price: Decimal,
    pub exit_time: DateTime<Utc>,
    pub exit_reason: ExitReason,
    pub strategy: Option<String>,
    pub stop_loss: Option<Decimal>,
    pub target: Option<Decimal>,
    pub gross_pnl: Decimal,
    /// Entry plus exit brokerage.
    pub brokerage: Decimal,
    pub net_pnl: Decimal,
    pub holding_minutes: i64,
}

/// End-of-day portfolio value. Days are calendar days at the exchange's UTC offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    /// The last bar recorded for this day.
    pub timestamp: DateTime<Utc>,
    pub portfolio_value: Decimal,
    pub total_pnl: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyBreakdown {
    pub buy: usize,
    pub sell: usize,
    pub total: usize,
}
