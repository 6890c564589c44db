use crate::ledger::SessionLedger;
use crate::report::{
    BacktestReport, DrawdownReport, EquityPoint, PortfolioReport, ReportConsistency, TradeRecord,
    TradeStatistics,
};
use configuration::SessionConfig;
use core_types::Position;
use executor::Portfolio;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Largest accepted deviation, in currency units, of the accounting identities.
const TOLERANCE: Decimal = dec!(0.01);

/// A stateless calculator for deriving the results report of a session.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the full report. Never fails: a broken accounting identity is
    /// logged and flagged in `consistency` instead.
    pub fn build_report(
        &self,
        config: &SessionConfig,
        portfolio: &Portfolio,
        ledger: &SessionLedger,
    ) -> BacktestReport {
        let trades: Vec<TradeRecord> =
            portfolio.closed_positions().iter().filter_map(trade_record).collect();
        let portfolio_report = self.portfolio_report(portfolio);
        let statistics = self.trade_statistics(&trades);
        let equity_curve = ledger.equity_curve();
        let drawdown = self.drawdown(portfolio.initial_capital(), &equity_curve);
        let consistency = self.check_consistency(&portfolio_report, &statistics);

        if !consistency.is_consistent {
            for issue in &consistency.issues {
                tracing::error!(session_id = %config.session_id, %issue, "accounting inconsistency");
            }
        }

        BacktestReport {
            session_id: config.session_id.clone(),
            mode: config.mode,
            symbols: config.symbols.clone(),
            start_date: config.start_date,
            end_date: config.end_date,
            as_of: ledger.last_timestamp(),
            portfolio: portfolio_report,
            consistency,
            statistics,
            drawdown,
            trades,
            open_positions: portfolio.positions().cloned().collect(),
            equity_curve,
            daily_pnl: ledger.daily_pnl(),
            signals_generated: ledger.signals_generated(),
            trades_executed: ledger.trades_executed(),
            orders_rejected: ledger.orders_rejected(),
            signal_breakdown: ledger.signal_breakdown().clone(),
            config: config.clone(),
        }
    }

    fn portfolio_report(&self, portfolio: &Portfolio) -> PortfolioReport {
        let summary = portfolio.summary();
        PortfolioReport {
            initial_capital: summary.initial_capital,
            final_value: summary.portfolio_value,
            cash: summary.cash,
            invested_capital: summary.invested_capital,
            realized_pnl: summary.realized_pnl,
            unrealized_pnl: summary.unrealized_pnl,
            total_charges: summary.total_brokerage,
            total_pnl: summary.portfolio_value - summary.initial_capital,
            returns_pct: summary.returns_pct,
            open_positions: summary.open_positions,
            closed_positions: summary.closed_positions,
        }
    }

    /// Statistics over closed trades, using net P&L.
    pub fn trade_statistics(&self, trades: &[TradeRecord]) -> TradeStatistics {
        let mut stats = TradeStatistics { total_trades: trades.len(), ..TradeStatistics::default() };
        if trades.is_empty() {
            return stats;
        }

        for trade in trades {
            let pnl = trade.net_pnl;
            stats.net_profit += pnl;
            if pnl > Decimal::ZERO {
                stats.winning_trades += 1;
                stats.gross_profit += pnl;
                stats.largest_win = stats.largest_win.max(pnl);
            } else if pnl < Decimal::ZERO {
                stats.losing_trades += 1;
                stats.gross_loss += pnl.abs();
                stats.largest_loss = stats.largest_loss.max(pnl.abs());
            } else {
                stats.breakeven_trades += 1;
            }
        }

        let total = Decimal::from(stats.total_trades);
        stats.win_rate_pct = Some(Decimal::from(stats.winning_trades) / total * dec!(100));
        if stats.winning_trades > 0 {
            stats.average_win = stats.gross_profit / Decimal::from(stats.winning_trades);
        }
        if stats.losing_trades > 0 {
            stats.average_loss = stats.gross_loss / Decimal::from(stats.losing_trades);
            stats.profit_factor = Some((stats.average_win / stats.average_loss).abs());
        }

        let minutes: i64 = trades.iter().map(|t| t.holding_minutes).sum();
        stats.average_holding_minutes = Some(minutes / trades.len() as i64);
        stats
    }

    /// Largest peak-to-trough fall of the end-of-day value. The peak starts at
    /// the initial capital.
    pub fn drawdown(&self, initial_capital: Decimal, equity_curve: &[EquityPoint]) -> DrawdownReport {
        let mut peak = initial_capital;
        let mut report = DrawdownReport::default();
        for point in equity_curve {
            peak = peak.max(point.portfolio_value);
            let drawdown = peak - point.portfolio_value;
            if drawdown > report.max_drawdown {
                report.max_drawdown = drawdown;
                if peak > Decimal::ZERO {
                    report.max_drawdown_pct = drawdown / peak * dec!(100);
                }
            }
        }
        report
    }

    fn check_consistency(
        &self,
        portfolio: &PortfolioReport,
        statistics: &TradeStatistics,
    ) -> ReportConsistency {
        let mut issues = Vec::new();

        let expected_value = portfolio.initial_capital + portfolio.realized_pnl
            + portfolio.unrealized_pnl
            - portfolio.total_charges;
        if (portfolio.final_value - expected_value).abs() > TOLERANCE {
            issues.push(format!(
                "final value {} differs from initial + realized + unrealized - charges = {}",
                portfolio.final_value, expected_value
            ));
        }

        let expected_pnl = portfolio.final_value - portfolio.initial_capital;
        if (portfolio.total_pnl - expected_pnl).abs() > TOLERANCE {
            issues.push(format!(
                "total P&L {} differs from final value - initial capital = {}",
                portfolio.total_pnl, expected_pnl
            ));
        }

        let expected_value = portfolio.cash + portfolio.invested_capital + portfolio.unrealized_pnl;
        if (portfolio.final_value - expected_value).abs() > TOLERANCE {
            issues.push(format!(
                "final value {} differs from cash + invested + unrealized = {}",
                portfolio.final_value, expected_value
            ));
        }

        if portfolio.cash < Decimal::ZERO {
            issues.push(format!("cash is negative: {}", portfolio.cash));
        }

        let counted =
            statistics.winning_trades + statistics.losing_trades + statistics.breakeven_trades;
        if counted != statistics.total_trades {
            issues.push(format!(
                "trade counts do not add up: {} classified of {}",
                counted, statistics.total_trades
            ));
        }

        ReportConsistency { is_consistent: issues.is_empty(), issues }
    }
}

/// Pairs a closed position's entry and exit. Open positions yield `None`.
fn trade_record(position: &Position) -> Option<TradeRecord> {
    let exit = position.exit.as_ref()?;
    Some(TradeRecord {
        position_id: position.position_id,
        symbol: position.symbol.clone(),
        side: position.side,
        quantity: position.quantity,
        entry_price: position.entry_price,
        entry_time: position.entry_time,
        exit_price: exit.price,
        exit_time: exit.time,
        exit_reason: exit.reason,
        strategy: position.strategy.clone(),
        stop_loss: position.stop_loss,
        target: position.target,
        gross_pnl: exit.realized_pnl,
        brokerage: position.entry_brokerage + exit.brokerage,
        net_pnl: position.net_pnl(),
        holding_minutes: position.holding_minutes(exit.time),
    })
}
