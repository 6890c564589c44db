use crate::error::BacktestError;
use analytics::{AnalyticsEngine, BacktestReport, SessionLedger};
use chrono::{DateTime, Utc};
use configuration::{Config, SessionConfig};
use core_types::{Candle, ExitReason};
use executor::{OrderOutcome, PaperExchange};
use risk::{RiskManager, SimpleRiskManager};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use strategies::{create_strategies, SignalAggregator, Strategy};

/// A point-in-time view of a running session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionProgress {
    pub processed: usize,
    /// Known for historical runs only.
    pub total: Option<usize>,
    pub percent: Option<Decimal>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub cash: Decimal,
    pub portfolio_value: Decimal,
    pub total_pnl: Decimal,
    pub open_positions: usize,
    pub trades_executed: usize,
    pub signals_generated: usize,
}

/// Owns one session's trading state and advances it one timestamp at a time.
///
/// Each step sweeps stop-losses and targets, marks positions, runs the
/// generators on every symbol with enough history, and routes the aggregated
/// decision through the risk manager to the paper exchange.
pub struct AutoTrader {
    config: SessionConfig,
    exchange: PaperExchange,
    risk_manager: Box<dyn RiskManager>,
    strategies: Vec<Box<dyn Strategy>>,
    aggregator: SignalAggregator,
    ledger: SessionLedger,
    history: HashMap<String, Vec<Candle>>,
    min_history_bars: usize,
    max_window_bars: usize,
}

impl AutoTrader {
    /// Builds the generators, risk manager and exchange described by `config`.
    pub fn new(config: SessionConfig, base: &Config) -> Result<Self, BacktestError> {
        let strategies = create_strategies(&config.strategy_ids()?, &base.strategies)?;
        Self::with_strategies(config, base, strategies)
    }

    pub fn with_strategies(
        config: SessionConfig,
        base: &Config,
        strategies: Vec<Box<dyn Strategy>>,
    ) -> Result<Self, BacktestError> {
        let risk_manager = SimpleRiskManager::new(config.risk_management(&base.simulation))?;
        Ok(Self {
            exchange: PaperExchange::new(config.simulation(&base.simulation)),
            risk_manager: Box::new(risk_manager),
            strategies,
            aggregator: SignalAggregator::default(),
            ledger: SessionLedger::new(base.live.utc_offset_minutes)?,
            history: HashMap::new(),
            min_history_bars: base.backtest.min_history_bars,
            max_window_bars: base.backtest.max_window_bars.max(base.backtest.min_history_bars),
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn exchange(&self) -> &PaperExchange {
        &self.exchange
    }

    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.ledger.last_timestamp()
    }

    /// Timestamp of the newest bar held for `symbol`.
    pub fn last_bar_time(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.history.get(symbol)?.last().map(|bar| bar.timestamp)
    }

    /// Adds bars to the history without trading on them.
    pub fn warm_up(&mut self, symbol: &str, bars: &[Candle]) {
        for bar in bars {
            self.remember(symbol, bar);
        }
    }

    /// Appends `bar` unless it is not newer than the last one held. History is
    /// trimmed so it never grows past twice the strategy window.
    fn remember(&mut self, symbol: &str, bar: &Candle) {
        let history = self.history.entry(symbol.to_string()).or_default();
        if history.last().is_some_and(|last| last.timestamp >= bar.timestamp) {
            return;
        }
        history.push(bar.clone());
        if history.len() > 2 * self.max_window_bars {
            let excess = history.len() - self.max_window_bars;
            history.drain(..excess);
        }
    }

    /// Processes every symbol's bar at timestamp `at`.
    ///
    /// Only symbols present in `bars` are evaluated; a symbol without a bar at
    /// `at` keeps its window unchanged and casts no vote.
    pub fn step(&mut self, at: DateTime<Utc>, bars: &BTreeMap<String, Candle>) -> Result<(), BacktestError> {
        for (symbol, bar) in bars {
            self.remember(symbol, bar);
        }
        let prices: HashMap<String, Decimal> =
            bars.iter().map(|(symbol, bar)| (symbol.clone(), bar.close)).collect();

        // --- 1. Protective exits ---
        for outcome in self.exchange.check_stop_loss_targets(&prices, at)? {
            self.record(&outcome);
        }

        // --- 2. Mark to market ---
        self.exchange.update_prices(&prices);

        // --- 3. Signals and execution ---
        for (symbol, bar) in bars {
            self.evaluate_symbol(symbol, bar, at)?;
        }

        // --- 4. Daily P&L ---
        self.ledger.record_equity(at, &self.exchange.portfolio().summary());
        Ok(())
    }

    fn evaluate_symbol(&mut self, symbol: &str, bar: &Candle, at: DateTime<Utc>) -> Result<(), BacktestError> {
        let Some(history) = self.history.get(symbol) else {
            return Ok(());
        };
        if history.len() < self.min_history_bars {
            return Ok(());
        }
        let window = &history[history.len().saturating_sub(self.max_window_bars)..];

        let mut votes = Vec::new();
        for strategy in &self.strategies {
            match strategy.evaluate(symbol, window) {
                Ok(Some(vote)) => votes.push(vote),
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    session_id = %self.config.session_id,
                    symbol,
                    strategy = %strategy.id(),
                    error = %e,
                    "strategy evaluation failed; no vote"
                ),
            }
        }
        self.ledger.record_votes(&votes);

        let Some(decision) = self.aggregator.aggregate(symbol, bar, &votes) else {
            return Ok(());
        };
        self.ledger.record_decision(&decision);
        tracing::info!(
            session_id = %self.config.session_id,
            symbol,
            side = %decision.side,
            confidence = %decision.confidence,
            strategies = %decision.strategy_label(),
            "signal generated"
        );

        let request = match self.risk_manager.evaluate_signal(&decision, self.exchange.portfolio()) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::warn!(session_id = %self.config.session_id, symbol, error = %e, "signal not sized");
                return Ok(());
            }
        };
        let outcome = self.exchange.place_order(&request, at)?;
        self.record(&outcome);
        Ok(())
    }

    fn record(&mut self, outcome: &OrderOutcome) {
        self.ledger.record_outcome(outcome);
        if let OrderOutcome::Executed { order, .. } = outcome {
            tracing::info!(
                session_id = %self.config.session_id,
                symbol = %order.symbol,
                side = %order.side,
                quantity = ?order.executed_quantity,
                price = ?order.executed_price,
                "order executed"
            );
        }
    }

    /// Closes every open position at its last mark with reason AUTO_EXIT.
    pub fn liquidate(&mut self, at: DateTime<Utc>) -> Result<usize, BacktestError> {
        let outcomes = self.exchange.close_all(at, ExitReason::AutoExit)?;
        for outcome in &outcomes {
            self.record(outcome);
        }
        self.ledger.record_equity(at, &self.exchange.portfolio().summary());
        Ok(outcomes.len())
    }

    pub fn progress(&self, processed: usize, total: Option<usize>) -> SessionProgress {
        let summary = self.exchange.portfolio().summary();
        SessionProgress {
            processed,
            total,
            percent: total
                .filter(|total| *total > 0)
                .map(|total| (Decimal::from(processed) * dec!(100) / Decimal::from(total)).round_dp(2)),
            last_timestamp: self.ledger.last_timestamp(),
            cash: summary.cash,
            portfolio_value: summary.portfolio_value,
            total_pnl: summary.portfolio_value - summary.initial_capital,
            open_positions: summary.open_positions,
            trades_executed: self.ledger.trades_executed(),
            signals_generated: self.ledger.signals_generated(),
        }
    }

    pub fn report(&self) -> BacktestReport {
        AnalyticsEngine::new().build_report(&self.config, self.exchange.portfolio(), &self.ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use core_types::{OrderSide, SignalMetadata, StrategyId, StrategySignal};
    use strategies::StrategyError;

    struct AlwaysBuy;

    impl Strategy for AlwaysBuy {
        fn id(&self) -> StrategyId {
            StrategyId::Rsi
        }
        fn min_bars(&self) -> usize {
            1
        }
        fn evaluate(&self, symbol: &str, bars: &[Candle]) -> Result<Option<StrategySignal>, StrategyError> {
            let bar = bars.last().unwrap();
            Ok(Some(StrategySignal {
                strategy: self.id(),
                symbol: symbol.to_string(),
                side: OrderSide::Buy,
                price: bar.close,
                timestamp: bar.timestamp,
                confidence: dec!(0.9),
                metadata: SignalMetadata::new(),
            }))
        }
    }

    struct Broken;

    impl Strategy for Broken {
        fn id(&self) -> StrategyId {
            StrategyId::Macd
        }
        fn min_bars(&self) -> usize {
            1
        }
        fn evaluate(&self, _: &str, _: &[Candle]) -> Result<Option<StrategySignal>, StrategyError> {
            Err(StrategyError::IndicatorError("bad bar".to_string()))
        }
    }

    const SYMBOL: &str = "NSE:SBIN-EQ";

    fn trader() -> AutoTrader {
        let config = SessionConfig {
            symbols: vec![SYMBOL.to_string()],
            ..SessionConfig::default()
        };
        AutoTrader::with_strategies(config, &Config::default(), vec![Box::new(AlwaysBuy), Box::new(Broken)])
            .unwrap()
    }

    fn at(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 45, 0).unwrap() + Duration::minutes(5 * i)
    }

    fn step(trader: &mut AutoTrader, i: i64, close: Decimal) {
        let bar = Candle {
            timestamp: at(i),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1000),
        };
        trader.step(at(i), &BTreeMap::from([(SYMBOL.to_string(), bar)])).unwrap();
    }

    #[test]
    fn test_waits_for_history_then_trades_despite_failing_generator() {
        let mut trader = trader();
        for i in 0..29 {
            step(&mut trader, i, dec!(100));
        }
        assert_eq!(trader.exchange().portfolio().open_position_count(), 0);
        assert_eq!(trader.ledger().signals_generated(), 0);

        step(&mut trader, 29, dec!(100));
        let position = trader.exchange().portfolio().position(SYMBOL).unwrap();
        // 20% of 100000 at 100.1 after slippage.
        assert_eq!(position.quantity, dec!(199));
        assert_eq!(position.stop_loss, Some(dec!(98)));
        assert_eq!(trader.ledger().signals_generated(), 1);
        assert_eq!(trader.ledger().trades_executed(), 1);
    }

    #[test]
    fn test_stop_loss_sweep_runs_before_new_signals() {
        let mut trader = trader();
        for i in 0..30 {
            step(&mut trader, i, dec!(100));
        }
        step(&mut trader, 30, dec!(97));

        let closed = trader.exchange().portfolio().closed_positions();
        assert_eq!(closed.len(), 1);
        let exit = closed[0].exit.as_ref().unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
        // Quoted at the stop level, less 0.1% slippage.
        assert_eq!(exit.price, dec!(97.902));
        // The same bar's BUY vote re-enters at the new price.
        assert!(trader.exchange().portfolio().position(SYMBOL).is_some());
    }

    #[test]
    fn test_liquidation_closes_at_last_mark() {
        let mut trader = trader();
        for i in 0..30 {
            step(&mut trader, i, dec!(100));
        }
        step(&mut trader, 30, dec!(101));

        assert_eq!(trader.liquidate(at(30)).unwrap(), 1);
        let portfolio = trader.exchange().portfolio();
        assert_eq!(portfolio.open_position_count(), 0);
        assert_eq!(portfolio.closed_positions()[0].exit.as_ref().unwrap().reason, ExitReason::AutoExit);

        let report = trader.report();
        assert!(report.consistency.is_consistent, "{:?}", report.consistency.issues);
        assert_eq!(report.statistics.total_trades, 1);
        assert_eq!(report.trades_executed, 2);
    }

    #[test]
    fn test_progress_reports_percentage() {
        let mut trader = trader();
        step(&mut trader, 0, dec!(100));
        let progress = trader.progress(25, Some(100));
        assert_eq!(progress.percent, Some(dec!(25)));
        assert_eq!(progress.portfolio_value, dec!(100000));
        assert_eq!(trader.progress(3, None).percent, None);
    }

    #[test]
    fn test_stale_bars_are_not_added_twice() {
        let mut trader = trader();
        step(&mut trader, 5, dec!(100));
        step(&mut trader, 5, dec!(100));
        step(&mut trader, 4, dec!(100));
        assert_eq!(trader.history[SYMBOL].len(), 1);
        assert_eq!(trader.last_bar_time(SYMBOL), Some(at(5)));
    }

    struct Recorder(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

    impl Strategy for Recorder {
        fn id(&self) -> StrategyId {
            StrategyId::Adx
        }
        fn min_bars(&self) -> usize {
            1
        }
        fn evaluate(&self, symbol: &str, _: &[Candle]) -> Result<Option<StrategySignal>, StrategyError> {
            self.0.lock().unwrap().push(symbol.to_string());
            Ok(None)
        }
    }

    #[test]
    fn test_only_symbols_with_a_bar_at_the_step_are_evaluated() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let config = SessionConfig {
            symbols: vec!["A".to_string(), "B".to_string()],
            ..SessionConfig::default()
        };
        let mut trader = AutoTrader::with_strategies(
            config,
            &Config::default(),
            vec![Box::new(Recorder(seen.clone()))],
        )
        .unwrap();
        let bar = |i: i64| Candle {
            timestamp: at(i),
            open: dec!(100),
            high: dec!(100),
            low: dec!(100),
            close: dec!(100),
            volume: dec!(1000),
        };

        for i in 0..35 {
            let bars = BTreeMap::from([("A".to_string(), bar(i)), ("B".to_string(), bar(i))]);
            trader.step(at(i), &bars).unwrap();
        }
        seen.lock().unwrap().clear();

        trader.step(at(35), &BTreeMap::from([("A".to_string(), bar(35))])).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["A".to_string()]);
        assert_eq!(trader.last_bar_time("B"), Some(at(34)));
    }
}
