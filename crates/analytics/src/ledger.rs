use crate::error::AnalyticsError;
use crate::report::{EquityPoint, StrategyBreakdown};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use core_types::{AggregatedSignal, OrderSide, StrategyId, StrategySignal};
use executor::{OrderOutcome, PortfolioSummary};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Running bookkeeping for one session: the daily equity curve and the
/// signal and order counters the report needs.
#[derive(Debug, Clone)]
pub struct SessionLedger {
    offset: FixedOffset,
    equity: BTreeMap<NaiveDate, EquityPoint>,
    votes: BTreeMap<StrategyId, StrategyBreakdown>,
    signals_generated: usize,
    trades_executed: usize,
    orders_rejected: usize,
    last_timestamp: Option<DateTime<Utc>>,
}

impl SessionLedger {
    pub fn new(utc_offset_minutes: i32) -> Result<Self, AnalyticsError> {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(AnalyticsError::InvalidUtcOffset(utc_offset_minutes))?;
        Ok(Self {
            offset,
            equity: BTreeMap::new(),
            votes: BTreeMap::new(),
            signals_generated: 0,
            trades_executed: 0,
            orders_rejected: 0,
            last_timestamp: None,
        })
    }

    /// Calendar day of `at` at the exchange's offset.
    pub fn trading_day(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Records the portfolio at `at`. Later records on the same day replace
    /// earlier ones, so each day keeps its closing value.
    pub fn record_equity(&mut self, at: DateTime<Utc>, summary: &PortfolioSummary) {
        let date = self.trading_day(at);
        self.equity.insert(
            date,
            EquityPoint {
                date,
                timestamp: at,
                portfolio_value: summary.portfolio_value,
                total_pnl: summary.portfolio_value - summary.initial_capital,
            },
        );
        self.last_timestamp = Some(self.last_timestamp.map_or(at, |last| last.max(at)));
    }

    /// Tallies individual generator votes.
    pub fn record_votes(&mut self, votes: &[StrategySignal]) {
        for vote in votes {
            let entry = self.votes.entry(vote.strategy).or_default();
            match vote.side {
                OrderSide::Buy => entry.buy += 1,
                OrderSide::Sell => entry.sell += 1,
            }
            entry.total += 1;
        }
    }

    pub fn record_decision(&mut self, decision: &AggregatedSignal) {
        self.signals_generated += 1;
        tracing::debug!(
            symbol = %decision.symbol,
            side = %decision.side,
            confidence = %decision.confidence,
            "signal recorded"
        );
    }

    pub fn record_outcome(&mut self, outcome: &OrderOutcome) {
        if outcome.is_executed() {
            self.trades_executed += 1;
        } else {
            self.orders_rejected += 1;
        }
    }

    pub fn equity_curve(&self) -> Vec<EquityPoint> {
        self.equity.values().cloned().collect()
    }

    /// Day-over-day change of total P&L; the first day is measured from zero.
    pub fn daily_pnl(&self) -> BTreeMap<NaiveDate, Decimal> {
        let mut previous = Decimal::ZERO;
        self.equity
            .values()
            .map(|point| {
                let change = point.total_pnl - previous;
                previous = point.total_pnl;
                (point.date, change)
            })
            .collect()
    }

    pub fn signal_breakdown(&self) -> &BTreeMap<StrategyId, StrategyBreakdown> {
        &self.votes
    }

    pub fn signals_generated(&self) -> usize {
        self.signals_generated
    }

    pub fn trades_executed(&self) -> usize {
        self.trades_executed
    }

    pub fn orders_rejected(&self) -> usize {
        self.orders_rejected
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn summary(value: Decimal) -> PortfolioSummary {
        PortfolioSummary {
            initial_capital: dec!(100000),
            cash: value,
            invested_capital: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: value - dec!(100000),
            total_pnl: value - dec!(100000),
            total_brokerage: Decimal::ZERO,
            portfolio_value: value,
            returns_pct: Decimal::ZERO,
            open_positions: 0,
            closed_positions: 0,
        }
    }

    #[test]
    fn test_equity_keeps_last_value_of_each_local_day() {
        let mut ledger = SessionLedger::new(330).unwrap();
        // 19:00 UTC is already the next day at +05:30.
        ledger.record_equity(Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap(), &summary(dec!(100500)));
        ledger.record_equity(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(), &summary(dec!(100800)));
        ledger.record_equity(Utc.with_ymd_and_hms(2024, 1, 1, 19, 0, 0).unwrap(), &summary(dec!(100200)));

        let curve = ledger.equity_curve();
        assert_eq!(curve.len(), 2);
        assert_eq!(curve[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(curve[0].portfolio_value, dec!(100800));
        assert_eq!(curve[1].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());

        let daily: Vec<Decimal> = ledger.daily_pnl().into_values().collect();
        assert_eq!(daily, vec![dec!(800), dec!(-600)]);
    }

    #[test]
    fn test_votes_are_tallied_per_strategy() {
        let mut ledger = SessionLedger::new(0).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap();
        let vote = |strategy, side| StrategySignal {
            strategy,
            symbol: "NSE:SBIN-EQ".to_string(),
            side,
            price: dec!(600),
            timestamp: at,
            confidence: dec!(0.7),
            metadata: Default::default(),
        };
        ledger.record_votes(&[
            vote(StrategyId::Rsi, OrderSide::Buy),
            vote(StrategyId::Rsi, OrderSide::Sell),
            vote(StrategyId::Macd, OrderSide::Buy),
        ]);

        let breakdown = ledger.signal_breakdown();
        assert_eq!(breakdown[&StrategyId::Rsi], StrategyBreakdown { buy: 1, sell: 1, total: 2 });
        assert_eq!(breakdown[&StrategyId::Macd].total, 1);
        assert!(!breakdown.contains_key(&StrategyId::Renko));
        assert_eq!(ledger.signals_generated(), 0);
    }

    #[test]
    fn test_rejects_impossible_offset() {
        assert_eq!(
            SessionLedger::new(24 * 60).unwrap_err(),
            AnalyticsError::InvalidUtcOffset(1440)
        );
        assert_eq!(
            SessionLedger::new(i32::MAX).unwrap_err(),
            AnalyticsError::InvalidUtcOffset(i32::MAX)
        );
    }
}
