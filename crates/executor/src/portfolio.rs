use crate::error::ExecutorError;
use chrono::{DateTime, Utc};
use configuration::Simulation;
use core_types::{ExitReason, OrderSide, Position, PositionEntry};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The cash and position ledger of one simulation session.
///
/// Only primary facts are stored (cash, positions, brokerage paid). Every
/// aggregate is recomputed from them on each call.
#[derive(Debug, Clone)]
pub struct Portfolio {
    initial_capital: Decimal,
    cash: Decimal,
    /// Open positions keyed by symbol; at most one per symbol. Ordered so every
    /// sweep over positions is deterministic.
    positions: BTreeMap<String, Position>,
    closed_positions: Vec<Position>,
    total_brokerage: Decimal,
    brokerage_per_trade: Decimal,
    slippage_pct: Decimal,
}

/// A read-only snapshot of every derived ledger value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub initial_capital: Decimal,
    pub cash: Decimal,
    pub invested_capital: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    /// `realized_pnl + unrealized_pnl`, before charges.
    pub total_pnl: Decimal,
    pub total_brokerage: Decimal,
    pub portfolio_value: Decimal,
    pub returns_pct: Decimal,
    pub open_positions: usize,
    pub closed_positions: usize,
}

impl Portfolio {
    pub fn new(initial_capital: Decimal, brokerage_per_trade: Decimal, slippage_pct: Decimal) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: BTreeMap::new(),
            closed_positions: Vec::new(),
            total_brokerage: Decimal::ZERO,
            brokerage_per_trade,
            slippage_pct,
        }
    }

    pub fn from_simulation(params: &Simulation) -> Self {
        Self::new(
            params.initial_capital,
            params.brokerage_per_trade,
            params.slippage_pct,
        )
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn brokerage_per_trade(&self) -> Decimal {
        self.brokerage_per_trade
    }

    pub fn total_brokerage(&self) -> Decimal {
        self.total_brokerage
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Open positions in symbol order.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    /// Closed positions in the order they were closed.
    pub fn closed_positions(&self) -> &[Position] {
        &self.closed_positions
    }

    /// Records a new open position and debits its cost basis from cash.
    pub fn open_position(&mut self, entry: PositionEntry) -> Result<&Position, ExecutorError> {
        if self.positions.contains_key(&entry.symbol) {
            return Err(ExecutorError::PositionExists(entry.symbol));
        }
        let position = Position::open(entry);
        self.cash -= position.cost_basis();
        let symbol = position.symbol.clone();
        Ok(self.positions.entry(symbol).or_insert(position))
    }

    /// Closes `quantity` units of the open position in `symbol` at `price`.
    ///
    /// Cash is credited with the cost basis plus realized P&L, which is the sale
    /// proceeds for a long and the released escrow for a short. Closing fewer
    /// units than held splits the position; the closed part is returned and the
    /// remainder stays open.
    pub fn close_position(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        time: DateTime<Utc>,
        reason: ExitReason,
        brokerage: Decimal,
    ) -> Result<Position, ExecutorError> {
        let held = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| ExecutorError::PositionNotFound(symbol.to_string()))?;
        if quantity <= Decimal::ZERO || quantity > held.quantity {
            return Err(ExecutorError::InvalidClosingQuantity {
                requested: quantity.to_string(),
                available: held.quantity.to_string(),
            });
        }

        let mut closing = if quantity < held.quantity {
            held.split_off(quantity)?
        } else {
            self.positions
                .remove(symbol)
                .ok_or_else(|| ExecutorError::PositionNotFound(symbol.to_string()))?
        };

        let realized = closing.close(price, time, reason, brokerage)?;
        self.cash += closing.cost_basis() + realized;
        self.closed_positions.push(closing.clone());
        Ok(closing)
    }

    /// Marks the open position in `symbol`, if any. Returns whether one was updated.
    pub fn update_price(&mut self, symbol: &str, price: Decimal) -> bool {
        match self.positions.get_mut(symbol) {
            Some(position) => {
                position.update_price(price);
                true
            }
            None => false,
        }
    }

    pub fn update_prices(&mut self, prices: &HashMap<String, Decimal>) {
        for (symbol, position) in self.positions.iter_mut() {
            if let Some(price) = prices.get(symbol) {
                position.update_price(*price);
            }
        }
    }

    pub fn apply_brokerage(&mut self, amount: Decimal) {
        self.cash -= amount;
        self.total_brokerage += amount;
    }

    /// Degrades a quote against the trader: up for buys, down for sells.
    pub fn apply_slippage(&self, price: Decimal, side: OrderSide) -> Decimal {
        if self.slippage_pct.is_zero() {
            return price;
        }
        let factor = self.slippage_pct / dec!(100);
        match side {
            OrderSide::Buy => price * (Decimal::ONE + factor),
            OrderSide::Sell => price * (Decimal::ONE - factor),
        }
    }

    pub fn invested_capital(&self) -> Decimal {
        self.positions.values().map(Position::cost_basis).sum()
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(Position::unrealized_pnl).sum()
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.closed_positions.iter().map(Position::realized_pnl).sum()
    }

    pub fn total_pnl(&self) -> Decimal {
        self.realized_pnl() + self.unrealized_pnl()
    }

    pub fn portfolio_value(&self) -> Decimal {
        self.cash + self.invested_capital() + self.unrealized_pnl()
    }

    pub fn returns_pct(&self) -> Decimal {
        if self.initial_capital.is_zero() {
            return Decimal::ZERO;
        }
        (self.portfolio_value() - self.initial_capital) / self.initial_capital * dec!(100)
    }

    pub fn summary(&self) -> PortfolioSummary {
        let invested_capital = self.invested_capital();
        let unrealized_pnl = self.unrealized_pnl();
        let realized_pnl = self.realized_pnl();
        PortfolioSummary {
            initial_capital: self.initial_capital,
            cash: self.cash,
            invested_capital,
            unrealized_pnl,
            realized_pnl,
            total_pnl: realized_pnl + unrealized_pnl,
            total_brokerage: self.total_brokerage,
            portfolio_value: self.cash + invested_capital + unrealized_pnl,
            returns_pct: self.returns_pct(),
            open_positions: self.positions.len(),
            closed_positions: self.closed_positions.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::PositionSide;

    fn entry(symbol: &str, side: PositionSide, quantity: Decimal, price: Decimal) -> PositionEntry {
        PositionEntry {
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            time: Utc::now(),
            stop_loss: None,
            target: None,
            strategy: None,
            brokerage: dec!(20),
        }
    }

    fn assert_identity(portfolio: &Portfolio) {
        let s = portfolio.summary();
        let expected = s.initial_capital + s.realized_pnl + s.unrealized_pnl - s.total_brokerage;
        assert!((s.portfolio_value - expected).abs() <= dec!(0.01), "{s:?}");
        assert_eq!(s.portfolio_value, s.cash + s.invested_capital + s.unrealized_pnl);
    }

    #[test]
    fn test_derived_values_follow_positions() {
        let mut portfolio = Portfolio::new(dec!(100000), dec!(20), Decimal::ZERO);
        portfolio.open_position(entry("TCS", PositionSide::Long, dec!(10), dec!(3000))).unwrap();
        portfolio.apply_brokerage(dec!(20));
        portfolio.update_price("TCS", dec!(3100));

        let s = portfolio.summary();
        assert_eq!(s.cash, dec!(69980));
        assert_eq!(s.invested_capital, dec!(30000));
        assert_eq!(s.unrealized_pnl, dec!(1000));
        assert_eq!(s.portfolio_value, dec!(100980));
        assert_eq!(s.returns_pct, dec!(0.98));
        assert_identity(&portfolio);
    }

    #[test]
    fn test_duplicate_open_is_rejected_without_side_effects() {
        let mut portfolio = Portfolio::new(dec!(100000), dec!(20), Decimal::ZERO);
        portfolio.open_position(entry("TCS", PositionSide::Long, dec!(1), dec!(100))).unwrap();
        let before = portfolio.summary();

        let again = portfolio.open_position(entry("TCS", PositionSide::Long, dec!(5), dec!(100)));
        assert!(matches!(again, Err(ExecutorError::PositionExists(_))));
        assert_eq!(portfolio.summary(), before);
    }

    #[test]
    fn test_partial_close_keeps_identity() {
        let mut portfolio = Portfolio::new(dec!(100000), dec!(20), Decimal::ZERO);
        portfolio.open_position(entry("SBIN", PositionSide::Long, dec!(10), dec!(500))).unwrap();
        portfolio.apply_brokerage(dec!(20));

        let closed = portfolio
            .close_position("SBIN", dec!(4), dec!(550), Utc::now(), ExitReason::SignalExit, dec!(20))
            .unwrap();
        portfolio.apply_brokerage(dec!(20));
        portfolio.update_price("SBIN", dec!(540));

        assert_eq!(closed.realized_pnl(), dec!(200));
        assert_eq!(portfolio.position("SBIN").map(|p| p.quantity), Some(dec!(6)));
        assert_eq!(portfolio.realized_pnl(), dec!(200));
        assert_eq!(portfolio.unrealized_pnl(), dec!(240));
        assert_identity(&portfolio);
    }

    #[test]
    fn test_short_round_trip_credits_escrow_and_pnl() {
        let mut portfolio = Portfolio::new(dec!(100000), Decimal::ZERO, Decimal::ZERO);
        portfolio.open_position(entry("INFY", PositionSide::Short, dec!(10), dec!(1500))).unwrap();
        assert_eq!(portfolio.cash(), dec!(85000));

        let closed = portfolio
            .close_position("INFY", dec!(10), dec!(1400), Utc::now(), ExitReason::Target, Decimal::ZERO)
            .unwrap();
        assert_eq!(closed.realized_pnl(), dec!(1000));
        assert_eq!(portfolio.cash(), dec!(101000));
        assert_eq!(portfolio.open_position_count(), 0);
        assert_identity(&portfolio);
    }

    #[test]
    fn test_overclose_is_rejected() {
        let mut portfolio = Portfolio::new(dec!(100000), dec!(20), Decimal::ZERO);
        portfolio.open_position(entry("SBIN", PositionSide::Long, dec!(10), dec!(500))).unwrap();
        let result =
            portfolio.close_position("SBIN", dec!(11), dec!(500), Utc::now(), ExitReason::AutoExit, dec!(20));
        assert!(matches!(result, Err(ExecutorError::InvalidClosingQuantity { .. })));
        assert_eq!(portfolio.position("SBIN").map(|p| p.quantity), Some(dec!(10)));
    }

    #[test]
    fn test_slippage_moves_price_against_trader() {
        let portfolio = Portfolio::new(dec!(100000), dec!(20), dec!(0.1));
        assert_eq!(portfolio.apply_slippage(dec!(2500), OrderSide::Buy), dec!(2502.5));
        assert_eq!(portfolio.apply_slippage(dec!(2600), OrderSide::Sell), dec!(2597.4));

        let frictionless = Portfolio::new(dec!(100000), dec!(20), Decimal::ZERO);
        assert_eq!(frictionless.apply_slippage(dec!(2500), OrderSide::Buy), dec!(2500));
    }
}
