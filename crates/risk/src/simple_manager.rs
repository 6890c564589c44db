use crate::error::RiskError;
use crate::RiskManager;
use configuration::RiskManagement;
use core_types::{AggregatedSignal, ExitReason, OrderRequest, OrderSide};
use executor::Portfolio;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// A simple, concrete implementation of the `RiskManager` trait.
///
/// Entries commit a fixed percentage of available cash (never more than that
/// percentage of initial capital) and carry stop-loss and target levels at fixed
/// percentage distances from the signal price.
#[derive(Debug, Clone)]
pub struct SimpleRiskManager {
    params: RiskManagement,
}

impl SimpleRiskManager {
    /// Creates a new `SimpleRiskManager` with the given configuration parameters.
    pub fn new(params: RiskManagement) -> Result<Self, RiskError> {
        if params.position_size_pct <= dec!(0) || params.position_size_pct > dec!(100) {
            return Err(RiskError::InvalidParameters(
                "position_size_pct must be within (0, 100]".to_string(),
            ));
        }
        if params.stop_loss_pct <= dec!(0) || params.stop_loss_pct >= dec!(100) {
            return Err(RiskError::InvalidParameters(
                "stop_loss_pct must be within (0, 100)".to_string(),
            ));
        }
        if params.target_pct <= dec!(0) || params.target_pct >= dec!(100) {
            return Err(RiskError::InvalidParameters(
                "target_pct must be within (0, 100)".to_string(),
            ));
        }
        Ok(Self { params })
    }

    fn protective_levels(&self, side: OrderSide, price: Decimal) -> (Decimal, Decimal) {
        let stop = self.params.stop_loss_pct / dec!(100);
        let target = self.params.target_pct / dec!(100);
        let (stop_loss, target) = match side {
            OrderSide::Buy => (price * (Decimal::ONE - stop), price * (Decimal::ONE + target)),
            OrderSide::Sell => (price * (Decimal::ONE + stop), price * (Decimal::ONE - target)),
        };
        (stop_loss.round_dp(2), target.round_dp(2))
    }
}

impl RiskManager for SimpleRiskManager {
    fn evaluate_signal(
        &self,
        signal: &AggregatedSignal,
        portfolio: &Portfolio,
    ) -> Result<Option<OrderRequest>, RiskError> {
        if signal.price <= Decimal::ZERO {
            return Err(RiskError::InvalidEntryPrice(signal.price));
        }

        // --- 1. Existing position: exit on an opposing signal, otherwise hold ---
        if let Some(position) = portfolio.position(&signal.symbol) {
            if position.side.exit_side() != signal.side {
                tracing::debug!(symbol = %signal.symbol, "signal agrees with open position; holding");
                return Ok(None);
            }
            return Ok(Some(
                OrderRequest::market(&signal.symbol, signal.side, position.quantity, signal.price)
                    .with_strategy(signal.strategy_label())
                    .with_exit_reason(ExitReason::SignalExit),
            ));
        }

        if signal.side == OrderSide::Sell && !self.params.allow_short {
            tracing::debug!(symbol = %signal.symbol, "no position to exit and shorting disabled");
            return Ok(None);
        }

        // --- 2. Size the entry on the slippage-adjusted fill price ---
        let budget = portfolio.cash().min(portfolio.initial_capital()) * self.params.position_size_pct
            / dec!(100);
        let fill_price = portfolio.apply_slippage(signal.price, signal.side);
        let quantity = (budget / fill_price).floor();
        if quantity <= Decimal::ZERO {
            tracing::debug!(
                symbol = %signal.symbol,
                %budget,
                price = %signal.price,
                "position size rounds to zero; skipping"
            );
            return Ok(None);
        }

        // --- 3. Attach protective levels ---
        let (stop_loss, target) = self.protective_levels(signal.side, signal.price);
        Ok(Some(
            OrderRequest::market(&signal.symbol, signal.side, quantity, signal.price)
                .with_protection(Some(stop_loss), Some(target))
                .with_strategy(signal.strategy_label()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{PositionEntry, PositionSide, StrategyId};

    fn manager(allow_short: bool) -> SimpleRiskManager {
        SimpleRiskManager::new(RiskManagement {
            stop_loss_pct: dec!(2),
            target_pct: dec!(4),
            position_size_pct: dec!(20),
            allow_short,
        })
        .unwrap()
    }

    fn signal(side: OrderSide, price: Decimal) -> AggregatedSignal {
        AggregatedSignal {
            symbol: "NSE:SBIN-EQ".to_string(),
            side,
            price,
            timestamp: Utc::now(),
            confidence: dec!(0.5),
            buy_votes: 2,
            sell_votes: 0,
            buy_strategies: vec![StrategyId::Rsi, StrategyId::Macd],
            sell_strategies: vec![],
        }
    }

    #[test]
    fn test_sizes_entry_with_protective_levels() {
        let portfolio = Portfolio::new(dec!(100000), dec!(20), dec!(0.1));
        let request = manager(false)
            .evaluate_signal(&signal(OrderSide::Buy, dec!(600)), &portfolio)
            .unwrap()
            .unwrap();

        // 20000 / (600 * 1.001) = 33.3
        assert_eq!(request.quantity, dec!(33));
        assert_eq!(request.stop_loss, Some(dec!(588)));
        assert_eq!(request.target, Some(dec!(624)));
        assert_eq!(request.strategy.as_deref(), Some("RSI, MACD"));
        assert!(request.exit_reason.is_none());
    }

    #[test]
    fn test_exact_multiple_still_fits_size_cap_after_slippage() {
        let portfolio = Portfolio::new(dec!(100000), dec!(20), dec!(0.1));
        let request = manager(false)
            .evaluate_signal(&signal(OrderSide::Buy, dec!(2500)), &portfolio)
            .unwrap()
            .unwrap();
        assert_eq!(request.quantity, dec!(7));
        assert!(dec!(2502.5) * request.quantity <= dec!(20000));
    }

    #[test]
    fn test_opposing_signal_exits_whole_position() {
        let mut portfolio = Portfolio::new(dec!(100000), dec!(20), Decimal::ZERO);
        portfolio
            .open_position(PositionEntry {
                symbol: "NSE:SBIN-EQ".to_string(),
                side: PositionSide::Long,
                quantity: dec!(12),
                price: dec!(580),
                time: Utc::now(),
                stop_loss: None,
                target: None,
                strategy: None,
                brokerage: dec!(20),
            })
            .unwrap();

        let exit = manager(false)
            .evaluate_signal(&signal(OrderSide::Sell, dec!(610)), &portfolio)
            .unwrap()
            .unwrap();
        assert_eq!(exit.side, OrderSide::Sell);
        assert_eq!(exit.quantity, dec!(12));
        assert_eq!(exit.exit_reason, Some(ExitReason::SignalExit));

        let same_side = manager(false)
            .evaluate_signal(&signal(OrderSide::Buy, dec!(610)), &portfolio)
            .unwrap();
        assert!(same_side.is_none());
    }

    #[test]
    fn test_sell_without_position_depends_on_shorting() {
        let portfolio = Portfolio::new(dec!(100000), dec!(20), Decimal::ZERO);
        let sell = signal(OrderSide::Sell, dec!(500));

        assert!(manager(false).evaluate_signal(&sell, &portfolio).unwrap().is_none());

        let short = manager(true).evaluate_signal(&sell, &portfolio).unwrap().unwrap();
        assert_eq!(short.quantity, dec!(40));
        assert_eq!(short.stop_loss, Some(dec!(510)));
        assert_eq!(short.target, Some(dec!(480)));
    }

    #[test]
    fn test_rejects_invalid_parameters_and_prices() {
        assert!(SimpleRiskManager::new(RiskManagement {
            stop_loss_pct: Decimal::ZERO,
            target_pct: dec!(4),
            position_size_pct: dec!(20),
            allow_short: false,
        })
        .is_err());

        let portfolio = Portfolio::new(dec!(100000), dec!(20), Decimal::ZERO);
        let result = manager(false).evaluate_signal(&signal(OrderSide::Buy, Decimal::ZERO), &portfolio);
        assert!(matches!(result, Err(RiskError::InvalidEntryPrice(_))));
    }
}
