use crate::error::ExecutorError;
use crate::portfolio::{Portfolio, PortfolioSummary};
use chrono::{DateTime, Utc};
use configuration::Simulation;
use core_types::{
    ExitReason, Order, OrderRequest, OrderSide, Position, PositionEntry, PositionSide,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

/// The result of a single `place_order` call.
///
/// Rejection is an ordinary outcome carrying a reason, not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderOutcome {
    Executed {
        order: Order,
        /// The position opened, or the closed record when the order was an exit.
        position: Position,
        portfolio: PortfolioSummary,
    },
    Rejected {
        order: Order,
        reason: String,
        portfolio: PortfolioSummary,
    },
}

impl OrderOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, OrderOutcome::Executed { .. })
    }

    pub fn order(&self) -> &Order {
        match self {
            OrderOutcome::Executed { order, .. } | OrderOutcome::Rejected { order, .. } => order,
        }
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            OrderOutcome::Rejected { reason, .. } => Some(reason),
            OrderOutcome::Executed { .. } => None,
        }
    }
}

/// What a validated order will do to the ledger.
enum Fill {
    Open { side: PositionSide, price: Decimal },
    Close { price: Decimal },
}

/// The paper exchange: validates orders against the risk limits, applies
/// slippage and brokerage, and mutates the `Portfolio` it owns.
///
/// Every check runs before the first ledger mutation, so an order either
/// applies in full or leaves the ledger untouched.
#[derive(Debug, Clone)]
pub struct PaperExchange {
    params: Simulation,
    portfolio: Portfolio,
}

impl PaperExchange {
    pub fn new(params: Simulation) -> Self {
        Self {
            portfolio: Portfolio::from_simulation(&params),
            params,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn params(&self) -> &Simulation {
        &self.params
    }

    pub fn place_order(
        &mut self,
        request: &OrderRequest,
        at: DateTime<Utc>,
    ) -> Result<OrderOutcome, ExecutorError> {
        let mut order = Order::new(request, at);

        let fill = match self.validate(request) {
            Ok(fill) => fill,
            Err(reason) => {
                order.reject(reason.clone())?;
                tracing::info!(
                    symbol = %request.symbol,
                    side = %request.side,
                    quantity = %request.quantity,
                    %reason,
                    "order rejected"
                );
                return Ok(OrderOutcome::Rejected {
                    order,
                    reason,
                    portfolio: self.portfolio.summary(),
                });
            }
        };

        let brokerage = self.portfolio.brokerage_per_trade();
        let position = match fill {
            Fill::Open { side, price } => {
                let entry = PositionEntry {
                    symbol: request.symbol.clone(),
                    side,
                    quantity: request.quantity,
                    price,
                    time: at,
                    stop_loss: request.stop_loss,
                    target: request.target,
                    strategy: request.strategy.clone(),
                    brokerage,
                };
                let position = self.portfolio.open_position(entry)?.clone();
                self.portfolio.apply_brokerage(brokerage);
                order.execute(price, request.quantity, at)?;
                position
            }
            Fill::Close { price } => {
                let reason = request.exit_reason.unwrap_or(ExitReason::AutoExit);
                let closed = self.portfolio.close_position(
                    &request.symbol,
                    request.quantity,
                    price,
                    at,
                    reason,
                    brokerage,
                )?;
                self.portfolio.apply_brokerage(brokerage);
                order.execute(price, request.quantity, at)?;
                closed
            }
        };

        tracing::info!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = %request.quantity,
            price = %position.current_price,
            cash = %self.portfolio.cash(),
            "order executed"
        );
        Ok(OrderOutcome::Executed {
            order,
            position,
            portfolio: self.portfolio.summary(),
        })
    }

    /// Runs every limit check without touching the ledger.
    fn validate(&self, request: &OrderRequest) -> Result<Fill, String> {
        if request.quantity <= Decimal::ZERO {
            return Err("Quantity must be positive".to_string());
        }
        if request.price <= Decimal::ZERO {
            return Err("Price must be positive".to_string());
        }

        let existing = self.portfolio.position(&request.symbol);
        match (request.side, existing) {
            (side, Some(position)) if position.side.exit_side() == side => {
                if request.quantity > position.quantity {
                    return Err(format!(
                        "Cannot {} {} units, only {} held",
                        side, request.quantity, position.quantity
                    ));
                }
                Ok(Fill::Close {
                    price: self.portfolio.apply_slippage(request.price, side),
                })
            }
            (_, Some(_)) => Err("Position already exists for this symbol".to_string()),
            (OrderSide::Sell, None) if !self.params.allow_short => {
                Err("No open position to sell".to_string())
            }
            (side, None) => self.validate_entry(request, side),
        }
    }

    fn validate_entry(&self, request: &OrderRequest, side: OrderSide) -> Result<Fill, String> {
        if self.portfolio.open_position_count() >= self.params.max_positions {
            return Err(format!(
                "Maximum positions limit ({}) reached",
                self.params.max_positions
            ));
        }

        let price = self.portfolio.apply_slippage(request.price, side);
        let required = price * request.quantity;
        let max_allowed = self.portfolio.initial_capital() * self.params.max_position_size;
        if required > max_allowed {
            return Err(format!(
                "Position size {} exceeds maximum allowed {}",
                required.round_dp(2),
                max_allowed.round_dp(2)
            ));
        }

        let brokerage = self.portfolio.brokerage_per_trade();
        if self.portfolio.cash() < required + brokerage {
            return Err(format!(
                "Insufficient funds. Required: {}, Available: {}",
                (required + brokerage).round_dp(2),
                self.portfolio.cash().round_dp(2)
            ));
        }

        Ok(Fill::Open {
            side: PositionSide::from(side),
            price,
        })
    }

    /// Marks every open position that has a price in `prices`.
    pub fn update_prices(&mut self, prices: &HashMap<String, Decimal>) {
        self.portfolio.update_prices(prices);
    }

    /// Closes positions whose stop-loss or target has been crossed by `prices`.
    ///
    /// Positions are visited in symbol order. For each one the stop-loss is
    /// tested before the target, so a bar that crosses both exits at the stop.
    /// The exit order is quoted at the stop or target level itself.
    pub fn check_stop_loss_targets(
        &mut self,
        prices: &HashMap<String, Decimal>,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderOutcome>, ExecutorError> {
        let triggered: Vec<OrderRequest> = self
            .portfolio
            .positions()
            .filter_map(|position| {
                let price = *prices.get(&position.symbol)?;
                let (level, reason) = if position.stop_loss_hit(price) {
                    (position.stop_loss?, ExitReason::StopLoss)
                } else if position.target_hit(price) {
                    (position.target?, ExitReason::Target)
                } else {
                    return None;
                };
                Some(
                    OrderRequest::market(
                        position.symbol.clone(),
                        position.side.exit_side(),
                        position.quantity,
                        level,
                    )
                    .with_exit_reason(reason),
                )
            })
            .collect();

        let mut outcomes = Vec::with_capacity(triggered.len());
        for request in triggered {
            tracing::info!(
                symbol = %request.symbol,
                level = %request.price,
                reason = ?request.exit_reason,
                "protective exit triggered"
            );
            outcomes.push(self.place_order(&request, at)?);
        }
        Ok(outcomes)
    }

    /// Closes every open position at its last mark.
    pub fn close_all(
        &mut self,
        at: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<Vec<OrderOutcome>, ExecutorError> {
        let exits: Vec<OrderRequest> = self
            .portfolio
            .positions()
            .map(|position| {
                OrderRequest::market(
                    position.symbol.clone(),
                    position.side.exit_side(),
                    position.quantity,
                    position.current_price,
                )
                .with_exit_reason(reason)
            })
            .collect();

        exits
            .iter()
            .map(|request| self.place_order(request, at))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::OrderStatus;
    use rust_decimal_macros::dec;

    fn params() -> Simulation {
        Simulation {
            initial_capital: dec!(100000),
            brokerage_per_trade: dec!(20),
            slippage_pct: dec!(0.1),
            max_positions: 10,
            max_position_size: dec!(0.3),
            allow_short: false,
        }
    }

    fn buy(symbol: &str, quantity: Decimal, price: Decimal) -> OrderRequest {
        OrderRequest::market(symbol, OrderSide::Buy, quantity, price)
    }

    fn sell(symbol: &str, quantity: Decimal, price: Decimal) -> OrderRequest {
        OrderRequest::market(symbol, OrderSide::Sell, quantity, price)
    }

    fn assert_identity(exchange: &PaperExchange) {
        let s = exchange.portfolio().summary();
        let expected = s.initial_capital + s.realized_pnl + s.unrealized_pnl - s.total_brokerage;
        assert!((s.portfolio_value - expected).abs() <= dec!(0.01));
        assert!((s.portfolio_value - (s.cash + s.invested_capital + s.unrealized_pnl)).abs() <= dec!(0.01));
    }

    #[test]
    fn test_round_trip_with_brokerage_and_slippage() {
        let mut exchange = PaperExchange::new(params());
        let t0 = Utc::now();

        let opened = exchange.place_order(&buy("RELIANCE", dec!(10), dec!(2500)), t0).unwrap();
        assert!(opened.is_executed());
        assert_identity(&exchange);

        let closed = exchange.place_order(&sell("RELIANCE", dec!(10), dec!(2600)), t0).unwrap();
        let OrderOutcome::Executed { position, portfolio, .. } = closed else {
            panic!("sell should execute");
        };

        let entry = dec!(2500) * (Decimal::ONE + dec!(0.001));
        let exit = dec!(2600) * (Decimal::ONE - dec!(0.001));
        let expected_net = (exit - entry) * dec!(10) - dec!(2) * dec!(20);

        assert_eq!(position.realized_pnl(), (exit - entry) * dec!(10));
        assert_eq!(position.net_pnl(), expected_net);
        assert_eq!(portfolio.cash, dec!(100000) + expected_net);
        assert_eq!(portfolio.portfolio_value, dec!(100000) + expected_net);
        assert_eq!(portfolio.total_brokerage, dec!(40));
        assert_identity(&exchange);
    }

    #[test]
    fn test_third_position_rejected_at_max_positions() {
        let mut exchange = PaperExchange::new(Simulation { max_positions: 2, ..params() });
        let now = Utc::now();
        exchange.place_order(&buy("A", dec!(1), dec!(100)), now).unwrap();
        exchange.place_order(&buy("B", dec!(1), dec!(100)), now).unwrap();
        let before = exchange.portfolio().summary();

        let third = exchange.place_order(&buy("C", dec!(1), dec!(100)), now).unwrap();
        assert_eq!(third.rejection_reason(), Some("Maximum positions limit (2) reached"));
        assert_eq!(third.order().status, OrderStatus::Rejected);
        assert_eq!(exchange.portfolio().summary(), before);
    }

    #[test]
    fn test_second_buy_for_same_symbol_is_rejected() {
        let mut exchange = PaperExchange::new(params());
        let now = Utc::now();
        exchange.place_order(&buy("TCS", dec!(2), dec!(3000)), now).unwrap();

        let again = exchange.place_order(&buy("TCS", dec!(1), dec!(3000)), now).unwrap();
        assert_eq!(again.rejection_reason(), Some("Position already exists for this symbol"));
        assert_eq!(exchange.portfolio().position("TCS").map(|p| p.quantity), Some(dec!(2)));
    }

    #[test]
    fn test_sell_without_position_or_beyond_holding_is_rejected() {
        let mut exchange = PaperExchange::new(params());
        let now = Utc::now();

        let naked = exchange.place_order(&sell("TCS", dec!(1), dec!(3000)), now).unwrap();
        assert_eq!(naked.rejection_reason(), Some("No open position to sell"));

        exchange.place_order(&buy("TCS", dec!(2), dec!(3000)), now).unwrap();
        let over = exchange.place_order(&sell("TCS", dec!(3), dec!(3000)), now).unwrap();
        assert!(!over.is_executed());
        assert_eq!(exchange.portfolio().position("TCS").map(|p| p.quantity), Some(dec!(2)));
    }

    #[test]
    fn test_capital_limits_reject_before_mutation() {
        let mut exchange = PaperExchange::new(params());
        let now = Utc::now();

        let oversized = exchange.place_order(&buy("MRF", dec!(1), dec!(130000)), now).unwrap();
        assert!(!oversized.is_executed());

        let invalid = exchange.place_order(&buy("MRF", Decimal::ZERO, dec!(100)), now).unwrap();
        assert_eq!(invalid.rejection_reason(), Some("Quantity must be positive"));

        let negative = exchange.place_order(&buy("MRF", dec!(1), dec!(-5)), now).unwrap();
        assert_eq!(negative.rejection_reason(), Some("Price must be positive"));

        assert_eq!(exchange.portfolio().cash(), dec!(100000));
    }

    #[test]
    fn test_rejected_orders_are_handed_back_to_the_caller() {
        let mut exchange = PaperExchange::new(params());
        let now = Utc::now();

        for _ in 0..1000 {
            let outcome = exchange.place_order(&sell("TCS", dec!(1), dec!(3000)), now).unwrap();
            assert_eq!(outcome.order().status, OrderStatus::Rejected);
            assert_eq!(outcome.rejection_reason(), Some("No open position to sell"));
        }
        assert_eq!(exchange.portfolio().cash(), dec!(100000));
        assert_eq!(exchange.portfolio().open_position_count(), 0);
        assert!(exchange.portfolio().closed_positions().is_empty());
    }

    #[test]
    fn test_insufficient_cash_after_earlier_entries() {
        let mut exchange = PaperExchange::new(Simulation {
            slippage_pct: Decimal::ZERO,
            max_position_size: Decimal::ONE,
            ..params()
        });
        let now = Utc::now();
        exchange.place_order(&buy("A", dec!(1), dec!(99970)), now).unwrap();

        let next = exchange.place_order(&buy("B", dec!(1), dec!(1)), now).unwrap();
        assert!(next.rejection_reason().unwrap_or_default().starts_with("Insufficient funds"));
    }

    #[test]
    fn test_stop_loss_wins_when_both_levels_crossed() {
        let mut exchange = PaperExchange::new(Simulation { slippage_pct: Decimal::ZERO, ..params() });
        let now = Utc::now();
        // A degenerate bracket where any price crosses both levels.
        let request = buy("HDFC", dec!(10), dec!(1000)).with_protection(Some(dec!(1010)), Some(dec!(990)));
        exchange.place_order(&request, now).unwrap();

        let prices = HashMap::from([("HDFC".to_string(), dec!(1000))]);
        let outcomes = exchange.check_stop_loss_targets(&prices, now).unwrap();
        assert_eq!(outcomes.len(), 1);
        let OrderOutcome::Executed { position, .. } = &outcomes[0] else {
            panic!("exit should execute");
        };
        assert_eq!(position.exit.as_ref().map(|e| e.reason), Some(ExitReason::StopLoss));
        assert_eq!(position.exit.as_ref().map(|e| e.price), Some(dec!(1010)));
    }

    #[test]
    fn test_target_exit_and_untouched_positions() {
        let mut exchange = PaperExchange::new(Simulation { slippage_pct: Decimal::ZERO, ..params() });
        let now = Utc::now();
        exchange
            .place_order(&buy("A", dec!(10), dec!(100)).with_protection(Some(dec!(95)), Some(dec!(110))), now)
            .unwrap();
        exchange
            .place_order(&buy("B", dec!(10), dec!(100)).with_protection(Some(dec!(95)), Some(dec!(110))), now)
            .unwrap();

        let prices = HashMap::from([("A".to_string(), dec!(112)), ("B".to_string(), dec!(101))]);
        let outcomes = exchange.check_stop_loss_targets(&prices, now).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(exchange.portfolio().position("A").is_none());
        assert!(exchange.portfolio().position("B").is_some());
        let closed = &exchange.portfolio().closed_positions()[0];
        assert_eq!(closed.realized_pnl(), dec!(100));
        assert_eq!(closed.exit.as_ref().map(|e| e.reason), Some(ExitReason::Target));
    }

    #[test]
    fn test_shorts_open_and_close_when_enabled() {
        let mut exchange = PaperExchange::new(Simulation {
            allow_short: true,
            slippage_pct: Decimal::ZERO,
            ..params()
        });
        let now = Utc::now();
        let opened = exchange.place_order(&sell("ITC", dec!(50), dec!(450)), now).unwrap();
        assert!(opened.is_executed());
        assert_eq!(exchange.portfolio().position("ITC").map(|p| p.side), Some(PositionSide::Short));

        let again = exchange.place_order(&sell("ITC", dec!(10), dec!(450)), now).unwrap();
        assert!(!again.is_executed());

        exchange.place_order(&buy("ITC", dec!(50), dec!(440)), now).unwrap();
        assert_eq!(exchange.portfolio().realized_pnl(), dec!(500));
        assert_identity(&exchange);
    }

    #[test]
    fn test_close_all_liquidates_at_last_mark() {
        let mut exchange = PaperExchange::new(Simulation { slippage_pct: Decimal::ZERO, ..params() });
        let now = Utc::now();
        exchange.place_order(&buy("A", dec!(10), dec!(100)), now).unwrap();
        exchange.place_order(&buy("B", dec!(5), dec!(200)), now).unwrap();
        exchange.update_prices(&HashMap::from([
            ("A".to_string(), dec!(105)),
            ("B".to_string(), dec!(190)),
        ]));

        let outcomes = exchange.close_all(now, ExitReason::AutoExit).unwrap();
        assert!(outcomes.iter().all(OrderOutcome::is_executed));
        assert_eq!(exchange.portfolio().open_position_count(), 0);
        assert_eq!(exchange.portfolio().realized_pnl(), dec!(0));
        assert_identity(&exchange);
    }
}
