use crate::adx::Adx;
use crate::atr::Atr;
use crate::bollinger::Bollinger;
use crate::error::StrategyError;
use crate::macd::Macd;
use crate::renko::Renko;
use crate::rsi::Rsi;
use crate::super_trend::SuperTrend;
use crate::Strategy;
use configuration::Strategies;
use core_types::enums::StrategyId;

/// Creates a new strategy instance based on the provided ID and configuration.
///
/// The match is exhaustive, so adding a `StrategyId` without wiring it here is
/// a compile error.
pub fn create_strategy(id: StrategyId, config: &Strategies) -> Result<Box<dyn Strategy>, StrategyError> {
    match id {
        StrategyId::Rsi => Ok(Box::new(Rsi::new(config.rsi.clone())?)),
        StrategyId::Macd => Ok(Box::new(Macd::new(config.macd.clone())?)),
        StrategyId::Supertrend => Ok(Box::new(SuperTrend::new(config.supertrend.clone())?)),
        StrategyId::Bollinger => Ok(Box::new(Bollinger::new(config.bollinger.clone())?)),
        StrategyId::Adx => Ok(Box::new(Adx::new(config.adx.clone())?)),
        StrategyId::Atr => Ok(Box::new(Atr::new(config.atr.clone())?)),
        StrategyId::Renko => Ok(Box::new(Renko::new(config.renko.clone())?)),
    }
}

/// Builds every requested generator, failing on the first invalid parameter set.
pub fn create_strategies(
    ids: &[StrategyId],
    config: &Strategies,
) -> Result<Vec<Box<dyn Strategy>>, StrategyError> {
    ids.iter().map(|id| create_strategy(*id, config)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::RsiParams;

    #[test]
    fn test_builds_every_known_strategy() {
        let strategies = create_strategies(&StrategyId::ALL, &Strategies::default()).unwrap();
        let ids: Vec<StrategyId> = strategies.iter().map(|s| s.id()).collect();
        assert_eq!(ids, StrategyId::ALL.to_vec());
    }

    #[test]
    fn test_invalid_parameters_are_reported() {
        let config = Strategies {
            rsi: RsiParams { period: 0, ..RsiParams::default() },
            ..Strategies::default()
        };
        assert!(matches!(
            create_strategy(StrategyId::Rsi, &config),
            Err(StrategyError::InvalidParameters(_))
        ));
    }
}
