use crate::error::BacktestError;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use configuration::LiveSettings;
use std::collections::HashSet;

/// Trading-session gate for live polling: weekdays that are not holidays,
/// between the opening and closing time at the exchange's UTC offset.
#[derive(Debug, Clone)]
pub struct MarketHours {
    offset: FixedOffset,
    open: NaiveTime,
    close: NaiveTime,
    holidays: HashSet<NaiveDate>,
    enforce: bool,
}

impl MarketHours {
    pub fn from_settings(settings: &LiveSettings) -> Result<Self, BacktestError> {
        let offset = settings
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                BacktestError::Analytics(analytics::AnalyticsError::InvalidUtcOffset(
                    settings.utc_offset_minutes,
                ))
            })?;
        Ok(Self {
            offset,
            open: settings.market_open,
            close: settings.market_close,
            holidays: settings.holidays.iter().copied().collect(),
            enforce: settings.enforce_market_hours,
        })
    }

    pub fn is_open(&self, at: DateTime<Utc>) -> bool {
        if !self.enforce {
            return true;
        }
        let local = at.with_timezone(&self.offset);
        let date = local.date_naive();
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) || self.holidays.contains(&date) {
            return false;
        }
        let time = local.time();
        time >= self.open && time <= self.close
    }
}
