use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("UTC offset of {0} minutes is out of range")]
    InvalidUtcOffset(i32),
}
