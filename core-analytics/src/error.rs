use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Invalid recommendation weights: {0}")]
    InvalidWeights(String),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
