use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid timeframe \"{0}\"")]
    InvalidTimeframe(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::StorageUnavailable(format!("database: {}", e))
    }
}

impl From<elasticsearch::Error> for AppError {
    fn from(e: elasticsearch::Error) -> Self {
        AppError::StorageUnavailable(format!("search backend: {}", e))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::StorageUnavailable(format!("malformed page: {}", e))
    }
}

pub type AppResult<T> = Result<T, AppError>;
