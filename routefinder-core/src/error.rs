use routefinder_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Scan coordinator is no longer running")]
    CoordinatorClosed,

    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
