use fxra_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("Feature error: {0}")]
    Features(String),

    #[error("Store lock poisoned: {0}")]
    Lock(String),
}
