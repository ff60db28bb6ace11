use thiserror::Error;

use super::config::ConfigError;
use crate::db::StorageError;
use crate::dispatch::DispatchError;

/// Startup and lifecycle failures
///
/// Request handlers return `shared::error::AppError` instead.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("dispatch client error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
