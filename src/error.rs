//! Domain errors shared by the store, the transport adapter and the router.
//!
//! An absent record is not an error: lookups return `Option`.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<teloxide::RequestError> for Error {
    fn from(err: teloxide::RequestError) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<teloxide::DownloadError> for Error {
    fn from(err: teloxide::DownloadError) -> Self {
        Self::Transport(err.to_string())
    }
}
