//! Error type for the I/O and thread boundaries of the engine.
//!
//! Keystroke handling never produces one of these: rejected or late keys are
//! reported through `AcceptResult::rejection` instead.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("offload worker failed to start: {0}")]
    OffloadSpawn(String),

    #[error("offload worker disconnected")]
    OffloadDisconnected,
}

pub type Result<T> = std::result::Result<T, Error>;
