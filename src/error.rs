// src/error.rs

use thiserror::Error;

/// Everything that can go wrong between loading a clip and drawing it.
///
/// Only `Container` and `Config` escape as `Err` from a constructor. The rest
/// are reported once through the player's `error` event.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The preferred backend cannot run on this host (no output device, etc).
    #[error("capability unavailable: {0}")]
    Capability(String),

    /// Bytes were fetched but could not be turned into samples.
    #[error("{0}")]
    Decode(String),

    /// The fetch itself failed.
    #[error("{0}")]
    Network(String),

    /// The drawing target is missing.
    #[error("container not found: {0}")]
    Container(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
