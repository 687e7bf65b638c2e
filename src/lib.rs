// src/lib.rs

pub mod audio;
pub mod backend;
pub mod board;
pub mod controller;
pub mod decoder;
pub mod error;
pub mod events;
pub mod loader;
pub mod params;
pub mod peaks;
pub mod render;
pub mod session;

pub use backend::{DesktopPlatform, HeadlessPlatform, Platform};
pub use controller::{Command, CommandSender, LoadState, Player};
pub use error::{PlayerError, Result};
pub use events::{EventBus, PlayerEvent};
pub use params::{BackendKind, PlaybackParams, RendererKind};
pub use session::{Catalog, SessionConfig}; // convenience
