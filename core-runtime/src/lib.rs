//! # Engine Runtime
//!
//! Ambient infrastructure for the playback engine:
//! - Typed event broadcasting
//! - Engine configuration and validation
//! - Logging bootstrap
//!
//! Kept separate from the engine itself so host shells and tests can share
//! the runtime conventions without pulling in playback logic.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{BackgroundPolicy, EngineConfig};
pub use error::{Error, Result};
pub use events::{EngineEvent, EventBus, PlaybackEvent, RecoveryEvent, SessionEvent};
pub use logging::{init_logging, LogFormat, LoggingConfig};
