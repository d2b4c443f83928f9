//! # Ambient Playback Engine
//!
//! Resilient, loop-based playback of a single long-running ambient audio
//! stream. The engine survives app backgrounding, system audio
//! interruptions, output-route changes, and transient pipeline stalls, while
//! cooperating with other audio producers in the process (voice messages,
//! recording) through a shared [`SessionArbiter`].
//!
//! ## Architecture
//!
//! ```text
//!  play/pause/seek/stop        lifecycle signals        remote commands
//!        │                           │                        │
//!        └───────────────┬───────────┴────────────────────────┘
//!                        ▼
//!              ┌───────────────────┐  resolve   ┌────────────────────┐
//!              │  Playback Actor   ├───────────>│ Media Cache Gateway│
//!              │  (single owner)   │            └────────────────────┘
//!              │  · watchdog       │  open      ┌────────────────────┐
//!              │  · sleep timer    ├───────────>│  PipelineFactory   │
//!              │  · lifecycle route│<───────────┤  (host bridge)     │
//!              │  · now-playing    │  signals   └────────────────────┘
//!              └─────────┬─────────┘
//!                        │ watch / broadcast
//!                        ▼
//!                  observers (view layer, OS now-playing surface)
//! ```
//!
//! All mutable state lives inside one actor task; every external input
//! (commands, lifecycle signals, pipeline signals, timer ticks, async
//! completions) arrives as a message on its channel. Async completions are
//! stamped with a generation counter and discarded when a newer `play()` or
//! `stop()` superseded them.

pub mod cache;
pub mod engine;
pub mod error;
pub mod session;
pub mod state;

pub use cache::MediaCacheGateway;
pub use engine::{EngineDeps, PlaybackEngine};
pub use error::{EngineError, Result};
pub use session::{RoleDecision, SessionArbiter, SessionRole};
pub use state::{PlaybackSnapshot, PlaybackStatus, Track};
