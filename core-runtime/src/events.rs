//! # Engine Event Bus
//!
//! Typed broadcast channel for engine-originated events, built on
//! `tokio::sync::broadcast`. The playback actor is the only publisher; any
//! number of observers (view layer, diagnostics, tests) subscribe
//! independently. Slow subscribers lag rather than block the engine.
//!
//! ```text
//! ┌────────────────┐    emit     ┌───────────┐  subscribe  ┌────────────┐
//! │ Playback Actor ├────────────>│ EventBus  ├────────────>│ View Layer │
//! └────────────────┘             │(broadcast)├────────────>│ Diagnostics│
//!                                └───────────┘             └────────────┘
//! ```
//!
//! Continuous state (position, status) is *not* carried here: that flows
//! through the engine's `watch`-published snapshot. The bus carries discrete
//! transitions and the few failures that are ever surfaced outward.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default per-subscriber buffer. Subscribers falling further behind than
/// this receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

// ============================================================================
// Event Types
// ============================================================================

/// Top-level event published by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// Transport-level transitions.
    Playback(PlaybackEvent),
    /// Audio-role arbitration outcomes.
    Session(SessionEvent),
    /// Stall-recovery progress.
    Recovery(RecoveryEvent),
}

impl EngineEvent {
    /// Human-readable description, mostly for log lines.
    pub fn description(&self) -> &str {
        match self {
            EngineEvent::Playback(e) => e.description(),
            EngineEvent::Session(e) => e.description(),
            EngineEvent::Recovery(e) => e.description(),
        }
    }

    /// Returns `true` for the events that represent surfaced failures.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            EngineEvent::Playback(PlaybackEvent::Failed { .. })
                | EngineEvent::Recovery(RecoveryEvent::Abandoned { .. })
        )
    }
}

/// Transport-level transitions of the single active track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Rendering began for a track.
    Started { track_id: String, title: String },
    /// Playback paused (user, remote command, or preemption).
    Paused { track_id: String, position_ms: u64 },
    /// Playback resumed from a pause.
    Resumed { track_id: String, position_ms: u64 },
    /// Playback stopped and the session tore down.
    Stopped { track_id: String },
    /// Terminal failure surfaced to observers. Emitted only when the
    /// cache→network fallback is exhausted or a rebuild cannot be built.
    Failed {
        track_id: Option<String>,
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Failed { .. } => "Playback failed",
        }
    }
}

/// Audio-role arbitration outcomes.
///
/// Roles are carried as their string names so observers need no dependency
/// on the arbiter's types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// A role request was granted.
    RoleGranted { role: String },
    /// A role request lost to the current holder. Normal deferred state,
    /// not an error.
    RoleDenied { requested: String, held_by: String },
    /// Ambient playback paused because an exclusive producer took the
    /// session.
    Preempted { by: String },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::RoleGranted { .. } => "Audio role granted",
            SessionEvent::RoleDenied { .. } => "Audio role denied",
            SessionEvent::Preempted { .. } => "Ambient playback preempted",
        }
    }
}

/// Stall-recovery progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum RecoveryEvent {
    /// The watchdog confirmed a stall after consecutive samples.
    StallDetected { observations: u32 },
    /// A soft resume was issued against the existing pipeline.
    SoftResumeAttempted { attempt: u32 },
    /// The render pipeline was rebuilt from scratch.
    PipelineRebuilt { position_ms: u64 },
    /// Auto-recovery was disabled for the rest of the session after hitting
    /// the consecutive-failure ceiling.
    Abandoned { failures: u32 },
}

impl RecoveryEvent {
    fn description(&self) -> &str {
        match self {
            RecoveryEvent::StallDetected { .. } => "Playback stall detected",
            RecoveryEvent::SoftResumeAttempted { .. } => "Soft resume attempted",
            RecoveryEvent::PipelineRebuilt { .. } => "Render pipeline rebuilt",
            RecoveryEvent::Abandoned { .. } => "Auto-recovery abandoned",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central bus for publishing and subscribing to [`EngineEvent`]s.
///
/// Cloning the bus clones the sending side; each `subscribe()` creates an
/// independent receiver. Sends never block: events are cloned per
/// subscriber, and subscribers that fall behind observe `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of subscribers reached, or an error when there are
    /// none: callers that don't care use `emit(...).ok()`.
    pub fn emit(&self, event: EngineEvent) -> Result<usize, SendError<EngineEvent>> {
        self.sender.send(event)
    }

    /// Create a new independent subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
