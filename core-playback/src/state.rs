//! Track descriptor and observable playback state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable descriptor of a playable ambient track, supplied by the content
/// catalog. The engine never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Stable catalog identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// HTTP(S) URL of the audio stream. Also the cache key.
    pub stream_url: String,
    /// Cover image URL, when the catalog provides one.
    pub artwork_url: Option<String>,
    /// Catalog-reported duration, used until the pipeline reports one.
    pub duration_hint: Option<Duration>,
}

/// Transport status of the single active track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Idle,
    Loading,
    Playing,
    Paused,
    Stopped,
}

impl PlaybackStatus {
    /// Returns `true` while a playback session exists (loaded or loading).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackStatus::Loading | PlaybackStatus::Playing | PlaybackStatus::Paused
        )
    }
}

/// Read-only snapshot pushed to observers on every state change.
///
/// Invariants: `track.is_none()` implies `status == Idle`, and
/// `position_seconds <= duration_seconds` whenever a duration is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    /// Currently loaded track, retained across `Stopped` so a replay can
    /// target the same content.
    pub track: Option<Track>,
    pub status: PlaybackStatus,
    pub position_seconds: f64,
    /// `0.0` while the duration is unknown.
    pub duration_seconds: f64,
    pub is_muted: bool,
    pub volume: f32,
    /// Remaining sleep-timer seconds while a timer is armed.
    pub sleep_timer_remaining: Option<u32>,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            track: None,
            status: PlaybackStatus::Idle,
            position_seconds: 0.0,
            duration_seconds: 0.0,
            is_muted: false,
            volume: 1.0,
            sleep_timer_remaining: None,
        }
    }
}

impl PlaybackSnapshot {
    /// Returns `true` while the render head is expected to be moving.
    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// Normalized progress in `[0.0, 1.0]`; `0.0` while duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration_seconds > 0.0 {
            (self.position_seconds / self.duration_seconds).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
