//! The OS "now playing" surface and remote transport commands.

use crate::error::Result;
use bytes::Bytes;
use std::time::Duration;

/// Metadata mirrored to the platform now-playing surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlayingInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Total track duration, when known.
    pub duration: Option<Duration>,
    /// Elapsed playback time.
    pub elapsed: Duration,
    /// `1.0` while rendering, `0.0` while paused.
    pub rate: f32,
}

/// Transport commands arriving from the platform remote-command center
/// (lock screen, control center, headset buttons).
///
/// Hosts register for these with their platform and forward each one into
/// the engine's `remote_command` entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Play,
    Pause,
    TogglePlayPause,
}

/// Platform "now playing" surface (MPNowPlayingInfoCenter, MediaSession,
/// MPRIS, ...).
#[async_trait::async_trait]
pub trait NowPlayingSurface: Send + Sync {
    /// Replace the published metadata fields.
    async fn publish(&self, info: NowPlayingInfo) -> Result<()>;

    /// Attach artwork to the current entry.
    async fn publish_artwork(&self, image: Bytes) -> Result<()>;

    /// Remove the entry entirely.
    async fn clear(&self) -> Result<()>;
}
