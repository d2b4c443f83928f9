//! Analytics sink consumed by the engine.

use crate::error::Result;

/// Best-effort playback analytics.
#[async_trait::async_trait]
pub trait PlaybackAnalytics: Send + Sync {
    /// Record that a track accumulated enough continuous playback to count
    /// as a play. Called at most once per track per playback session.
    /// Failures are logged by the caller and never retried.
    async fn record_play(&self, track_id: &str) -> Result<()>;
}
