//! Render-pipeline bridge traits and supporting types.
//!
//! The engine never decodes audio itself. Host applications provide a
//! [`PipelineFactory`] that builds a platform [`RenderPipeline`] (an AVPlayer
//! item graph, an ExoPlayer instance, a GStreamer playbin, ...) around a
//! resolved [`MediaSource`]. Pipeline-originated signals (readiness, end of
//! stream, faults) are delivered on a channel returned at build time so the
//! engine can treat them as ordinary messages on its command loop.

use crate::error::Result;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Resolved audio source handed to a pipeline.
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// Media bytes already resident in memory (hot-tier cache hit).
    Memory {
        /// Complete encoded media payload.
        data: Bytes,
    },

    /// Cached media file on local storage.
    LocalFile {
        /// Absolute path to the media file.
        path: PathBuf,
    },

    /// Remote HTTP(S) stream fetched by the pipeline itself.
    RemoteStream {
        /// Full URL of the audio resource.
        url: String,
    },
}

impl MediaSource {
    /// Returns `true` if rendering this source requires network access.
    pub fn is_remote(&self) -> bool {
        matches!(self, MediaSource::RemoteStream { .. })
    }

    /// Returns `true` if the media bytes are already in memory.
    pub fn is_in_memory(&self) -> bool {
        matches!(self, MediaSource::Memory { .. })
    }
}

/// Options applied when a pipeline is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    /// Position to begin rendering from. Non-zero when a pipeline is rebuilt
    /// mid-track during recovery.
    pub start_position: Duration,
    /// Initial volume in `[0.0, 1.0]`.
    pub volume: f32,
    /// Whether output starts muted.
    pub muted: bool,
    /// Hint: how much audio to buffer ahead of the render head.
    pub prebuffer: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            start_position: Duration::ZERO,
            volume: 1.0,
            muted: false,
            prebuffer: Duration::from_secs(30),
        }
    }
}

/// Signals a pipeline delivers back to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineSignal {
    /// Enough media is buffered for rendering to begin.
    Ready {
        /// Total stream duration, when the container reports one.
        duration: Option<Duration>,
    },

    /// The render head reached the end of the stream.
    EndOfStream,

    /// The pipeline hit a fault it cannot recover from on its own
    /// (decoder failure, platform media-service reset).
    Faulted {
        /// Human-readable fault description.
        message: String,
    },
}

/// Point-in-time liveness sample of a pipeline.
///
/// Sampled on a short period by the engine's stall watchdog; implementations
/// should answer from already-known state rather than blocking on the
/// platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineHealth {
    /// Effective render rate; `0.0` means the render head is not moving.
    pub rate: f32,
    /// Current render position.
    pub position: Duration,
    /// The forward buffer has drained completely.
    pub buffer_empty: bool,
    /// The pipeline expects to sustain realtime rendering.
    pub likely_to_keep_up: bool,
}

/// One live decode/render pipeline for a single source.
///
/// Control methods must be fast and non-blocking; the engine calls them from
/// its single owning task.
#[async_trait::async_trait]
pub trait RenderPipeline: Send + Sync {
    /// Begin or re-assert rendering.
    ///
    /// Must be safe to call repeatedly: the engine leans on that during
    /// recovery nudges, where a wedged platform player is poked more than
    /// once before escalating.
    async fn play(&self) -> Result<()>;

    /// Halt rendering, keeping position and resources.
    async fn pause(&self) -> Result<()>;

    /// Move the render head to an absolute position.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Set output volume in `[0.0, 1.0]`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Mute or unmute output without touching volume.
    async fn set_muted(&self, muted: bool) -> Result<()>;

    /// Sample current liveness.
    async fn health(&self) -> PipelineHealth;

    /// Release all resources. The pipeline is unusable afterwards.
    async fn shutdown(&self) -> Result<()>;
}

/// Builds render pipelines.
///
/// Also the seam the engine uses to rebuild a wedged pipeline from scratch
/// when lighter recovery steps fail.
#[async_trait::async_trait]
pub trait PipelineFactory: Send + Sync {
    /// Build a pipeline around `source`.
    ///
    /// The pipeline starts paused; the engine issues `play()` once the
    /// pipeline reports [`PipelineSignal::Ready`]. The returned receiver
    /// carries the pipeline's signals; dropping it discards further signals.
    ///
    /// # Errors
    ///
    /// Fails if the source cannot be opened or the platform audio engine is
    /// unavailable.
    async fn open(
        &self,
        source: MediaSource,
        options: PipelineOptions,
    ) -> Result<(Arc<dyn RenderPipeline>, mpsc::Receiver<PipelineSignal>)>;
}
