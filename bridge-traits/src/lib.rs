//! # Host Bridge Traits
//!
//! Platform seams for the ambient playback engine. The engine core stays
//! platform-agnostic; host applications implement these traits around their
//! native audio, media-session, networking, and background-execution
//! facilities.
//!
//! ## Seams
//!
//! - [`pipeline`]: the decode/render pipeline abstraction the engine drives
//!   and, during recovery, rebuilds from scratch
//! - [`http`]: fetch-URL-to-bytes, used by the media cache gateway and the
//!   artwork path
//! - [`lifecycle`]: system audio/lifecycle signal types and bounded
//!   background-execution grants
//! - [`media_session`]: the OS "now playing" surface and remote transport
//!   commands
//! - [`analytics`]: best-effort play recording

pub mod analytics;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod media_session;
pub mod pipeline;

pub use analytics::PlaybackAnalytics;
pub use error::{BridgeError, Result};
#[cfg(feature = "reqwest-client")]
pub use http::HttpMediaFetcher;
pub use http::MediaFetcher;
pub use lifecycle::{AppState, BackgroundGrant, GrantToken, LifecycleSignal, RouteChangeReason};
pub use media_session::{NowPlayingInfo, NowPlayingSurface, RemoteCommand};
pub use pipeline::{
    MediaSource, PipelineFactory, PipelineHealth, PipelineOptions, PipelineSignal, RenderPipeline,
};
