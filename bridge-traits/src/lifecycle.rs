//! System audio/lifecycle signal types and background-execution grants.
//!
//! Hosts translate their platform's notifications (audio-session
//! interruptions, route changes, app state transitions, media-service
//! resets) into the closed [`LifecycleSignal`] enum and deliver them to the
//! engine, which is the single consumer. This replaces notification-center
//! style many-to-many subscription wiring with one typed channel.

use crate::error::Result;
use uuid::Uuid;

/// Coarse application execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Foreground,
    Background,
}

/// Why the audio output route changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChangeReason {
    /// The active output device disappeared (headphones unplugged).
    DeviceUnavailable,
    /// Another component in the process reconfigured the shared audio
    /// session category.
    CategoryChanged,
    /// Any other platform-reported reason.
    Other,
}

/// System-level audio lifecycle signals published by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// Another audio producer interrupted the session (call, alarm).
    InterruptionBegan,

    /// The interruption ended. `should_resume` mirrors the platform's resume
    /// hint; some interrupters (notification chimes) never set it, so the
    /// engine also consults its own was-playing record.
    InterruptionEnded { should_resume: bool },

    /// The audio output route changed.
    RouteChanged { reason: RouteChangeReason },

    /// The "secondary audio should be silenced" hint toggled.
    SecondaryAudioSilence { silenced: bool },

    /// The application moved to the background.
    AppEnteredBackground,

    /// The application is returning to the foreground.
    AppWillEnterForeground,

    /// The platform reset its media services; all pipelines are orphaned and
    /// must be rebuilt.
    MediaServicesReset,
}

/// Opaque handle for a granted background-execution window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrantToken(Uuid);

impl GrantToken {
    /// Mint a fresh token. Called by [`BackgroundGrant`] implementations.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GrantToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded extra execution time while backgrounded.
///
/// Hosts map this onto their platform facility (`beginBackgroundTask`,
/// WorkManager expedited work, a no-op on desktop). Grants must be released
/// promptly once the work completes; platforms penalize apps with
/// outstanding unfinished background tasks.
#[async_trait::async_trait]
pub trait BackgroundGrant: Send + Sync {
    /// Request a bounded execution window. `name` labels the work for
    /// platform diagnostics.
    async fn begin(&self, name: &str) -> Result<GrantToken>;

    /// Release a previously granted window.
    async fn end(&self, token: GrantToken) -> Result<()>;
}
