//! # Engine Configuration
//!
//! Every timing and recovery tunable of the playback engine in one validated
//! struct. Defaults are the constants the recovery protocol was tuned with;
//! tests shrink them to run against virtual time.
//!
//! The background-recovery branching is deliberately a policy knob rather
//! than hard-coded behavior: whether re-negotiating the shared audio
//! session while backgrounded is safe varies by platform and should be
//! validated empirically. See [`BackgroundPolicy`].

use crate::error::{Error, Result};
use std::time::Duration;

/// Recovery behavior while the app is backgrounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundPolicy {
    /// Re-negotiate the shared audio session while backgrounded. Off by
    /// default: backgrounded re-negotiation risks the platform treating the
    /// app as relinquishing playback priority, so recovery only nudges the
    /// existing pipeline.
    pub reassert_session_in_background: bool,

    /// Label attached to background-execution grants.
    pub grant_name: String,
}

impl Default for BackgroundPolicy {
    fn default() -> Self {
        Self {
            reassert_session_in_background: false,
            grant_name: "ambient-keepalive".to_string(),
        }
    }
}

/// Engine tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Liveness sampling period while playing in the foreground.
    pub watchdog_interval: Duration,

    /// Minimum position delta per sample, in seconds, to count as advancing.
    pub stall_advance_threshold: f64,

    /// Consecutive stalled samples required before recovery starts. Guards
    /// against reacting to a single transient buffering blip.
    pub stall_confirmation_samples: u32,

    /// Recovery failures after which the pipeline is rebuilt outright.
    pub rebuild_after_failures: u32,

    /// Consecutive recovery failures after which auto-recovery stops for the
    /// session. Prevents an infinite retry loop burning battery and network.
    pub max_recovery_failures: u32,

    /// Delay before verifying that a soft resume actually took.
    pub resume_verify_delay: Duration,

    /// Delay before the follow-up nudge after a resume is issued.
    pub resume_nudge_delay: Duration,

    /// Delay after an interruption ends before touching the session, letting
    /// the interrupter's audio wind down.
    pub interruption_settle_delay: Duration,

    /// Delay before the still-silent fallback check that escalates a failed
    /// resume path straight to a pipeline rebuild.
    pub soft_restart_probe_delay: Duration,

    /// Delay before the defensive re-play issued right after backgrounding.
    pub background_nudge_delay: Duration,

    /// Position sampling period driving progress updates.
    pub progress_interval: Duration,

    /// Minimum elapsed-playback delta between now-playing refreshes.
    pub now_playing_refresh: Duration,

    /// Continuous playback needed before a play is recorded, once per track.
    pub record_play_threshold: Duration,

    /// Countdown granularity of the sleep timer.
    pub sleep_timer_tick: Duration,

    /// Artist string published to the now-playing surface.
    pub now_playing_artist: String,

    /// Album string published to the now-playing surface.
    pub now_playing_album: String,

    /// Recovery behavior while backgrounded.
    pub background_policy: BackgroundPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            watchdog_interval: Duration::from_secs(5),
            stall_advance_threshold: 1.0,
            stall_confirmation_samples: 2,
            rebuild_after_failures: 2,
            max_recovery_failures: 3,
            resume_verify_delay: Duration::from_millis(500),
            resume_nudge_delay: Duration::from_millis(100),
            interruption_settle_delay: Duration::from_millis(100),
            soft_restart_probe_delay: Duration::from_millis(800),
            background_nudge_delay: Duration::from_millis(300),
            progress_interval: Duration::from_secs(1),
            now_playing_refresh: Duration::from_secs(5),
            record_play_threshold: Duration::from_secs(5),
            sleep_timer_tick: Duration::from_secs(1),
            now_playing_artist: "Ambient".to_string(),
            now_playing_album: "Ambient Sounds".to_string(),
            background_policy: BackgroundPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Override the watchdog sampling period.
    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    /// Override the progress sampling period.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Override the background recovery policy.
    pub fn with_background_policy(mut self, policy: BackgroundPolicy) -> Self {
        self.background_policy = policy;
        self
    }

    /// Validate invariants between tunables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.watchdog_interval.is_zero() {
            return Err(Error::Config("watchdog_interval must be non-zero".into()));
        }
        if self.progress_interval.is_zero() {
            return Err(Error::Config("progress_interval must be non-zero".into()));
        }
        if self.sleep_timer_tick.is_zero() {
            return Err(Error::Config("sleep_timer_tick must be non-zero".into()));
        }
        if self.stall_confirmation_samples == 0 {
            return Err(Error::Config(
                "stall_confirmation_samples must be at least 1".into(),
            ));
        }
        if !(self.stall_advance_threshold > 0.0) {
            return Err(Error::Config(
                "stall_advance_threshold must be positive".into(),
            ));
        }
        if self.rebuild_after_failures == 0 {
            return Err(Error::Config(
                "rebuild_after_failures must be at least 1".into(),
            ));
        }
        if self.max_recovery_failures < self.rebuild_after_failures {
            return Err(Error::Config(
                "max_recovery_failures must be >= rebuild_after_failures".into(),
            ));
        }
        Ok(())
    }
}
