//! Lifecycle event routing.
//!
//! Maps system audio/lifecycle signals onto engine actions. The split that
//! matters: foreground recovery fully re-negotiates (re-assert the role,
//! resume, verify), while background recovery only nudges the existing
//! pipeline. Naively re-activating the shared session on every signal
//! causes session thrashing that some platforms penalize with silent
//! output, so the background branch is configurable through
//! `BackgroundPolicy`.

use super::actor::{EngineActor, ProbeKind};
use crate::session::SessionRole;
use bridge_traits::{AppState, LifecycleSignal, RouteChangeReason};
use tracing::{debug, info, warn};

impl EngineActor {
    pub(super) async fn on_lifecycle(&mut self, signal: LifecycleSignal) {
        debug!(?signal, "lifecycle signal");
        match signal {
            LifecycleSignal::InterruptionBegan => {
                // record and stand down: the platform pauses rendering on
                // its own, and forcing a stop here breaks background
                // resumption
                self.was_playing_before_interruption = self.snapshot.is_playing();
                debug!(
                    was_playing = self.was_playing_before_interruption,
                    "audio session interrupted"
                );
            }

            LifecycleSignal::InterruptionEnded { should_resume } => {
                // some interrupters (notification chimes) never set the
                // resume hint, so the engine's own record wins too
                if should_resume || self.was_playing_before_interruption {
                    self.was_playing_before_interruption = false;
                    self.schedule_probe(
                        ProbeKind::InterruptionSettle,
                        self.config.interruption_settle_delay,
                    );
                } else {
                    debug!("interruption ended, nothing to resume");
                }
            }

            LifecycleSignal::RouteChanged { reason } => self.on_route_changed(reason).await,

            LifecycleSignal::SecondaryAudioSilence { silenced } => {
                if silenced {
                    debug!("secondary audio silence hint began");
                } else if self.snapshot.is_playing() {
                    info!("secondary audio silence hint ended, resuming");
                    self.reassert_and_resume().await;
                    self.schedule_probe(
                        ProbeKind::SoftRestartCheck,
                        self.config.soft_restart_probe_delay,
                    );
                }
            }

            LifecycleSignal::AppEnteredBackground => self.on_entered_background().await,
            LifecycleSignal::AppWillEnterForeground => self.on_will_enter_foreground().await,

            LifecycleSignal::MediaServicesReset => {
                if self.snapshot.status.is_active() {
                    info!("media services reset, rebuilding pipeline");
                    let position = self.snapshot.position_seconds;
                    self.rebuild_pipeline(position).await;
                }
            }
        }
    }

    async fn on_route_changed(&mut self, reason: RouteChangeReason) {
        match reason {
            RouteChangeReason::DeviceUnavailable => {
                if !self.snapshot.status.is_active() {
                    return;
                }
                info!("output device went away, re-asserting session");
                self.reassert_and_resume().await;
                self.schedule_probe(
                    ProbeKind::SoftRestartCheck,
                    self.config.soft_restart_probe_delay,
                );
            }

            RouteChangeReason::CategoryChanged => {
                if !self.snapshot.is_playing() {
                    return;
                }
                let backgrounded = self.app_state == AppState::Background;
                if backgrounded && !self.config.background_policy.reassert_session_in_background {
                    // nudge only: re-negotiating the session from the
                    // background risks the platform demoting our priority
                    debug!("category changed while backgrounded, nudging pipeline only");
                    if let Some(pipeline) = &self.pipeline {
                        if let Err(error) = pipeline.play().await {
                            warn!(%error, "background nudge failed");
                        }
                    }
                } else {
                    self.reassert_and_resume().await;
                }
            }

            RouteChangeReason::Other => {}
        }
    }

    async fn on_entered_background(&mut self) {
        self.app_state = AppState::Background;
        // background stall readings are unreliable; this router handles
        // recovery out here instead
        self.stop_watchdog();

        if !self.snapshot.is_playing() {
            return;
        }

        // bounded extra execution for any recovery work we do back here
        if self.background_grant.is_none() {
            let name = self.config.background_policy.grant_name.clone();
            match self.deps.background.begin(&name).await {
                Ok(token) => self.background_grant = Some(token),
                Err(error) => warn!(%error, "background grant unavailable"),
            }
        }

        if self.deps.arbiter.current_role().preempts_ambient() {
            debug!("preempted by exclusive role, skipping background keepalive");
            return;
        }

        // confirm the role is still ours; the session itself is not
        // re-negotiated while backgrounded
        if self.deps.arbiter.current_role() != SessionRole::AmbientMedia {
            let _ = self.deps.arbiter.request_role(SessionRole::AmbientMedia);
        }

        if let Some(pipeline) = self.pipeline.clone() {
            if let Err(error) = pipeline.set_muted(self.snapshot.is_muted).await {
                debug!(%error, "set_muted failed");
            }
            if let Err(error) = pipeline.set_volume(self.snapshot.volume).await {
                debug!(%error, "set_volume failed");
            }
            if let Err(error) = pipeline.play().await {
                warn!(%error, "background keepalive play failed");
            }
            self.schedule_probe(ProbeKind::ResumeNudge, self.config.background_nudge_delay);
        }
        self.publish_now_playing(true).await;
    }

    async fn on_will_enter_foreground(&mut self) {
        self.app_state = AppState::Foreground;

        if let Some(token) = self.background_grant.take() {
            if let Err(error) = self.deps.background.end(token).await {
                warn!(%error, "failed to release background grant");
            }
        }

        if self.snapshot.is_playing() {
            if self.deps.arbiter.current_role().preempts_ambient() {
                debug!("foregrounded while preempted, not resuming");
                return;
            }
            info!("foregrounded, re-asserting playback");
            self.reassert_and_resume().await;
            self.start_watchdog();
            // artwork fetches are deferred while backgrounded; catch up now
            self.maybe_fetch_artwork();
        }
    }

    /// Unified recovery entry: role re-assertion then resume. Remote
    /// commands and most lifecycle paths funnel through here rather than
    /// re-activating the session ad hoc.
    pub(super) async fn reassert_and_resume(&mut self) {
        self.handle_resume().await;
    }
}
