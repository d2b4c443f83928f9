//! Stall watchdog and the escalating recovery ladder.
//!
//! The watchdog runs only while foregrounded and playing: background stall
//! signals are unreliable, and recovery out there is the lifecycle router's
//! job. A stall is confirmed after two consecutive samples with rate 0 and
//! no position advance; recovery then escalates soft resume → pipeline
//! rebuild → abandonment, with counters reset by any confirmed advancing
//! sample.

use super::actor::{Command, EngineActor, ProbeKind, TickTask};
use crate::state::PlaybackStatus;
use bridge_traits::AppState;
use core_runtime::{EngineEvent, RecoveryEvent};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-session stall bookkeeping. Reset whenever playback is confirmed
/// advancing; destroyed with the session.
#[derive(Debug, Default)]
pub(super) struct WatchdogState {
    pub(super) consecutive_stall_observations: u32,
    pub(super) consecutive_recovery_failures: u32,
    pub(super) last_observed_position: f64,
}

impl EngineActor {
    /// Arm the liveness sampler for the current session. No-op while
    /// backgrounded or after the recovery ladder was exhausted.
    pub(super) fn start_watchdog(&mut self) {
        if self.app_state == AppState::Background {
            debug!("backgrounded, watchdog stays disarmed");
            return;
        }
        if self.recovery_abandoned {
            debug!("recovery abandoned for this session, watchdog stays disarmed");
            return;
        }
        if !self.snapshot.is_playing() {
            return;
        }
        let id = self.next_task_id();
        self.watchdog_task = Some(TickTask::spawn(
            id,
            self.config.watchdog_interval,
            self.self_tx.clone(),
            |id| Command::WatchdogTick { id },
        ));
        self.watchdog.consecutive_stall_observations = 0;
        self.watchdog.consecutive_recovery_failures = 0;
        self.watchdog.last_observed_position = self.snapshot.position_seconds;
        debug!(interval = ?self.config.watchdog_interval, "stall watchdog armed");
    }

    pub(super) fn stop_watchdog(&mut self) {
        self.watchdog_task = None;
    }

    pub(super) async fn on_watchdog_tick(&mut self, id: u64) {
        if self.watchdog_task.as_ref().map(|t| t.id) != Some(id) {
            return;
        }
        if !self.snapshot.is_playing() || self.app_state == AppState::Background {
            return;
        }
        let Some(pipeline) = self.pipeline.clone() else {
            return;
        };

        let health = pipeline.health().await;
        let advanced = self.snapshot.position_seconds - self.watchdog.last_observed_position
            > self.config.stall_advance_threshold;
        let stalled = health.rate == 0.0 && !advanced;

        if stalled {
            self.watchdog.consecutive_stall_observations += 1;
            debug!(
                rate = health.rate,
                advanced,
                buffer_empty = health.buffer_empty,
                likely_to_keep_up = health.likely_to_keep_up,
                observations = self.watchdog.consecutive_stall_observations,
                "stall sample"
            );

            if self.watchdog.consecutive_stall_observations
                >= self.config.stall_confirmation_samples
            {
                if self.watchdog.consecutive_recovery_failures
                    >= self.config.max_recovery_failures
                {
                    warn!(
                        failures = self.watchdog.consecutive_recovery_failures,
                        "recovery keeps failing, disabling auto-recovery for this session"
                    );
                    self.emit(EngineEvent::Recovery(RecoveryEvent::Abandoned {
                        failures: self.watchdog.consecutive_recovery_failures,
                    }));
                    self.recovery_abandoned = true;
                    self.stop_watchdog();
                    return;
                }

                self.emit(EngineEvent::Recovery(RecoveryEvent::StallDetected {
                    observations: self.watchdog.consecutive_stall_observations,
                }));
                self.attempt_soft_resume().await;
                self.watchdog.consecutive_recovery_failures += 1;

                if self.watchdog.consecutive_recovery_failures
                    >= self.config.rebuild_after_failures
                {
                    let position = self.snapshot.position_seconds;
                    self.rebuild_pipeline(position).await;
                }
            }
        } else {
            if self.watchdog.consecutive_recovery_failures > 0 {
                info!("playback recovered, resetting recovery counters");
            }
            self.watchdog.consecutive_stall_observations = 0;
            self.watchdog.consecutive_recovery_failures = 0;
        }
        self.watchdog.last_observed_position = self.snapshot.position_seconds;
    }

    /// Step 1 of the ladder: poke the existing pipeline back into motion and
    /// schedule a verification probe.
    async fn attempt_soft_resume(&mut self) {
        let attempt = self.watchdog.consecutive_recovery_failures + 1;
        info!(attempt, "attempting soft resume of stalled pipeline");
        self.emit(EngineEvent::Recovery(RecoveryEvent::SoftResumeAttempted {
            attempt,
        }));
        if let Some(pipeline) = self.pipeline.clone() {
            // re-assert intended output state; platforms have been seen
            // zeroing volume across interruptions
            if let Err(error) = pipeline.set_muted(self.snapshot.is_muted).await {
                debug!(%error, "set_muted failed");
            }
            if let Err(error) = pipeline.set_volume(self.snapshot.volume).await {
                debug!(%error, "set_volume failed");
            }
            if let Err(error) = pipeline.play().await {
                warn!(%error, "soft resume play failed");
            }
            self.schedule_probe(ProbeKind::ResumeNudge, self.config.resume_nudge_delay);
            self.schedule_probe(ProbeKind::SoftResumeVerify, self.config.resume_verify_delay);
        }
    }

    /// Handle a delayed probe scheduled by a recovery or lifecycle path.
    pub(super) async fn on_probe(&mut self, generation: u64, epoch: u64, kind: ProbeKind) {
        if generation != self.generation || epoch != self.recovery_epoch {
            return; // superseded by a newer play/stop/rebuild
        }
        match kind {
            ProbeKind::ResumeNudge => {
                if self.snapshot.is_playing() {
                    if let Some(pipeline) = &self.pipeline {
                        if let Err(error) = pipeline.play().await {
                            debug!(%error, "resume nudge failed");
                        }
                    }
                }
            }
            ProbeKind::SoftResumeVerify => {
                let Some(pipeline) = self.pipeline.clone() else {
                    return;
                };
                let health = pipeline.health().await;
                if health.rate > 0.0 {
                    debug!(rate = health.rate, "soft resume verified");
                    self.watchdog.consecutive_stall_observations = 0;
                    self.watchdog.consecutive_recovery_failures = 0;
                    self.publish_now_playing(true).await;
                } else {
                    warn!("soft resume did not take, nudging again");
                    if let Err(error) = pipeline.play().await {
                        debug!(%error, "post-verify nudge failed");
                    }
                }
            }
            ProbeKind::SoftRestartCheck => {
                if !self.snapshot.is_playing() {
                    return;
                }
                let Some(pipeline) = self.pipeline.clone() else {
                    return;
                };
                let health = pipeline.health().await;
                if health.rate == 0.0 {
                    info!("pipeline still silent after resume path, rebuilding");
                    let position = self.snapshot.position_seconds;
                    self.rebuild_pipeline(position).await;
                }
            }
            ProbeKind::InterruptionSettle => {
                self.reassert_and_resume().await;
                self.schedule_probe(
                    ProbeKind::SoftRestartCheck,
                    self.config.soft_restart_probe_delay,
                );
            }
        }
    }

    /// Step 2 of the ladder (also the media-services-reset path): discard
    /// the pipeline and build a fresh one from the already-resolved source,
    /// seeked back to where playback was.
    pub(super) async fn rebuild_pipeline(&mut self, resume_at: f64) {
        let Some(source) = self.resolved_source.clone() else {
            debug!("no resolved source to rebuild from");
            return;
        };
        self.recovery_epoch = self.recovery_epoch.wrapping_add(1);
        info!(position = resume_at, "rebuilding render pipeline");

        if let Some(old) = self.pipeline.take() {
            if let Err(error) = old.shutdown().await {
                debug!(%error, "old pipeline shutdown failed");
            }
        }
        self.pipeline_rx = None;

        let mut options = self.pipeline_options();
        options.start_position = Duration::from_secs_f64(resume_at.max(0.0));

        match self.deps.pipelines.open(source, options).await {
            Ok((pipeline, rx)) => {
                let loading = self.snapshot.status == PlaybackStatus::Loading;
                if !loading {
                    if let Err(error) = pipeline.play().await {
                        warn!(%error, "play after rebuild failed");
                    }
                }
                self.pipeline = Some(pipeline);
                self.pipeline_rx = Some(rx);
                if !loading {
                    self.snapshot.status = PlaybackStatus::Playing;
                    self.schedule_probe(ProbeKind::ResumeNudge, self.config.resume_nudge_delay);
                }
                self.snapshot.position_seconds = resume_at;
                self.watchdog.consecutive_stall_observations = 0;
                self.watchdog.last_observed_position = resume_at;
                self.emit(EngineEvent::Recovery(RecoveryEvent::PipelineRebuilt {
                    position_ms: (resume_at.max(0.0) * 1000.0) as u64,
                }));
                self.publish();
                self.publish_now_playing(true).await;
            }
            Err(error) => {
                self.fail_session(format!("pipeline rebuild failed: {error}"))
                    .await;
            }
        }
    }
}
