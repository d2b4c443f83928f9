//! The engine actor: single owner of all mutable playback state.
//!
//! Commands, lifecycle signals, pipeline signals, timer ticks, and async
//! completions all arrive as messages on one channel, so no two mutations
//! ever interleave. Async completions carry the generation they were started
//! under and are discarded when a newer `play()` or `stop()` superseded them.

use super::now_playing::NowPlayingTracker;
use super::recovery::WatchdogState;
use super::sleep::SleepTimer;
use super::EngineDeps;
use crate::session::{RoleDecision, SessionRole};
use crate::state::{PlaybackSnapshot, PlaybackStatus, Track};
use bridge_traits::{
    AppState, GrantToken, LifecycleSignal, MediaSource, PipelineOptions, PipelineSignal,
    RemoteCommand, RenderPipeline,
};
use bytes::Bytes;
use core_runtime::{EngineConfig, EngineEvent, PlaybackEvent, SessionEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// ============================================================================
// Messages
// ============================================================================

/// Messages processed by the actor. External commands and internal
/// completions share one channel so every mutation is serialized.
pub(super) enum Command {
    Play(Track),
    Pause,
    Resume,
    Seek(f64),
    Stop(Option<oneshot::Sender<()>>),
    SetVolume(f32),
    SetMuted(bool),
    SetSleepTimer { minutes: u32 },
    CancelSleepTimer,
    Remote(RemoteCommand),
    Lifecycle(LifecycleSignal),

    // Internal completions, stamped for staleness checks.
    PipelineBuilt {
        generation: u64,
        source: MediaSource,
        result: bridge_traits::Result<(Arc<dyn RenderPipeline>, mpsc::Receiver<PipelineSignal>)>,
    },
    ArtworkFetched {
        generation: u64,
        url: String,
        data: Bytes,
    },
    WatchdogTick { id: u64 },
    ProgressTick { id: u64 },
    SleepTick { id: u64, remaining: u32 },
    SleepExpired { id: u64 },
    RecoveryProbe {
        generation: u64,
        epoch: u64,
        kind: ProbeKind,
    },
}

/// Delayed one-shot checks scheduled by recovery and lifecycle paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ProbeKind {
    /// Second `play()` nudge shortly after a resume was issued.
    ResumeNudge,
    /// Did the soft resume actually take?
    SoftResumeVerify,
    /// Still silent after a resume path: escalate to a rebuild.
    SoftRestartCheck,
    /// Interruption ended; wait for the interrupter's audio to wind down,
    /// then re-assert and resume.
    InterruptionSettle,
}

/// A periodic ticking task feeding the actor. Aborted on drop, so stopping
/// a watchdog or progress sampler is just dropping its handle; ticks from an
/// aborted task that are already queued are filtered by id.
pub(super) struct TickTask {
    pub(super) id: u64,
    handle: JoinHandle<()>,
}

impl TickTask {
    pub(super) fn spawn(
        id: u64,
        period: Duration,
        tx: mpsc::WeakSender<Command>,
        make: fn(u64) -> Command,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // consume the immediate first tick
            loop {
                ticker.tick().await;
                let Some(tx) = tx.upgrade() else { break };
                if tx.send(make(id)).await.is_err() {
                    break;
                }
            }
        });
        Self { id, handle }
    }
}

impl Drop for TickTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// Actor
// ============================================================================

pub(super) struct EngineActor {
    pub(super) config: EngineConfig,
    pub(super) deps: EngineDeps,
    commands: mpsc::Receiver<Command>,
    pub(super) self_tx: mpsc::WeakSender<Command>,
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
    role_rx: watch::Receiver<SessionRole>,

    pub(super) snapshot: PlaybackSnapshot,
    pub(super) generation: u64,
    pub(super) recovery_epoch: u64,
    pub(super) pipeline: Option<Arc<dyn RenderPipeline>>,
    pub(super) pipeline_rx: Option<mpsc::Receiver<PipelineSignal>>,
    pub(super) resolved_source: Option<MediaSource>,
    pub(super) app_state: AppState,
    pub(super) was_playing_before_interruption: bool,
    was_playing_before_preemption: bool,
    pending_play: bool,
    has_recorded_play: bool,
    pub(super) fetch_cancel: CancellationToken,
    pub(super) background_grant: Option<GrantToken>,

    pub(super) watchdog: WatchdogState,
    pub(super) watchdog_task: Option<TickTask>,
    pub(super) progress_task: Option<TickTask>,
    pub(super) sleep_timer: Option<SleepTimer>,
    pub(super) now_playing: NowPlayingTracker,
    pub(super) recovery_abandoned: bool,
    task_seq: u64,
}

impl EngineActor {
    pub(super) fn new(
        deps: EngineDeps,
        config: EngineConfig,
        commands: mpsc::Receiver<Command>,
        self_tx: mpsc::WeakSender<Command>,
        snapshot_tx: watch::Sender<PlaybackSnapshot>,
    ) -> Self {
        let role_rx = deps.arbiter.subscribe();
        Self {
            config,
            deps,
            commands,
            self_tx,
            snapshot_tx,
            role_rx,
            snapshot: PlaybackSnapshot::default(),
            generation: 0,
            recovery_epoch: 0,
            pipeline: None,
            pipeline_rx: None,
            resolved_source: None,
            app_state: AppState::Foreground,
            was_playing_before_interruption: false,
            was_playing_before_preemption: false,
            pending_play: false,
            has_recorded_play: false,
            fetch_cancel: CancellationToken::new(),
            background_grant: None,
            watchdog: WatchdogState::default(),
            watchdog_task: None,
            progress_task: None,
            sleep_timer: None,
            now_playing: NowPlayingTracker::default(),
            recovery_abandoned: false,
            task_seq: 0,
        }
    }

    pub(super) async fn run(mut self) {
        info!("playback engine started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.dispatch(command).await,
                    None => break,
                },
                signal = Self::next_pipeline_signal(&mut self.pipeline_rx) => match signal {
                    Some(signal) => self.on_pipeline_signal(signal).await,
                    None => self.pipeline_rx = None,
                },
                changed = self.role_rx.changed() => match changed {
                    Ok(()) => {
                        let role = *self.role_rx.borrow_and_update();
                        self.on_role_changed(role).await;
                    }
                    // The arbiter owns the sender and outlives the engine;
                    // closure means the process is tearing down.
                    Err(_) => break,
                },
            }
        }
        self.teardown().await;
        info!("playback engine stopped");
    }

    async fn next_pipeline_signal(
        rx: &mut Option<mpsc::Receiver<PipelineSignal>>,
    ) -> Option<PipelineSignal> {
        match rx {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    async fn dispatch(&mut self, command: Command) {
        match command {
            Command::Play(track) => self.handle_play(track).await,
            Command::Pause => self.handle_pause().await,
            Command::Resume => self.handle_resume().await,
            Command::Seek(seconds) => self.handle_seek(seconds).await,
            Command::Stop(ack) => {
                self.teardown().await;
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
            Command::SetVolume(volume) => self.handle_set_volume(volume).await,
            Command::SetMuted(muted) => self.handle_set_muted(muted).await,
            Command::SetSleepTimer { minutes } => self.arm_sleep_timer(minutes),
            Command::CancelSleepTimer => self.disarm_sleep_timer(),
            Command::Remote(command) => self.handle_remote(command).await,
            Command::Lifecycle(signal) => self.on_lifecycle(signal).await,
            Command::PipelineBuilt {
                generation,
                source,
                result,
            } => self.on_pipeline_built(generation, source, result).await,
            Command::ArtworkFetched {
                generation,
                url,
                data,
            } => self.on_artwork(generation, url, data).await,
            Command::WatchdogTick { id } => self.on_watchdog_tick(id).await,
            Command::ProgressTick { id } => self.on_progress_tick(id).await,
            Command::SleepTick { id, remaining } => self.on_sleep_tick(id, remaining),
            Command::SleepExpired { id } => self.on_sleep_expired(id).await,
            Command::RecoveryProbe {
                generation,
                epoch,
                kind,
            } => self.on_probe(generation, epoch, kind).await,
        }
    }

    // ========================================================================
    // Transport commands
    // ========================================================================

    async fn handle_play(&mut self, track: Track) {
        let same_track =
            self.snapshot.track.as_ref().map(|t| t.id.as_str()) == Some(track.id.as_str());
        if same_track {
            match self.snapshot.status {
                PlaybackStatus::Loading => {
                    debug!(track_id = %track.id, "already loading this track");
                    return;
                }
                PlaybackStatus::Playing | PlaybackStatus::Paused if self.pipeline.is_some() => {
                    debug!(track_id = %track.id, "same track, resuming in place");
                    self.handle_resume().await;
                    return;
                }
                _ => {}
            }
        }
        self.start_playback(track).await;
    }

    async fn start_playback(&mut self, track: Track) {
        self.teardown().await;

        match self.deps.arbiter.request_role(SessionRole::AmbientMedia) {
            RoleDecision::Granted => {
                self.emit(EngineEvent::Session(SessionEvent::RoleGranted {
                    role: SessionRole::AmbientMedia.as_str().to_string(),
                }));
            }
            RoleDecision::Denied { held_by } => {
                // normal deferred state: resume automatically once released
                info!(
                    held_by = held_by.as_str(),
                    track_id = %track.id,
                    "session held by exclusive role, deferring playback"
                );
                self.emit(EngineEvent::Session(SessionEvent::RoleDenied {
                    requested: SessionRole::AmbientMedia.as_str().to_string(),
                    held_by: held_by.as_str().to_string(),
                }));
                self.snapshot.track = Some(track);
                self.snapshot.status = PlaybackStatus::Paused;
                self.pending_play = true;
                self.publish();
                return;
            }
        }

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        self.snapshot.track = Some(track.clone());
        self.snapshot.status = PlaybackStatus::Loading;
        self.snapshot.position_seconds = 0.0;
        self.snapshot.duration_seconds =
            track.duration_hint.map(|d| d.as_secs_f64()).unwrap_or(0.0);
        self.publish();

        info!(track_id = %track.id, title = %track.title, "loading track");

        // Resolve and open off the actor so stop() stays responsive while
        // the pipeline spins up.
        let cache = Arc::clone(&self.deps.cache);
        let factory = Arc::clone(&self.deps.pipelines);
        let tx = self.self_tx.clone();
        let cancel = self.fetch_cancel.clone();
        let options = self.pipeline_options();
        let url = track.stream_url.clone();
        tokio::spawn(async move {
            let source = cache.resolve(&url).await;
            if source.is_remote() {
                // persist for next time without blocking playback
                let cache = Arc::clone(&cache);
                let fill_url = url.clone();
                tokio::spawn(async move {
                    if let Err(error) = cache.fetch_and_store(&fill_url, cancel).await {
                        warn!(%error, url = %fill_url, "background cache fill failed");
                    }
                });
            }
            let result = factory.open(source.clone(), options).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx
                    .send(Command::PipelineBuilt {
                        generation,
                        source,
                        result,
                    })
                    .await;
            }
        });

        self.publish_now_playing(true).await;
    }

    async fn handle_pause(&mut self) {
        if !self.snapshot.status.is_active() {
            return;
        }
        if let Some(pipeline) = &self.pipeline {
            if let Err(error) = pipeline.pause().await {
                warn!(%error, "pipeline pause failed");
            }
        }
        self.snapshot.status = PlaybackStatus::Paused;
        self.stop_watchdog();
        self.progress_task = None;
        self.was_playing_before_preemption = false;
        self.pending_play = false;
        if let Some(track) = &self.snapshot.track {
            self.emit(EngineEvent::Playback(PlaybackEvent::Paused {
                track_id: track.id.clone(),
                position_ms: self.position_ms(),
            }));
        }
        self.publish();
        self.publish_now_playing(true).await;
    }

    pub(super) async fn handle_resume(&mut self) {
        let Some(track) = self.snapshot.track.clone() else {
            debug!("resume requested with no track loaded");
            return;
        };
        if self.snapshot.status == PlaybackStatus::Loading {
            return;
        }

        // re-assert audio-session ownership before touching the pipeline
        match self.deps.arbiter.request_role(SessionRole::AmbientMedia) {
            RoleDecision::Granted => {}
            RoleDecision::Denied { held_by } => {
                debug!(
                    held_by = held_by.as_str(),
                    "resume deferred, session held by exclusive role"
                );
                self.emit(EngineEvent::Session(SessionEvent::RoleDenied {
                    requested: SessionRole::AmbientMedia.as_str().to_string(),
                    held_by: held_by.as_str().to_string(),
                }));
                self.was_playing_before_preemption = true;
                if self.snapshot.status != PlaybackStatus::Paused {
                    self.snapshot.status = PlaybackStatus::Paused;
                    self.publish();
                }
                return;
            }
        }

        match self.pipeline.clone() {
            Some(pipeline) => {
                // re-assert intended output state; platforms have been seen
                // zeroing these across interruptions
                if let Err(error) = pipeline.set_muted(self.snapshot.is_muted).await {
                    debug!(%error, "set_muted failed");
                }
                if let Err(error) = pipeline.set_volume(self.snapshot.volume).await {
                    debug!(%error, "set_volume failed");
                }
                if let Err(error) = pipeline.play().await {
                    warn!(%error, "pipeline play failed");
                }
                self.schedule_probe(ProbeKind::ResumeNudge, self.config.resume_nudge_delay);

                let was_paused = self.snapshot.status != PlaybackStatus::Playing;
                self.snapshot.status = PlaybackStatus::Playing;
                if was_paused {
                    self.emit(EngineEvent::Playback(PlaybackEvent::Resumed {
                        track_id: track.id.clone(),
                        position_ms: self.position_ms(),
                    }));
                }
                self.start_watchdog();
                self.start_progress_task();
                self.publish();
                self.publish_now_playing(true).await;
            }
            None => {
                // stopped earlier (or the pipeline faulted while paused);
                // start over from the top of the track
                self.start_playback(track).await;
            }
        }
    }

    async fn handle_seek(&mut self, seconds: f64) {
        if !seconds.is_finite() || self.snapshot.track.is_none() {
            return;
        }
        let max = if self.snapshot.duration_seconds > 0.0 {
            self.snapshot.duration_seconds
        } else {
            f64::MAX
        };
        let target = seconds.clamp(0.0, max);
        if let Some(pipeline) = &self.pipeline {
            if let Err(error) = pipeline.seek(Duration::from_secs_f64(target)).await {
                warn!(%error, "seek failed");
                return;
            }
        }
        // reflect the new target before the next watchdog sample fires, so
        // the jump is never read as a stall
        self.snapshot.position_seconds = target;
        self.watchdog.last_observed_position = target;
        self.watchdog.consecutive_stall_observations = 0;
        self.publish();
        self.publish_now_playing(true).await;
    }

    async fn handle_set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.snapshot.volume = volume;
        if let Some(pipeline) = &self.pipeline {
            if let Err(error) = pipeline.set_volume(volume).await {
                warn!(%error, "set_volume failed");
            }
        }
        self.publish();
    }

    async fn handle_set_muted(&mut self, muted: bool) {
        self.snapshot.is_muted = muted;
        if let Some(pipeline) = &self.pipeline {
            if let Err(error) = pipeline.set_muted(muted).await {
                warn!(%error, "set_muted failed");
            }
        }
        self.publish();
    }

    async fn handle_remote(&mut self, command: RemoteCommand) {
        debug!(?command, "remote transport command");
        match command {
            RemoteCommand::Play => self.reassert_and_resume().await,
            RemoteCommand::Pause => self.handle_pause().await,
            RemoteCommand::TogglePlayPause => {
                if self.snapshot.is_playing() {
                    self.handle_pause().await
                } else {
                    self.reassert_and_resume().await
                }
            }
        }
    }

    // ========================================================================
    // Pipeline completions and signals
    // ========================================================================

    async fn on_pipeline_built(
        &mut self,
        generation: u64,
        source: MediaSource,
        result: bridge_traits::Result<(Arc<dyn RenderPipeline>, mpsc::Receiver<PipelineSignal>)>,
    ) {
        if generation != self.generation {
            if let Ok((pipeline, _rx)) = result {
                debug!("discarding pipeline built for a superseded request");
                if let Err(error) = pipeline.shutdown().await {
                    debug!(%error, "stale pipeline shutdown failed");
                }
            }
            return;
        }

        match result {
            Ok((pipeline, rx)) => {
                self.pipeline = Some(pipeline);
                self.pipeline_rx = Some(rx);
                self.resolved_source = Some(source);
                debug!("render pipeline built, waiting for readiness");
            }
            Err(error) => {
                if !source.is_remote() {
                    // cached bytes would not open; fall back to the network
                    // copy before surfacing anything
                    if let Some(track) = &self.snapshot.track {
                        warn!(%error, "cached source failed to open, falling back to network");
                        let factory = Arc::clone(&self.deps.pipelines);
                        let tx = self.self_tx.clone();
                        let options = self.pipeline_options();
                        let url = track.stream_url.clone();
                        tokio::spawn(async move {
                            let source = MediaSource::RemoteStream { url };
                            let result = factory.open(source.clone(), options).await;
                            if let Some(tx) = tx.upgrade() {
                                let _ = tx
                                    .send(Command::PipelineBuilt {
                                        generation,
                                        source,
                                        result,
                                    })
                                    .await;
                            }
                        });
                        return;
                    }
                }
                self.fail_session(format!("failed to open render pipeline: {error}"))
                    .await;
            }
        }
    }

    async fn on_pipeline_signal(&mut self, signal: PipelineSignal) {
        match signal {
            PipelineSignal::Ready { duration } => {
                let reported = duration.or_else(|| {
                    self.snapshot
                        .track
                        .as_ref()
                        .and_then(|t| t.duration_hint)
                });
                if let Some(duration) = reported {
                    self.snapshot.duration_seconds = duration.as_secs_f64();
                }

                if self.snapshot.status == PlaybackStatus::Loading {
                    if let Some(pipeline) = &self.pipeline {
                        if let Err(error) = pipeline.play().await {
                            warn!(%error, "initial play failed");
                        }
                    }
                    self.snapshot.status = PlaybackStatus::Playing;
                    if let Some(track) = &self.snapshot.track {
                        info!(track_id = %track.id, title = %track.title, "playback started");
                        self.emit(EngineEvent::Playback(PlaybackEvent::Started {
                            track_id: track.id.clone(),
                            title: track.title.clone(),
                        }));
                    }
                    self.start_watchdog();
                    self.start_progress_task();
                    self.publish();
                    self.publish_now_playing(true).await;
                    self.maybe_fetch_artwork();
                } else {
                    if self.snapshot.is_playing() {
                        if let Some(pipeline) = &self.pipeline {
                            if let Err(error) = pipeline.play().await {
                                debug!(%error, "post-ready play failed");
                            }
                        }
                    }
                    self.publish();
                }
            }

            PipelineSignal::EndOfStream => {
                // seamless loop: wrap to the start without leaving Playing
                // and without signaling observers
                if let Some(pipeline) = &self.pipeline {
                    if let Err(error) = pipeline.seek(Duration::ZERO).await {
                        warn!(%error, "loop seek failed");
                    }
                    if let Err(error) = pipeline.play().await {
                        warn!(%error, "loop play failed");
                    }
                }
                self.snapshot.position_seconds = 0.0;
                self.watchdog.last_observed_position = 0.0;
                self.watchdog.consecutive_stall_observations = 0;
                debug!("end of stream, looped to start");
                self.publish();
            }

            PipelineSignal::Faulted { message } => {
                warn!(message = %message, "pipeline fault");
                if !self.snapshot.is_playing() && self.snapshot.status != PlaybackStatus::Loading {
                    // faulted while paused; drop it and rebuild lazily on
                    // the next resume
                    if let Some(pipeline) = self.pipeline.take() {
                        if let Err(error) = pipeline.shutdown().await {
                            debug!(%error, "faulted pipeline shutdown failed");
                        }
                    }
                    self.pipeline_rx = None;
                    return;
                }
                self.watchdog.consecutive_recovery_failures += 1;
                if self.watchdog.consecutive_recovery_failures > self.config.max_recovery_failures
                {
                    self.fail_session(format!("pipeline fault: {message}")).await;
                } else {
                    let position = self.snapshot.position_seconds;
                    self.rebuild_pipeline(position).await;
                }
            }
        }
    }

    // ========================================================================
    // Progress sampling
    // ========================================================================

    pub(super) fn start_progress_task(&mut self) {
        let id = self.next_task_id();
        self.progress_task = Some(TickTask::spawn(
            id,
            self.config.progress_interval,
            self.self_tx.clone(),
            |id| Command::ProgressTick { id },
        ));
    }

    async fn on_progress_tick(&mut self, id: u64) {
        if self.progress_task.as_ref().map(|t| t.id) != Some(id) {
            return;
        }
        if !self.snapshot.is_playing() {
            return;
        }
        let Some(pipeline) = self.pipeline.clone() else {
            return;
        };

        let health = pipeline.health().await;
        let position = health.position.as_secs_f64();
        self.snapshot.position_seconds = if self.snapshot.duration_seconds > 0.0 {
            position.min(self.snapshot.duration_seconds)
        } else {
            position
        };

        if !self.has_recorded_play
            && self.snapshot.position_seconds >= self.config.record_play_threshold.as_secs_f64()
        {
            self.record_play();
        }

        self.publish_now_playing(false).await;
        self.publish();
    }

    /// Fire-and-forget analytics call, once per track per session.
    fn record_play(&mut self) {
        let Some(track) = &self.snapshot.track else {
            return;
        };
        self.has_recorded_play = true;
        let analytics = Arc::clone(&self.deps.analytics);
        let track_id = track.id.clone();
        tokio::spawn(async move {
            match analytics.record_play(&track_id).await {
                Ok(()) => debug!(track_id = %track_id, "play recorded"),
                Err(error) => warn!(%error, track_id = %track_id, "failed to record play"),
            }
        });
    }

    // ========================================================================
    // Role arbitration
    // ========================================================================

    async fn on_role_changed(&mut self, role: SessionRole) {
        if role.preempts_ambient() {
            // pause (never stop) whatever is live or still loading, and
            // remember to come back once the exclusive role releases
            if self.snapshot.status.is_active() {
                info!(by = role.as_str(), "preempted by exclusive audio role, pausing");
                self.was_playing_before_preemption = true;
                if let Some(pipeline) = &self.pipeline {
                    if let Err(error) = pipeline.pause().await {
                        warn!(%error, "pause on preemption failed");
                    }
                }
                self.snapshot.status = PlaybackStatus::Paused;
                self.stop_watchdog();
                self.progress_task = None;
                self.emit(EngineEvent::Session(SessionEvent::Preempted {
                    by: role.as_str().to_string(),
                }));
                self.publish();
                self.publish_now_playing(true).await;
            }
        } else if role == SessionRole::None {
            if self.pending_play {
                info!("exclusive audio role released, starting deferred playback");
                self.pending_play = false;
                if let Some(track) = self.snapshot.track.clone() {
                    self.start_playback(track).await;
                }
            } else if self.was_playing_before_preemption {
                info!("exclusive audio role released, resuming ambient playback");
                self.was_playing_before_preemption = false;
                self.handle_resume().await;
            }
        }
        // role == AmbientMedia is the echo of our own grant; nothing to do
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Synchronous teardown shared by `stop()`, sleep-timer expiry, track
    /// changes, and terminal failures. Idempotent: a second call on a
    /// stopped session is a no-op apart from the (unconditional) role
    /// release.
    pub(super) async fn teardown(&mut self) {
        // deferred-play sessions (paused with no pipeline) never started,
        // so they don't get a Stopped event either
        let was_active =
            self.pipeline.is_some() || self.snapshot.status == PlaybackStatus::Loading;

        // invalidate anything still in flight before touching shared state
        self.generation = self.generation.wrapping_add(1);
        self.recovery_epoch = self.recovery_epoch.wrapping_add(1);
        self.fetch_cancel.cancel();
        self.fetch_cancel = CancellationToken::new();

        self.watchdog_task = None;
        self.progress_task = None;
        self.disarm_sleep_timer();
        self.pipeline_rx = None;
        self.resolved_source = None;
        self.watchdog = WatchdogState::default();
        self.recovery_abandoned = false;
        self.has_recorded_play = false;
        self.was_playing_before_interruption = false;
        self.was_playing_before_preemption = false;
        self.pending_play = false;
        self.now_playing = NowPlayingTracker::default();

        if let Some(pipeline) = self.pipeline.take() {
            if let Err(error) = pipeline.shutdown().await {
                warn!(%error, "pipeline shutdown failed");
            }
        }

        if let Err(error) = self.deps.now_playing.clear().await {
            warn!(%error, "failed to clear now-playing surface");
        }

        if let Some(token) = self.background_grant.take() {
            if let Err(error) = self.deps.background.end(token).await {
                warn!(%error, "failed to release background grant");
            }
        }

        self.deps.arbiter.release_role(SessionRole::AmbientMedia);

        self.snapshot.status = if self.snapshot.track.is_some() {
            PlaybackStatus::Stopped
        } else {
            PlaybackStatus::Idle
        };
        self.snapshot.position_seconds = 0.0;
        self.snapshot.duration_seconds = 0.0;
        self.snapshot.sleep_timer_remaining = None;
        self.publish();

        if was_active {
            if let Some(track) = &self.snapshot.track {
                self.emit(EngineEvent::Playback(PlaybackEvent::Stopped {
                    track_id: track.id.clone(),
                }));
            }
            info!("playback stopped");
        }
    }

    /// Terminal failure: surface it, then tear down.
    pub(super) async fn fail_session(&mut self, message: String) {
        error!(message = %message, "playback failed");
        self.emit(EngineEvent::Playback(PlaybackEvent::Failed {
            track_id: self.snapshot.track.as_ref().map(|t| t.id.clone()),
            message,
        }));
        self.teardown().await;
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    pub(super) fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot.clone());
    }

    pub(super) fn emit(&self, event: EngineEvent) {
        let _ = self.deps.events.emit(event);
    }

    pub(super) fn next_task_id(&mut self) -> u64 {
        self.task_seq += 1;
        self.task_seq
    }

    pub(super) fn position_ms(&self) -> u64 {
        (self.snapshot.position_seconds.max(0.0) * 1000.0) as u64
    }

    pub(super) fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            start_position: Duration::ZERO,
            volume: self.snapshot.volume,
            muted: self.snapshot.is_muted,
            ..PipelineOptions::default()
        }
    }

    /// Schedule a delayed recovery/lifecycle probe. The probe carries the
    /// current generation and recovery epoch and is dropped if either moved
    /// on before it fires.
    pub(super) fn schedule_probe(&self, kind: ProbeKind, delay: Duration) {
        let tx = self.self_tx.clone();
        let generation = self.generation;
        let epoch = self.recovery_epoch;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx
                    .send(Command::RecoveryProbe {
                        generation,
                        epoch,
                        kind,
                    })
                    .await;
            }
        });
    }
}
