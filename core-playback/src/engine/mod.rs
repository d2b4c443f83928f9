//! # Playback Engine
//!
//! Public handle and dependency wiring for the playback actor. One engine
//! instance drives one ambient track at a time; construct it once at startup
//! with [`PlaybackEngine::spawn`] and share clones of the handle.
//!
//! Every command is a message into the actor task, so callers never contend
//! on playback state. `stop()` is special: it acknowledges only after the
//! actor finished synchronous teardown (pipeline shutdown, timer and
//! watchdog cancellation, fetch cancellation, role release, now-playing
//! clear), making it observably terminal.

mod actor;
mod lifecycle;
mod now_playing;
mod recovery;
mod sleep;

use crate::cache::MediaCacheGateway;
use crate::error::{EngineError, Result};
use crate::session::SessionArbiter;
use crate::state::{PlaybackSnapshot, Track};
use actor::{Command, EngineActor};
use bridge_traits::{
    BackgroundGrant, LifecycleSignal, MediaFetcher, NowPlayingSurface, PipelineFactory,
    PlaybackAnalytics, RemoteCommand,
};
use core_runtime::{EngineConfig, EngineEvent, EventBus};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Command channel depth. Commands are small and handled quickly; the
/// buffer only absorbs bursts of timer ticks and lifecycle signals.
const COMMAND_BUFFER: usize = 64;

/// Collaborators injected into the engine at construction. There are no
/// ambient globals; everything the engine touches arrives here.
pub struct EngineDeps {
    /// Builds render pipelines (host bridge).
    pub pipelines: Arc<dyn PipelineFactory>,
    /// Resolves track URLs to local or remote byte sources.
    pub cache: Arc<MediaCacheGateway>,
    /// Process-wide audio role token, shared with every audio producer.
    pub arbiter: Arc<SessionArbiter>,
    /// OS now-playing surface.
    pub now_playing: Arc<dyn NowPlayingSurface>,
    /// Artwork fetcher (usually the same HTTP stack the cache uses).
    pub artwork: Arc<dyn MediaFetcher>,
    /// Best-effort play recording.
    pub analytics: Arc<dyn PlaybackAnalytics>,
    /// Bounded background-execution windows.
    pub background: Arc<dyn BackgroundGrant>,
    /// Bus carrying discrete engine events.
    pub events: EventBus,
}

/// Cloneable handle to the playback actor.
#[derive(Clone)]
pub struct PlaybackEngine {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<PlaybackSnapshot>,
    arbiter: Arc<SessionArbiter>,
    events: EventBus,
}

impl PlaybackEngine {
    /// Validate `config` and spawn the engine actor on the current tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Fails if the configuration does not validate.
    pub fn spawn(deps: EngineDeps, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(PlaybackSnapshot::default());
        let arbiter = Arc::clone(&deps.arbiter);
        let events = deps.events.clone();

        let actor = EngineActor::new(deps, config, command_rx, commands.downgrade(), snapshot_tx);
        tokio::spawn(actor.run());

        Ok(Self {
            commands,
            snapshot: snapshot_rx,
            arbiter,
            events,
        })
    }

    /// Start playing `track`. If the same track is already loaded and merely
    /// paused or stopped, playback resumes in place instead of rebuilding.
    pub async fn play(&self, track: Track) -> Result<()> {
        self.send(Command::Play(track)).await
    }

    /// Pause playback, keeping the pipeline and position.
    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    /// Resume paused playback, re-asserting audio-session ownership first.
    pub async fn resume(&self) -> Result<()> {
        self.send(Command::Resume).await
    }

    /// Seek to an absolute position in seconds, clamped to the known
    /// duration.
    pub async fn seek(&self, seconds: f64) -> Result<()> {
        self.send(Command::Seek(seconds)).await
    }

    /// Stop playback and tear the session down. Returns once teardown has
    /// completed; no stale async completion can mutate state afterwards.
    pub async fn stop(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::Stop(Some(ack_tx))).await?;
        ack_rx.await.map_err(|_| EngineError::EngineShutDown)
    }

    /// Set output volume in `[0.0, 1.0]`.
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(Command::SetVolume(volume)).await
    }

    /// Mute or unmute output.
    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.send(Command::SetMuted(muted)).await
    }

    /// Arm the sleep timer; any existing timer is replaced. On expiry the
    /// engine stops exactly as if [`stop`](Self::stop) had been called.
    pub async fn set_sleep_timer(&self, minutes: u32) -> Result<()> {
        self.send(Command::SetSleepTimer { minutes }).await
    }

    /// Cancel the sleep timer, if armed.
    pub async fn cancel_sleep_timer(&self) -> Result<()> {
        self.send(Command::CancelSleepTimer).await
    }

    /// Route a platform remote transport command into the engine.
    pub async fn remote_command(&self, command: RemoteCommand) -> Result<()> {
        self.send(Command::Remote(command)).await
    }

    /// Deliver a system lifecycle signal. Hosts publish every signal here;
    /// the engine's router is the single consumer.
    pub async fn deliver(&self, signal: LifecycleSignal) -> Result<()> {
        self.send(Command::Lifecycle(signal)).await
    }

    /// Observe playback state. The receiver always holds the latest
    /// snapshot; changes are push-delivered.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.clone()
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to discrete engine events.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// The shared session arbiter, for other audio producers in the
    /// process.
    pub fn arbiter(&self) -> &Arc<SessionArbiter> {
        &self.arbiter
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| EngineError::EngineShutDown)
    }
}
