//! Shared test doubles and harness wiring for engine integration tests.

#![allow(dead_code)]

use bridge_traits::{
    BackgroundGrant, BridgeError, GrantToken, MediaFetcher, MediaSource, NowPlayingInfo,
    NowPlayingSurface, PipelineFactory, PipelineHealth, PipelineOptions, PipelineSignal,
    PlaybackAnalytics, RenderPipeline,
};
use bytes::Bytes;
use core_playback::{
    EngineDeps, MediaCacheGateway, PlaybackEngine, PlaybackStatus, SessionArbiter, Track,
};
use core_runtime::{EngineConfig, EventBus};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Fake render pipeline
// ============================================================================

struct PipelineState {
    rate: f32,
    position: Duration,
    volume: f32,
    muted: bool,
    /// A frozen pipeline ignores play() and keeps reporting rate 0,
    /// simulating a wedged platform player.
    frozen: bool,
}

pub struct FakePipeline {
    state: Mutex<PipelineState>,
    pub options: PipelineOptions,
    play_calls: AtomicU32,
    pause_calls: AtomicU32,
    seek_calls: AtomicU32,
    shutdown_calls: AtomicU32,
    signals: Mutex<Option<tokio::sync::mpsc::Sender<PipelineSignal>>>,
}

impl FakePipeline {
    pub fn new(
        options: PipelineOptions,
        frozen: bool,
    ) -> (Arc<Self>, tokio::sync::mpsc::Receiver<PipelineSignal>) {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let pipeline = Arc::new(Self {
            state: Mutex::new(PipelineState {
                rate: 0.0,
                position: options.start_position,
                volume: options.volume,
                muted: options.muted,
                frozen,
            }),
            options,
            play_calls: AtomicU32::new(0),
            pause_calls: AtomicU32::new(0),
            seek_calls: AtomicU32::new(0),
            shutdown_calls: AtomicU32::new(0),
            signals: Mutex::new(Some(tx)),
        });
        (pipeline, rx)
    }

    pub fn set_position(&self, position: Duration) {
        self.state.lock().position = position;
    }

    pub fn position(&self) -> Duration {
        self.state.lock().position
    }

    pub fn rate(&self) -> f32 {
        self.state.lock().rate
    }

    pub fn freeze(&self) {
        let mut state = self.state.lock();
        state.frozen = true;
        state.rate = 0.0;
    }

    pub fn unfreeze(&self) {
        let mut state = self.state.lock();
        state.frozen = false;
        state.rate = 1.0;
    }

    pub async fn send_signal(&self, signal: PipelineSignal) {
        let sender = self.signals.lock().clone();
        if let Some(sender) = sender {
            sender.send(signal).await.expect("pipeline signal receiver gone");
        }
    }

    pub fn play_count(&self) -> u32 {
        self.play_calls.load(Ordering::SeqCst)
    }

    pub fn pause_count(&self) -> u32 {
        self.pause_calls.load(Ordering::SeqCst)
    }

    pub fn seek_count(&self) -> u32 {
        self.seek_calls.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> u32 {
        self.shutdown_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RenderPipeline for FakePipeline {
    async fn play(&self) -> bridge_traits::Result<()> {
        self.play_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if !state.frozen {
            state.rate = 1.0;
        }
        Ok(())
    }

    async fn pause(&self) -> bridge_traits::Result<()> {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().rate = 0.0;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> bridge_traits::Result<()> {
        self.seek_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().position = position;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> bridge_traits::Result<()> {
        self.state.lock().volume = volume;
        Ok(())
    }

    async fn set_muted(&self, muted: bool) -> bridge_traits::Result<()> {
        self.state.lock().muted = muted;
        Ok(())
    }

    async fn health(&self) -> PipelineHealth {
        let state = self.state.lock();
        PipelineHealth {
            rate: state.rate,
            position: state.position,
            buffer_empty: state.frozen,
            likely_to_keep_up: !state.frozen,
        }
    }

    async fn shutdown(&self) -> bridge_traits::Result<()> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.rate = 0.0;
        state.frozen = true;
        Ok(())
    }
}

// ============================================================================
// Fake pipeline factory
// ============================================================================

pub struct FakeFactory {
    open_calls: AtomicU32,
    /// Every open() fails.
    pub fail_opens: AtomicBool,
    /// Only opens of non-remote (cached) sources fail.
    pub fail_local_opens: AtomicBool,
    /// New pipelines come up wedged (rate stays 0).
    pub frozen: AtomicBool,
    /// Artificial delay before open() completes.
    pub open_delay: Mutex<Option<Duration>>,
    /// Duration reported by the automatic Ready signal.
    pub ready_duration: Mutex<Option<Duration>>,
    /// Send Ready automatically after each open (default true).
    pub auto_ready: AtomicBool,
    pipelines: Mutex<Vec<Arc<FakePipeline>>>,
    sources: Mutex<Vec<MediaSource>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            open_calls: AtomicU32::new(0),
            fail_opens: AtomicBool::new(false),
            fail_local_opens: AtomicBool::new(false),
            frozen: AtomicBool::new(false),
            open_delay: Mutex::new(None),
            ready_duration: Mutex::new(None),
            auto_ready: AtomicBool::new(true),
            pipelines: Mutex::new(Vec::new()),
            sources: Mutex::new(Vec::new()),
        })
    }

    pub fn open_count(&self) -> u32 {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn last_pipeline(&self) -> Option<Arc<FakePipeline>> {
        self.pipelines.lock().last().cloned()
    }

    pub fn pipeline(&self, index: usize) -> Option<Arc<FakePipeline>> {
        self.pipelines.lock().get(index).cloned()
    }

    pub fn sources(&self) -> Vec<MediaSource> {
        self.sources.lock().clone()
    }
}

#[async_trait::async_trait]
impl PipelineFactory for FakeFactory {
    async fn open(
        &self,
        source: MediaSource,
        options: PipelineOptions,
    ) -> bridge_traits::Result<(
        Arc<dyn RenderPipeline>,
        tokio::sync::mpsc::Receiver<PipelineSignal>,
    )> {
        let delay = *self.open_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.sources.lock().push(source.clone());

        if self.fail_opens.load(Ordering::SeqCst) {
            return Err(BridgeError::AudioUnavailable("open refused".to_string()));
        }
        if self.fail_local_opens.load(Ordering::SeqCst) && !source.is_remote() {
            return Err(BridgeError::AudioUnavailable(
                "cached source rejected".to_string(),
            ));
        }

        let (pipeline, rx) = FakePipeline::new(options, self.frozen.load(Ordering::SeqCst));
        if self.auto_ready.load(Ordering::SeqCst) {
            let duration = *self.ready_duration.lock();
            pipeline.send_signal(PipelineSignal::Ready { duration }).await;
        }
        self.pipelines.lock().push(Arc::clone(&pipeline));
        Ok((pipeline, rx))
    }
}

// ============================================================================
// Other fakes
// ============================================================================

pub struct CountingFetcher {
    calls: AtomicU32,
    data: Bytes,
    pub fail: AtomicBool,
}

impl CountingFetcher {
    pub fn new(data: &'static [u8]) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            data: Bytes::from_static(data),
            fail: AtomicBool::new(false),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MediaFetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> bridge_traits::Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::Network(format!("unreachable: {url}")));
        }
        Ok(self.data.clone())
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    published: Mutex<Vec<NowPlayingInfo>>,
    artwork: Mutex<Vec<Bytes>>,
    clear_calls: AtomicU32,
}

impl RecordingSurface {
    pub fn published(&self) -> Vec<NowPlayingInfo> {
        self.published.lock().clone()
    }

    pub fn artwork_count(&self) -> usize {
        self.artwork.lock().len()
    }

    pub fn clear_count(&self) -> u32 {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NowPlayingSurface for RecordingSurface {
    async fn publish(&self, info: NowPlayingInfo) -> bridge_traits::Result<()> {
        self.published.lock().push(info);
        Ok(())
    }

    async fn publish_artwork(&self, image: Bytes) -> bridge_traits::Result<()> {
        self.artwork.lock().push(image);
        Ok(())
    }

    async fn clear(&self) -> bridge_traits::Result<()> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAnalytics {
    plays: Mutex<Vec<String>>,
}

impl RecordingAnalytics {
    pub fn plays(&self) -> Vec<String> {
        self.plays.lock().clone()
    }
}

#[async_trait::async_trait]
impl PlaybackAnalytics for RecordingAnalytics {
    async fn record_play(&self, track_id: &str) -> bridge_traits::Result<()> {
        self.plays.lock().push(track_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeGrant {
    active: AtomicU32,
    begun: AtomicU32,
}

impl FakeGrant {
    pub fn active(&self) -> u32 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn begun(&self) -> u32 {
        self.begun.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BackgroundGrant for FakeGrant {
    async fn begin(&self, _name: &str) -> bridge_traits::Result<GrantToken> {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(GrantToken::new())
    }

    async fn end(&self, _token: GrantToken) -> bridge_traits::Result<()> {
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub engine: PlaybackEngine,
    pub factory: Arc<FakeFactory>,
    pub media_fetcher: Arc<CountingFetcher>,
    pub artwork_fetcher: Arc<CountingFetcher>,
    pub surface: Arc<RecordingSurface>,
    pub analytics: Arc<RecordingAnalytics>,
    pub grants: Arc<FakeGrant>,
    pub arbiter: Arc<SessionArbiter>,
    pub cache: Arc<MediaCacheGateway>,
    pub events: EventBus,
    _cache_dir: tempfile::TempDir,
}

pub async fn harness() -> Harness {
    harness_with(EngineConfig::default()).await
}

pub async fn harness_with(config: EngineConfig) -> Harness {
    let factory = FakeFactory::new();
    let media_fetcher = CountingFetcher::new(b"media-bytes");
    let artwork_fetcher = CountingFetcher::new(b"artwork-bytes");
    let surface = Arc::new(RecordingSurface::default());
    let analytics = Arc::new(RecordingAnalytics::default());
    let grants = Arc::new(FakeGrant::default());
    let arbiter = Arc::new(SessionArbiter::new());
    let events = EventBus::default();

    let cache_dir = tempfile::tempdir().expect("tempdir");
    let cache = Arc::new(MediaCacheGateway::new(
        cache_dir.path().join("media"),
        media_fetcher.clone() as Arc<dyn MediaFetcher>,
    ));
    cache.initialize().await.expect("cache init");

    let deps = EngineDeps {
        pipelines: factory.clone(),
        cache: cache.clone(),
        arbiter: arbiter.clone(),
        now_playing: surface.clone(),
        artwork: artwork_fetcher.clone(),
        analytics: analytics.clone(),
        background: grants.clone(),
        events: events.clone(),
    };
    let engine = PlaybackEngine::spawn(deps, config).expect("spawn engine");

    Harness {
        engine,
        factory,
        media_fetcher,
        artwork_fetcher,
        surface,
        analytics,
        grants,
        arbiter,
        cache,
        events,
        _cache_dir: cache_dir,
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Track {id}"),
        stream_url: format!("https://cdn.example.com/{id}.m4a"),
        artwork_url: None,
        duration_hint: None,
    }
}

pub fn track_with_artwork(id: &str) -> Track {
    Track {
        artwork_url: Some(format!("https://cdn.example.com/{id}.jpg")),
        ..track(id)
    }
}

/// Poll `pred` until it holds, driving timers and spawned tasks along.
/// Gives up after ~30 seconds of (virtual or real) time.
pub async fn wait_until(what: &str, mut pred: impl FnMut() -> bool) {
    for _ in 0..600 {
        if pred() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {what}");
}

pub async fn wait_for_status(engine: &PlaybackEngine, status: PlaybackStatus) {
    for _ in 0..600 {
        if engine.snapshot().status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "engine never reached {:?}, currently {:?}",
        status,
        engine.snapshot().status
    );
}

/// Let queued messages and spawned tasks drain.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}

/// Drain every event currently buffered on a bus subscription.
pub fn drain_events(
    rx: &mut tokio::sync::broadcast::Receiver<core_runtime::EngineEvent>,
) -> Vec<core_runtime::EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
