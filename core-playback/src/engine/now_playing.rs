//! Now-playing mirroring, throttled.
//!
//! Metadata goes out on every track change and transport change; artwork is
//! fetched at most once per track and only while foregrounded; elapsed/rate
//! fields go out at most once per ~5 seconds of elapsed playback. The
//! artwork fetch is generation-guarded like every other async boundary.

use super::actor::{Command, EngineActor};
use bridge_traits::{AppState, NowPlayingInfo};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-track publisher bookkeeping.
#[derive(Debug, Default)]
pub(super) struct NowPlayingTracker {
    pub(super) last_pushed_elapsed: f64,
    pub(super) loaded_artwork_url: Option<String>,
    pub(super) artwork_in_flight: bool,
}

impl EngineActor {
    /// Push metadata and transport fields to the surface. `force` bypasses
    /// the elapsed-time throttle (track changes, pause/resume, seeks).
    pub(super) async fn publish_now_playing(&mut self, force: bool) {
        let Some(track) = self.snapshot.track.clone() else {
            return;
        };
        let elapsed = self.snapshot.position_seconds;
        if !force
            && elapsed - self.now_playing.last_pushed_elapsed
                < self.config.now_playing_refresh.as_secs_f64()
        {
            return;
        }

        let info = NowPlayingInfo {
            title: track.title.clone(),
            artist: self.config.now_playing_artist.clone(),
            album: self.config.now_playing_album.clone(),
            duration: (self.snapshot.duration_seconds > 0.0)
                .then(|| Duration::from_secs_f64(self.snapshot.duration_seconds)),
            elapsed: Duration::from_secs_f64(elapsed.max(0.0)),
            rate: if self.snapshot.is_playing() { 1.0 } else { 0.0 },
        };
        if let Err(error) = self.deps.now_playing.publish(info).await {
            warn!(%error, "now-playing publish failed");
        }
        self.now_playing.last_pushed_elapsed = elapsed;
    }

    /// Kick off the artwork fetch unless this track's artwork is already
    /// loaded or in flight. Never fetches while backgrounded.
    pub(super) fn maybe_fetch_artwork(&mut self) {
        let Some(track) = &self.snapshot.track else {
            return;
        };
        let Some(url) = track.artwork_url.clone() else {
            return;
        };
        if self.app_state == AppState::Background {
            debug!("backgrounded, deferring artwork fetch");
            return;
        }
        if self.now_playing.loaded_artwork_url.as_deref() == Some(url.as_str())
            || self.now_playing.artwork_in_flight
        {
            return;
        }
        self.now_playing.artwork_in_flight = true;

        let fetcher = Arc::clone(&self.deps.artwork);
        let tx = self.self_tx.clone();
        let generation = self.generation;
        let cancel = self.fetch_cancel.clone();
        tokio::spawn(async move {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                fetched = fetcher.fetch(&url) => fetched,
            };
            match fetched {
                Ok(data) => {
                    if let Some(tx) = tx.upgrade() {
                        let _ = tx
                            .send(Command::ArtworkFetched {
                                generation,
                                url,
                                data,
                            })
                            .await;
                    }
                }
                Err(error) => warn!(%error, "artwork fetch failed"),
            }
        });
    }

    pub(super) async fn on_artwork(&mut self, generation: u64, url: String, data: Bytes) {
        if generation != self.generation {
            return; // a newer play()/stop() reset the tracker already
        }
        self.now_playing.artwork_in_flight = false;
        let current = self
            .snapshot
            .track
            .as_ref()
            .and_then(|t| t.artwork_url.as_deref());
        if current != Some(url.as_str()) {
            return;
        }
        if let Err(error) = self.deps.now_playing.publish_artwork(data).await {
            warn!(%error, "artwork publish failed");
        } else {
            self.now_playing.loaded_artwork_url = Some(url);
            debug!("artwork published");
        }
    }
}
