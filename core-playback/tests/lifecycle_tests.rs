//! Lifecycle routing tests: background grants, the foreground/background
//! recovery split on category changes, route-loss recovery, and the
//! artwork fetch policy.

mod support;

use bridge_traits::{LifecycleSignal, RouteChangeReason};
use core_playback::{PlaybackStatus, SessionRole};
use std::time::Duration;
use support::{harness, track, track_with_artwork, wait_for_status, wait_until};

#[tokio::test(start_paused = true)]
async fn background_grant_is_taken_and_released() {
    let h = harness().await;
    h.engine.play(track("rain")).await.unwrap();
    wait_for_status(&h.engine, PlaybackStatus::Playing).await;
    assert_eq!(h.grants.active(), 0);

    h.engine
        .deliver(LifecycleSignal::AppEnteredBackground)
        .await
        .unwrap();
    wait_until("grant taken", || h.grants.active() == 1).await;

    h.engine
        .deliver(LifecycleSignal::AppWillEnterForeground)
        .await
        .unwrap();
    wait_until("grant released", || h.grants.active() == 0).await;
    assert_eq!(h.grants.begun(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_releases_an_outstanding_background_grant() {
    let h = harness().await;
    h.engine.play(track("rain")).await.unwrap();
    wait_for_status(&h.engine, PlaybackStatus::Playing).await;

    h.engine
        .deliver(LifecycleSignal::AppEnteredBackground)
        .await
        .unwrap();
    wait_until("grant taken", || h.grants.active() == 1).await;

    h.engine.stop().await.unwrap();
    assert_eq!(h.grants.active(), 0);
}

#[tokio::test(start_paused = true)]
async fn category_change_in_foreground_reasserts_the_role() {
    let h = harness().await;
    h.engine.play(track("rain")).await.unwrap();
    wait_for_status(&h.engine, PlaybackStatus::Playing).await;

    // another component dropped our session out from under us
    h.arbiter.release_role(SessionRole::AmbientMedia);
    support::settle().await;
    assert_eq!(h.arbiter.current_role(), SessionRole::None);

    h.engine
        .deliver(LifecycleSignal::RouteChanged {
            reason: RouteChangeReason::CategoryChanged,
        })
        .await
        .unwrap();
    wait_until("role re-acquired", || {
        h.arbiter.current_role() == SessionRole::AmbientMedia
    })
    .await;
    assert_eq!(h.engine.snapshot().status, PlaybackStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn category_change_in_background_only_nudges_the_pipeline() {
    let h = harness().await;
    h.engine.play(track("rain")).await.unwrap();
    wait_for_status(&h.engine, PlaybackStatus::Playing).await;

    h.engine
        .deliver(LifecycleSignal::AppEnteredBackground)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    h.arbiter.release_role(SessionRole::AmbientMedia);
    support::settle().await;
    let pipeline = h.factory.last_pipeline().unwrap();
    let plays_before = pipeline.play_count();

    h.engine
        .deliver(LifecycleSignal::RouteChanged {
            reason: RouteChangeReason::CategoryChanged,
        })
        .await
        .unwrap();
    wait_until("pipeline nudged", || pipeline.play_count() > plays_before).await;

    // no session re-negotiation happened from the background
    assert_eq!(h.arbiter.current_role(), SessionRole::None);
}

#[tokio::test(start_paused = true)]
async fn device_loss_reasserts_and_resumes() {
    let h = harness().await;
    h.engine.play(track("rain")).await.unwrap();
    wait_for_status(&h.engine, PlaybackStatus::Playing).await;
    let pipeline = h.factory.last_pipeline().unwrap();
    let plays_before = pipeline.play_count();

    h.engine
        .deliver(LifecycleSignal::RouteChanged {
            reason: RouteChangeReason::DeviceUnavailable,
        })
        .await
        .unwrap();
    wait_until("resume issued", || pipeline.play_count() > plays_before).await;
    assert_eq!(h.engine.snapshot().status, PlaybackStatus::Playing);
    assert_eq!(h.arbiter.current_role(), SessionRole::AmbientMedia);
}

#[tokio::test(start_paused = true)]
async fn artwork_is_fetched_once_per_track_in_foreground() {
    let h = harness().await;
    h.engine.play(track_with_artwork("rain")).await.unwrap();
    wait_for_status(&h.engine, PlaybackStatus::Playing).await;

    wait_until("artwork fetched", || h.artwork_fetcher.call_count() == 1).await;
    wait_until("artwork published", || h.surface.artwork_count() == 1).await;

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(h.artwork_fetcher.call_count(), 1);
    assert_eq!(h.surface.artwork_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn artwork_fetch_waits_for_foreground() {
    let h = harness().await;
    h.engine
        .deliver(LifecycleSignal::AppEnteredBackground)
        .await
        .unwrap();
    support::settle().await;

    h.engine.play(track_with_artwork("rain")).await.unwrap();
    wait_for_status(&h.engine, PlaybackStatus::Playing).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.artwork_fetcher.call_count(), 0);

    h.engine
        .deliver(LifecycleSignal::AppWillEnterForeground)
        .await
        .unwrap();
    wait_until("artwork fetched after foreground", || {
        h.artwork_fetcher.call_count() == 1
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn silence_hint_end_resumes_playback() {
    let h = harness().await;
    h.engine.play(track("rain")).await.unwrap();
    wait_for_status(&h.engine, PlaybackStatus::Playing).await;
    let pipeline = h.factory.last_pipeline().unwrap();

    h.engine
        .deliver(LifecycleSignal::SecondaryAudioSilence { silenced: true })
        .await
        .unwrap();
    support::settle().await;

    let plays_before = pipeline.play_count();
    h.engine
        .deliver(LifecycleSignal::SecondaryAudioSilence { silenced: false })
        .await
        .unwrap();
    wait_until("resume after hint end", || {
        pipeline.play_count() > plays_before
    })
    .await;
    assert_eq!(h.engine.snapshot().status, PlaybackStatus::Playing);
}
