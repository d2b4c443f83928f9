//! Stall-watchdog tests: the escalation ladder, counter resets, the
//! background exclusion, and the media-services-reset rebuild path.
//!
//! All tests run on virtual time; a "wedged" pipeline is a FakePipeline
//! frozen so `play()` never brings its rate back above zero.

mod support;

use bridge_traits::LifecycleSignal;
use core_playback::PlaybackStatus;
use core_runtime::{EngineEvent, RecoveryEvent};
use std::sync::atomic::Ordering;
use std::time::Duration;
use support::{harness, track, wait_for_status, wait_until};

#[tokio::test(start_paused = true)]
async fn recovery_ladder_escalates_and_then_abandons() {
    let h = harness().await;
    h.factory.frozen.store(true, Ordering::SeqCst);

    let mut events = h.engine.events();
    h.engine.play(track("rain")).await.unwrap();
    wait_for_status(&h.engine, PlaybackStatus::Playing).await;
    let first = h.factory.last_pipeline().unwrap();
    let plays_at_start = first.play_count();

    // Two samples (~10s) confirm the stall; the first remedy is a soft
    // resume against the existing pipeline, not a rebuild.
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(h.factory.open_count(), 1);
    assert!(
        first.play_count() > plays_at_start,
        "soft resume must be attempted before any rebuild"
    );

    // Third stalled sample: second soft-resume failure, so the ladder
    // escalates to a full pipeline rebuild.
    wait_until("first rebuild", || h.factory.open_count() == 2).await;

    // The rebuilt pipeline is wedged too; one more confirmed stall round
    // brings the third consecutive failure and a second rebuild.
    wait_until("second rebuild", || h.factory.open_count() == 3).await;

    // Ceiling reached: auto-recovery shuts off for the session.
    wait_until("recovery abandoned", || {
        support::drain_events(&mut events)
            .into_iter()
            .any(|e| matches!(e, EngineEvent::Recovery(RecoveryEvent::Abandoned { failures: 3 })))
    })
    .await;

    // and stays off
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.factory.open_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn advancing_sample_resets_the_ladder() {
    let h = harness().await;
    h.engine.play(track("rain")).await.unwrap();
    wait_for_status(&h.engine, PlaybackStatus::Playing).await;
    let pipeline = h.factory.last_pipeline().unwrap();

    let mut events = h.engine.events();

    // One stalled sample only, then the pipeline comes back to life.
    pipeline.freeze();
    tokio::time::sleep(Duration::from_secs(6)).await;
    pipeline.unfreeze();
    tokio::time::sleep(Duration::from_secs(25)).await;

    assert_eq!(h.factory.open_count(), 1);
    let recovery_events = support::drain_events(&mut events)
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::Recovery(_)))
        .count();
    assert_eq!(
        recovery_events, 0,
        "a single transient blip must not trigger recovery"
    );
}

#[tokio::test(start_paused = true)]
async fn watchdog_is_disabled_while_backgrounded() {
    let h = harness().await;
    h.engine.play(track("rain")).await.unwrap();
    wait_for_status(&h.engine, PlaybackStatus::Playing).await;
    let pipeline = h.factory.last_pipeline().unwrap();

    h.engine
        .deliver(LifecycleSignal::AppEnteredBackground)
        .await
        .unwrap();
    // let the defensive background nudge and its delayed re-play drain
    tokio::time::sleep(Duration::from_secs(1)).await;

    let mut events = h.engine.events();
    pipeline.freeze();
    let plays_backgrounded = pipeline.play_count();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(pipeline.play_count(), plays_backgrounded);
    assert!(support::drain_events(&mut events)
        .into_iter()
        .all(|e| !matches!(e, EngineEvent::Recovery(_))));

    // foreground return re-arms the watchdog; recovery starts biting again
    h.engine
        .deliver(LifecycleSignal::AppWillEnterForeground)
        .await
        .unwrap();
    wait_until("recovery resumes in foreground", || {
        support::drain_events(&mut events).into_iter().any(|e| {
            matches!(e, EngineEvent::Recovery(RecoveryEvent::SoftResumeAttempted { .. }))
        })
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn media_services_reset_rebuilds_at_last_position() {
    let h = harness().await;
    *h.factory.ready_duration.lock() = Some(Duration::from_secs(600));

    h.engine.play(track("rain")).await.unwrap();
    wait_for_status(&h.engine, PlaybackStatus::Playing).await;

    h.factory
        .last_pipeline()
        .unwrap()
        .set_position(Duration::from_secs(12));
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.engine.snapshot().position_seconds >= 12.0);

    h.engine
        .deliver(LifecycleSignal::MediaServicesReset)
        .await
        .unwrap();
    wait_until("pipeline rebuilt", || h.factory.open_count() == 2).await;

    let rebuilt = h.factory.pipeline(1).unwrap();
    assert_eq!(rebuilt.options.start_position, Duration::from_secs(12));
    assert_eq!(h.engine.snapshot().status, PlaybackStatus::Playing);
}
