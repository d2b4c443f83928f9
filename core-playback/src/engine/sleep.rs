//! Sleep timer: a cancellable one-shot deadline with a 1-second countdown.
//!
//! The deadline and the countdown are one spawned task publishing ticks and
//! a terminal expiry message into the actor. Cancellation aborts the task;
//! messages already queued from a replaced timer are filtered by id, which
//! also makes expiry idempotent with a concurrent manual `stop()`.

use super::actor::{Command, EngineActor};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Armed sleep timer. Dropping it aborts the countdown task.
pub(super) struct SleepTimer {
    pub(super) id: u64,
    pub(super) total_seconds: u32,
    pub(super) remaining_seconds: u32,
    handle: JoinHandle<()>,
}

impl Drop for SleepTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl EngineActor {
    /// Arm a timer for `minutes`, replacing any existing one.
    pub(super) fn arm_sleep_timer(&mut self, minutes: u32) {
        self.disarm_sleep_timer();
        if minutes == 0 {
            warn!("ignoring zero-length sleep timer");
            return;
        }

        let id = self.next_task_id();
        let total = minutes.saturating_mul(60);
        let tick_period = self.config.sleep_timer_tick;
        let tx = self.self_tx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // consume the immediate first tick
            for elapsed in 1..=total {
                ticker.tick().await;
                let Some(tx) = tx.upgrade() else { return };
                let remaining = total - elapsed;
                if tx.send(Command::SleepTick { id, remaining }).await.is_err() {
                    return;
                }
            }
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::SleepExpired { id }).await;
            }
        });

        self.sleep_timer = Some(SleepTimer {
            id,
            total_seconds: total,
            remaining_seconds: total,
            handle,
        });
        self.snapshot.sleep_timer_remaining = Some(total);
        self.publish();
        info!(minutes, "sleep timer armed");
    }

    /// Cancel the timer and clear its observable state.
    pub(super) fn disarm_sleep_timer(&mut self) {
        if self.sleep_timer.take().is_some() {
            info!("sleep timer cancelled");
        }
        if self.snapshot.sleep_timer_remaining.take().is_some() {
            self.publish();
        }
    }

    pub(super) fn on_sleep_tick(&mut self, id: u64, remaining: u32) {
        let Some(timer) = self.sleep_timer.as_mut() else {
            return;
        };
        if timer.id != id {
            return;
        }
        timer.remaining_seconds = remaining;
        debug!(remaining, total = timer.total_seconds, "sleep timer tick");
        self.snapshot.sleep_timer_remaining = Some(remaining);
        self.publish();
    }

    pub(super) async fn on_sleep_expired(&mut self, id: u64) {
        if self.sleep_timer.as_ref().map(|t| t.id) != Some(id) {
            return; // a manual stop or cancel got there first
        }
        info!("sleep timer expired, stopping playback");
        self.sleep_timer = None;
        self.snapshot.sleep_timer_remaining = None;
        self.teardown().await;
    }
}
