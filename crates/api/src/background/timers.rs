//! One-off in-process transition timers.
//!
//! A timer sleeps until its target instant (plus the configured skew) and
//! then sends its [`TimerKey`] to the runner, which calls the release
//! service. Timers live only in memory; the daily sweep re-arms whatever a
//! restart dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use accessgate_core::scheduling::ScheduleClock;
use accessgate_core::types::{DbId, Timestamp};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::release::ReleaseService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduledTransition {
    Activate,
    Expire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub release_id: DbId,
    pub transition: ScheduledTransition,
}

struct PendingTimer {
    generation: u64,
    handle: AbortHandle,
}

type PendingMap = Arc<Mutex<HashMap<TimerKey, PendingTimer>>>;

pub struct TransitionTimers {
    clock: ScheduleClock,
    sender: mpsc::UnboundedSender<TimerKey>,
    pending: PendingMap,
    generation: AtomicU64,
    cancel: CancellationToken,
}

impl TransitionTimers {
    /// Create the timer set and the receiving end the runner consumes.
    pub fn new(
        clock: ScheduleClock,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<TimerKey>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let timers = Self {
            clock,
            sender,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            cancel,
        };
        (timers, receiver)
    }

    pub fn clock(&self) -> &ScheduleClock {
        &self.clock
    }

    /// Arm (or re-arm) the timer for `transition` of `release_id`.
    ///
    /// Re-registering the same key replaces the previous timer.
    pub fn schedule(&self, release_id: DbId, transition: ScheduledTransition, target: Timestamp) {
        let key = TimerKey {
            release_id,
            transition,
        };
        let delay = self.clock.delay_until(target, Utc::now());
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);

        let sender = self.sender.clone();
        let pending = Arc::clone(&self.pending);
        let cancel = self.cancel.clone();

        let mut map = lock(&self.pending);
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if sender.send(key).is_err() {
                tracing::warn!(release_id, ?transition, "Timer runner gone, dropping transition");
            }
            let mut map = lock(&pending);
            if map.get(&key).is_some_and(|t| t.generation == generation) {
                map.remove(&key);
            }
        });

        if let Some(previous) = map.insert(
            key,
            PendingTimer {
                generation,
                handle: task.abort_handle(),
            },
        ) {
            previous.handle.abort();
        }

        tracing::debug!(
            release_id,
            ?transition,
            target = %target,
            delay_ms = delay.as_millis() as u64,
            "Transition timer armed"
        );
    }

    /// Drop both timers of a release that reached a terminal status.
    pub fn cancel_release(&self, release_id: DbId) {
        let mut map = lock(&self.pending);
        for transition in [ScheduledTransition::Activate, ScheduledTransition::Expire] {
            if let Some(timer) = map.remove(&TimerKey {
                release_id,
                transition,
            }) {
                timer.handle.abort();
            }
        }
    }

    pub fn is_pending(&self, release_id: DbId, transition: ScheduledTransition) -> bool {
        lock(&self.pending).contains_key(&TimerKey {
            release_id,
            transition,
        })
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Abort every armed timer.
    pub fn shutdown(&self) {
        let mut map = lock(&self.pending);
        for (_, timer) in map.drain() {
            timer.handle.abort();
        }
    }
}

/// The map is only touched in short non-async sections, so a poisoned lock
/// still holds consistent data.
fn lock(pending: &PendingMap) -> std::sync::MutexGuard<'_, HashMap<TimerKey, PendingTimer>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Consume fired timers and apply their transitions until cancelled.
pub async fn run(
    service: ReleaseService,
    mut fired: mpsc::UnboundedReceiver<TimerKey>,
    cancel: CancellationToken,
) {
    tracing::info!("Transition timer runner started");

    loop {
        let key = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Transition timer runner stopping");
                break;
            }
            key = fired.recv() => match key {
                Some(key) => key,
                None => break,
            },
        };

        let result = match key.transition {
            ScheduledTransition::Activate => service.activate_on_schedule(key.release_id).await,
            ScheduledTransition::Expire => service.expire_on_schedule(key.release_id).await,
        };

        match result {
            Ok(release) => tracing::debug!(
                release_id = key.release_id,
                transition = ?key.transition,
                status_id = release.status_id,
                "Timer transition applied"
            ),
            Err(e) => tracing::error!(
                release_id = key.release_id,
                transition = ?key.transition,
                error = %e,
                "Timer transition failed"
            ),
        }
    }
}
