use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::{task::JoinHandle, time::Instant};
use uuid::Uuid;

use super::debounce::Debouncer;
use super::tracker::ViewportMeasurement;
use crate::domain::models::{
    Percent, PersistenceOutcome, ProgressKey, ReadingProgressRecord,
};
use crate::storage::{LocalCache, ProgressCache, ProgressStore};

pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Inactivity required before a remote save is sent.
    pub save_debounce: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            save_debounce: DEFAULT_SAVE_DEBOUNCE,
        }
    }
}

struct SessionState {
    percent: Percent,
    completed: bool,
    /// Last value the remote store confirmed.
    last_saved: Option<Percent>,
    /// Whether the latest local cache write succeeded.
    local_synced: bool,
    debounce: Debouncer<Percent>,
    timer: Option<JoinHandle<()>>,
    /// Set once the session handle is gone; no new timers after that.
    closed: bool,
}

impl SessionState {
    fn cancel_timer(&mut self) {
        self.debounce.cancel();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct Shared {
    id: Uuid,
    key: ProgressKey,
    cache: Arc<dyn LocalCache>,
    remote: Arc<dyn ProgressStore>,
    state: Mutex<SessionState>,
    /// Held for the whole remote write; at most one save is in flight.
    save_gate: tokio::sync::Mutex<()>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sets the current value and mirrors it to the local cache. Never fails.
    fn apply(&self, state: &mut SessionState, percent: Percent) {
        state.percent = percent;
        if percent.is_complete() {
            state.completed = true;
        }
        self.write_local(state);
    }

    fn write_local(&self, state: &mut SessionState) {
        let record = ReadingProgressRecord::new(&self.key, state.percent, state.completed);
        match ProgressCache::new(self.cache.as_ref()).save(&record) {
            Ok(()) => state.local_synced = true,
            Err(e) => {
                state.local_synced = false;
                tracing::warn!(session = %self.id, key = %self.key, error = %e, "local cache write failed");
            }
        }
    }

    fn schedule(self: &Arc<Self>, state: &mut SessionState) {
        if state.last_saved == Some(state.percent) {
            // the latest value is already stored remotely; anything pending is stale
            state.cancel_timer();
            return;
        }
        let deadline = state.debounce.schedule(state.percent, Instant::now());
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.timer = Some(spawn_timer(Arc::clone(self), deadline));
    }

    async fn save_now(self: &Arc<Self>) -> PersistenceOutcome {
        let percent = {
            let mut state = self.lock_state();
            state.cancel_timer();
            state.percent
        };
        self.persist(percent).await
    }

    async fn persist(self: &Arc<Self>, percent: Percent) -> PersistenceOutcome {
        let _gate = self.save_gate.lock().await;
        let local_ok = {
            let mut state = self.lock_state();
            if state.last_saved == Some(percent) {
                tracing::debug!(session = %self.id, %percent, "skipping save; value already stored");
                return PersistenceOutcome::Saved;
            }
            if !state.local_synced {
                self.write_local(&mut state);
            }
            state.local_synced
        };

        match self.remote.store(&self.key, percent).await {
            Ok(()) => {
                let mut state = self.lock_state();
                state.last_saved = Some(percent);
                tracing::debug!(session = %self.id, key = %self.key, %percent, "progress saved");
                if state.percent == percent {
                    // a window opened during the write would only resend this value
                    state.cancel_timer();
                } else if !state.closed && state.debounce.pending().is_none() {
                    // the reader moved while this write was in flight
                    self.schedule(&mut state);
                }
                PersistenceOutcome::Saved
            }
            Err(e) => {
                tracing::warn!(session = %self.id, key = %self.key, %percent, error = %e, "remote save failed; progress kept locally");
                if local_ok {
                    PersistenceOutcome::SavedLocalOnly
                } else {
                    PersistenceOutcome::Failed
                }
            }
        }
    }
}

fn spawn_timer(shared: Arc<Shared>, deadline: Instant) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;
        let due = {
            let mut state = shared.lock_state();
            let due = state.debounce.fire(Instant::now());
            if due.is_some() {
                // detach: from here on the save must not be cancelled by a new update
                state.timer = None;
            }
            due
        };
        if let Some(percent) = due {
            let outcome = shared.persist(percent).await;
            tracing::debug!(session = %shared.id, %percent, outcome = outcome.as_str(), "debounced save finished");
        }
    })
}

/// Reading state of one chapter, mirrored to the local cache immediately and to the
/// remote store after a quiet period.
///
/// Must be used from within a tokio runtime: scheduling a remote save spawns a timer task.
pub struct ReadingSession {
    shared: Arc<Shared>,
}

impl ReadingSession {
    /// Hydrates from the remote store, then the local cache, then zero.
    #[tracing::instrument(level = "debug", skip(key, cache, remote, policy), fields(key = %key))]
    pub async fn open(
        key: ProgressKey,
        cache: Arc<dyn LocalCache>,
        remote: Arc<dyn ProgressStore>,
        policy: SyncPolicy,
    ) -> Self {
        let (percent, completed, last_saved) = match remote.fetch(&key).await {
            Ok(Some(found)) => (
                found.percent,
                found.completed || found.percent.is_complete(),
                Some(found.percent),
            ),
            Ok(None) => {
                tracing::debug!("no remote progress; falling back to local cache");
                Self::cached(&key, cache.as_ref())
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote hydration failed; falling back to local cache");
                Self::cached(&key, cache.as_ref())
            }
        };

        let id = Uuid::new_v4();
        tracing::info!(session = %id, %percent, completed, "reading session opened");
        let state = SessionState {
            percent,
            completed,
            last_saved,
            local_synced: true,
            debounce: Debouncer::new(policy.save_debounce),
            timer: None,
            closed: false,
        };
        ReadingSession {
            shared: Arc::new(Shared {
                id,
                key,
                cache,
                remote,
                state: Mutex::new(state),
                save_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn cached(key: &ProgressKey, cache: &dyn LocalCache) -> (Percent, bool, Option<Percent>) {
        match ProgressCache::new(cache).load(key) {
            Some(record) => (
                record.percent,
                record.completed || record.percent.is_complete(),
                None,
            ),
            None => (Percent::ZERO, false, None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn key(&self) -> &ProgressKey {
        &self.shared.key
    }

    pub fn percent(&self) -> Percent {
        self.shared.lock_state().percent
    }

    /// Sticky for the session once 95% has been reached.
    pub fn is_completed(&self) -> bool {
        self.shared.lock_state().completed
    }

    pub fn last_saved(&self) -> Option<Percent> {
        self.shared.lock_state().last_saved
    }

    /// The current value has not been confirmed by the remote store.
    pub fn is_unsaved(&self) -> bool {
        let state = self.shared.lock_state();
        state.last_saved != Some(state.percent)
    }

    /// Value waiting for the debounce window, if any.
    pub fn pending(&self) -> Option<Percent> {
        self.shared.lock_state().debounce.pending()
    }

    pub fn record(&self) -> ReadingProgressRecord {
        let state = self.shared.lock_state();
        ReadingProgressRecord::new(&self.shared.key, state.percent, state.completed)
    }

    /// Clamps, writes through to the local cache and (re)starts the debounce window.
    ///
    /// Lower values are accepted as-is: the latest position wins.
    pub fn update_progress(&self, percent: i64) {
        let percent = Percent::clamped(percent);
        let mut state = self.shared.lock_state();
        self.shared.apply(&mut state, percent);
        self.shared.schedule(&mut state);
        tracing::trace!(session = %self.shared.id, %percent, "progress updated");
    }

    pub fn reset_progress(&self) {
        self.update_progress(0);
    }

    /// Saves the current value immediately, cancelling any pending debounced save.
    pub async fn save_now(&self) -> PersistenceOutcome {
        self.shared.save_now().await
    }

    pub async fn mark_completed(&self) -> PersistenceOutcome {
        {
            let mut state = self.shared.lock_state();
            self.shared.apply(&mut state, Percent::FULL);
        }
        self.shared.save_now().await
    }

    /// Feeds one scroll measurement through the tracker.
    ///
    /// Measurements taken before the viewport reaches the content are ignored so a
    /// freshly loaded page does not wipe hydrated progress. Reaching the completion
    /// threshold marks the chapter completed and returns that save's outcome.
    pub async fn observe(&self, measurement: &ViewportMeasurement) -> Option<PersistenceOutcome> {
        if measurement.viewport_top < measurement.content_top {
            return None;
        }
        let sample = measurement.sample();
        if sample.completed {
            Some(self.mark_completed().await)
        } else {
            self.update_progress(i64::from(sample.percent.value()));
            None
        }
    }

    /// Flushes a final save on a detached task and returns at once.
    pub fn leave(self) -> JoinHandle<PersistenceOutcome> {
        let shared = Arc::clone(&self.shared);
        tracing::debug!(session = %shared.id, "leaving chapter; flushing progress");
        tokio::spawn(async move { shared.save_now().await })
    }
}

impl Drop for ReadingSession {
    fn drop(&mut self) {
        let mut state = self.shared.lock_state();
        state.closed = true;
        state.cancel_timer();
    }
}
