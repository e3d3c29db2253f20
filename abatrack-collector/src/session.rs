//! Session lifecycle
//!
//! One runner drives one client's session at a time:
//!
//! ```text
//! NoSession --start--> Open --save_and_exit--> Ending --success--> Closed
//!                       ^                         |
//!                       +------- failure ---------+
//! ```
//!
//! Ending flushes in a fixed order, each step retried independently:
//! behavior queue, then skill queue, then the end call. A queue is
//! drained only when the store accepts it, so a failure part-way leaves
//! the remaining work queued and drops the runner back to Open with
//! nothing lost; the operator can retry.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use abatrack_common::model::BehaviorSession;

use crate::buffer::SessionBuffer;
use crate::error::{CollectorError, Result};
use crate::store::EventStore;
use crate::sync;

/// Lifecycle phase of the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session open; collection controls are inert
    NoSession,
    /// Collecting; autosave loop is running
    Open,
    /// Terminal flush in progress
    Ending,
    /// Session durably ended
    Closed,
}

/// Drives one session against a durable store
pub struct SessionRunner<S> {
    store: Arc<S>,
    buffer: Arc<Mutex<SessionBuffer>>,
    // Serializes autosave passes with the terminal flush; held before
    // the autosave task is aborted so no pass dies mid-post
    flush_lock: Arc<Mutex<()>>,
    session: Option<BehaviorSession>,
    phase: SessionPhase,
    autosave: Option<tokio::task::JoinHandle<()>>,
}

impl<S> SessionRunner<S>
where
    S: EventStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            buffer: Arc::new(Mutex::new(SessionBuffer::new())),
            flush_lock: Arc::new(Mutex::new(())),
            session: None,
            phase: SessionPhase::NoSession,
            autosave: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The open session's id, if any
    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Shared handle to the local buffer (display reads)
    pub fn buffer(&self) -> Arc<Mutex<SessionBuffer>> {
        Arc::clone(&self.buffer)
    }

    fn accepts_events(&self) -> bool {
        self.phase == SessionPhase::Open
    }

    // Collection actions. Each is a silent no-op unless a session is
    // open, so stray UI events can never produce orphan records.

    pub async fn increment(&self, behavior_id: Uuid, now: DateTime<Utc>) {
        if self.accepts_events() {
            self.buffer.lock().await.increment(behavior_id, now);
        }
    }

    pub async fn decrement(&self, behavior_id: Uuid, now: DateTime<Utc>) {
        if self.accepts_events() {
            self.buffer.lock().await.decrement(behavior_id, now);
        }
    }

    pub async fn start_timer(&self, behavior_id: Uuid, now: DateTime<Utc>) {
        if self.accepts_events() {
            self.buffer.lock().await.start_timer(behavior_id, now);
        }
    }

    pub async fn stop_timer(&self, behavior_id: Uuid, now: DateTime<Utc>) {
        if self.accepts_events() {
            self.buffer.lock().await.stop_timer(behavior_id, now);
        }
    }

    pub async fn record_hit(&self, behavior_id: Uuid, now: DateTime<Utc>) {
        if self.accepts_events() {
            self.buffer.lock().await.record_hit(behavior_id, now);
        }
    }

    pub async fn mark_correct(&self, skill_id: Uuid, now: DateTime<Utc>) {
        if self.accepts_events() {
            self.buffer.lock().await.mark_correct(skill_id, now);
        }
    }

    pub async fn mark_wrong(&self, skill_id: Uuid, now: DateTime<Utc>) {
        if self.accepts_events() {
            self.buffer.lock().await.mark_wrong(skill_id, now);
        }
    }

    fn stop_autosave(&mut self) {
        if let Some(handle) = self.autosave.take() {
            handle.abort();
        }
    }

    /// Open a session for a client and start the autosave loop.
    ///
    /// Valid from NoSession or Closed. The buffer is reset first; any
    /// state from a previous session does not bleed into the new one.
    pub async fn start(&mut self, client_id: Uuid, date: NaiveDate) -> Result<Uuid> {
        match self.phase {
            SessionPhase::NoSession | SessionPhase::Closed => {}
            other => {
                return Err(CollectorError::State(format!(
                    "Cannot start a session from {:?}",
                    other
                )))
            }
        }

        let session = self.store.start_session(client_id, date).await?;
        let session_id = session.id;
        tracing::info!(session_id = %session_id, client_id = %client_id, "Session opened");

        self.buffer.lock().await.reset();
        self.session = Some(session);
        self.phase = SessionPhase::Open;
        self.autosave = Some(sync::spawn_autosave(
            Arc::clone(&self.store),
            session_id,
            Arc::clone(&self.buffer),
            Arc::clone(&self.flush_lock),
        ));

        Ok(session_id)
    }

    /// Switch away from the current client, discarding unsaved state.
    ///
    /// Queued events that never reached the store are dropped; this is
    /// the one deliberate loss path and it requires an explicit call.
    pub async fn select_client(&mut self) {
        self.stop_autosave();
        let mut buf = self.buffer.lock().await;
        if buf.has_pending() {
            tracing::warn!(
                session_id = ?self.session_id(),
                "Discarding unsaved events on client switch"
            );
        }
        buf.reset();
        drop(buf);
        self.session = None;
        self.phase = SessionPhase::NoSession;
    }

    /// Signal the intent to end the session (confirm/cancel step).
    /// No network effect; collection controls go inert until the
    /// intent is confirmed or cancelled.
    pub fn request_end(&mut self) -> Result<()> {
        if self.phase != SessionPhase::Open {
            return Err(CollectorError::State(format!(
                "Cannot request end from {:?}",
                self.phase
            )));
        }
        self.phase = SessionPhase::Ending;
        Ok(())
    }

    /// Back out of a requested end. Queued events are untouched.
    pub fn cancel_end(&mut self) -> Result<()> {
        if self.phase != SessionPhase::Ending {
            return Err(CollectorError::State(format!(
                "Cannot cancel end from {:?}",
                self.phase
            )));
        }
        self.phase = SessionPhase::Open;
        Ok(())
    }

    /// Terminal flush: stop running timers, push both queues, end the
    /// session. Each step gets its own bounded retries; any step failing
    /// after retries returns the runner to Open (autosave restarted) with
    /// every unacknowledged event still queued.
    ///
    /// Callable straight from Open; going through [`request_end`]
    /// first is the UI's confirm step, not a requirement of the store.
    ///
    /// [`request_end`]: Self::request_end
    pub async fn save_and_exit(&mut self, now: DateTime<Utc>) -> Result<BehaviorSession> {
        if !matches!(self.phase, SessionPhase::Open | SessionPhase::Ending) {
            return Err(CollectorError::State(format!(
                "Cannot save and exit from {:?}",
                self.phase
            )));
        }
        let session_id = self.session_id().ok_or(CollectorError::NoSession)?;

        self.phase = SessionPhase::Ending;

        // Wait out any autosave pass in flight before stopping the
        // task: aborting between the store accepting a batch and the
        // queue drain would re-post those events later.
        let flush_lock = Arc::clone(&self.flush_lock);
        let _flush_guard = flush_lock.lock().await;
        self.stop_autosave();

        self.buffer.lock().await.stop_all_timers(now);

        let result = self.run_terminal_flush(session_id).await;
        match result {
            Ok(session) => {
                self.phase = SessionPhase::Closed;
                self.session = Some(session.clone());
                tracing::info!(session_id = %session_id, "Session saved and ended");
                Ok(session)
            }
            Err(err) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %err,
                    "Terminal flush failed, session stays open"
                );
                self.phase = SessionPhase::Open;
                self.autosave = Some(sync::spawn_autosave(
                    Arc::clone(&self.store),
                    session_id,
                    Arc::clone(&self.buffer),
                    Arc::clone(&self.flush_lock),
                ));
                Err(err)
            }
        }
    }

    async fn run_terminal_flush(&self, session_id: Uuid) -> Result<BehaviorSession> {
        sync::with_retry("terminal behavior flush", || {
            sync::flush_behavior_events(self.store.as_ref(), session_id, &self.buffer)
        })
        .await?;

        sync::with_retry("terminal skill flush", || {
            sync::flush_skill_events(self.store.as_ref(), session_id, &self.buffer)
        })
        .await?;

        sync::with_retry("end session", || self.store.end_session(session_id)).await
    }
}

impl<S> Drop for SessionRunner<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.autosave.take() {
            handle.abort();
        }
    }
}
