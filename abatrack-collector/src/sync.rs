//! Queue flushing and retry policy
//!
//! Two flush modes share the same plumbing:
//! - the autosave loop runs every [`AUTOSAVE_INTERVAL`] and is best
//!   effort: a failure logs a warning and the queue stays put for the
//!   next tick;
//! - the terminal flush at session end goes through [`with_retry`],
//!   which allows [`FLUSH_ATTEMPTS`] tries with exponential backoff
//!   before giving up.
//!
//! A flush snapshots the queue, posts the snapshot, and drains exactly
//! that prefix on success. Events recorded while the post was in flight
//! stay queued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::buffer::SessionBuffer;
use crate::error::Result;
use crate::store::EventStore;

/// Cadence of the best-effort autosave loop
pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(60);

/// Attempts allowed for the terminal flush
pub const FLUSH_ATTEMPTS: u32 = 3;

/// First retry delay; doubles on each subsequent attempt
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(600);

/// Retry a store operation with exponential backoff.
///
/// Deterministic rejections (4xx) fail immediately; only transport-level
/// failures are retried. Backoff sequence for 3 attempts: 600ms, 1200ms.
pub async fn with_retry<F, Fut, T>(operation_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut delay = RETRY_BASE_DELAY;

    for attempt in 1..=FLUSH_ATTEMPTS {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Store operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_retryable() && attempt < FLUSH_ATTEMPTS => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Store operation failed, will retry after backoff"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => {
                tracing::error!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Store operation failed"
                );
                return Err(err);
            }
        }
    }

    unreachable!("loop returns on final attempt")
}

/// Push the queued behavior events once; drain the posted prefix on success
pub async fn flush_behavior_events<S: EventStore>(
    store: &S,
    session_id: Uuid,
    buffer: &Mutex<SessionBuffer>,
) -> Result<usize> {
    let snapshot = {
        let buf = buffer.lock().await;
        buf.behavior_queue().to_vec()
    };
    if snapshot.is_empty() {
        return Ok(0);
    }

    let created = store.post_behavior_events(session_id, &snapshot).await?;
    buffer.lock().await.drain_behavior_prefix(snapshot.len());
    Ok(created)
}

/// Push the queued skill events once; drain the posted prefix on success
pub async fn flush_skill_events<S: EventStore>(
    store: &S,
    session_id: Uuid,
    buffer: &Mutex<SessionBuffer>,
) -> Result<usize> {
    let snapshot = {
        let buf = buffer.lock().await;
        buf.skill_queue().to_vec()
    };
    if snapshot.is_empty() {
        return Ok(0);
    }

    let created = store.post_skill_events(session_id, &snapshot).await?;
    buffer.lock().await.drain_skill_prefix(snapshot.len());
    Ok(created)
}

/// One best-effort autosave pass: failures are logged and swallowed,
/// the queues keep their events for the next tick.
pub async fn autosave_once<S: EventStore>(
    store: &S,
    session_id: Uuid,
    buffer: &Mutex<SessionBuffer>,
) {
    if let Err(err) = flush_behavior_events(store, session_id, buffer).await {
        tracing::warn!(session_id = %session_id, error = %err, "Autosave: behavior flush failed");
    }
    if let Err(err) = flush_skill_events(store, session_id, buffer).await {
        tracing::warn!(session_id = %session_id, error = %err, "Autosave: skill flush failed");
    }
}

/// Spawn the periodic autosave loop for an open session.
///
/// Each pass runs under `flush_lock`; the terminal flush acquires the
/// same lock before aborting this task, so a pass is never cancelled
/// between the store accepting a batch and the queue being drained
/// (cancelling there would re-post accepted events).
pub fn spawn_autosave<S>(
    store: Arc<S>,
    session_id: Uuid,
    buffer: Arc<Mutex<SessionBuffer>>,
    flush_lock: Arc<Mutex<()>>,
) -> tokio::task::JoinHandle<()>
where
    S: EventStore + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(AUTOSAVE_INTERVAL);
        // First tick fires immediately; skip it so the first flush
        // happens one full interval after the session opens.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let _guard = flush_lock.lock().await;
            autosave_once(store.as_ref(), session_id, &buffer).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectorError;
    use crate::testing::RecordingStore;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn t0() -> DateTime<Utc> {
        "2026-08-20T15:00:00Z".parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn retry_backs_off_600_then_1200_ms() {
        let attempts = AtomicU32::new(0);
        let started = Instant::now();

        let result = with_retry("test flush", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(CollectorError::Unavailable("offline".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // 600ms + 1200ms of (auto-advanced) backoff
        assert_eq!(started.elapsed(), Duration::from_millis(1800));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_three_attempts() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = with_retry("test flush", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(CollectorError::Unavailable("offline".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_are_retried() {
        let attempts = AtomicU32::new(0);

        let result = with_retry("test flush", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(CollectorError::Rejected {
                        status: 503,
                        message: "Service Unavailable".to_string(),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = with_retry("test flush", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CollectorError::Rejected {
                    status: 409,
                    message: "Session is already ended".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn flush_drains_only_acknowledged_prefix() {
        let store = RecordingStore::new();
        let session_id = Uuid::new_v4();
        let behavior = Uuid::new_v4();
        let buffer = Mutex::new(SessionBuffer::new());

        {
            let mut buf = buffer.lock().await;
            buf.increment(behavior, t0());
            buf.increment(behavior, t0());
        }

        let created = flush_behavior_events(&store, session_id, &buffer)
            .await
            .unwrap();
        assert_eq!(created, 2);
        assert!(buffer.lock().await.behavior_queue().is_empty());
        assert_eq!(store.behavior_posts(), 1);

        // Nothing queued: no post at all
        let created = flush_behavior_events(&store, session_id, &buffer)
            .await
            .unwrap();
        assert_eq!(created, 0);
        assert_eq!(store.behavior_posts(), 1);
    }

    #[tokio::test]
    async fn failed_flush_keeps_the_queue() {
        let store = RecordingStore::new();
        store.fail_behavior_posts(1);
        let session_id = Uuid::new_v4();
        let behavior = Uuid::new_v4();
        let buffer = Mutex::new(SessionBuffer::new());

        buffer.lock().await.increment(behavior, t0());

        let result = flush_behavior_events(&store, session_id, &buffer).await;
        assert!(result.is_err());
        assert_eq!(buffer.lock().await.behavior_queue().len(), 1);

        // Next pass succeeds and drains
        flush_behavior_events(&store, session_id, &buffer)
            .await
            .unwrap();
        assert!(buffer.lock().await.behavior_queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retried_flush_submits_exactly_once_on_success() {
        let store = RecordingStore::new();
        store.fail_behavior_posts(1);
        let session_id = Uuid::new_v4();
        let behavior = Uuid::new_v4();
        let buffer = Mutex::new(SessionBuffer::new());

        buffer.lock().await.increment(behavior, t0());

        with_retry("terminal behavior flush", || {
            flush_behavior_events(&store, session_id, &buffer)
        })
        .await
        .unwrap();

        // Two attempts, one acceptance, empty queue
        assert_eq!(store.behavior_posts(), 2);
        assert_eq!(store.accepted_behavior().len(), 1);
        assert!(buffer.lock().await.behavior_queue().is_empty());
    }

    #[tokio::test]
    async fn autosave_once_swallows_failures() {
        let store = RecordingStore::new();
        store.fail_behavior_posts(1);
        store.fail_skill_posts(1);
        let session_id = Uuid::new_v4();
        let buffer = Mutex::new(SessionBuffer::new());

        {
            let mut buf = buffer.lock().await;
            buf.increment(Uuid::new_v4(), t0());
            buf.mark_correct(Uuid::new_v4(), t0());
        }

        autosave_once(&store, session_id, &buffer).await;
        let buf = buffer.lock().await;
        assert_eq!(buf.behavior_queue().len(), 1);
        assert_eq!(buf.skill_queue().len(), 1);
    }
}
