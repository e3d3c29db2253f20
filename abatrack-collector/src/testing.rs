//! In-memory store fake for engine tests
//!
//! Records every accepted batch and can be told to fail the next N calls
//! of each kind with a retryable error, which is how the offline paths
//! are exercised without a network.

use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use abatrack_common::model::{BehaviorSession, NewBehaviorEvent, NewSkillEvent};

use crate::error::{CollectorError, Result};
use crate::store::EventStore;

#[derive(Default)]
struct Inner {
    behavior_posts: u32,
    skill_posts: u32,
    end_calls: u32,
    fail_behavior: u32,
    fail_skill: u32,
    fail_end: u32,
    behavior_post_delay: Option<std::time::Duration>,
    accepted_behavior: Vec<NewBehaviorEvent>,
    accepted_skill: Vec<NewSkillEvent>,
    ended: Vec<Uuid>,
}

#[derive(Default)]
pub(crate) struct RecordingStore {
    inner: Mutex<Inner>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` behavior posts with a retryable error
    pub fn fail_behavior_posts(&self, n: u32) {
        self.inner.lock().unwrap().fail_behavior = n;
    }

    pub fn fail_skill_posts(&self, n: u32) {
        self.inner.lock().unwrap().fail_skill = n;
    }

    pub fn fail_end_calls(&self, n: u32) {
        self.inner.lock().unwrap().fail_end = n;
    }

    /// Make every behavior post take this long (simulates a slow link)
    pub fn delay_behavior_posts(&self, delay: std::time::Duration) {
        self.inner.lock().unwrap().behavior_post_delay = Some(delay);
    }

    /// Behavior post attempts, failed ones included
    pub fn behavior_posts(&self) -> u32 {
        self.inner.lock().unwrap().behavior_posts
    }

    pub fn end_calls(&self) -> u32 {
        self.inner.lock().unwrap().end_calls
    }

    pub fn accepted_behavior(&self) -> Vec<NewBehaviorEvent> {
        self.inner.lock().unwrap().accepted_behavior.clone()
    }

    pub fn accepted_skill(&self) -> Vec<NewSkillEvent> {
        self.inner.lock().unwrap().accepted_skill.clone()
    }

    pub fn ended(&self) -> Vec<Uuid> {
        self.inner.lock().unwrap().ended.clone()
    }
}

fn offline() -> CollectorError {
    CollectorError::Unavailable("simulated outage".to_string())
}

impl EventStore for RecordingStore {
    async fn start_session(&self, client_id: Uuid, _date: NaiveDate) -> Result<BehaviorSession> {
        Ok(BehaviorSession {
            id: Uuid::new_v4(),
            client_id,
            started_at: Utc::now(),
            ended_at: None,
        })
    }

    async fn post_behavior_events(
        &self,
        _session_id: Uuid,
        events: &[NewBehaviorEvent],
    ) -> Result<usize> {
        let delay = self.inner.lock().unwrap().behavior_post_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.behavior_posts += 1;
        if inner.fail_behavior > 0 {
            inner.fail_behavior -= 1;
            return Err(offline());
        }
        inner.accepted_behavior.extend_from_slice(events);
        Ok(events.len())
    }

    async fn post_skill_events(&self, _session_id: Uuid, events: &[NewSkillEvent]) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.skill_posts += 1;
        if inner.fail_skill > 0 {
            inner.fail_skill -= 1;
            return Err(offline());
        }
        inner.accepted_skill.extend_from_slice(events);
        Ok(events.len())
    }

    async fn end_session(&self, session_id: Uuid) -> Result<BehaviorSession> {
        let mut inner = self.inner.lock().unwrap();
        inner.end_calls += 1;
        if inner.fail_end > 0 {
            inner.fail_end -= 1;
            return Err(offline());
        }
        inner.ended.push(session_id);
        Ok(BehaviorSession {
            id: session_id,
            client_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: Some(Utc::now()),
        })
    }
}
