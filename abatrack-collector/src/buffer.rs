//! Local session buffer
//!
//! Every UI action lands here first: the visible tallies update
//! immediately and an outbound event is appended to the matching queue,
//! stamped with the instant the action happened. Flushing is someone
//! else's job ([`crate::sync`]); the buffer itself never touches the
//! network, which keeps collection responsive with no connectivity.
//!
//! Callers pass `now` explicitly so timer math is deterministic.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use abatrack_common::model::{BehaviorEventType, NewBehaviorEvent, NewSkillEvent, SkillEventType};

/// Running percent-correct tally for one skill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkillTally {
    pub correct: u32,
    pub total: u32,
}

impl SkillTally {
    /// Display label; "0%" before any trial is recorded
    pub fn label(&self) -> String {
        if self.total == 0 {
            "0%".to_string()
        } else {
            format!(
                "{}%",
                (self.correct as f64 / self.total as f64 * 100.0).round() as i64
            )
        }
    }
}

/// In-memory state for one client's session in progress
#[derive(Debug, Default)]
pub struct SessionBuffer {
    counts: HashMap<Uuid, i64>,
    running: HashMap<Uuid, DateTime<Utc>>,
    total_seconds: HashMap<Uuid, i64>,
    tallies: HashMap<Uuid, SkillTally>,
    behavior_queue: Vec<NewBehaviorEvent>,
    skill_queue: Vec<NewSkillEvent>,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_behavior(
        &mut self,
        behavior_id: Uuid,
        event_type: BehaviorEventType,
        value: Option<i64>,
        now: DateTime<Utc>,
    ) {
        self.behavior_queue.push(NewBehaviorEvent {
            behavior_id,
            event_type,
            value,
            happened_at: Some(now),
            extra: None,
        });
    }

    /// FREQUENCY: count one occurrence
    pub fn increment(&mut self, behavior_id: Uuid, now: DateTime<Utc>) {
        *self.counts.entry(behavior_id).or_default() += 1;
        self.queue_behavior(behavior_id, BehaviorEventType::Inc, Some(1), now);
    }

    /// FREQUENCY: undo one occurrence
    ///
    /// The clamp is display-only: the visible count never goes below
    /// zero, but a DEC event is queued unconditionally so the durable
    /// record reflects every correction the observer made.
    pub fn decrement(&mut self, behavior_id: Uuid, now: DateTime<Utc>) {
        let count = self.counts.entry(behavior_id).or_default();
        *count = (*count - 1).max(0);
        self.queue_behavior(behavior_id, BehaviorEventType::Dec, Some(-1), now);
    }

    /// FREQUENCY display count (never negative)
    pub fn count(&self, behavior_id: Uuid) -> i64 {
        self.counts.get(&behavior_id).copied().unwrap_or(0)
    }

    /// DURATION: start the timer; a second start while running is ignored
    pub fn start_timer(&mut self, behavior_id: Uuid, now: DateTime<Utc>) {
        if self.running.contains_key(&behavior_id) {
            return;
        }
        self.running.insert(behavior_id, now);
        self.queue_behavior(behavior_id, BehaviorEventType::Start, None, now);
    }

    /// DURATION: stop the timer and record the elapsed block
    ///
    /// Elapsed is rounded to whole seconds with a floor of 1, so even a
    /// tap-stop registers. Stop without a running timer is a no-op.
    pub fn stop_timer(&mut self, behavior_id: Uuid, now: DateTime<Utc>) {
        let Some(started) = self.running.remove(&behavior_id) else {
            return;
        };
        let elapsed = elapsed_seconds(started, now);
        *self.total_seconds.entry(behavior_id).or_default() += elapsed;
        self.queue_behavior(behavior_id, BehaviorEventType::Stop, Some(elapsed), now);
    }

    /// DURATION: stop every running timer (used at session end)
    pub fn stop_all_timers(&mut self, now: DateTime<Utc>) {
        let running: Vec<Uuid> = self.running.keys().copied().collect();
        for behavior_id in running {
            self.stop_timer(behavior_id, now);
        }
    }

    /// When the timer started, if it is running
    pub fn running_since(&self, behavior_id: Uuid) -> Option<DateTime<Utc>> {
        self.running.get(&behavior_id).copied()
    }

    /// Accumulated seconds across stopped blocks
    pub fn total_seconds(&self, behavior_id: Uuid) -> i64 {
        self.total_seconds.get(&behavior_id).copied().unwrap_or(0)
    }

    /// INTERVAL/MTS: record one interval hit
    pub fn record_hit(&mut self, behavior_id: Uuid, now: DateTime<Utc>) {
        *self.counts.entry(behavior_id).or_default() += 1;
        self.queue_behavior(behavior_id, BehaviorEventType::Hit, None, now);
    }

    /// HIT display tally. Lives in buffer state, not the queue, so a
    /// mid-session flush does not reset what the observer sees.
    pub fn hits(&self, behavior_id: Uuid) -> i64 {
        self.count(behavior_id)
    }

    fn queue_skill(&mut self, skill_id: Uuid, event_type: SkillEventType, now: DateTime<Utc>) {
        self.skill_queue.push(NewSkillEvent {
            skill_id,
            event_type,
            happened_at: Some(now),
        });
    }

    /// Record a correct trial
    pub fn mark_correct(&mut self, skill_id: Uuid, now: DateTime<Utc>) {
        let tally = self.tallies.entry(skill_id).or_default();
        tally.correct += 1;
        tally.total += 1;
        self.queue_skill(skill_id, SkillEventType::Correct, now);
    }

    /// Record an incorrect trial
    pub fn mark_wrong(&mut self, skill_id: Uuid, now: DateTime<Utc>) {
        self.tallies.entry(skill_id).or_default().total += 1;
        self.queue_skill(skill_id, SkillEventType::Wrong, now);
    }

    /// Running tally for a skill
    pub fn tally(&self, skill_id: Uuid) -> SkillTally {
        self.tallies.get(&skill_id).copied().unwrap_or_default()
    }

    /// Outbound behavior events not yet accepted by the store
    pub fn behavior_queue(&self) -> &[NewBehaviorEvent] {
        &self.behavior_queue
    }

    /// Outbound skill events not yet accepted by the store
    pub fn skill_queue(&self) -> &[NewSkillEvent] {
        &self.skill_queue
    }

    /// Anything still waiting to be flushed?
    pub fn has_pending(&self) -> bool {
        !self.behavior_queue.is_empty() || !self.skill_queue.is_empty()
    }

    /// Remove the first `n` behavior events after the store accepted them.
    /// Events queued during the flush keep their place.
    pub fn drain_behavior_prefix(&mut self, n: usize) {
        self.behavior_queue.drain(..n.min(self.behavior_queue.len()));
    }

    /// Remove the first `n` skill events after the store accepted them
    pub fn drain_skill_prefix(&mut self, n: usize) {
        self.skill_queue.drain(..n.min(self.skill_queue.len()));
    }

    /// Throw away all local state, queues included (client switch)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Whole-second rounding with a floor of one second
fn elapsed_seconds(started: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (now - started).num_milliseconds().max(0);
    ((ms as f64 / 1000.0).round() as i64).max(1)
}
