//! Domain model: clients, behaviors, skills, sessions, events
//!
//! Events are immutable once recorded; sessions are "open" while
//! `ended_at` is null and only open sessions accept new events.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actor role supplied by the identity collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Board Certified Behavior Analyst (may review, analyze, delete)
    Bcba,
    /// Registered Behavior Technician (may collect)
    Rbt,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Bcba => "BCBA",
            Role::Rbt => "RBT",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BCBA" => Ok(Role::Bcba),
            "RBT" => Ok(Role::Rbt),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown role: {}",
                other
            ))),
        }
    }
}

/// Behavior data-collection method, fixed at behavior creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CollectionMethod {
    /// Net count of occurrences (INC/DEC events)
    Frequency,
    /// Cumulative elapsed seconds (START/STOP events)
    Duration,
    /// Partial/whole-interval occurrence (HIT events)
    Interval,
    /// Momentary time sampling occurrence (HIT events)
    Mts,
}

impl CollectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionMethod::Frequency => "FREQUENCY",
            CollectionMethod::Duration => "DURATION",
            CollectionMethod::Interval => "INTERVAL",
            CollectionMethod::Mts => "MTS",
        }
    }

    /// INTERVAL and MTS require `interval_seconds` in behavior settings
    pub fn requires_interval_seconds(&self) -> bool {
        matches!(self, CollectionMethod::Interval | CollectionMethod::Mts)
    }
}

impl std::str::FromStr for CollectionMethod {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FREQUENCY" => Ok(CollectionMethod::Frequency),
            "DURATION" => Ok(CollectionMethod::Duration),
            "INTERVAL" => Ok(CollectionMethod::Interval),
            "MTS" => Ok(CollectionMethod::Mts),
            other => Err(crate::Error::InvalidInput(format!(
                "Invalid method: {}. Use FREQUENCY | DURATION | INTERVAL | MTS",
                other
            ))),
        }
    }
}

/// Behavior event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BehaviorEventType {
    Inc,
    Dec,
    Start,
    Stop,
    Hit,
}

impl BehaviorEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorEventType::Inc => "INC",
            BehaviorEventType::Dec => "DEC",
            BehaviorEventType::Start => "START",
            BehaviorEventType::Stop => "STOP",
            BehaviorEventType::Hit => "HIT",
        }
    }

    /// Whether this event type is valid for a behavior collected with `method`.
    ///
    /// Enforced at durable insert: INC/DEC pair with FREQUENCY, START/STOP
    /// with DURATION, HIT with INTERVAL/MTS.
    pub fn valid_for(&self, method: CollectionMethod) -> bool {
        match self {
            BehaviorEventType::Inc | BehaviorEventType::Dec => {
                method == CollectionMethod::Frequency
            }
            BehaviorEventType::Start | BehaviorEventType::Stop => {
                method == CollectionMethod::Duration
            }
            BehaviorEventType::Hit => {
                matches!(method, CollectionMethod::Interval | CollectionMethod::Mts)
            }
        }
    }
}

impl std::str::FromStr for BehaviorEventType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INC" => Ok(BehaviorEventType::Inc),
            "DEC" => Ok(BehaviorEventType::Dec),
            "START" => Ok(BehaviorEventType::Start),
            "STOP" => Ok(BehaviorEventType::Stop),
            "HIT" => Ok(BehaviorEventType::Hit),
            other => Err(crate::Error::InvalidInput(format!(
                "Invalid behavior event type: {}",
                other
            ))),
        }
    }
}

/// Skill event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SkillEventType {
    Correct,
    Wrong,
}

impl SkillEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillEventType::Correct => "CORRECT",
            SkillEventType::Wrong => "WRONG",
        }
    }
}

impl std::str::FromStr for SkillEventType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CORRECT" => Ok(SkillEventType::Correct),
            "WRONG" => Ok(SkillEventType::Wrong),
            other => Err(crate::Error::InvalidInput(format!(
                "Invalid skill event type: {}",
                other
            ))),
        }
    }
}

/// Skill acquisition category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SkillType {
    Lr,
    Mand,
    Tact,
    Iv,
    Mi,
    Play,
    Vp,
    Adl,
    Soc,
    Acad,
    Other,
}

impl SkillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillType::Lr => "LR",
            SkillType::Mand => "MAND",
            SkillType::Tact => "TACT",
            SkillType::Iv => "IV",
            SkillType::Mi => "MI",
            SkillType::Play => "PLAY",
            SkillType::Vp => "VP",
            SkillType::Adl => "ADL",
            SkillType::Soc => "SOC",
            SkillType::Acad => "ACAD",
            SkillType::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for SkillType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LR" => Ok(SkillType::Lr),
            "MAND" => Ok(SkillType::Mand),
            "TACT" => Ok(SkillType::Tact),
            "IV" => Ok(SkillType::Iv),
            "MI" => Ok(SkillType::Mi),
            "PLAY" => Ok(SkillType::Play),
            "VP" => Ok(SkillType::Vp),
            "ADL" => Ok(SkillType::Adl),
            "SOC" => Ok(SkillType::Soc),
            "ACAD" => Ok(SkillType::Acad),
            "OTHER" => Ok(SkillType::Other),
            other => Err(crate::Error::InvalidInput(format!(
                "Invalid skill type: {}",
                other
            ))),
        }
    }
}

/// A client receiving services; owns behaviors, skills and sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub birthdate: NaiveDate,
    pub info: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A target behavior tracked with one collection method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Behavior {
    pub id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub method: CollectionMethod,
    /// Method-specific settings, e.g. `interval_seconds` for INTERVAL/MTS
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// An acquisition target tracked as percent of trials correct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Always "PERCENTAGE" on the wire
    pub method: String,
    pub skill_type: SkillType,
    pub created_at: DateTime<Utc>,
}

/// One timed block of data collection for one client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorSession {
    pub id: Uuid,
    pub client_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl BehaviorSession {
    /// A session accepts new events only while open
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Immutable behavior observation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub id: Uuid,
    pub session_id: Uuid,
    pub behavior_id: Uuid,
    pub event_type: BehaviorEventType,
    /// ±1 for INC/DEC, elapsed seconds for STOP
    pub value: Option<i64>,
    pub happened_at: DateTime<Utc>,
    pub extra: Option<serde_json::Value>,
}

/// Immutable skill trial record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEvent {
    pub id: Uuid,
    pub session_id: Uuid,
    pub skill_id: Uuid,
    pub event_type: SkillEventType,
    pub happened_at: DateTime<Utc>,
}

/// Outbound behavior event, queued client-side before it has a durable id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBehaviorEvent {
    pub behavior_id: Uuid,
    pub event_type: BehaviorEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    /// Captured at the moment of the UI action, not at flush time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub happened_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Outbound skill event, queued client-side before it has a durable id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSkillEvent {
    pub skill_id: Uuid,
    pub event_type: SkillEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub happened_at: Option<DateTime<Utc>>,
}

/// One aggregated analysis sample: all relevant events on one calendar date
///
/// Derived on every analysis request; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedPoint {
    pub date: NaiveDate,
    pub value: i64,
    /// Distinct sessions contributing events to this date (coverage indicator)
    pub session_count: i64,
}
