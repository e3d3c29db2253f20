//! Shared API request/response types
//!
//! Used by both the abatrack-api handlers and the abatrack-collector HTTP
//! store so the two sides cannot drift apart.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    Behavior, BehaviorEvent, BehaviorSession, CollectionMethod, DatedPoint, NewBehaviorEvent,
    NewSkillEvent, Skill, SkillEvent, SkillType,
};

// ========================================
// Catalog (clients / behaviors / skills)
// ========================================

/// POST /api/clients request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    /// yyyy-mm-dd
    pub birthdate: String,
    #[serde(default)]
    pub info: Option<String>,
}

/// POST /api/clients/{id}/behaviors request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBehaviorRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub method: CollectionMethod,
    /// Method-specific; INTERVAL/MTS require a positive `interval_seconds`
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

/// POST /api/clients/{id}/skills request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSkillRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub skill_type: Option<SkillType>,
}

// ========================================
// Sessions and events
// ========================================

/// POST /api/sessions/start request
///
/// `date` is advisory/display-only; the authoritative `started_at` is the
/// server instant at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub client_id: Uuid,
    pub date: NaiveDate,
}

/// POST /api/sessions/{id}/events request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostBehaviorEventsRequest {
    pub events: Vec<NewBehaviorEvent>,
}

/// POST /api/sessions/{id}/skill-events request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSkillEventsRequest {
    pub events: Vec<NewSkillEvent>,
}

/// Batch insert acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostEventsResponse {
    pub ok: bool,
    pub created: usize,
}

/// GET /api/sessions query parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
}

/// One session in the review list, with per-session event counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: BehaviorSession,
    pub behavior_event_count: i64,
    pub skill_event_count: i64,
}

/// GET /api/sessions/{id}/details response: events grouped by target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetails {
    #[serde(flatten)]
    pub session: BehaviorSession,
    pub behaviors: Vec<BehaviorEventGroup>,
    pub skills: Vec<SkillEventGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorEventGroup {
    pub behavior: Behavior,
    pub events: Vec<BehaviorEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEventGroup {
    pub skill: Skill,
    pub events: Vec<SkillEvent>,
}

// ========================================
// Analysis
// ========================================

/// Behavior identity echoed alongside its analysis series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorMeta {
    pub id: Uuid,
    pub name: String,
    pub method: CollectionMethod,
}

/// Skill identity echoed alongside its analysis series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillMeta {
    pub id: Uuid,
    pub name: String,
    pub method: String,
    pub skill_type: SkillType,
}

/// GET /api/analysis/behavior/{id}/session-points response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorAnalysis {
    pub behavior: BehaviorMeta,
    /// Ascending by date, one point per calendar date with relevant events
    pub points: Vec<DatedPoint>,
}

/// GET /api/analysis/skill/{id}/session-points response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillAnalysis {
    pub skill: SkillMeta,
    pub points: Vec<DatedPoint>,
}
