//! Per-date analysis handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use abatrack_common::api::{BehaviorAnalysis, SkillAnalysis};

use crate::error::ApiResult;
use crate::{db, AppState};

/// GET /api/analysis/behavior/{behavior_id}/session-points
pub async fn behavior_session_points(
    State(state): State<AppState>,
    Path(behavior_id): Path<Uuid>,
) -> ApiResult<Json<BehaviorAnalysis>> {
    Ok(Json(db::analysis::behavior_points(&state.db, behavior_id).await?))
}

/// GET /api/analysis/skill/{skill_id}/session-points
pub async fn skill_session_points(
    State(state): State<AppState>,
    Path(skill_id): Path<Uuid>,
) -> ApiResult<Json<SkillAnalysis>> {
    Ok(Json(db::analysis::skill_points(&state.db, skill_id).await?))
}
