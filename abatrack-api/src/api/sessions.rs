//! Session lifecycle, event intake, review and deletion handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use abatrack_common::api::{
    PostBehaviorEventsRequest, PostEventsResponse, PostSkillEventsRequest, SessionDetails,
    SessionListQuery, SessionSummary, StartSessionRequest,
};
use abatrack_common::model::BehaviorSession;

use crate::error::ApiResult;
use crate::{db, AppState};

/// POST /api/sessions/start
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> ApiResult<(StatusCode, Json<BehaviorSession>)> {
    db::catalog::get_client(&state.db, request.client_id).await?;

    let session = db::sessions::insert_session(&state.db, request.client_id).await?;
    tracing::info!(
        session_id = %session.id,
        client_id = %session.client_id,
        date = %request.date,
        "Session started"
    );
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/sessions/{session_id}/events
///
/// Accepts a whole outbound queue in one batch. All-or-nothing: any
/// invalid event rejects the batch so the client keeps its queue intact
/// and can retry after fixing it.
pub async fn post_behavior_events(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<PostBehaviorEventsRequest>,
) -> ApiResult<Json<PostEventsResponse>> {
    let session = db::sessions::get_session(&state.db, session_id).await?;
    let created =
        db::sessions::insert_behavior_events(&state.db, &session, &request.events, Utc::now())
            .await?;

    tracing::debug!(session_id = %session_id, created, "Behavior events recorded");
    Ok(Json(PostEventsResponse { ok: true, created }))
}

/// POST /api/sessions/{session_id}/skill-events
pub async fn post_skill_events(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<PostSkillEventsRequest>,
) -> ApiResult<Json<PostEventsResponse>> {
    let session = db::sessions::get_session(&state.db, session_id).await?;
    let created =
        db::sessions::insert_skill_events(&state.db, &session, &request.events, Utc::now())
            .await?;

    tracing::debug!(session_id = %session_id, created, "Skill events recorded");
    Ok(Json(PostEventsResponse { ok: true, created }))
}

/// POST /api/sessions/{session_id}/end
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<BehaviorSession>> {
    let session = db::sessions::end_session(&state.db, session_id).await?;
    tracing::info!(session_id = %session_id, "Session ended");
    Ok(Json(session))
}

/// GET /api/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionListQuery>,
) -> ApiResult<Json<Vec<SessionSummary>>> {
    Ok(Json(db::sessions::list_sessions(&state.db, &query).await?))
}

/// GET /api/sessions/{session_id}/details
pub async fn session_details(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionDetails>> {
    Ok(Json(db::sessions::session_details(&state.db, session_id).await?))
}

/// DELETE /api/sessions/events/behavior/{event_id}
pub async fn delete_behavior_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    db::sessions::delete_behavior_event(&state.db, event_id).await?;
    tracing::info!(event_id = %event_id, "Behavior event deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/sessions/events/skill/{event_id}
pub async fn delete_skill_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    db::sessions::delete_skill_event(&state.db, event_id).await?;
    tracing::info!(event_id = %event_id, "Skill event deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/sessions/{session_id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    db::sessions::delete_session(&state.db, session_id).await?;
    tracing::info!(session_id = %session_id, "Session and all its events deleted");
    Ok(StatusCode::NO_CONTENT)
}
