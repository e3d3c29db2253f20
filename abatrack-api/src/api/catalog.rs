//! Client / behavior / skill HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use abatrack_common::api::{CreateBehaviorRequest, CreateClientRequest, CreateSkillRequest};
use abatrack_common::model::{Behavior, Client, Skill, SkillType};

use crate::error::{ApiError, ApiResult};
use crate::{db, AppState};

/// POST /api/clients
pub async fn create_client(
    State(state): State<AppState>,
    Json(request): Json<CreateClientRequest>,
) -> ApiResult<(StatusCode, Json<Client>)> {
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Client name is required".to_string()));
    }
    let birthdate = abatrack_common::time::parse_date(&request.birthdate)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let client = db::catalog::insert_client(
        &state.db,
        request.name.trim(),
        birthdate,
        request.info.as_deref(),
    )
    .await?;

    tracing::info!(client_id = %client.id, "Client created");
    Ok((StatusCode::CREATED, Json(client)))
}

/// GET /api/clients (management view, newest first)
pub async fn list_clients(State(state): State<AppState>) -> ApiResult<Json<Vec<Client>>> {
    Ok(Json(db::catalog::list_clients_by_created(&state.db).await?))
}

/// GET /api/clients/{client_id}
pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> ApiResult<Json<Client>> {
    Ok(Json(db::catalog::get_client(&state.db, client_id).await?))
}

/// GET /api/collect/clients (collection view, by name)
pub async fn collect_clients(State(state): State<AppState>) -> ApiResult<Json<Vec<Client>>> {
    Ok(Json(db::catalog::list_clients_by_name(&state.db).await?))
}

/// POST /api/clients/{client_id}/behaviors
pub async fn create_behavior(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Json(request): Json<CreateBehaviorRequest>,
) -> ApiResult<(StatusCode, Json<Behavior>)> {
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Behavior name is required".to_string(),
        ));
    }
    // 404 before 400: an unknown client wins over bad settings
    db::catalog::get_client(&state.db, client_id).await?;

    let settings = request.settings.unwrap_or_else(|| serde_json::json!({}));
    let behavior = db::catalog::insert_behavior(
        &state.db,
        client_id,
        request.name.trim(),
        request.description.as_deref(),
        request.method,
        settings,
    )
    .await?;

    tracing::info!(
        behavior_id = %behavior.id,
        client_id = %client_id,
        method = behavior.method.as_str(),
        "Behavior created"
    );
    Ok((StatusCode::CREATED, Json(behavior)))
}

/// GET /api/clients/{client_id}/behaviors
pub async fn list_behaviors(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Behavior>>> {
    db::catalog::get_client(&state.db, client_id).await?;
    Ok(Json(db::catalog::list_behaviors(&state.db, client_id).await?))
}

/// GET /api/collect/clients/{client_id}/behaviors
pub async fn collect_client_behaviors(
    state: State<AppState>,
    client_id: Path<Uuid>,
) -> ApiResult<Json<Vec<Behavior>>> {
    list_behaviors(state, client_id).await
}

/// POST /api/clients/{client_id}/skills
pub async fn create_skill(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Json(request): Json<CreateSkillRequest>,
) -> ApiResult<(StatusCode, Json<Skill>)> {
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Skill name is required".to_string()));
    }
    db::catalog::get_client(&state.db, client_id).await?;

    let skill = db::catalog::insert_skill(
        &state.db,
        client_id,
        request.name.trim(),
        request.description.as_deref(),
        request.skill_type.unwrap_or(SkillType::Other),
    )
    .await?;

    tracing::info!(skill_id = %skill.id, client_id = %client_id, "Skill created");
    Ok((StatusCode::CREATED, Json(skill)))
}

/// GET /api/clients/{client_id}/skills
pub async fn list_skills(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Skill>>> {
    db::catalog::get_client(&state.db, client_id).await?;
    Ok(Json(db::catalog::list_skills(&state.db, client_id).await?))
}

/// GET /api/collect/clients/{client_id}/skills
pub async fn collect_client_skills(
    state: State<AppState>,
    client_id: Path<Uuid>,
) -> ApiResult<Json<Vec<Skill>>> {
    list_skills(state, client_id).await
}
