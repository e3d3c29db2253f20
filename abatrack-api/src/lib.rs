//! abatrack-api library - session data-collection and analysis service
//!
//! Exposes the durable event store over HTTP: session lifecycle, batched
//! event inserts, review listings, per-date aggregation, and BCBA-gated
//! deletion.

use axum::Router;
use sqlx::SqlitePool;

pub mod api;
pub mod db;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
///
/// Collection routes accept any authenticated role (RBT or BCBA);
/// review, analysis, and deletion require BCBA. Health is public.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post};

    // Collection surface: any authenticated role
    let collect = Router::new()
        .route("/api/collect/clients", get(api::catalog::collect_clients))
        .route(
            "/api/collect/clients/:client_id/behaviors",
            get(api::catalog::collect_client_behaviors),
        )
        .route(
            "/api/collect/clients/:client_id/skills",
            get(api::catalog::collect_client_skills),
        )
        .route("/api/sessions/start", post(api::sessions::start_session))
        .route(
            "/api/sessions/:session_id/events",
            post(api::sessions::post_behavior_events),
        )
        .route(
            "/api/sessions/:session_id/skill-events",
            post(api::sessions::post_skill_events),
        )
        .route("/api/sessions/:session_id/end", post(api::sessions::end_session))
        .layer(middleware::from_fn(api::auth::require_user));

    // Review / analysis / mutation surface: BCBA only
    let bcba = Router::new()
        .route("/api/clients", post(api::catalog::create_client))
        .route("/api/clients", get(api::catalog::list_clients))
        .route("/api/clients/:client_id", get(api::catalog::get_client))
        .route(
            "/api/clients/:client_id/behaviors",
            post(api::catalog::create_behavior).get(api::catalog::list_behaviors),
        )
        .route(
            "/api/clients/:client_id/skills",
            post(api::catalog::create_skill).get(api::catalog::list_skills),
        )
        .route("/api/sessions", get(api::sessions::list_sessions))
        .route(
            "/api/sessions/:session_id/details",
            get(api::sessions::session_details),
        )
        .route(
            "/api/sessions/events/behavior/:event_id",
            delete(api::sessions::delete_behavior_event),
        )
        .route(
            "/api/sessions/events/skill/:event_id",
            delete(api::sessions::delete_skill_event),
        )
        .route("/api/sessions/:session_id", delete(api::sessions::delete_session))
        .route(
            "/api/analysis/behavior/:behavior_id/session-points",
            get(api::analysis::behavior_session_points),
        )
        .route(
            "/api/analysis/skill/:skill_id/session-points",
            get(api::analysis::skill_session_points),
        )
        .layer(middleware::from_fn(api::auth::require_bcba));

    // Public routes (no authentication)
    let public = Router::new().route("/api/health", get(api::health::health));

    // The collection UI is served from a different origin
    Router::new()
        .merge(collect)
        .merge(bcba)
        .merge(public)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}
