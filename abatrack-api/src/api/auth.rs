//! Role-gating middleware
//!
//! Identity is established by an upstream collaborator (login/cookie
//! plumbing lives outside this service). The verified actor role reaches
//! us as the `X-Abatrack-Role` request header; these middlewares translate
//! it into a pass/fail authorization decision.
//!
//! Collection routes require any authenticated role (RBT or BCBA);
//! review, analysis, and deletion routes require BCBA.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use abatrack_common::model::Role;

/// Request header carrying the verified actor role
pub const ROLE_HEADER: &str = "x-abatrack-role";

fn extract_role(request: &Request) -> Result<Role, AuthError> {
    let value = request
        .headers()
        .get(ROLE_HEADER)
        .ok_or(AuthError::NotAuthenticated)?;
    let value = value.to_str().map_err(|_| AuthError::NotAuthenticated)?;
    value.parse().map_err(|_| AuthError::NotAuthenticated)
}

/// Require any authenticated role (RBT or BCBA)
pub async fn require_user(mut request: Request, next: Next) -> Result<Response, AuthError> {
    let role = extract_role(&request)?;
    request.extensions_mut().insert(role);
    Ok(next.run(request).await)
}

/// Require the BCBA role
pub async fn require_bcba(mut request: Request, next: Next) -> Result<Response, AuthError> {
    let role = extract_role(&request)?;
    if role != Role::Bcba {
        return Err(AuthError::BcbaRequired);
    }
    request.extensions_mut().insert(role);
    Ok(next.run(request).await)
}

/// Authorization error types for HTTP responses
///
/// 403 is kept distinct from generic failure so the caller can tell a
/// permissions problem from a transient fault.
#[derive(Debug)]
pub enum AuthError {
    NotAuthenticated,
    BcbaRequired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            AuthError::NotAuthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Not authenticated",
            ),
            AuthError::BcbaRequired => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", "BCBA role required")
            }
        };

        // Same envelope as ApiError so clients parse one shape
        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
