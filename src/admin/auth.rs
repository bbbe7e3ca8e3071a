use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == state.config.admin.api_key);

    if !authorized {
        tracing::warn!(path = %request.uri().path(), "Rejected admin request");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}
