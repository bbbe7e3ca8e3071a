pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use crate::http::server::AppState;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Admin routes, guarded by the bearer key. Merged into the main router
/// when `admin.enabled` is set.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/circuits", get(get_circuits))
        .route("/admin/remediations", get(get_remediations))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
