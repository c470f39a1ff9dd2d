pub mod admin;
pub mod comments;
pub mod files;
pub mod likes;
pub mod posts;
pub mod users;

use axum::middleware;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ratelimit;
use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(users::router())
        .merge(posts::router())
        .merge(likes::router())
        .merge(comments::router())
        .merge(admin::router())
        .merge(files::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            ratelimit::limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
