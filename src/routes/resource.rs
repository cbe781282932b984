//! Resource routes. Every path falls through to the dispatcher, which matches
//! registered resource patterns itself.

use crate::handlers::dispatch;
use crate::state::AppState;
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
