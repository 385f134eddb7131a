use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::adapters::prom::Exposition;

use super::handlers::{metrics_handler, AppState};

pub fn create_router(exposition: Arc<Exposition>) -> Router {
    let state = AppState { exposition };

    Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
