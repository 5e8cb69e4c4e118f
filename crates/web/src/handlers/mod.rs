use axum::{Router, routing::get};

use crate::AppState;

mod api;
pub(crate) mod common;
mod status;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/", get(common::get_homepage))
        .route("/status", get(status::get_status))
        .nest("/api/v1", api_router())
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/isListening", get(api::is_listening))
        .route("/recent", get(api::recent))
        .route("/render", get(api::render))
}
