use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use trackard_core::{AppError, util::join_normalized};

use crate::AppState;

pub const MISSING_USER: &str = "Target user query is missing from the URL.";

#[derive(serde::Deserialize)]
pub struct UserQuery {
    pub user: Option<String>,
    pub theme: Option<String>,
}

impl UserQuery {
    /// The requested user id; an empty `user=` counts as missing.
    pub fn user_id(&self) -> Option<&str> { self.user.as_deref().filter(|id| !id.is_empty()) }
}

pub fn svg_response(status: StatusCode, svg: String) -> Response {
    (status, [(header::CONTENT_TYPE, mime::IMAGE_SVG.as_ref())], svg).into_response()
}

pub async fn get_homepage(State(state): State<AppState>) -> Result<Response, AppError> {
    let path = join_normalized(&state.config.server.assets_dir, "index.html");
    let output = tokio::fs::read_to_string(&path)
        .await
        .map_err(|_| AppError::Status(StatusCode::NOT_FOUND))?;
    Ok((
        [
            (header::CONTENT_TYPE, mime::TEXT_HTML_UTF_8.as_ref()),
            #[cfg(not(debug_assertions))]
            (header::CACHE_CONTROL, "public, max-age=3600"),
            #[cfg(debug_assertions)]
            (header::CACHE_CONTROL, "no-cache"),
        ],
        output,
    )
        .into_response())
}
