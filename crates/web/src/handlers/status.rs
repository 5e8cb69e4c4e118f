use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
};
use trackard_core::AppError;

use crate::{
    AppState,
    handlers::common::{MISSING_USER, UserQuery, svg_response},
};

/// Unthemed track card. The offline card is served with HTTP 500 in legacy mode.
pub async fn get_status(
    Query(query): Query<UserQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let legacy = state.config.server.legacy_error_status;
    let Some(user_id) = query.user_id() else {
        return Err(AppError::client(MISSING_USER, legacy));
    };
    let user = state.laudiolin.find_user(user_id).await;
    let rendered = state.renderer.render_card(user.as_ref(), state.config.status).await?;
    let status = if rendered.listening || !legacy {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok(svg_response(status, rendered.svg))
}
