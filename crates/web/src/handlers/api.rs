use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use time::{Duration, UtcDateTime, macros::format_description};
use trackard_core::AppError;
use trackard_images::Theme;

use crate::{
    AppState,
    handlers::common::{MISSING_USER, UserQuery},
};

/// Envelope shared by the JSON state endpoints. Always sent with HTTP 200.
#[derive(Serialize)]
struct StateNotify<T: Serialize> {
    status: u16,
    code: &'static str,
    message: T,
}

fn notify<T: Serialize>(status: StatusCode, code: &'static str, message: T) -> Response {
    Json(StateNotify { status: status.as_u16(), code, message }).into_response()
}

pub async fn is_listening(
    Query(query): Query<UserQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(user_id) = query.user_id() else {
        return notify(StatusCode::INTERNAL_SERVER_ERROR, "missing_user_notify", MISSING_USER);
    };
    let user = state.laudiolin.find_user(user_id).await;
    match user.as_ref().and_then(|u| u.listening()) {
        Some(track) => notify(StatusCode::OK, "laudiolin_state_notify", track),
        None => notify(
            StatusCode::INTERNAL_SERVER_ERROR,
            "laudiolin_state_notify",
            "The user queried is not using rest at the moment.",
        ),
    }
}

pub async fn recent(Query(query): Query<UserQuery>, State(state): State<AppState>) -> Response {
    let Some(user_id) = query.user_id() else {
        return notify(StatusCode::INTERNAL_SERVER_ERROR, "missing_user_notify", MISSING_USER);
    };
    match state.laudiolin.find_partial(user_id).await {
        Some(partial) => notify(StatusCode::OK, "laudiolin_recent_notify", partial),
        None => notify(
            StatusCode::INTERNAL_SERVER_ERROR,
            "laudiolin_recent_notify",
            "The user queried hasn't been seen recently.",
        ),
    }
}

pub async fn render(
    Query(query): Query<UserQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let legacy = state.config.server.legacy_error_status;
    let Some(user_id) = query.user_id() else {
        return Err(AppError::client(MISSING_USER, legacy));
    };
    if let Some(theme) = query.theme.as_deref().filter(|t| !t.is_empty())
        && !Theme::is_known(theme)
    {
        return Err(AppError::client(
            format!("{theme} isn't a part of the default color palettes (dark/light)."),
            legacy,
        ));
    }

    let user = state.laudiolin.find_user(user_id).await;
    let theme = Theme::select(query.theme.as_deref());
    let rendered = state.renderer.render(theme, user.as_ref(), state.config.render).await?;

    let now = UtcDateTime::now();
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let etag = blake3::hash(format!("{millis}-rf6").as_bytes()).to_hex();
    let expires = (now + Duration::minutes(1)).format(format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    ))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/svg+xml"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
    headers.insert(header::ETAG, HeaderValue::from_str(&format!("\"{etag}\""))?);
    headers.insert(header::EXPIRES, HeaderValue::from_str(&expires)?);
    Ok((headers, rendered.svg).into_response())
}
