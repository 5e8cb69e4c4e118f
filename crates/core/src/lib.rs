pub mod config;
pub mod models;
pub mod util;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub enum AppError {
    Status(StatusCode),
    /// Client-facing error rendered as `{ "code": .., "message": .. }`.
    Json { status: StatusCode, message: String },
    Internal(anyhow::Error),
}

impl AppError {
    /// Error for a malformed request. Uses 500 when `legacy` is set, matching the
    /// status code existing badge embeds were written against.
    pub fn client(message: impl Into<String>, legacy: bool) -> Self {
        let status = if legacy { StatusCode::INTERNAL_SERVER_ERROR } else { StatusCode::BAD_REQUEST };
        Self::Json { status, message: message.into() }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody<'a> {
    code: u16,
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Status(status) if status == StatusCode::NOT_FOUND => {
                (status, "Not found").into_response()
            }
            Self::Status(status) => status.into_response(),
            Self::Json { status, message } => {
                (status, Json(ErrorBody { code: status.as_u16(), message: &message }))
                    .into_response()
            }
            Self::Internal(err) => {
                tracing::error!("{:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Something went wrong: {}", err))
                    .into_response()
            }
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self { Self::Internal(err.into()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_status() {
        let legacy = AppError::client("missing", true).into_response();
        assert_eq!(legacy.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let strict = AppError::client("missing", false).into_response();
        assert_eq!(strict.status(), StatusCode::BAD_REQUEST);
    }
}
