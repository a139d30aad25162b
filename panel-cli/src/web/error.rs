use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use panel_core::{ErrorKind, PanelError};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Panel(#[from] PanelError),
    #[error("{0}")]
    InvalidInput(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Panel(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Security => StatusCode::FORBIDDEN,
                ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("❌ 请求处理失败: {}", self);
        }
        (
            status,
            Json(serde_json::json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PanelError::validation("x"), StatusCode::BAD_REQUEST),
            (PanelError::not_found("x"), StatusCode::NOT_FOUND),
            (PanelError::AlreadyScheduled(3), StatusCode::CONFLICT),
            (PanelError::PathTraversal("../x".into()), StatusCode::FORBIDDEN),
            (PanelError::custom("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
        assert_eq!(
            AppError::InvalidInput("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
