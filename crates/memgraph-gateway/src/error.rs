//! Error → HTTP response mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use memgraph_core::{Error, ErrorKind};
use serde_json::json;

/// Wraps a core error so handlers can use `?`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn invalid_body(shape: &str) -> Self {
        Self(Error::validation(format!("Body must be {}.", shape)))
    }
}

impl<E: Into<Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("request failed: {}", self.0);
        }
        let mut body = json!({ "ok": false, "error": self.0.to_string() });
        if let Some(stage) = self.0.rename_stage() {
            body["stage"] = json!(stage);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memgraph_core::RenameStage;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError(Error::validation("x")).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError(Error::not_found("x")).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError(Error::conflict("x")).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError(Error::upstream("x")).status(), StatusCode::INTERNAL_SERVER_ERROR);
        let rename = Error::rename_failed(RenameStage::DeleteEntity, &Error::upstream("gone"));
        assert_eq!(ApiError(rename).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
