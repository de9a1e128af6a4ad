/// API error type and its HTTP mapping
///
/// Every handler returns `Result<_, ApiError>`. Client errors carry their message
/// into the JSON body; server-side failures are logged and masked.

use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("missing or invalid authorization token")]
    Unauthorized,

    #[error("you do not have access to this {0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PlanLimit(String),

    #[error("upstream service error: {0}")]
    Upstream(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PlanLimit(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(StoreError::Missing(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("❌ Request failed: {}", self);
            "internal server error".to_string()
        } else {
            tracing::debug!("Request rejected with {}: {}", status, self);
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_their_status() {
        assert_eq!(ApiError::validation("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("project").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("task").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("subscribed".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::PlanLimit("full".into()).status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(ApiError::NotConfigured("billing").status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::Store(StoreError::Missing("snapshot")).status(),
            StatusCode::NOT_FOUND
        );
    }

    async fn body_of(error: ApiError) -> (StatusCode, String) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn internal_errors_are_masked() {
        let (status, body) =
            body_of(ApiError::Internal(anyhow::anyhow!("connection string leaked"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"internal server error"}"#);
        assert!(!body.contains("leaked"));

        let (status, body) =
            body_of(ApiError::Store(StoreError::Corrupt("task 1: bad status".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("bad status"));
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let (status, body) = body_of(ApiError::validation("repo_name is required")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error":"repo_name is required"}"#);
    }

    #[test]
    fn messages_name_the_resource() {
        assert_eq!(ApiError::NotFound("snapshot").to_string(), "snapshot not found");
        assert_eq!(ApiError::NotConfigured("billing").to_string(), "billing is not configured");
    }
}
