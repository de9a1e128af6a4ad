/// Request extractors shared by all handlers
///
/// `AuthUser` resolves the bearer token through the configured `Authenticator`;
/// `ValidJson` deserializes a body and runs its `Validate` rules; `ValidPath`
/// parses path parameters. Every rejection comes back as a JSON `ApiError`.

use super::validate::Validate;
use super::AppState;
use crate::auth::{bearer_token, AuthError};
use crate::error::ApiError;
use crate::model::User;
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let token = bearer_token(header).ok_or(ApiError::Unauthorized)?;

        let user = state.auth.verify(token).await.map_err(|e| match e {
            AuthError::InvalidToken => ApiError::Unauthorized,
            AuthError::Provider(message) => {
                tracing::error!("❌ Auth provider failure: {}", message);
                ApiError::Upstream(message)
            }
        })?;

        state.store.upsert_user(&user).await?;
        Ok(AuthUser(user))
    }
}

/// JSON body that passed its validation rules
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

/// Path parameters that parsed cleanly, e.g. `ValidPath(id): ValidPath<Uuid>`
#[derive(Debug, Clone)]
pub struct ValidPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                // A missing parameter means the route and handler disagree.
                if rejection.status().is_server_error() {
                    ApiError::Internal(anyhow::anyhow!(rejection.body_text()))
                } else {
                    ApiError::validation(rejection.body_text())
                }
            })?;
        Ok(ValidPath(value))
    }
}
