/// Supabase Auth token verification
///
/// Calls `GET {SUPABASE_URL}/auth/v1/user` with the caller's access token; the
/// provider answers with the user record or 401.

use super::{AuthError, Authenticator};
use crate::model::User;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SupabaseAuthenticator {
    client: Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: Uuid,
    email: Option<String>,
}

impl SupabaseAuthenticator {
    pub fn new(client: Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }
}

#[async_trait]
impl Authenticator for SupabaseAuthenticator {
    async fn verify(&self, token: &str) -> Result<User, AuthError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let user: SupabaseUser = response
                    .json()
                    .await
                    .map_err(|e| AuthError::Provider(format!("unexpected user payload: {}", e)))?;
                tracing::debug!("🔑 Token verified for user {}", user.id);
                Ok(User {
                    id: user.id,
                    email: user.email,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidToken),
            status => Err(AuthError::Provider(format!("auth provider returned {}", status))),
        }
    }
}
