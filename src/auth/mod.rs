/// Bearer token verification
///
/// Token validation is delegated to the auth provider. The `Authenticator` trait
/// is the seam: production uses Supabase Auth, tests plug in a static table.

use crate::model::User;
use async_trait::async_trait;

pub mod supabase;

pub use supabase::SupabaseAuthenticator;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("auth provider unreachable: {0}")]
    Provider(String),
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve a bearer token to the user it was issued for
    async fn verify(&self, token: &str) -> Result<User, AuthError>;
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::bearer_token;

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(bearer_token("Basic dXNlcg=="), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
