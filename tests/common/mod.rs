#![allow(dead_code)]

pub mod upstream;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use snaptask::{
    analytics::Analytics,
    auth::{AuthError, Authenticator},
    billing::StripeClient,
    build_router,
    config::Config,
    github::GitHubClient,
    model::User,
    service::PriceCatalog,
    store::MemoryStore,
    AppState,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const STRIPE_KEY: &str = "sk_test_integration";

/// `Stripe-Signature` header value for a payload, as Stripe computes it
pub fn sign_webhook(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

/// Accepts a fixed set of tokens
pub struct StaticAuthenticator {
    users: HashMap<String, User>,
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn verify(&self, token: &str) -> Result<User, AuthError> {
        self.users.get(token).cloned().ok_or(AuthError::InvalidToken)
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub alice: User,
    pub bob: User,
}

pub const ALICE: &str = "alice-token";
pub const BOB: &str = "bob-token";

impl TestApp {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// App whose Stripe calls go to `api_base`
    pub fn with_stripe(api_base: &str) -> Self {
        Self::build(Some(StripeClient::new(reqwest::Client::new(), api_base, STRIPE_KEY)))
    }

    fn build(stripe: Option<StripeClient>) -> Self {
        let alice = User { id: Uuid::new_v4(), email: Some("alice@example.com".to_string()) };
        let bob = User { id: Uuid::new_v4(), email: Some("bob@example.com".to_string()) };
        let users = HashMap::from([
            (ALICE.to_string(), alice.clone()),
            (BOB.to_string(), bob.clone()),
        ]);

        let mut config = Config::from_lookup(|_| None);
        // Nothing listens on the discard port, so GitHub calls fail fast.
        config.github.api_base = "http://127.0.0.1:9".to_string();
        config.billing.webhook_secret = Some(WEBHOOK_SECRET.to_string());
        config.billing.price_pro = Some("price_pro".to_string());
        config.billing.price_team = Some("price_team".to_string());

        let store = Arc::new(MemoryStore::new());
        let state = AppState {
            store: store.clone(),
            auth: Arc::new(StaticAuthenticator { users }),
            github: GitHubClient::new(reqwest::Client::new(), &config.github),
            stripe,
            prices: PriceCatalog::from_config(&config.billing),
            billing: config.billing.clone(),
            analytics: Analytics::disabled(),
        };

        Self { router: build_router(state), store, alice, bob }
    }

    pub async fn raw(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.raw(request).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, json)
    }
}
