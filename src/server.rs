/// Server setup and initialization
///
/// Wires together all components: store, auth provider, GitHub and Stripe clients,
/// analytics, and HTTP routes.

use crate::{
    analytics::Analytics,
    api::{create_api_routes, AppState},
    auth::{Authenticator, SupabaseAuthenticator},
    billing::StripeClient,
    config::Config,
    github::GitHubClient,
    logging,
    service::PriceCatalog,
    store::{MemoryStore, PgStore, Store},
};
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Outbound HTTP timeout for auth, GitHub, Stripe and analytics calls
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the router around an already assembled state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Authenticated API plus the Stripe webhook
        .merge(create_api_routes())
        .with_state(state)
}

/// Create the application state from configuration
///
/// Connects to Postgres when DATABASE_URL is set and falls back to the in-memory
/// store otherwise.
pub async fn create_state(config: &Config) -> Result<AppState> {
    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let store: Arc<dyn Store> = match &config.database.url {
        Some(url) => Arc::new(
            PgStore::connect(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?,
        ),
        None => {
            tracing::warn!("⚠️ DATABASE_URL not set, using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    tracing::info!("🔑 Initializing Supabase authenticator");
    let supabase_url = config
        .auth
        .supabase_url
        .clone()
        .context("SUPABASE_URL must be set")?;
    let anon_key = config
        .auth
        .supabase_anon_key
        .clone()
        .context("SUPABASE_ANON_KEY must be set")?;
    let auth: Arc<dyn Authenticator> =
        Arc::new(SupabaseAuthenticator::new(http.clone(), supabase_url, anon_key));

    let stripe = match &config.billing.stripe_secret_key {
        Some(key) => {
            tracing::info!("💳 Stripe billing enabled");
            Some(StripeClient::new(http.clone(), &config.billing.api_base, key))
        }
        None => {
            tracing::warn!("⚠️ STRIPE_SECRET_KEY not set, billing endpoints will answer 503");
            None
        }
    };
    if config.billing.webhook_secret.is_none() {
        tracing::warn!("⚠️ STRIPE_WEBHOOK_SECRET not set, webhooks will be refused");
    }

    let analytics = Analytics::new(http.clone(), &config.analytics);
    if !analytics.is_enabled() {
        tracing::info!("📈 Analytics disabled (ANALYTICS_ENDPOINT not set)");
    }

    Ok(AppState {
        store,
        auth,
        github: GitHubClient::new(http, &config.github),
        stripe,
        prices: PriceCatalog::from_config(&config.billing),
        billing: config.billing.clone(),
        analytics,
    })
}

/// Create the main Axum application with all routes
pub async fn create_app(config: &Config) -> Result<Router> {
    let state = create_state(config).await?;
    tracing::info!("✅ Application initialized successfully");
    Ok(build_router(state))
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    logging::init(&config.log_level)?;
    tracing::info!("Starting snaptask server...");

    let app = create_app(&config).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
