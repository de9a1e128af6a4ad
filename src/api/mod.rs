/// HTTP API Layer
///
/// This module provides the REST API endpoints. It handles:
/// - Project, snapshot and task CRUD for the authenticated user
/// - GitHub branch lookup and markdown export
/// - Stripe checkout, portal and webhook endpoints

use crate::{
    analytics::Analytics,
    auth::Authenticator,
    billing::StripeClient,
    config::BillingConfig,
    github::GitHubClient,
    service::PriceCatalog,
    store::Store,
};
use std::sync::Arc;

// Request extractors (auth, validated JSON, parsed path ids)
pub mod extract;

// Request bodies and validation rules
pub mod validate;

// Current-user endpoint
pub mod account;

// Project endpoints, including GitHub branches
pub mod projects;

// Snapshot endpoints, including export
pub mod snapshots;

// Task endpoints
pub mod tasks;

// Stripe endpoints
pub mod billing;

pub use extract::{AuthUser, ValidJson, ValidPath};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend
    pub store: Arc<dyn Store>,
    /// Bearer token verification
    pub auth: Arc<dyn Authenticator>,
    /// GitHub REST client
    pub github: GitHubClient,
    /// Stripe client; None when STRIPE_SECRET_KEY is unset
    pub stripe: Option<StripeClient>,
    /// Plan ↔ price mapping
    pub prices: PriceCatalog,
    /// Redirect URLs and webhook secret
    pub billing: BillingConfig,
    /// Fire-and-forget event capture
    pub analytics: Analytics,
}

/// All API routes, ready to receive the application state
pub fn create_api_routes() -> axum::Router<AppState> {
    axum::Router::new()
        .merge(account::create_account_routes())
        .merge(projects::create_project_routes())
        .merge(snapshots::create_snapshot_routes())
        .merge(tasks::create_task_routes())
        .merge(billing::create_billing_routes())
}
