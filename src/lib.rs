/// snaptask: repository snapshots turned into tasks, with subscription billing
///
/// Stateless HTTP handlers over a Postgres store. Authentication, billing and
/// repository metadata are delegated to Supabase Auth, Stripe and GitHub.

// Core configuration and setup
pub mod config;

// Logging setup
pub mod logging;

// Error type shared by every handler
pub mod error;

// Domain types: users, projects, snapshots, tasks, subscriptions
pub mod model;

// Persistence: Postgres and in-memory stores behind one trait
pub mod store;

// Bearer token verification against the auth provider
pub mod auth;

// GitHub REST client (branches)
pub mod github;

// Stripe client and webhook verification
pub mod billing;

// Fire-and-forget product analytics
pub mod analytics;

// Ownership checks and plan rules
pub mod service;

// HTTP API layer - REST endpoints
pub mod api;

// Server setup and initialization
pub mod server;

pub use api::AppState;
pub use config::Config;
pub use error::ApiError;
pub use server::{build_router, start_server};
