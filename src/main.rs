/// snaptask server entry point
///
/// Loads `.env` when present, reads configuration from the environment and
/// starts the HTTP server.

use snaptask::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Project, snapshot and task API at /api/*
/// - Stripe billing at /api/billing/*
/// - Health check at /healthz
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real deployments set the environment directly
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    start_server(config).await
}
