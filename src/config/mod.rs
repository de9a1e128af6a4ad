/// Configuration management for the snaptask backend
///
/// Handles server, database, auth provider, billing, GitHub and analytics settings.
/// Everything is read from the environment; an optional `.env` is loaded by `main`.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Auth provider (Supabase Auth) configuration
    pub auth: AuthConfig,
    /// Stripe billing configuration
    pub billing: BillingConfig,
    /// GitHub API configuration
    pub github: GitHubConfig,
    /// Event capture configuration
    pub analytics: AnalyticsConfig,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Postgres connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string; None runs against the in-memory store
    pub url: Option<String>,
    /// Pool size
    pub max_connections: u32,
}

/// Supabase Auth settings used to verify bearer tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Project URL, e.g. "https://abc.supabase.co"
    pub supabase_url: Option<String>,
    /// Public anon key sent as the `apikey` header
    pub supabase_anon_key: Option<String>,
}

/// Stripe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Secret API key; billing endpoints answer 503 without it
    pub stripe_secret_key: Option<String>,
    /// Webhook signing secret (whsec_...)
    pub webhook_secret: Option<String>,
    /// Price id of the Pro plan
    pub price_pro: Option<String>,
    /// Price id of the Team plan
    pub price_team: Option<String>,
    /// Public URL of the web app, used for redirect URLs
    pub app_url: String,
    /// Stripe API base, overridable for testing
    pub api_base: String,
}

impl BillingConfig {
    pub fn success_url(&self) -> String {
        format!("{}/billing?status=success&session_id={{CHECKOUT_SESSION_ID}}", self.app_url)
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/billing?status=cancelled", self.app_url)
    }

    pub fn portal_return_url(&self) -> String {
        format!("{}/billing", self.app_url)
    }
}

/// GitHub REST API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub api_base: String,
    pub user_agent: String,
}

/// Event capture endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Capture URL; None disables analytics
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl Config {
    /// Build configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Empty values are treated as unset so that `FOO=` in a `.env` disables a feature.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            server: ServerConfig {
                host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
            },
            database: DatabaseConfig {
                url: get("DATABASE_URL"),
                max_connections: get("DATABASE_MAX_CONNECTIONS")
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(10),
            },
            auth: AuthConfig {
                supabase_url: get("SUPABASE_URL").map(|u| u.trim_end_matches('/').to_string()),
                supabase_anon_key: get("SUPABASE_ANON_KEY"),
            },
            billing: BillingConfig {
                stripe_secret_key: get("STRIPE_SECRET_KEY"),
                webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
                price_pro: get("STRIPE_PRICE_PRO"),
                price_team: get("STRIPE_PRICE_TEAM"),
                app_url: get("APP_URL")
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| "http://localhost:3000".to_string()),
                api_base: get("STRIPE_API_BASE")
                    .unwrap_or_else(|| "https://api.stripe.com".to_string()),
            },
            github: GitHubConfig {
                api_base: get("GITHUB_API_BASE")
                    .unwrap_or_else(|| "https://api.github.com".to_string()),
                user_agent: get("GITHUB_USER_AGENT").unwrap_or_else(|| "snaptask".to_string()),
            },
            analytics: AnalyticsConfig {
                endpoint: get("ANALYTICS_ENDPOINT"),
                api_key: get("ANALYTICS_API_KEY"),
            },
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self::from_env()
    }
}
