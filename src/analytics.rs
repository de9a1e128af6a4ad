/// Best-effort product analytics
///
/// Events are POSTed to a capture endpoint from a detached task. Nothing here
/// can fail a request: errors end up in the debug log.

use crate::config::AnalyticsConfig;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct Analytics {
    client: Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl Analytics {
    pub fn new(client: Client, config: &AnalyticsConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Analytics that never sends anything
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            endpoint: None,
            api_key: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Body sent to the capture endpoint
    pub fn payload(&self, distinct_id: &str, event: &str, properties: Value) -> Value {
        json!({
            "api_key": self.api_key,
            "event": event,
            "distinct_id": distinct_id,
            "properties": properties,
            "timestamp": Utc::now().to_rfc3339(),
        })
    }

    /// Fire-and-forget capture of a single event
    pub fn capture(&self, distinct_id: impl Into<String>, event: &str, properties: Value) {
        let Some(endpoint) = self.endpoint.clone() else {
            tracing::trace!("Analytics disabled, dropping event {}", event);
            return;
        };

        let body = self.payload(&distinct_id.into(), event, properties);
        let client = self.client.clone();
        let event = event.to_string();

        tokio::spawn(async move {
            match client.post(&endpoint).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::trace!("📈 Captured analytics event {}", event);
                }
                Ok(response) => {
                    tracing::debug!("Analytics endpoint answered {} for {}", response.status(), event);
                }
                Err(e) => {
                    tracing::debug!("Analytics capture failed for {}: {}", event, e);
                }
            }
        });
    }
}
