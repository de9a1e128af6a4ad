/// Minimal Stripe REST client
///
/// Stripe takes form-encoded bodies with bracketed keys for nested fields
/// (`line_items[0][price]`), authenticated with the secret key as a bearer token.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::Plan;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("RequestSend: {source}")]
    RequestSend { source: reqwest::Error },

    #[error("Stripe API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("unexpected Stripe response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Inputs for a subscription checkout session
#[derive(Debug, Clone)]
pub struct CheckoutParams<'a> {
    pub user_id: Uuid,
    pub plan: Plan,
    pub price_id: &'a str,
    /// Existing Stripe customer; when absent Stripe creates one from the email
    pub customer_id: Option<&'a str>,
    pub customer_email: Option<&'a str>,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

impl CheckoutParams<'_> {
    pub fn to_form(&self) -> Vec<(String, String)> {
        let user_id = self.user_id.to_string();
        let mut form = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), self.price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), self.success_url.to_string()),
            ("cancel_url".to_string(), self.cancel_url.to_string()),
            ("client_reference_id".to_string(), user_id.clone()),
            ("metadata[user_id]".to_string(), user_id.clone()),
            ("metadata[plan]".to_string(), self.plan.as_str().to_string()),
            ("subscription_data[metadata][user_id]".to_string(), user_id),
            ("subscription_data[metadata][plan]".to_string(), self.plan.as_str().to_string()),
        ];
        match (self.customer_id, self.customer_email) {
            (Some(customer), _) => form.push(("customer".to_string(), customer.to_string())),
            (None, Some(email)) => form.push(("customer_email".to_string(), email.to_string())),
            (None, None) => {}
        }
        form
    }
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(client: Client, api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    /// POST /v1/checkout/sessions
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutParams<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        tracing::debug!("💳 Creating checkout session for user {} ({})", params.user_id, params.plan);
        self.post_form("/v1/checkout/sessions", &params.to_form()).await
    }

    /// POST /v1/billing_portal/sessions
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, StripeError> {
        tracing::debug!("💳 Creating billing portal session for customer {}", customer_id);
        let form = [("customer", customer_id), ("return_url", return_url)];
        self.post_form("/v1/billing_portal/sessions", &form).await
    }

    async fn post_form<T, F>(&self, path: &str, form: &F) -> Result<T, StripeError>
    where
        T: for<'de> Deserialize<'de>,
        F: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|source| StripeError::RequestSend { source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| StripeError::RequestSend { source })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| body.clone());
            tracing::warn!("❌ Stripe {} failed with {}: {}", path, status, message);
            return Err(StripeError::Api { status, message });
        }

        serde_json::from_str(&body).map_err(|e| StripeError::Decode(e.to_string()))
    }
}
