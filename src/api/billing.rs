/// Billing REST API endpoints
///
/// Checkout and portal sessions are created on Stripe and the caller is sent to
/// Stripe's hosted pages. The webhook is the only unauthenticated route apart
/// from the health check; it is authenticated by its signature instead.

use super::validate::CheckoutRequest;
use super::{AppState, AuthUser, ValidJson};
use crate::billing::{construct_event, CheckoutParams};
use crate::error::{ApiError, ApiResult};
use crate::model::Plan;
use crate::service::billing::{self, EventOutcome};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};

pub fn create_billing_routes() -> Router<AppState> {
    Router::new()
        .route("/api/billing/subscription", get(get_subscription))
        .route("/api/billing/checkout", post(create_checkout))
        .route("/api/billing/portal", post(create_portal))
        .route("/api/billing/webhook", post(stripe_webhook))
}

/// GET /api/billing/subscription
/// Returns: { "plan": "pro", "subscription": {...} | null }
async fn get_subscription(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let subscription = billing::subscription_for(state.store.as_ref(), &user).await?;
    let plan = subscription
        .as_ref()
        .map(|s| s.effective_plan())
        .unwrap_or_default();
    Ok(Json(json!({ "plan": plan, "subscription": subscription })))
}

/// Start a hosted checkout for a paid plan
///
/// Users already on a live paid plan are sent to the portal instead (409).
///
/// POST /api/billing/checkout
/// Body: { "plan": "pro" }
/// Returns: { "id": "cs_...", "url": "https://checkout.stripe.com/..." }
async fn create_checkout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidJson(payload): ValidJson<CheckoutRequest>,
) -> ApiResult<Json<Value>> {
    let stripe = state.stripe.as_ref().ok_or(ApiError::NotConfigured("billing"))?;
    let price_id = state.prices.price_for(payload.plan).ok_or_else(|| {
        ApiError::validation(format!("the {} plan is not available", payload.plan))
    })?;

    let existing = billing::subscription_for(state.store.as_ref(), &user).await?;
    if let Some(current) = existing.as_ref().map(|s| s.effective_plan()).filter(Plan::is_paid) {
        return Err(ApiError::Conflict(format!(
            "already subscribed to the {} plan; use the billing portal to change plans",
            current
        )));
    }

    let success_url = state.billing.success_url();
    let cancel_url = state.billing.cancel_url();
    let params = CheckoutParams {
        user_id: user.id,
        plan: payload.plan,
        price_id,
        customer_id: existing.as_ref().and_then(|s| s.stripe_customer_id.as_deref()),
        customer_email: user.email.as_deref(),
        success_url: &success_url,
        cancel_url: &cancel_url,
    };

    let session = stripe
        .create_checkout_session(&params)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    tracing::info!("💳 Checkout session {} created for user {}", session.id, user.id);
    state.analytics.capture(
        user.id.to_string(),
        "checkout_started",
        json!({ "plan": payload.plan, "session_id": session.id }),
    );
    Ok(Json(json!({ "id": session.id, "url": session.url })))
}

/// Open the Stripe customer portal
///
/// POST /api/billing/portal
/// Returns: { "url": "https://billing.stripe.com/..." }
async fn create_portal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let stripe = state.stripe.as_ref().ok_or(ApiError::NotConfigured("billing"))?;
    let customer_id = billing::subscription_for(state.store.as_ref(), &user)
        .await?
        .and_then(|s| s.stripe_customer_id)
        .ok_or_else(|| ApiError::validation("no billing account exists for this user yet"))?;

    let session = stripe
        .create_portal_session(&customer_id, &state.billing.portal_return_url())
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    Ok(Json(json!({ "url": session.url })))
}

/// Receive Stripe events
///
/// POST /api/billing/webhook
/// Header: Stripe-Signature: t=...,v1=...
/// Returns: { "received": true }
async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let secret = state
        .billing
        .webhook_secret
        .as_deref()
        .ok_or(ApiError::NotConfigured("stripe webhooks"))?;
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::validation("missing Stripe-Signature header"))?;

    let event = construct_event(&body, signature, secret, Utc::now().timestamp()).map_err(|e| {
        tracing::warn!("❌ Rejected Stripe webhook: {}", e);
        ApiError::validation(e.to_string())
    })?;
    tracing::info!("📥 Stripe event received: {} ({})", event.kind, event.id);

    // Storage errors propagate as 500 so Stripe retries the delivery.
    let outcome = billing::apply_event(state.store.as_ref(), &state.prices, &event).await?;
    if let EventOutcome::Applied(subscription) = outcome {
        state.analytics.capture(
            subscription.user_id.to_string(),
            "subscription_updated",
            json!({
                "plan": subscription.plan,
                "status": subscription.status,
                "event": event.kind,
            }),
        );
    }

    Ok(Json(json!({ "received": true })))
}
