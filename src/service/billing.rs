/// Subscription bookkeeping driven by Stripe events
///
/// Stripe owns the billing state; the `subscriptions` table is a local mirror
/// updated from webhooks and read when enforcing plan limits.

use crate::billing::Event;
use crate::config::BillingConfig;
use crate::error::ApiResult;
use crate::model::{Plan, Subscription, User};
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Mapping between plans and Stripe price ids
#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    pub pro: Option<String>,
    pub team: Option<String>,
}

impl PriceCatalog {
    pub fn from_config(config: &BillingConfig) -> Self {
        Self {
            pro: config.price_pro.clone(),
            team: config.price_team.clone(),
        }
    }

    pub fn price_for(&self, plan: Plan) -> Option<&str> {
        match plan {
            Plan::Free => None,
            Plan::Pro => self.pro.as_deref(),
            Plan::Team => self.team.as_deref(),
        }
    }

    pub fn plan_for(&self, price_id: &str) -> Option<Plan> {
        if self.pro.as_deref() == Some(price_id) {
            Some(Plan::Pro)
        } else if self.team.as_deref() == Some(price_id) {
            Some(Plan::Team)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Applied(Subscription),
    Ignored(String),
}

pub async fn subscription_for(store: &dyn Store, user: &User) -> ApiResult<Option<Subscription>> {
    Ok(store.get_subscription(user.id).await?)
}

/// Plan currently in force for the user; free when there is no live subscription
pub async fn effective_plan(store: &dyn Store, user: &User) -> ApiResult<Plan> {
    Ok(subscription_for(store, user)
        .await?
        .map(|s| s.effective_plan())
        .unwrap_or_default())
}

/// Update the local subscription mirror from a verified Stripe event
pub async fn apply_event(
    store: &dyn Store,
    prices: &PriceCatalog,
    event: &Event,
) -> ApiResult<EventOutcome> {
    let object = &event.data.object;
    let outcome = match event.kind.as_str() {
        "checkout.session.completed" => checkout_completed(store, object).await?,
        "customer.subscription.created" | "customer.subscription.updated" => {
            subscription_changed(store, prices, object, false).await?
        }
        "customer.subscription.deleted" => subscription_changed(store, prices, object, true).await?,
        other => EventOutcome::Ignored(format!("unhandled event type {}", other)),
    };

    match &outcome {
        EventOutcome::Applied(s) => tracing::info!(
            "💳 {} applied: user {} now {} ({})",
            event.kind,
            s.user_id,
            s.plan,
            s.status
        ),
        EventOutcome::Ignored(reason) => {
            tracing::debug!("Ignoring Stripe event {}: {}", event.id, reason)
        }
    }
    Ok(outcome)
}

async fn checkout_completed(store: &dyn Store, session: &Value) -> ApiResult<EventOutcome> {
    let user_id = str_field(session, &["client_reference_id"])
        .or_else(|| str_field(session, &["metadata", "user_id"]))
        .and_then(|id| Uuid::parse_str(id).ok());
    let Some(user_id) = user_id else {
        return Ok(EventOutcome::Ignored("checkout session without a user reference".into()));
    };

    let plan = str_field(session, &["metadata", "plan"])
        .and_then(|p| p.parse::<Plan>().ok())
        .filter(Plan::is_paid)
        .unwrap_or(Plan::Pro);
    let existing = store.get_subscription(user_id).await?;

    // Delayed payment methods complete the session before the money arrives;
    // the subscription events flip the status once it does.
    let status = match str_field(session, &["payment_status"]) {
        Some("unpaid") => "incomplete",
        _ => "active",
    };

    let subscription = Subscription {
        user_id,
        plan,
        status: status.to_string(),
        stripe_customer_id: str_field(session, &["customer"])
            .map(str::to_string)
            .or_else(|| existing.as_ref().and_then(|s| s.stripe_customer_id.clone())),
        stripe_subscription_id: str_field(session, &["subscription"])
            .map(str::to_string)
            .or_else(|| existing.as_ref().and_then(|s| s.stripe_subscription_id.clone())),
        current_period_end: existing.and_then(|s| s.current_period_end),
        updated_at: Utc::now(),
    };
    store.upsert_subscription(&subscription).await?;
    Ok(EventOutcome::Applied(subscription))
}

async fn subscription_changed(
    store: &dyn Store,
    prices: &PriceCatalog,
    stripe_sub: &Value,
    deleted: bool,
) -> ApiResult<EventOutcome> {
    let Some(customer_id) = str_field(stripe_sub, &["customer"]) else {
        return Ok(EventOutcome::Ignored("subscription without customer".into()));
    };

    let existing = store.find_subscription_by_customer(customer_id).await?;
    let user_id = match (&existing, str_field(stripe_sub, &["metadata", "user_id"])) {
        (Some(s), _) => s.user_id,
        (None, Some(id)) => match Uuid::parse_str(id) {
            Ok(id) => id,
            Err(_) => return Ok(EventOutcome::Ignored(format!("bad user_id metadata {}", id))),
        },
        (None, None) => {
            let reason = format!("no subscription for customer {}", customer_id);
            return Ok(EventOutcome::Ignored(reason));
        }
    };

    let subscription_id = str_field(stripe_sub, &["id"]);
    let current_id = existing.as_ref().and_then(|s| s.stripe_subscription_id.as_deref());
    if let (Some(current), Some(incoming)) = (current_id, subscription_id) {
        let live = existing.as_ref().is_some_and(|s| s.effective_plan().is_paid());
        if current != incoming && (deleted || live) {
            return Ok(EventOutcome::Ignored(format!(
                "subscription {} is not the current subscription {} of customer {}",
                incoming, current, customer_id
            )));
        }
    }

    let price_plan = str_field(stripe_sub, &["items", "data", "0", "price", "id"])
        .and_then(|price| prices.plan_for(price));
    let plan = if deleted {
        Plan::Free
    } else {
        price_plan
            .or_else(|| existing.as_ref().map(|s| s.plan))
            .unwrap_or(Plan::Pro)
    };
    let status = if deleted {
        "canceled".to_string()
    } else {
        str_field(stripe_sub, &["status"]).unwrap_or("active").to_string()
    };

    // Newer API versions moved the period end onto the subscription item.
    let current_period_end = int_field(stripe_sub, &["current_period_end"])
        .or_else(|| int_field(stripe_sub, &["items", "data", "0", "current_period_end"]))
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .or_else(|| existing.as_ref().and_then(|s| s.current_period_end));

    let subscription = Subscription {
        user_id,
        plan,
        status,
        stripe_customer_id: Some(customer_id.to_string()),
        stripe_subscription_id: subscription_id
            .map(str::to_string)
            .or_else(|| existing.as_ref().and_then(|s| s.stripe_subscription_id.clone())),
        current_period_end,
        updated_at: Utc::now(),
    };
    store.upsert_subscription(&subscription).await?;
    Ok(EventOutcome::Applied(subscription))
}

fn field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| match current {
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => current.get(*key),
    })
}

fn str_field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    field(value, path).and_then(Value::as_str)
}

fn int_field(value: &Value, path: &[&str]) -> Option<i64> {
    field(value, path).and_then(Value::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::webhook::EventData;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn prices() -> PriceCatalog {
        PriceCatalog {
            pro: Some("price_pro".to_string()),
            team: Some("price_team".to_string()),
        }
    }

    fn event(kind: &str, object: Value) -> Event {
        Event {
            id: "evt_test".to_string(),
            kind: kind.to_string(),
            data: EventData { object },
        }
    }

    #[test]
    fn price_catalog_maps_both_ways() {
        let prices = prices();
        assert_eq!(prices.price_for(Plan::Team), Some("price_team"));
        assert_eq!(prices.price_for(Plan::Free), None);
        assert_eq!(prices.plan_for("price_pro"), Some(Plan::Pro));
        assert_eq!(prices.plan_for("price_other"), None);
    }

    #[tokio::test]
    async fn checkout_then_update_then_cancel() {
        let store = MemoryStore::new();
        let user = User { id: Uuid::new_v4(), email: None };

        let completed = event(
            "checkout.session.completed",
            json!({
                "client_reference_id": user.id.to_string(),
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "plan": "pro" }
            }),
        );
        apply_event(&store, &prices(), &completed).await.unwrap();
        assert_eq!(effective_plan(&store, &user).await.unwrap(), Plan::Pro);

        let updated = event(
            "customer.subscription.updated",
            json!({
                "id": "sub_1",
                "customer": "cus_1",
                "status": "active",
                "current_period_end": 1_800_000_000,
                "items": { "data": [ { "price": { "id": "price_team" } } ] }
            }),
        );
        let outcome = apply_event(&store, &prices(), &updated).await.unwrap();
        let EventOutcome::Applied(sub) = outcome else { panic!("expected applied") };
        assert_eq!(sub.plan, Plan::Team);
        assert_eq!(sub.current_period_end.unwrap().timestamp(), 1_800_000_000);

        let past_due = event(
            "customer.subscription.updated",
            json!({ "id": "sub_1", "customer": "cus_1", "status": "past_due" }),
        );
        apply_event(&store, &prices(), &past_due).await.unwrap();
        assert_eq!(effective_plan(&store, &user).await.unwrap(), Plan::Free);

        let deleted = event(
            "customer.subscription.deleted",
            json!({ "id": "sub_1", "customer": "cus_1", "status": "canceled" }),
        );
        apply_event(&store, &prices(), &deleted).await.unwrap();
        let sub = subscription_for(&store, &user).await.unwrap().unwrap();
        assert_eq!(sub.plan, Plan::Free);
        assert_eq!(sub.status, "canceled");
        assert_eq!(sub.stripe_customer_id.as_deref(), Some("cus_1"));
    }

    fn completed(user: &User, subscription: &str, plan: &str) -> Event {
        event(
            "checkout.session.completed",
            json!({
                "client_reference_id": user.id.to_string(),
                "customer": "cus_1",
                "subscription": subscription,
                "payment_status": "paid",
                "metadata": { "plan": plan }
            }),
        )
    }

    #[tokio::test]
    async fn events_for_a_replaced_subscription_do_not_touch_the_current_one() {
        let store = MemoryStore::new();
        let user = User { id: Uuid::new_v4(), email: None };
        apply_event(&store, &prices(), &completed(&user, "sub_old", "pro")).await.unwrap();
        apply_event(&store, &prices(), &completed(&user, "sub_new", "team")).await.unwrap();

        let stale_delete = event(
            "customer.subscription.deleted",
            json!({ "id": "sub_old", "customer": "cus_1", "status": "canceled" }),
        );
        let outcome = apply_event(&store, &prices(), &stale_delete).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Ignored(_)));

        let stale_update = event(
            "customer.subscription.updated",
            json!({
                "id": "sub_old",
                "customer": "cus_1",
                "status": "past_due",
                "items": { "data": [ { "price": { "id": "price_pro" } } ] }
            }),
        );
        let outcome = apply_event(&store, &prices(), &stale_update).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Ignored(_)));

        let sub = subscription_for(&store, &user).await.unwrap().unwrap();
        assert_eq!(sub.effective_plan(), Plan::Team);
        assert_eq!(sub.stripe_subscription_id.as_deref(), Some("sub_new"));

        let current_delete = event(
            "customer.subscription.deleted",
            json!({ "id": "sub_new", "customer": "cus_1", "status": "canceled" }),
        );
        apply_event(&store, &prices(), &current_delete).await.unwrap();
        assert_eq!(effective_plan(&store, &user).await.unwrap(), Plan::Free);
    }

    #[tokio::test]
    async fn a_new_subscription_replaces_a_lapsed_one() {
        let store = MemoryStore::new();
        let user = User { id: Uuid::new_v4(), email: None };
        apply_event(&store, &prices(), &completed(&user, "sub_old", "pro")).await.unwrap();
        let lapsed = event(
            "customer.subscription.deleted",
            json!({ "id": "sub_old", "customer": "cus_1", "status": "canceled" }),
        );
        apply_event(&store, &prices(), &lapsed).await.unwrap();

        let resubscribed = event(
            "customer.subscription.created",
            json!({
                "id": "sub_next",
                "customer": "cus_1",
                "status": "active",
                "items": { "data": [ { "price": { "id": "price_pro" } } ] }
            }),
        );
        let outcome = apply_event(&store, &prices(), &resubscribed).await.unwrap();
        let EventOutcome::Applied(sub) = outcome else { panic!("expected applied") };
        assert_eq!(sub.stripe_subscription_id.as_deref(), Some("sub_next"));
        assert_eq!(sub.effective_plan(), Plan::Pro);
    }

    #[tokio::test]
    async fn unpaid_checkout_waits_for_payment() {
        let store = MemoryStore::new();
        let user = User { id: Uuid::new_v4(), email: None };
        let pending = event(
            "checkout.session.completed",
            json!({
                "client_reference_id": user.id.to_string(),
                "customer": "cus_1",
                "subscription": "sub_1",
                "payment_status": "unpaid",
                "metadata": { "plan": "pro" }
            }),
        );
        apply_event(&store, &prices(), &pending).await.unwrap();
        let sub = subscription_for(&store, &user).await.unwrap().unwrap();
        assert_eq!(sub.status, "incomplete");
        assert_eq!(sub.effective_plan(), Plan::Free);

        let paid = event(
            "customer.subscription.updated",
            json!({ "id": "sub_1", "customer": "cus_1", "status": "active" }),
        );
        apply_event(&store, &prices(), &paid).await.unwrap();
        assert_eq!(effective_plan(&store, &user).await.unwrap(), Plan::Pro);
    }

    #[tokio::test]
    async fn unknown_events_and_customers_are_ignored() {
        let store = MemoryStore::new();
        let outcome = apply_event(&store, &prices(), &event("invoice.paid", json!({})))
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Ignored(_)));

        let orphan = event(
            "customer.subscription.updated",
            json!({ "id": "sub_9", "customer": "cus_unknown", "status": "active" }),
        );
        let outcome = apply_event(&store, &prices(), &orphan).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Ignored(_)));

        let anonymous = event("checkout.session.completed", json!({ "customer": "cus_2" }));
        let outcome = apply_event(&store, &prices(), &anonymous).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Ignored(_)));
    }

    #[test]
    fn field_paths_walk_arrays() {
        let value = json!({ "items": { "data": [ { "price": { "id": "p" } } ] } });
        assert_eq!(str_field(&value, &["items", "data", "0", "price", "id"]), Some("p"));
        assert_eq!(str_field(&value, &["items", "data", "1", "price", "id"]), None);
    }
}
