/// Stripe billing integration
///
/// Billing state lives in Stripe. This module starts hosted checkout and portal
/// sessions and authenticates the webhooks Stripe sends back.

pub mod stripe;
pub mod webhook;

pub use stripe::{CheckoutParams, CheckoutSession, PortalSession, StripeClient, StripeError};
pub use webhook::{construct_event, Event, WebhookError};
