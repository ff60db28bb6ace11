//! Inbound webhooks
//!
//! | Path | Method | Meaning |
//! |------|--------|---------|
//! | /webhooks/dispatch | POST | Provider push: reconcile the named order |
//! | /webhooks/payments | POST | Stripe-signed credit purchase |
//!
//! The dispatch webhook is only a trigger: the order state is always pulled
//! from the provider, never taken from the payload.

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/webhooks/dispatch", post(handler::dispatch))
        .route("/webhooks/payments", post(handler::payments))
}
