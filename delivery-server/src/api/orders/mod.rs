//! Order API
//!
//! | Path | Method | Meaning |
//! |------|--------|---------|
//! | /api/businesses/{id}/orders | POST | Create and dispatch an order |
//! | /api/businesses/{id}/orders | GET | Orders of a business, newest first |
//! | /api/orders/{id} | GET | Order by local id, provider id or number |
//! | /api/orders/{id}/tracking | GET | Tracking view |
//! | /api/orders/{id}/refund | POST | Refund credits of a cancelled order |
//! | /api/reconcile | POST | Run one reconcile sweep now |
//! | /api/reconcile/{provider_order_id} | POST | Reconcile one order now |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route(
            "/api/businesses/{id}/orders",
            post(handler::create).get(handler::list_for_business),
        )
        .route("/api/orders/{id}", get(handler::get_by_id))
        .route("/api/orders/{id}/tracking", get(handler::tracking))
        .route("/api/orders/{id}/refund", post(handler::refund))
        .route("/api/reconcile", post(handler::reconcile_batch))
        .route("/api/reconcile/{provider_order_id}", post(handler::reconcile_one))
}
