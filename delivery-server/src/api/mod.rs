//! HTTP API
//!
//! - [`health`] - liveness
//! - [`orders`] - order creation, tracking, refunds, manual reconcile
//! - [`accounts`] - business credits and driver wallets
//! - [`webhooks`] - provider push and payment events

pub mod accounts;
pub mod health;
pub mod orders;
pub mod webhooks;

use axum::Router;
use axum::http::{HeaderName, StatusCode};
use std::time::Duration;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Upper bound for one request; dispatch calls have their own timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Full application router
pub fn router(state: ServerState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(accounts::router())
        .merge(webhooks::router())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::db::Database;
    use crate::testing::FakeDispatch;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Router, ServerState, Arc<FakeDispatch>) {
        let fake = Arc::new(FakeDispatch::new());
        let state = ServerState::with_dispatch(
            Config::for_tests(),
            Database::open_in_memory().unwrap(),
            fake.clone(),
        );
        (router(state.clone()), state, fake)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn order_body() -> Value {
        json!({
            "customer": {"name": "Ana", "phone": "555-0100", "address": "Calle 1"},
            "pickup": {"name": "Tacos Don Beto", "phone": "555-0200", "address": "Av 2"},
            "subtotal": "100",
            "delivery_fee": "20",
            "payment_method": "CASH"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
    }

    #[tokio::test]
    async fn test_create_order_and_track() {
        let (app, state, _) = app();
        state.ledger.top_up_credits("biz-1", "pay_1", 2).unwrap();

        let (status, created) =
            send(&app, "POST", "/api/businesses/biz-1/orders", Some(order_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["remaining_credits"], 1);

        let order_id = created["order_id"].as_str().unwrap();
        let (status, tracking) =
            send(&app, "GET", &format!("/api/orders/{order_id}/tracking"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tracking["status"], "NOT_ASSIGNED");
        assert_eq!(tracking["tracking_link"], "https://track.example/1000");

        let (status, account) = send(&app, "GET", "/api/businesses/biz-1/account", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(account["account"]["credits"], 1);
    }

    #[tokio::test]
    async fn test_insufficient_credits_is_402() {
        let (app, state, fake) = app();
        state.ledger.open_business_account("biz-1", 0).unwrap();

        let (status, body) =
            send(&app, "POST", "/api/businesses/biz-1/orders", Some(order_body())).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["code"], 5001);
        assert!(fake.created().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_down_is_503_and_refunded() {
        let (app, state, fake) = app();
        state.ledger.top_up_credits("biz-1", "pay_1", 1).unwrap();
        fake.fail_creates(true);

        let (status, body) =
            send(&app, "POST", "/api/businesses/biz-1/orders", Some(order_body())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .contains("credits were not charged")
        );
        assert_eq!(
            state.ledger.business_account("biz-1").unwrap().account.credits,
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_tracking_is_404() {
        let (app, _, _) = app();
        let (status, _) = send(&app, "GET", "/api/orders/missing/tracking", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dispatch_webhook_reconciles() {
        let (app, state, fake) = app();
        state.ledger.top_up_credits("biz-1", "pay_1", 1).unwrap();
        send(&app, "POST", "/api/businesses/biz-1/orders", Some(order_body())).await;
        fake.set_status("1000", "PICKED_UP", Some("https://track.example/1000"));

        let (status, report) = send(
            &app,
            "POST",
            "/webhooks/dispatch",
            Some(json!({"event": "ORDER_PIKEDUP", "order": {"id": 1000}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["outcome"], "updated");
        assert_eq!(report["to"], "PICKED_UP");

        let (status, _) = send(&app, "POST", "/webhooks/dispatch", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dispatch_webhook_tags_origin() {
        let (app, state, fake) = app();
        state.ledger.top_up_credits("biz-1", "pay_1", 1).unwrap();
        let (_, created) =
            send(&app, "POST", "/api/businesses/biz-1/orders", Some(order_body())).await;
        fake.set_status("1000", "STARTED", None);

        let (status, report) = send(
            &app,
            "POST",
            "/webhooks/dispatch",
            Some(json!({"order": {"id": 1000, "orderNumber": created["order_number"]}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["outcome"], "updated");
        assert_eq!(report["origin"], "INTERNAL_DELIVERY");

        let (status, report) = send(
            &app,
            "POST",
            "/webhooks/dispatch",
            Some(json!({"order": {"id": 5555, "orderNumber": "SHD-20261018-ZZ9"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["outcome"], "not_found_locally");
        assert_eq!(report["origin"], "PROVIDER_NATIVE");
    }

    #[tokio::test]
    async fn test_payment_webhook_tops_up_once() {
        let (app, state, _) = app();
        let event = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_1",
                "payment_status": "paid",
                "metadata": {"business_id": "biz-9", "credits": "10"}
            }}
        })
        .to_string();
        let signature = crate::stripe::sign(
            event.as_bytes(),
            &state.config.payment_webhook_secret,
            chrono::Utc::now().timestamp(),
        );

        for expected in [10, 0] {
            let request = Request::builder()
                .method("POST")
                .uri("/webhooks/payments")
                .header("stripe-signature", signature.as_str())
                .body(Body::from(event.clone()))
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let ack: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(ack["credits_applied"], expected);
        }

        assert_eq!(
            state.ledger.business_account("biz-9").unwrap().account.credits,
            10
        );
    }

    #[tokio::test]
    async fn test_checkout_and_payment_intent_credit_once() {
        let (app, state, _) = app();
        let metadata = json!({"business_id": "biz-1", "credits": "10"});
        let events = [
            json!({
                "id": "evt_1",
                "type": "checkout.session.completed",
                "data": {"object": {
                    "id": "cs_1",
                    "payment_intent": "pi_1",
                    "payment_status": "paid",
                    "metadata": metadata
                }}
            }),
            json!({
                "id": "evt_2",
                "type": "payment_intent.succeeded",
                "data": {"object": {"id": "pi_1", "metadata": metadata}}
            }),
        ];

        let mut applied = Vec::new();
        for event in events {
            let body = event.to_string();
            let signature = crate::stripe::sign(
                body.as_bytes(),
                &state.config.payment_webhook_secret,
                chrono::Utc::now().timestamp(),
            );
            let request = Request::builder()
                .method("POST")
                .uri("/webhooks/payments")
                .header("stripe-signature", signature.as_str())
                .body(Body::from(body))
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let ack: Value = serde_json::from_slice(&bytes).unwrap();
            applied.push(ack["credits_applied"].clone());
        }

        assert_eq!(applied, vec![json!(10), json!(0)]);
        assert_eq!(
            state.ledger.business_account("biz-1").unwrap().account.credits,
            10
        );
    }

    #[tokio::test]
    async fn test_payment_webhook_rejects_bad_signature() {
        let (app, _, _) = app();
        let request = Request::builder()
            .method("POST")
            .uri("/webhooks/payments")
            .header("stripe-signature", "t=1,v1=00")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_driver_wallet_and_debt_payment() {
        let (app, state, _) = app();
        let (status, _) = send(
            &app,
            "PUT",
            "/api/drivers/drv-1",
            Some(json!({"carrier_id": "c-1", "debt_limit": "100"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        state
            .ledger
            .settle_completed_order(
                "drv-1",
                "o1",
                shared::order::PaymentMethod::Cash,
                rust_decimal::Decimal::from(200),
                rust_decimal::Decimal::from(15),
            )
            .unwrap();

        let (status, payment) = send(
            &app,
            "POST",
            "/api/drivers/drv-1/debt-payments",
            Some(json!({"payment_ref": "rcpt-1", "amount": "10"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payment["tx_type"], "DEBT_PAYMENT");

        let (status, wallet) = send(&app, "GET", "/api/drivers/drv-1/wallet", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(wallet["wallet"]["pending_debts"], "5");
        assert_eq!(wallet["can_accept_cash_orders"], true);
    }

    #[tokio::test]
    async fn test_refund_requires_cancelled_order() {
        let (app, state, _) = app();
        state.ledger.top_up_credits("biz-1", "pay_1", 1).unwrap();
        let (_, created) =
            send(&app, "POST", "/api/businesses/biz-1/orders", Some(order_body())).await;
        let order_id = created["order_id"].as_str().unwrap();

        let (status, body) =
            send(&app, "POST", &format!("/api/orders/{order_id}/refund"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], 4003);
    }
}
