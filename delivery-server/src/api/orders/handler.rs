//! Order API handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use shared::error::{AppError, AppResult};
use shared::ledger::LedgerTransaction;
use shared::order::{CreateOrderRequest, CreatedOrder, Order, OrderTracking};

use crate::core::ServerState;
use crate::orders::ReconcileReport;

const DEFAULT_REFUND_REASON: &str = "order cancelled";

pub async fn create(
    State(state): State<ServerState>,
    Path(business_id): Path<String>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<CreatedOrder>)> {
    let created = state.orders.create_order(&business_id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_for_business(
    State(state): State<ServerState>,
    Path(business_id): Path<String>,
) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(state.orders.list_orders(&business_id)?))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.orders.get_order(&id)?))
}

pub async fn tracking(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<OrderTracking>> {
    Ok(Json(state.orders.get_order_tracking(&id)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn refund(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<LedgerTransaction>> {
    let payload: RefundRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RefundRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::invalid_request(format!("invalid refund body: {e}")))?
    };
    let reason = payload
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REFUND_REASON.to_string());

    let applied = state.orders.refund_cancelled_order(&id, &reason)?;
    Ok(Json(applied.transaction))
}

pub async fn reconcile_batch(State(state): State<ServerState>) -> Json<Vec<ReconcileReport>> {
    let reports = state.poller.run_once().await;
    tracing::info!(polled = reports.len(), "Manual reconcile sweep finished");
    Json(reports)
}

pub async fn reconcile_one(
    State(state): State<ServerState>,
    Path(provider_order_id): Path<String>,
) -> Json<Vec<ReconcileReport>> {
    Json(vec![state.reconciler.reconcile(&provider_order_id).await])
}
