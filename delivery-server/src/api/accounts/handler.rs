//! Account API handlers

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::error::{AppError, AppResult};
use shared::ledger::{BusinessAccount, BusinessAccountView, DriverWallet, DriverWalletView, LedgerTransaction};

use crate::core::ServerState;

pub async fn business_account(
    State(state): State<ServerState>,
    Path(business_id): Path<String>,
) -> AppResult<Json<BusinessAccountView>> {
    Ok(Json(state.ledger.business_account(&business_id)?))
}

pub async fn open_business_account(
    State(state): State<ServerState>,
    Path(business_id): Path<String>,
) -> AppResult<Json<BusinessAccount>> {
    Ok(Json(state.ledger.open_business_account(&business_id, 0)?))
}

#[derive(Debug, Deserialize)]
pub struct RegisterDriverRequest {
    #[serde(default)]
    pub carrier_id: Option<String>,
    #[serde(default)]
    pub debt_limit: Option<Decimal>,
}

pub async fn register_driver(
    State(state): State<ServerState>,
    Path(driver_id): Path<String>,
    Json(payload): Json<RegisterDriverRequest>,
) -> AppResult<Json<DriverWallet>> {
    if let Some(limit) = payload.debt_limit
        && limit.is_sign_negative()
    {
        return Err(AppError::validation("debt_limit cannot be negative"));
    }

    let carrier_id = payload
        .carrier_id
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    Ok(Json(state.ledger.register_driver(
        &driver_id,
        carrier_id,
        payload.debt_limit,
    )?))
}

pub async fn driver_wallet(
    State(state): State<ServerState>,
    Path(driver_id): Path<String>,
) -> AppResult<Json<DriverWalletView>> {
    Ok(Json(state.ledger.driver_wallet(&driver_id)?))
}

#[derive(Debug, Deserialize)]
pub struct DebtPaymentRequest {
    /// Receipt or transfer reference; retries must reuse it
    pub payment_ref: String,
    pub amount: Decimal,
}

pub async fn debt_payment(
    State(state): State<ServerState>,
    Path(driver_id): Path<String>,
    Json(payload): Json<DebtPaymentRequest>,
) -> AppResult<Json<LedgerTransaction>> {
    if payload.payment_ref.trim().is_empty() {
        return Err(AppError::validation("payment_ref is required"));
    }

    let applied = state.ledger.record_debt_payment(
        &driver_id,
        payload.payment_ref.trim(),
        payload.amount,
    )?;
    Ok(Json(applied.transaction))
}
