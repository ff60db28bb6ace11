//! Business credit accounts and driver wallets
//!
//! | Path | Method | Meaning |
//! |------|--------|---------|
//! | /api/businesses/{id}/account | GET | Credits and recent ledger rows |
//! | /api/businesses/{id}/account | PUT | Open an empty account (idempotent) |
//! | /api/drivers/{id} | PUT | Register a driver, link a provider carrier |
//! | /api/drivers/{id}/wallet | GET | Wallet, debts and cash-order eligibility |
//! | /api/drivers/{id}/debt-payments | POST | Record an out-of-band debt payment |

mod handler;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route(
            "/api/businesses/{id}/account",
            get(handler::business_account).put(handler::open_business_account),
        )
        .route("/api/drivers/{id}", put(handler::register_driver))
        .route("/api/drivers/{id}/wallet", get(handler::driver_wallet))
        .route("/api/drivers/{id}/debt-payments", post(handler::debt_payment))
}
