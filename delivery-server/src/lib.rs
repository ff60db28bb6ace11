//! Delivery order lifecycle and financial reconciliation server
//!
//! # Modules
//!
//! - [`core`] - configuration, state, background tasks, HTTP server
//! - [`db`] - redb database handle
//! - [`dispatch`] - dispatch provider client
//! - [`orders`] - order store, creation saga, reconciliation
//! - [`ledger`] - business credits and driver wallets
//! - [`stripe`] - payment webhook verification
//! - [`api`] - HTTP routes

pub mod api;
pub mod core;
pub mod db;
pub mod dispatch;
pub mod ledger;
pub mod orders;
pub mod stripe;
pub mod utils;

#[cfg(test)]
mod testing;

pub use crate::core::{Config, Server, ServerState};
