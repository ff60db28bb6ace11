//! External dispatch provider (Shipday)
//!
//! [`DispatchProvider`] is the only way the rest of the crate talks to the
//! provider. It never touches local state.

mod client;
mod error;
mod types;

pub use client::{DEFAULT_BASE_URL, ShipdayClient};
pub use error::{DispatchError, DispatchResult};
pub use types::{
    CarrierRef, CarrierView, ProviderOrderView, RemoteOrderCreated, RemoteOrderRequest,
};

pub(crate) use types::id_value;

use async_trait::async_trait;

/// Last-mile dispatch provider
#[async_trait]
pub trait DispatchProvider: Send + Sync {
    /// Create the order on the provider. Any non-2xx is an error.
    async fn create_remote_order(
        &self,
        request: &RemoteOrderRequest,
    ) -> DispatchResult<RemoteOrderCreated>;

    /// Fetch one order. `Ok(None)` when the provider does not (yet) know it.
    async fn fetch_order(&self, provider_order_id: &str)
    -> DispatchResult<Option<ProviderOrderView>>;

    /// Orders the provider still considers active
    async fn list_active_orders(&self) -> DispatchResult<Vec<ProviderOrderView>>;

    async fn list_carriers(&self) -> DispatchResult<Vec<CarrierView>>;
}
