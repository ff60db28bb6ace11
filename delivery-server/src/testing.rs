//! Test fixtures: sample orders and an in-memory dispatch provider

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::order::{ContactInfo, Order, OrderSource, OrderStatus, OrderType, PaymentMethod};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::dispatch::{
    CarrierRef, CarrierView, DispatchError, DispatchProvider, DispatchResult, ProviderOrderView,
    RemoteOrderCreated, RemoteOrderRequest,
};

pub(crate) fn sample_order(id: &str, business_id: &str) -> Order {
    Order {
        id: id.to_string(),
        order_number: format!("DEL-20261018-{}", id.to_ascii_uppercase()),
        provider_order_id: None,
        provider_order_number: None,
        business_id: business_id.to_string(),
        driver_id: None,
        carrier_id: None,
        carrier_name: None,
        source: OrderSource::InternalDelivery,
        order_type: OrderType::Delivery,
        customer: ContactInfo {
            name: "Ana".into(),
            phone: "555-0100".into(),
            address: "Calle 1".into(),
        },
        pickup: ContactInfo {
            name: "Tacos Don Beto".into(),
            phone: "555-0200".into(),
            address: "Av 2".into(),
        },
        notes: None,
        subtotal: Decimal::new(100, 0),
        delivery_fee: Decimal::ZERO,
        tip: Decimal::ZERO,
        tax: Decimal::ZERO,
        discount: Decimal::ZERO,
        total_amount: Decimal::new(100, 0),
        amount_to_collect: Decimal::new(100, 0),
        payment_method: PaymentMethod::Cash,
        status: OrderStatus::NotAssigned,
        provider_status: None,
        tracking_link: None,
        created_at: shared::util::now_millis(),
        assigned_at: None,
        picked_up_at: None,
        completed_at: None,
        delivered_at: None,
        last_sync_at: None,
    }
}

pub(crate) fn provider_view(id: &str, status: &str, link: Option<&str>) -> ProviderOrderView {
    ProviderOrderView {
        provider_order_id: id.to_string(),
        order_number: None,
        status: Some(status.to_string()),
        tracking_link: link.map(str::to_string),
        carrier: None,
    }
}

/// Failure the fake returns from `fetch_order`
#[derive(Debug, Clone, Copy)]
pub(crate) enum FetchFailure {
    Auth,
    Timeout,
    Upstream(u16),
}

/// In-memory [`DispatchProvider`]
#[derive(Default)]
pub(crate) struct FakeDispatch {
    orders: Mutex<HashMap<String, ProviderOrderView>>,
    carriers: Mutex<Vec<CarrierView>>,
    created: Mutex<Vec<RemoteOrderRequest>>,
    fetch_failures: Mutex<HashMap<String, FetchFailure>>,
    fail_creates: AtomicBool,
    next_id: AtomicU64,
    fetch_calls: AtomicUsize,
}

impl FakeDispatch {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            ..Default::default()
        }
    }

    pub(crate) fn put_order(&self, view: ProviderOrderView) {
        self.orders
            .lock()
            .unwrap()
            .insert(view.provider_order_id.clone(), view);
    }

    pub(crate) fn set_status(&self, provider_order_id: &str, status: &str, link: Option<&str>) {
        let mut orders = self.orders.lock().unwrap();
        let carrier = orders
            .get(provider_order_id)
            .and_then(|v| v.carrier.clone());
        let mut view = provider_view(provider_order_id, status, link);
        view.carrier = carrier;
        orders.insert(provider_order_id.to_string(), view);
    }

    pub(crate) fn assign_carrier(&self, provider_order_id: &str, carrier_id: &str, name: &str) {
        if let Some(view) = self.orders.lock().unwrap().get_mut(provider_order_id) {
            view.carrier = Some(CarrierRef {
                id: carrier_id.to_string(),
                name: Some(name.to_string()),
            });
        }
    }

    pub(crate) fn put_carrier(&self, carrier: CarrierView) {
        self.carriers.lock().unwrap().push(carrier);
    }

    pub(crate) fn fail_fetch(&self, provider_order_id: &str, failure: FetchFailure) {
        self.fetch_failures
            .lock()
            .unwrap()
            .insert(provider_order_id.to_string(), failure);
    }

    pub(crate) fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn created(&self) -> Vec<RemoteOrderRequest> {
        self.created.lock().unwrap().clone()
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DispatchProvider for FakeDispatch {
    async fn create_remote_order(
        &self,
        request: &RemoteOrderRequest,
    ) -> DispatchResult<RemoteOrderCreated> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(DispatchError::Upstream {
                status: 503,
                body: "service unavailable".into(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let link = format!("https://track.example/{id}");
        self.created.lock().unwrap().push(request.clone());
        self.put_order(provider_view(&id, "NOT_ASSIGNED", Some(&link)));

        Ok(RemoteOrderCreated {
            provider_order_id: id,
            provider_order_number: Some(request.order_number.clone()),
            tracking_link: Some(link),
        })
    }

    async fn fetch_order(
        &self,
        provider_order_id: &str,
    ) -> DispatchResult<Option<ProviderOrderView>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let failure = self
            .fetch_failures
            .lock()
            .unwrap()
            .get(provider_order_id)
            .copied();
        match failure {
            Some(FetchFailure::Auth) => Err(DispatchError::Auth { status: 401 }),
            Some(FetchFailure::Timeout) => Err(DispatchError::Timeout),
            Some(FetchFailure::Upstream(status)) => Err(DispatchError::Upstream {
                status,
                body: String::new(),
            }),
            None => Ok(self.orders.lock().unwrap().get(provider_order_id).cloned()),
        }
    }

    async fn list_active_orders(&self) -> DispatchResult<Vec<ProviderOrderView>> {
        Ok(self.orders.lock().unwrap().values().cloned().collect())
    }

    async fn list_carriers(&self) -> DispatchResult<Vec<CarrierView>> {
        Ok(self.carriers.lock().unwrap().clone())
    }
}
