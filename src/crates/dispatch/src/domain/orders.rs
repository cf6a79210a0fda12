//! Order domain: shipping lookups and address changes.
//!
//! Orders live behind the [`OrderStore`] trait. Writes are compare-and-set on
//! a per-order version, so two concurrent address changes on one order are
//! serialised: each either lands on the version it read or re-reads and tries
//! again. Neither can silently restore the address the other replaced.

use crate::action::{ActionHandler, ActionName, ActionPayload, ActionResult, ValidatedCall};
use crate::StoreError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Fulfilment status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Processing => write!(f, "Processing"),
            OrderStatus::Shipped => write!(f, "Shipped"),
            OrderStatus::Delivered => write!(f, "Delivered"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub status: OrderStatus,
    pub address: String,
}

impl Order {
    pub fn new(status: OrderStatus, address: impl Into<String>) -> Self {
        Self {
            status,
            address: address.into(),
        }
    }
}

/// An order together with the version it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedOrder {
    pub order: Order,
    pub version: u64,
}

/// Storage for orders, keyed by opaque order id
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Read an order and its current version
    async fn get(&self, id: &str) -> Result<VersionedOrder, StoreError>;

    /// Replace the order if it is still at `expected_version`.
    ///
    /// Returns the new version.
    async fn compare_and_set(
        &self,
        id: &str,
        expected_version: u64,
        order: Order,
    ) -> Result<u64, StoreError>;
}

/// Process-local order store
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: DashMap<String, VersionedOrder>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with the demo orders `123` and `456`
    pub fn seeded() -> Self {
        let store = Self::new();
        store.insert("123", Order::new(OrderStatus::Shipped, "123 Main St"));
        store.insert("456", Order::new(OrderStatus::Processing, "456 Elm St"));
        store
    }

    /// Insert or overwrite an order at version 0
    pub fn insert(&self, id: impl Into<String>, order: Order) {
        self.orders
            .insert(id.into(), VersionedOrder { order, version: 0 });
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, id: &str) -> Result<VersionedOrder, StoreError> {
        self.orders
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn compare_and_set(
        &self,
        id: &str,
        expected_version: u64,
        order: Order,
    ) -> Result<u64, StoreError> {
        // the entry lock is held across the check and the write
        match self.orders.entry(id.to_string()) {
            Entry::Vacant(_) => Err(StoreError::NotFound(id.to_string())),
            Entry::Occupied(mut entry) => {
                let current = entry.get_mut();
                if current.version != expected_version {
                    return Err(StoreError::VersionConflict {
                        id: id.to_string(),
                        expected: expected_version,
                        actual: current.version,
                    });
                }
                current.order = order;
                current.version += 1;
                Ok(current.version)
            }
        }
    }
}

/// Handlers for the order actions
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    max_write_attempts: usize,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            store,
            max_write_attempts: 8,
        }
    }

    /// Bound on compare-and-set attempts under contention
    pub fn with_max_write_attempts(mut self, attempts: usize) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    /// Shipping status and address of an order
    pub async fn check_shipping(&self, order_id: &str) -> ActionResult {
        match self.store.get(order_id).await {
            Ok(current) => ActionResult::success(ActionPayload::Shipping {
                status: current.order.status.to_string(),
                address: current.order.address,
            }),
            Err(err) => ActionResult::failure(err.to_string()),
        }
    }

    /// Point an order at a new delivery address.
    ///
    /// Setting the address it already has is a successful no-op.
    pub async fn change_shipping_address(&self, order_id: &str, new_address: &str) -> ActionResult {
        for attempt in 1..=self.max_write_attempts {
            let current = match self.store.get(order_id).await {
                Ok(current) => current,
                Err(err) => return ActionResult::failure(err.to_string()),
            };

            if current.order.address != new_address {
                let updated = Order {
                    address: new_address.to_string(),
                    ..current.order
                };
                match self
                    .store
                    .compare_and_set(order_id, current.version, updated)
                    .await
                {
                    Ok(version) => {
                        tracing::info!(order_id, version, "Shipping address changed");
                    }
                    Err(StoreError::VersionConflict { .. }) => {
                        tracing::debug!(
                            order_id,
                            attempt,
                            "Order changed underneath us, re-reading"
                        );
                        continue;
                    }
                    Err(err) => return ActionResult::failure(err.to_string()),
                }
            }

            return ActionResult::success(ActionPayload::AddressChanged {
                new_address: new_address.to_string(),
            });
        }

        tracing::warn!(order_id, attempts = self.max_write_attempts, "Gave up on contended order");
        ActionResult::failure(format!(
            "Order {} is being modified concurrently, please retry",
            order_id
        ))
    }
}

#[async_trait]
impl ActionHandler for OrderService {
    async fn handle(&self, call: &ValidatedCall) -> ActionResult {
        match call.action() {
            ActionName::CheckShipping => self.check_shipping(call.value("order_id")).await,
            ActionName::ChangeShippingAddress => {
                self.change_shipping_address(call.value("order_id"), call.value("new_address"))
                    .await
            }
            other => ActionResult::failure(format!("{} is not an order action", other)),
        }
    }
}
