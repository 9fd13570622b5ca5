//! In-memory cache for the two-tab delivery order list.
//!
//! Stands in for the repository layer that would back it with the delivery
//! service plus a local database. It registers with the expiration monitor as
//! a clearable capability so an expired session never leaves another
//! driver's orders behind.

use onyx_session::Clearable;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// The home screen's two tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderTab {
    New,
    Delivered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub bill_number: String,
    pub customer_name: String,
    pub address: String,
    pub total: String,
}

#[derive(Default)]
pub struct OrdersCache {
    /// Cached orders keyed by (driver id, tab).
    entries: Mutex<HashMap<(String, OrderTab), Vec<Order>>>,
}

impl OrdersCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, driver_id: &str, tab: OrderTab) -> Option<Vec<Order>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(driver_id.to_string(), tab))
            .cloned()
    }

    pub fn put(&self, driver_id: &str, tab: OrderTab, orders: Vec<Order>) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((driver_id.to_string(), tab), orders);
    }
}

impl Clearable for OrdersCache {
    fn name(&self) -> &str {
        "orders"
    }

    fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Placeholder for the remote fetch: deterministic demo orders per driver.
pub fn fetch_demo_orders(driver_id: &str, tab: OrderTab) -> Vec<Order> {
    let (prefix, status_note) = match tab {
        OrderTab::New => ("N", "pending pickup"),
        OrderTab::Delivered => ("D", "delivered"),
    };
    (1..=3)
        .map(|n| Order {
            bill_number: format!("{}-{}-{:03}", prefix, driver_id, n),
            customer_name: format!("Customer {}", n),
            address: format!("{} Market Street, unit {}", n * 11, n),
            total: format!("{}.50 SAR", 40 + n * 15),
        })
        .map(|mut order| {
            order.customer_name = format!("{} ({})", order.customer_name, status_note);
            order
        })
        .collect()
}
