//! Per-instrument order tracking.
//!
//! `PositionOrders` holds the orders that make up one instrument's position.
//! Orders enter on fill and leave on close confirmation; both happen through
//! explicit `add` / `remove` calls. Orders taking part in a batch operation
//! (merge or close of the whole position) are marked `Active` so a second
//! batch does not pick them up.

use crate::order::{combined_direction, signed_amount, OrderDirection, OrderHandle};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Processing state of a tracked order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    Idle,
    /// Part of an ongoing batch operation.
    Active,
}

/// Orders of one instrument.
///
/// Mutations take the write lock; reads take the read lock and return
/// snapshots.
#[derive(Debug)]
pub struct PositionOrders {
    instrument: String,
    orders: RwLock<HashMap<OrderHandle, ProcessState>>,
}

impl PositionOrders {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            orders: RwLock::new(HashMap::new()),
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Track an order as `Idle`. Re-adding resets it to `Idle`.
    pub fn add(&self, order: &OrderHandle) {
        self.orders.write().insert(order.clone(), ProcessState::Idle);
        debug!(
            instrument = %self.instrument,
            order_id = %order.order_id(),
            "Order added to position"
        );
    }

    /// Stop tracking an order. No-op if absent.
    pub fn remove(&self, order: &OrderHandle) {
        if self.orders.write().remove(order).is_some() {
            debug!(
                instrument = %self.instrument,
                order_id = %order.order_id(),
                "Order removed from position"
            );
        }
    }

    pub fn contains(&self, order: &OrderHandle) -> bool {
        self.orders.read().contains_key(order)
    }

    pub fn process_state(&self, order: &OrderHandle) -> Option<ProcessState> {
        self.orders.read().get(order).copied()
    }

    pub fn mark_all_active(&self) {
        self.orders
            .write()
            .values_mut()
            .for_each(|state| *state = ProcessState::Active);
    }

    /// Mark the given orders `Active`, ignoring untracked ones.
    pub fn mark_active(&self, orders: &[OrderHandle]) {
        self.set_state(orders, ProcessState::Active);
    }

    /// Return the given orders to `Idle`, ignoring untracked ones.
    pub fn mark_idle(&self, orders: &[OrderHandle]) {
        self.set_state(orders, ProcessState::Idle);
    }

    fn set_state(&self, orders: &[OrderHandle], new_state: ProcessState) {
        let mut guard = self.orders.write();
        for order in orders {
            if let Some(state) = guard.get_mut(order) {
                *state = new_state;
            }
        }
    }

    /// Snapshot of tracked orders matching `predicate`.
    pub fn filter<P>(&self, predicate: P) -> Vec<OrderHandle>
    where
        P: Fn(&OrderHandle) -> bool,
    {
        self.orders
            .read()
            .keys()
            .filter(|order| predicate(order))
            .cloned()
            .collect()
    }

    /// Snapshot of `Idle` orders matching `predicate`.
    pub fn filter_idle<P>(&self, predicate: P) -> Vec<OrderHandle>
    where
        P: Fn(&OrderHandle) -> bool,
    {
        self.orders
            .read()
            .iter()
            .filter(|(order, state)| **state == ProcessState::Idle && predicate(order))
            .map(|(order, _)| order.clone())
            .collect()
    }

    /// Snapshot of all tracked orders.
    pub fn orders(&self) -> Vec<OrderHandle> {
        self.orders.read().keys().cloned().collect()
    }

    /// Net direction of the filled orders.
    pub fn direction(&self) -> OrderDirection {
        let filled = self.filter(OrderHandle::is_filled);
        combined_direction(&filled)
    }

    /// Sum of signed filled amounts (positive = long).
    pub fn signed_exposure(&self) -> Decimal {
        self.filter(OrderHandle::is_filled)
            .iter()
            .map(signed_amount)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }
}

/// One `PositionOrders` per instrument, created on first use.
#[derive(Debug, Default)]
pub struct PositionRegistry {
    positions: DashMap<String, Arc<PositionOrders>>,
}

impl PositionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position for an instrument, creating an empty one if needed.
    pub fn position(&self, instrument: &str) -> Arc<PositionOrders> {
        if let Some(existing) = self.positions.get(instrument) {
            return Arc::clone(existing.value());
        }
        self.positions
            .entry(instrument.to_string())
            .or_insert_with(|| Arc::new(PositionOrders::new(instrument)))
            .clone()
    }

    /// Position for an instrument, if one was created.
    pub fn get(&self, instrument: &str) -> Option<Arc<PositionOrders>> {
        self.positions.get(instrument).map(|p| Arc::clone(p.value()))
    }

    /// Position that tracks `order`, if any.
    pub fn find_tracking(&self, order: &OrderHandle) -> Option<Arc<PositionOrders>> {
        self.get(&order.instrument())
            .filter(|position| position.contains(order))
    }

    pub fn instruments(&self) -> Vec<String> {
        self.positions.iter().map(|p| p.key().clone()).collect()
    }
}

/// Shared handle to the position registry.
pub type SharedPositionRegistry = Arc<PositionRegistry>;

pub fn create_position_registry() -> SharedPositionRegistry {
    Arc::new(PositionRegistry::new())
}
