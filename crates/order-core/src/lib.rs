//! Core order types shared by the order engine and the position switcher.
//!
//! - **Orders**: `OrderHandle` wraps an engine-owned order behind the
//!   `EngineOrder` trait; the core never mutates an order except through
//!   engine calls.
//! - **Events**: `CallKind`, `EventType` and the per-kind `EventTypeSet`
//!   (done / reject / info) used to correlate notifications with commands.
//! - **Classification**: `classify` turns a `RawNotification` into an
//!   `EventType`.
//! - **Positions**: `PositionOrders` tracks the orders of one instrument and
//!   derives the aggregate direction; `PositionRegistry` holds one per
//!   instrument.

mod classifier;
mod event;
mod notification;
mod order;
mod position;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{classify, classify_parts};
pub use event::{CallKind, EventType, EventTypeSet};
pub use notification::{MessageReason, MessageType, OrderSnapshot, RawNotification};
pub use order::{
    combined_direction, generate_order_label, signed_amount, EngineFault, EngineOrder,
    OrderCommand, OrderDirection, OrderEngine, OrderHandle, OrderId, OrderParams, OrderState,
};
pub use position::{
    create_position_registry, PositionOrders, PositionRegistry, ProcessState,
    SharedPositionRegistry,
};
