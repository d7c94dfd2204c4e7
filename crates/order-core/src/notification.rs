//! Raw notifications as emitted by the engine binding.

use crate::order::{OrderCommand, OrderHandle, OrderState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Platform message type of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Notification,
    OrderSubmitOk,
    OrderSubmitRejected,
    OrderFillOk,
    OrderFillRejected,
    OrderChangedOk,
    OrderChangedRejected,
    OrderCloseOk,
    OrderCloseRejected,
    OrdersMergeOk,
    OrdersMergeRejected,
    /// Anything the binding does not map.
    Other,
}

/// Platform reason code attached to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageReason {
    OrderFullyFilled,
    OrderClosedByMerge,
    OrderClosedBySl,
    OrderClosedByTp,
    OrderChangedLabel,
    OrderChangedGtt,
    OrderChangedAmount,
    OrderChangedPrice,
    OrderChangedSl,
    OrderChangedTp,
}

/// Order fields captured when the notification was produced.
///
/// The handle always reads the engine's latest view, which may already
/// reflect later notifications; classification uses the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub state: OrderState,
    pub command: OrderCommand,
    pub amount: Decimal,
    pub requested_amount: Decimal,
}

impl OrderSnapshot {
    pub fn of(order: &OrderHandle) -> Self {
        Self {
            state: order.state(),
            command: order.command(),
            amount: order.amount(),
            requested_amount: order.requested_amount(),
        }
    }

    /// Less than the requested amount is filled, including nothing at all.
    pub fn is_partially_filled(&self) -> bool {
        self.amount < self.requested_amount
    }
}

/// One inbound notification, not yet classified.
#[derive(Debug, Clone)]
pub struct RawNotification {
    pub order: OrderHandle,
    pub message_type: MessageType,
    pub reasons: Vec<MessageReason>,
    pub snapshot: OrderSnapshot,
}

impl RawNotification {
    /// Notification with a snapshot taken from the order right now.
    pub fn new(order: OrderHandle, message_type: MessageType, reasons: Vec<MessageReason>) -> Self {
        let snapshot = OrderSnapshot::of(&order);
        Self {
            order,
            message_type,
            reasons,
            snapshot,
        }
    }

    pub fn with_snapshot(mut self, snapshot: OrderSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn has_reason(&self, reason: MessageReason) -> bool {
        self.reasons.contains(&reason)
    }
}
