//! Notification classification.

use crate::event::EventType;
use crate::notification::{MessageReason, MessageType, OrderSnapshot, RawNotification};
use crate::order::OrderState;

/// Reasons that report a changed attribute, in priority order.
const CHANGE_REASONS: [(MessageReason, EventType); 6] = [
    (MessageReason::OrderChangedLabel, EventType::ChangedLabel),
    (MessageReason::OrderChangedGtt, EventType::ChangedGtt),
    (MessageReason::OrderChangedAmount, EventType::ChangedAmount),
    (MessageReason::OrderChangedPrice, EventType::ChangedPrice),
    (MessageReason::OrderChangedSl, EventType::ChangedSl),
    (MessageReason::OrderChangedTp, EventType::ChangedTp),
];

/// Reasons that report why an order was closed, in priority order.
const CLOSE_REASONS: [(MessageReason, EventType); 3] = [
    (MessageReason::OrderClosedByMerge, EventType::ClosedByMerge),
    (MessageReason::OrderClosedBySl, EventType::ClosedBySl),
    (MessageReason::OrderClosedByTp, EventType::ClosedByTp),
];

/// Classify a notification. Total and deterministic.
pub fn classify(notification: &RawNotification) -> EventType {
    classify_parts(
        notification.message_type,
        &notification.reasons,
        &notification.snapshot,
    )
}

/// Classify from the individual notification parts.
pub fn classify_parts(
    message_type: MessageType,
    reasons: &[MessageReason],
    snapshot: &OrderSnapshot,
) -> EventType {
    match message_type {
        MessageType::Notification => EventType::Notification,
        MessageType::OrderSubmitRejected => EventType::SubmitRejected,
        MessageType::OrderFillRejected => EventType::FillRejected,
        MessageType::OrderSubmitOk => {
            if snapshot.command.is_conditional() {
                EventType::SubmitConditionalOk
            } else {
                EventType::SubmitOk
            }
        }
        // The fill check runs before any reason is looked at.
        MessageType::OrderFillOk | MessageType::OrderChangedOk
            if snapshot.is_partially_filled() =>
        {
            EventType::PartialFillOk
        }
        MessageType::OrderFillOk => {
            if reasons.contains(&MessageReason::OrderFullyFilled) {
                EventType::FullyFilled
            } else {
                EventType::Notification
            }
        }
        MessageType::OrderChangedOk => {
            first_matching(reasons, &CHANGE_REASONS).unwrap_or(EventType::Notification)
        }
        MessageType::OrderChangedRejected => EventType::ChangedRejected,
        MessageType::OrderCloseOk => {
            if let Some(event_type) = first_matching(reasons, &CLOSE_REASONS) {
                event_type
            } else if snapshot.state == OrderState::Filled {
                EventType::PartialCloseOk
            } else {
                EventType::CloseOk
            }
        }
        MessageType::OrderCloseRejected => EventType::CloseRejected,
        MessageType::OrdersMergeOk => {
            if snapshot.state == OrderState::Closed {
                EventType::MergeCloseOk
            } else {
                EventType::MergeOk
            }
        }
        MessageType::OrdersMergeRejected => EventType::MergeRejected,
        MessageType::Other => EventType::Notification,
    }
}

fn first_matching(
    reasons: &[MessageReason],
    table: &[(MessageReason, EventType)],
) -> Option<EventType> {
    table
        .iter()
        .find(|(reason, _)| reasons.contains(reason))
        .map(|(_, event_type)| *event_type)
}
