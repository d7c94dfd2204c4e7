//! Inbound order event stream.
//!
//! The engine binding pushes raw notifications into the gateway. Each one is
//! classified once and multicast to every subscriber in arrival order.

use metrics::SharedMetrics;
use order_core::{classify, EventType, MessageType, OrderHandle, RawNotification};
use tokio::sync::broadcast;
use tracing::trace;

/// A classified order notification.
#[derive(Debug, Clone)]
pub struct OrderEvent {
    pub order: OrderHandle,
    pub event_type: EventType,
    pub message_type: MessageType,
}

/// Receives raw notifications from an engine binding.
pub trait NotificationSink: Send + Sync {
    fn on_notification(&self, notification: RawNotification);
}

/// Multicast source of classified order events.
#[derive(Clone)]
pub struct OrderEventGateway {
    sender: broadcast::Sender<OrderEvent>,
    metrics: Option<SharedMetrics>,
}

impl OrderEventGateway {
    /// `capacity` bounds how far a slow subscriber may fall behind.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Classify and publish a notification.
    pub fn publish(&self, notification: RawNotification) -> EventType {
        let event_type = classify(&notification);

        trace!(
            order_id = %notification.order.order_id(),
            message_type = ?notification.message_type,
            event_type = %event_type,
            "order event"
        );

        if let Some(metrics) = &self.metrics {
            metrics.inc_events_published();
        }

        // No subscribers is fine: nobody is waiting on this order.
        let _ = self.sender.send(OrderEvent {
            order: notification.order,
            event_type,
            message_type: notification.message_type,
        });

        event_type
    }
}

impl NotificationSink for OrderEventGateway {
    fn on_notification(&self, notification: RawNotification) {
        self.publish(notification);
    }
}

impl std::fmt::Debug for OrderEventGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderEventGateway")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_core::{MessageReason, OrderCommand, OrderHandle, OrderState};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    #[derive(Debug)]
    struct StubOrder(OrderCommand);

    impl order_core::EngineOrder for StubOrder {
        fn id(&self) -> order_core::OrderId {
            order_core::OrderId::new("stub")
        }
        fn instrument(&self) -> String {
            "EURUSD".to_string()
        }
        fn label(&self) -> String {
            "Stub".to_string()
        }
        fn state(&self) -> OrderState {
            OrderState::Filled
        }
        fn command(&self) -> OrderCommand {
            self.0
        }
        fn amount(&self) -> Decimal {
            Decimal::ONE
        }
        fn requested_amount(&self) -> Decimal {
            Decimal::ONE
        }
        fn open_price(&self) -> Decimal {
            Decimal::ONE
        }
        fn stop_loss_price(&self) -> Option<Decimal> {
            None
        }
        fn take_profit_price(&self) -> Option<Decimal> {
            None
        }
        fn good_till_time(&self) -> Option<i64> {
            None
        }
        fn close(&self) -> Result<(), order_core::EngineFault> {
            Ok(())
        }
        fn set_label(&self, _: &str) -> Result<(), order_core::EngineFault> {
            Ok(())
        }
        fn set_good_till_time(&self, _: i64) -> Result<(), order_core::EngineFault> {
            Ok(())
        }
        fn set_requested_amount(&self, _: Decimal) -> Result<(), order_core::EngineFault> {
            Ok(())
        }
        fn set_open_price(&self, _: Decimal) -> Result<(), order_core::EngineFault> {
            Ok(())
        }
        fn set_stop_loss_price(&self, _: Option<Decimal>) -> Result<(), order_core::EngineFault> {
            Ok(())
        }
        fn set_take_profit_price(&self, _: Option<Decimal>) -> Result<(), order_core::EngineFault> {
            Ok(())
        }
    }

    fn order() -> OrderHandle {
        OrderHandle::new(Arc::new(StubOrder(OrderCommand::Buy)))
    }

    #[test]
    fn test_publish_classifies() {
        let gateway = OrderEventGateway::new(8);
        let mut events = gateway.subscribe();

        let event_type = gateway.publish(RawNotification::new(
            order(),
            MessageType::OrderCloseOk,
            vec![MessageReason::OrderClosedByTp],
        ));

        assert_eq!(event_type, EventType::ClosedByTp);
        let event = events.try_recv().unwrap();
        assert_eq!(event.event_type, EventType::ClosedByTp);
        assert_eq!(event.message_type, MessageType::OrderCloseOk);
        assert_eq!(event.order.order_id().as_str(), "stub");
    }

    #[test]
    fn test_every_subscriber_sees_arrival_order() {
        let metrics = metrics::create_metrics();
        let gateway = OrderEventGateway::new(8).with_metrics(Arc::clone(&metrics));
        let mut first = gateway.subscribe();
        let mut second = gateway.subscribe();
        assert_eq!(gateway.subscriber_count(), 2);

        gateway.on_notification(RawNotification::new(order(), MessageType::OrderSubmitOk, vec![]));
        gateway.on_notification(RawNotification::new(
            order(),
            MessageType::OrderFillOk,
            vec![MessageReason::OrderFullyFilled],
        ));

        for receiver in [&mut first, &mut second] {
            assert_eq!(receiver.try_recv().unwrap().event_type, EventType::SubmitOk);
            assert_eq!(receiver.try_recv().unwrap().event_type, EventType::FullyFilled);
            assert!(receiver.try_recv().is_err());
        }
        assert_eq!(metrics.events_published(), 2);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let gateway = OrderEventGateway::new(1);
        let event_type =
            gateway.publish(RawNotification::new(order(), MessageType::Other, vec![]));
        assert_eq!(event_type, EventType::Notification);
    }
}
