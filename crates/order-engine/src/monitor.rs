//! Background position monitor.
//!
//! Orders can leave a position without a command of ours: a stop loss or
//! take profit hit, a merge issued elsewhere, a close from another client.
//! The monitor watches the event stream and drops such orders from the
//! registry.

use crate::gateway::{OrderEvent, OrderEventGateway};
use order_core::SharedPositionRegistry;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawn the monitor. It runs until `shutdown` turns true, the shutdown
/// sender is dropped, or the event stream closes.
///
/// Subscribes before spawning, so events published after this call returns
/// are seen.
pub fn spawn_position_monitor(
    gateway: &OrderEventGateway,
    positions: SharedPositionRegistry,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let mut events = gateway.subscribe();

    tokio::spawn(async move {
        info!("position monitor started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                received = events.recv() => match received {
                    Ok(event) => handle_event(&positions, &event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "position monitor lagged, exits may be missed");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        info!("position monitor stopped");
    })
}

fn handle_event(positions: &SharedPositionRegistry, event: &OrderEvent) {
    if !event.event_type.is_position_exit() {
        return;
    }

    if let Some(position) = positions.find_tracking(&event.order) {
        position.remove(&event.order);
        debug!(
            instrument = %position.instrument(),
            order_id = %event.order.order_id(),
            event_type = %event.event_type,
            "order left position"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::PaperEngine;
    use order_core::{
        create_position_registry, MessageReason, OrderCommand, OrderEngine, OrderParams,
    };
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;

    async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
        for _ in 0..100 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        condition()
    }

    #[tokio::test]
    async fn test_stop_loss_hit_leaves_position() {
        let gateway = OrderEventGateway::new(64);
        let paper = PaperEngine::new(Arc::new(gateway.clone()));
        let positions = create_position_registry();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = spawn_position_monitor(&gateway, Arc::clone(&positions), shutdown_rx);

        let params = OrderParams::new("EURUSD", "Monitored", OrderCommand::Buy, dec!(0.1));
        let order = paper.submit_order(&params).unwrap();
        let position = positions.position("EURUSD");
        position.add(&order);

        paper
            .order(order.order_id())
            .unwrap()
            .close_by(MessageReason::OrderClosedBySl)
            .unwrap();

        assert!(eventually(|| !position.contains(&order)).await);
        monitor.abort();
    }

    #[tokio::test]
    async fn test_untracked_and_non_exit_events_ignored() {
        let gateway = OrderEventGateway::new(64);
        let paper = PaperEngine::new(Arc::new(gateway.clone()));
        let positions = create_position_registry();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = spawn_position_monitor(&gateway, Arc::clone(&positions), shutdown_rx);

        let params = OrderParams::new("EURUSD", "Kept", OrderCommand::Sell, dec!(0.1));
        let tracked = paper.submit_order(&params).unwrap();
        positions.position("EURUSD").add(&tracked);
        tracked.set_label("Relabeled").unwrap();

        // A close of an untracked order must not disturb the tracked one.
        let other = paper.submit_order(&params).unwrap();
        other.close().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(positions.position("EURUSD").contains(&tracked));
        monitor.abort();
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let gateway = OrderEventGateway::new(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = spawn_position_monitor(&gateway, create_position_registry(), shutdown_rx);

        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), monitor)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(gateway.subscriber_count(), 0);
    }
}
