use common::Settings;
use metrics::create_metrics;
use order_core::{create_position_registry, MessageReason};
use order_engine::{
    spawn_position_monitor, BlockingPoolExecutor, CommandOptions, CorrelationEngine,
    OrderEventGateway, OrderUtil, PaperEngine,
};
use position_switcher::{PositionSwitcher, SwitcherConfig};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// How long to wait for the switcher to leave `Busy`.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    common::init_logging();

    let mut args = std::env::args().skip(1);
    let instrument = args.next().unwrap_or_else(|| "EURUSD".to_string());
    let amount = match args.next().map(|raw| Decimal::from_str(&raw)) {
        Some(Ok(amount)) if amount > Decimal::ZERO => amount,
        Some(_) => {
            warn!("invalid amount argument, using 0.1");
            Decimal::new(1, 1)
        }
        None => Decimal::new(1, 1),
    };

    let settings = Settings::from_env();
    info!(
        instrument = %instrument,
        amount = %amount,
        settings = ?settings,
        "Starting paper switcher demo"
    );

    let metrics = create_metrics();
    let gateway = OrderEventGateway::new(settings.event_capacity).with_metrics(metrics.clone());
    let paper = Arc::new(PaperEngine::new(Arc::new(gateway.clone())));
    let executor = Arc::new(BlockingPoolExecutor::new(settings.executor_threads));
    let correlation =
        CorrelationEngine::new(executor.clone(), gateway.clone()).with_metrics(metrics.clone());
    let positions = create_position_registry();
    let util = Arc::new(OrderUtil::new(paper.clone(), correlation, positions.clone()));

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_handle = spawn_position_monitor(&gateway, positions, shutdown_rx);

    // Spawn ctrl_c handler
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, initiating shutdown");
            let _ = shutdown_tx_clone.send(true);
        }
    });

    let config = SwitcherConfig::from_settings(instrument.clone(), amount, &settings);
    let switcher = match PositionSwitcher::new(config, util.clone()) {
        Ok(switcher) => switcher,
        Err(e) => {
            error!(error = %e, "Failed to create position switcher");
            return;
        }
    };

    let mut shutdown_rx = shutdown_tx.subscribe();
    let demo = async {
        switcher.send_buy_signal();
        settle(&switcher).await;
        log_position(&util, &instrument);

        switcher.send_sell_signal();
        settle(&switcher).await;
        log_position(&util, &instrument);

        simulate_stop_loss(&util, &paper, &instrument).await;
        log_position(&util, &instrument);

        switcher.send_flat_signal();
        settle(&switcher).await;
        log_position(&util, &instrument);
    };

    tokio::select! {
        _ = demo => info!("Demo finished"),
        _ = shutdown_rx.changed() => info!("Demo interrupted"),
    }

    let _ = shutdown_tx.send(true);
    executor.close();
    let _ = monitor_handle.await;

    // Print final metrics
    let snapshot = metrics.snapshot();
    println!("\n{}", snapshot);

    info!(status = %snapshot.health_status(), "Shutdown complete");
}

/// Wait until the switcher leaves `Busy`.
async fn settle(switcher: &PositionSwitcher) {
    let mut states = switcher.subscribe_state();
    let settled = tokio::time::timeout(SETTLE_TIMEOUT, states.wait_for(|s| !s.is_busy()))
        .await
        .map(|waited| waited.map(|state| *state));
    match settled {
        Ok(Ok(state)) => info!(state = %state, "Switcher settled"),
        Ok(Err(_)) => warn!("Switcher state channel closed"),
        Err(_) => warn!(state = %switcher.state(), "Switcher did not settle in time"),
    }
}

fn log_position(util: &OrderUtil, instrument: &str) {
    let position = util.position(instrument);
    info!(
        instrument = %instrument,
        direction = %position.direction(),
        exposure = %position.signed_exposure(),
        orders = position.len(),
        "Position"
    );
}

/// Put a stop loss on every open order and let the paper engine hit it.
/// The position monitor drops the orders once the exits are published.
async fn simulate_stop_loss(util: &OrderUtil, paper: &PaperEngine, instrument: &str) {
    for order in util.position(instrument).orders() {
        let stop = order.open_price();
        if let Err(e) = util
            .set_stop_loss_price(&order, Some(stop), CommandOptions::new())
            .await
        {
            warn!(order_id = %order.order_id(), error = %e, "Failed to set stop loss");
            continue;
        }

        if let Some(paper_order) = paper.order(order.order_id()) {
            if let Err(e) = paper_order.close_by(MessageReason::OrderClosedBySl) {
                warn!(order_id = %order.order_id(), error = %e, "Stop loss not triggered");
            }
        }
    }

    // Give the monitor a moment to catch up with the exit events.
    tokio::time::sleep(Duration::from_millis(50)).await;

    if util.position(instrument).is_empty() {
        info!(instrument = %instrument, "Position stopped out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use position_switcher::SwitchState;

    fn switcher() -> (Arc<OrderUtil>, PositionSwitcher) {
        let gateway = OrderEventGateway::new(64);
        let paper = Arc::new(PaperEngine::new(Arc::new(gateway.clone())));
        let correlation = CorrelationEngine::new(Arc::new(BlockingPoolExecutor::new(2)), gateway);
        let util = Arc::new(OrderUtil::new(paper, correlation, create_position_registry()));
        let config = SwitcherConfig::new("EURUSD", Decimal::new(1, 1));
        let switcher = PositionSwitcher::new(config, util.clone()).unwrap();
        (util, switcher)
    }

    #[tokio::test]
    async fn test_settle_waits_for_switch() {
        let (util, switcher) = switcher();

        switcher.send_buy_signal();
        settle(&switcher).await;

        assert_eq!(switcher.state(), SwitchState::Long);
        assert_eq!(util.position("EURUSD").signed_exposure(), Decimal::new(1, 1));
    }

    #[tokio::test]
    async fn test_settle_returns_when_idle() {
        let (_util, switcher) = switcher();
        settle(&switcher).await;
        assert!(!switcher.state().is_busy());
    }
}
