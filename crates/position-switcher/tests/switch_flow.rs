use std::sync::Arc;
use std::time::Duration;

use common::RetryPolicy;
use metrics::create_metrics;
use order_core::{create_position_registry, OrderDirection};
use order_engine::{BlockingPoolExecutor, CorrelationEngine, OrderEventGateway, OrderUtil, PaperEngine};
use position_switcher::{PositionSwitcher, SwitchState, SwitcherConfig};
use rust_decimal_macros::dec;

struct Harness {
    paper: Arc<PaperEngine>,
    util: Arc<OrderUtil>,
    switcher: PositionSwitcher,
}

fn harness(retry: RetryPolicy) -> Harness {
    let metrics = create_metrics();
    let gateway = OrderEventGateway::new(256).with_metrics(Arc::clone(&metrics));
    let paper = Arc::new(PaperEngine::new(Arc::new(gateway.clone())));
    let correlation = CorrelationEngine::new(Arc::new(BlockingPoolExecutor::new(2)), gateway)
        .with_metrics(metrics);
    let util = Arc::new(OrderUtil::new(
        paper.clone(),
        correlation,
        create_position_registry(),
    ));
    let config = SwitcherConfig::new("EURUSD", dec!(0.1))
        .with_order_label_prefix("Flow_")
        .with_retry(retry);
    let switcher = PositionSwitcher::new(config, Arc::clone(&util)).unwrap();

    Harness {
        paper,
        util,
        switcher,
    }
}

async fn settle(switcher: &PositionSwitcher, expected: SwitchState) {
    let mut states = switcher.subscribe_state();
    tokio::time::timeout(Duration::from_secs(5), states.wait_for(|s| *s == expected))
        .await
        .expect("switcher did not settle in time")
        .expect("state channel closed");
}

#[tokio::test]
async fn test_buy_sell_flat_cycle() {
    let h = harness(RetryPolicy::none());
    assert_eq!(h.switcher.state(), SwitchState::Flat);

    h.switcher.send_buy_signal();
    assert_eq!(h.switcher.state(), SwitchState::Busy);
    settle(&h.switcher, SwitchState::Long).await;

    let position = h.util.position("EURUSD");
    assert_eq!(position.signed_exposure(), dec!(0.1));

    h.switcher.send_sell_signal();
    settle(&h.switcher, SwitchState::Short).await;
    assert_eq!(position.signed_exposure(), dec!(-0.1));
    assert_eq!(position.len(), 1);
    assert!(position.orders()[0].label().starts_with("MergedPosition_Flow_"));

    h.switcher.send_flat_signal();
    settle(&h.switcher, SwitchState::Flat).await;
    assert!(position.is_empty());
    assert_eq!(position.direction(), OrderDirection::Flat);
}

#[tokio::test]
async fn test_signals_ignored_while_busy_or_redundant() {
    let h = harness(RetryPolicy::none());

    h.switcher.send_buy_signal();
    h.switcher.send_sell_signal();
    h.switcher.send_flat_signal();
    settle(&h.switcher, SwitchState::Long).await;
    assert_eq!(h.paper.submit_calls(), 1);

    h.switcher.send_buy_signal();
    assert_eq!(h.switcher.state(), SwitchState::Long);
    assert_eq!(h.paper.submit_calls(), 1);
}

#[tokio::test]
async fn test_rejected_submit_is_retried() {
    let h = harness(RetryPolicy::fixed(2, Duration::from_millis(10)));
    h.paper.reject_next_submits(1);

    h.switcher.send_sell_signal();
    settle(&h.switcher, SwitchState::Short).await;

    assert_eq!(h.paper.submit_calls(), 2);
    assert_eq!(h.util.position("EURUSD").signed_exposure(), dec!(-0.1));
}

#[tokio::test]
async fn test_exhausted_retries_resolve_from_position() {
    let h = harness(RetryPolicy::fixed(1, Duration::from_millis(5)));
    h.paper.reject_next_submits(u32::MAX);

    h.switcher.send_buy_signal();
    settle(&h.switcher, SwitchState::Flat).await;

    assert_eq!(h.paper.submit_calls(), 2);
    assert!(h.util.position("EURUSD").is_empty());
    assert!(h.util.correlation().metrics().commands_failed() >= 2);
}

#[tokio::test]
async fn test_failed_close_still_reaches_flat() {
    let h = harness(RetryPolicy::none());

    h.switcher.send_buy_signal();
    settle(&h.switcher, SwitchState::Long).await;

    h.paper.reject_next_closes(1);
    h.switcher.send_flat_signal();
    settle(&h.switcher, SwitchState::Flat).await;

    // The rejected order stays tracked and idle for the next attempt.
    let position = h.util.position("EURUSD");
    assert_eq!(position.len(), 1);
    assert_eq!(position.direction(), OrderDirection::Long);
}

/// Leave a 0.1 long behind while the switcher reports `Flat`.
async fn flat_with_residual_long(h: &Harness, close_rejects: u32) {
    h.switcher.send_buy_signal();
    settle(&h.switcher, SwitchState::Long).await;

    h.paper.reject_next_closes(close_rejects);
    h.switcher.send_flat_signal();
    settle(&h.switcher, SwitchState::Flat).await;
    assert_eq!(h.util.position("EURUSD").signed_exposure(), dec!(0.1));
}

#[tokio::test]
async fn test_buy_with_residual_long_adds_exposure() {
    let h = harness(RetryPolicy::none());
    flat_with_residual_long(&h, 1).await;

    h.switcher.send_buy_signal();
    settle(&h.switcher, SwitchState::Long).await;

    // 0.1 configured plus 0.1 residual, merged with the residual order.
    assert_eq!(h.paper.submit_calls(), 2);
    let position = h.util.position("EURUSD");
    assert_eq!(position.signed_exposure(), dec!(0.3));
    assert_eq!(position.len(), 1);
    assert!(position.orders()[0].label().starts_with("MergedPosition_Flow_"));
}

#[tokio::test]
async fn test_sell_with_residual_long_flips_to_short() {
    let h = harness(RetryPolicy::none());
    flat_with_residual_long(&h, 1).await;

    h.switcher.send_sell_signal();
    settle(&h.switcher, SwitchState::Short).await;

    assert_eq!(h.paper.submit_calls(), 2);
    let position = h.util.position("EURUSD");
    assert_eq!(position.signed_exposure(), dec!(-0.1));
    assert_eq!(position.len(), 1);
}

#[tokio::test]
async fn test_merge_retry_does_not_submit_again() {
    let h = harness(RetryPolicy::fixed(1, Duration::from_millis(10)));
    flat_with_residual_long(&h, 2).await;

    h.paper.reject_next_merges(1);
    h.switcher.send_buy_signal();
    settle(&h.switcher, SwitchState::Long).await;

    assert_eq!(h.paper.submit_calls(), 2);
    assert_eq!(h.paper.merge_calls(), 2);
    let position = h.util.position("EURUSD");
    assert_eq!(position.signed_exposure(), dec!(0.3));
    assert_eq!(position.len(), 1);
}
