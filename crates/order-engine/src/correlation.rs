//! Command/event correlation.
//!
//! Engine notifications carry no request id. A command is matched to its
//! notifications by order identity and by the event types of its call kind:
//!
//! 1. Subscribe to the event stream
//! 2. Run the engine call on the executor, which returns the order
//! 3. Wait for events on that order; ignore types outside the kind's set,
//!    fire callbacks for info types, stop on the first done or reject type
//! 4. On reject or engine fault, retry per the command's policy
//!
//! Subscribing before the call means events emitted while the call is still
//! running are buffered, not lost.

use crate::command::CommandSpec;
use crate::error::{AttemptError, CommandError};
use crate::executor::OrderExecutor;
use crate::gateway::OrderEventGateway;
use metrics::{create_metrics, SharedMetrics};
use order_core::{EventType, OrderHandle};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, trace, warn};

/// Runs commands and correlates them with order events.
///
/// Commands on different orders run fully concurrently. Two change commands
/// racing on the same order each see only their own event types, but callers
/// should not issue conflicting changes to one order at the same time.
pub struct CorrelationEngine {
    executor: Arc<dyn OrderExecutor>,
    gateway: OrderEventGateway,
    metrics: SharedMetrics,
}

impl CorrelationEngine {
    pub fn new(executor: Arc<dyn OrderExecutor>, gateway: OrderEventGateway) -> Self {
        Self {
            executor,
            gateway,
            metrics: create_metrics(),
        }
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn gateway(&self) -> &OrderEventGateway {
        &self.gateway
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Run a command to completion.
    ///
    /// Resolves exactly once: with the order after a done event, or with the
    /// last attempt's error once retries are exhausted. Dropping the future
    /// cancels the command and its subscription.
    pub async fn execute(&self, spec: &CommandSpec) -> Result<OrderHandle, CommandError> {
        let call_kind = spec.call_kind();
        let retry = spec.retry();

        self.metrics.inc_commands_started();
        spec.fire_start();
        debug!(call_kind = %call_kind, max_attempts = retry.max_attempts(), "command started");

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            self.metrics.inc_attempts();

            let cause = match self.attempt(spec).await {
                Ok(order) => {
                    self.metrics.inc_commands_completed();
                    info!(
                        call_kind = %call_kind,
                        order_id = %order.order_id(),
                        attempts,
                        "command completed"
                    );
                    spec.fire_complete(&order);
                    return Ok(order);
                }
                Err(cause) => cause,
            };

            if cause.is_retryable() && retry.allows_retry(attempts) {
                let delay = retry.delay_for(attempts - 1);
                warn!(
                    call_kind = %call_kind,
                    attempt = attempts,
                    error = %cause,
                    delay_ms = delay.as_millis() as u64,
                    "command attempt failed, retrying"
                );
                self.metrics.inc_retries();
                tokio::time::sleep(delay).await;
                continue;
            }

            let error = CommandError {
                call_kind,
                attempts,
                cause,
            };
            self.metrics.inc_commands_failed();
            error!(call_kind = %call_kind, error = %error, "command failed");
            spec.fire_error(&error);
            return Err(error);
        }
    }

    async fn attempt(&self, spec: &CommandSpec) -> Result<OrderHandle, AttemptError> {
        let mut events = self.gateway.subscribe();

        let order = self.executor.run(spec.callable()).await.map_err(|e| {
            if let AttemptError::Fault(fault) = &e {
                self.metrics.inc_executor_faults();
                debug!(call_kind = %spec.call_kind(), fault = %fault, "engine call faulted");
            }
            e
        })?;

        trace!(
            call_kind = %spec.call_kind(),
            order_id = %order.order_id(),
            "awaiting order events"
        );

        let event_types = spec.event_types();
        let mut fired: HashSet<EventType> = HashSet::new();

        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        order_id = %order.order_id(),
                        skipped,
                        "order event subscriber lagged"
                    );
                    self.metrics.add_events_lagged(skipped);
                    continue;
                }
                Err(RecvError::Closed) => return Err(AttemptError::StreamClosed),
            };

            if event.order != order {
                continue;
            }

            let event_type = event.event_type;
            if !event_types.contains(event_type) {
                trace!(
                    order_id = %order.order_id(),
                    event_type = %event_type,
                    "ignoring event of another command"
                );
                continue;
            }

            if fired.insert(event_type) {
                spec.fire_event(event_type, &event.order);
            }

            if event_types.is_done(event_type) {
                return Ok(order);
            }
            if event_types.is_reject(event_type) {
                self.metrics.inc_rejects();
                return Err(AttemptError::Rejected { event_type });
            }
        }
    }
}
