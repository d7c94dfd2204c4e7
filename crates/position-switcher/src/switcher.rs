//! Position switcher.
//!
//! Serializes buy/sell/flat signals for one instrument. A signal that changes
//! the net direction moves the switcher to `Busy` and starts a command
//! sequence in the background; further signals are ignored until the
//! sequence reports back through `MergeDone` or `CloseDone`.

use crate::fsm::{busy_action, next_state, BusyAction, SwitchState, Trigger};
use common::{RetryPolicy, Settings};
use order_core::{
    generate_order_label, OrderCommand, OrderDirection, OrderParams, PositionOrders,
};
use order_engine::{CommandOptions, OrderUtil, PositionTaskError, TaskError};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Errors of the position switcher.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// The switcher spawns its command sequences on a Tokio runtime.
    #[error("position switcher must be created inside a Tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Command(#[from] TaskError),

    #[error(transparent)]
    Position(#[from] PositionTaskError),
}

/// Configuration for one switcher.
#[derive(Debug, Clone)]
pub struct SwitcherConfig {
    /// Instrument whose position is switched.
    pub instrument: String,
    /// Amount to hold in the signaled direction.
    pub amount: Decimal,
    /// Label prefix for submitted orders.
    pub order_label_prefix: String,
    /// Label prefix for merged position orders.
    pub merge_label_prefix: String,
    /// Retry policy for a whole switch or close sequence.
    pub retry: RetryPolicy,
}

impl SwitcherConfig {
    pub fn new(instrument: impl Into<String>, amount: Decimal) -> Self {
        Self::from_settings(instrument, amount, &Settings::default())
    }

    pub fn from_settings(instrument: impl Into<String>, amount: Decimal, settings: &Settings) -> Self {
        Self {
            instrument: instrument.into(),
            amount,
            order_label_prefix: "Switch_".to_string(),
            merge_label_prefix: settings.merge_label_prefix.clone(),
            retry: settings.switch_retry,
        }
    }

    pub fn with_order_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.order_label_prefix = prefix.into();
        self
    }

    pub fn with_merge_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.merge_label_prefix = prefix.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

struct Inner {
    config: SwitcherConfig,
    order_util: Arc<OrderUtil>,
    position: Arc<PositionOrders>,
    state: Mutex<SwitchState>,
    state_tx: watch::Sender<SwitchState>,
    runtime: Handle,
}

/// State machine over one instrument's position. Clones share the machine.
#[derive(Clone)]
pub struct PositionSwitcher {
    inner: Arc<Inner>,
}

impl PositionSwitcher {
    /// Create a switcher starting in the state of the current position.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: SwitcherConfig, order_util: Arc<OrderUtil>) -> Result<Self, SwitchError> {
        let runtime = Handle::try_current().map_err(|_| SwitchError::NoRuntime)?;
        let position = order_util.position(&config.instrument);
        let initial = SwitchState::from_direction(position.direction());
        let (state_tx, _) = watch::channel(initial);

        info!(
            instrument = %config.instrument,
            amount = %config.amount,
            state = %initial,
            "position switcher created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                order_util,
                position,
                state: Mutex::new(initial),
                state_tx,
                runtime,
            }),
        })
    }

    pub fn config(&self) -> &SwitcherConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SwitchState {
        *self.inner.state.lock()
    }

    /// Receiver that sees every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<SwitchState> {
        self.inner.state_tx.subscribe()
    }

    pub fn send_buy_signal(&self) {
        self.fire(Trigger::Buy);
    }

    pub fn send_sell_signal(&self) {
        self.fire(Trigger::Sell);
    }

    pub fn send_flat_signal(&self) {
        self.fire(Trigger::Flat);
    }

    fn fire(&self, trigger: Trigger) {
        let (from, to) = {
            let mut state = self.inner.state.lock();
            let from = *state;
            let Some(to) = next_state(from, trigger, || self.inner.position.direction()) else {
                debug!(
                    instrument = %self.inner.config.instrument,
                    state = %from,
                    trigger = ?trigger,
                    "trigger ignored"
                );
                return;
            };
            *state = to;
            self.inner.state_tx.send_replace(to);
            (from, to)
        };

        info!(
            instrument = %self.inner.config.instrument,
            from = %from,
            to = %to,
            trigger = ?trigger,
            "switcher transition"
        );

        if to.is_busy() {
            if let Some(action) = busy_action(trigger) {
                let switcher = self.clone();
                self.inner.runtime.spawn(async move {
                    switcher.run_busy(action).await;
                });
            }
        }
    }

    /// Run the entry action with retries, then fire its completion trigger.
    async fn run_busy(self, action: BusyAction) {
        let retry = self.inner.config.retry;
        let label = generate_order_label(&self.inner.config.order_label_prefix);
        let mut submitted = false;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let result = match action {
                BusyAction::Switch(direction) => {
                    self.switch_once(direction, &label, &mut submitted).await
                }
                BusyAction::Close => self.close_once().await,
            };

            match result {
                Ok(()) => break,
                Err(e) if retry.allows_retry(attempts) => {
                    let delay = retry.delay_for(attempts - 1);
                    warn!(
                        instrument = %self.inner.config.instrument,
                        action = ?action,
                        attempt = attempts,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "switch sequence failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        instrument = %self.inner.config.instrument,
                        action = ?action,
                        attempts,
                        error = %e,
                        "switch sequence gave up"
                    );
                    break;
                }
            }
        }

        self.fire(action.completion());
    }

    /// Submit the configured amount plus the absolute exposure toward
    /// `direction`, then merge the position.
    ///
    /// `submitted` survives retries of one sequence: once the submit went
    /// through, later attempts only repeat the merge.
    async fn switch_once(
        &self,
        direction: OrderDirection,
        label: &str,
        submitted: &mut bool,
    ) -> Result<(), SwitchError> {
        let config = &self.inner.config;

        let command = match direction {
            OrderDirection::Long => OrderCommand::Buy,
            OrderDirection::Short => OrderCommand::Sell,
            OrderDirection::Flat => return self.close_once().await,
        };

        if !*submitted {
            let exposure = self.inner.position.signed_exposure();
            let amount = config.amount + exposure.abs();
            debug!(
                instrument = %config.instrument,
                label = %label,
                command = ?command,
                exposure = %exposure,
                amount = %amount,
                "submitting switch order"
            );
            let params = OrderParams::new(config.instrument.clone(), label, command, amount);
            self.inner
                .order_util
                .submit_order(params, CommandOptions::new())
                .await?;
            *submitted = true;
        }

        let merge_label = format!("{}{}", config.merge_label_prefix, label);
        self.inner
            .order_util
            .merge_position(&config.instrument, &merge_label, CommandOptions::new())
            .await?;
        Ok(())
    }

    async fn close_once(&self) -> Result<(), SwitchError> {
        self.inner
            .order_util
            .close_position(&self.inner.config.instrument, CommandOptions::new())
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for PositionSwitcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionSwitcher")
            .field("instrument", &self.inner.config.instrument)
            .field("state", &self.state())
            .finish()
    }
}
