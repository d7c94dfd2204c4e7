//! Order facade.
//!
//! One async operation per call kind. Each builds the `CommandSpec` for its
//! kind and runs it through the correlation engine. Commands that would not
//! change anything are suppressed before the engine is touched, and the
//! per-instrument position registry is kept in step with completed commands.

use crate::command::{CommandOptions, CommandSpec};
use crate::correlation::CorrelationEngine;
use crate::error::{PositionTaskError, TaskError};
use futures_util::future::join_all;
use order_core::{
    CallKind, EngineFault, OrderEngine, OrderHandle, OrderParams, PositionOrders,
    SharedPositionRegistry,
};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Async order operations with position tracking.
pub struct OrderUtil {
    engine: Arc<dyn OrderEngine>,
    correlation: CorrelationEngine,
    positions: SharedPositionRegistry,
}

impl OrderUtil {
    pub fn new(
        engine: Arc<dyn OrderEngine>,
        correlation: CorrelationEngine,
        positions: SharedPositionRegistry,
    ) -> Self {
        Self {
            engine,
            correlation,
            positions,
        }
    }

    pub fn correlation(&self) -> &CorrelationEngine {
        &self.correlation
    }

    pub fn positions(&self) -> &SharedPositionRegistry {
        &self.positions
    }

    /// Tracked orders of `instrument`.
    pub fn position(&self, instrument: &str) -> Arc<PositionOrders> {
        self.positions.position(instrument)
    }

    /// Submit a new order. A filled order joins its instrument's position.
    pub async fn submit_order(
        &self,
        params: OrderParams,
        options: CommandOptions,
    ) -> Result<OrderHandle, TaskError> {
        let engine = Arc::clone(&self.engine);
        let instrument = params.instrument.clone();
        let spec = CommandSpec::new(
            CallKind::Submit,
            move || engine.submit_order(&params),
            options,
        )?;

        let order = self.correlation.execute(&spec).await?;
        if order.is_filled() {
            self.positions.position(&instrument).add(&order);
        }
        Ok(order)
    }

    /// Merge `orders` into one under `label`.
    ///
    /// Fewer than two orders is a no-op and resolves to `None`. On success
    /// the sources leave their position and the merged order joins it if it
    /// still carries an amount.
    pub async fn merge_orders(
        &self,
        label: &str,
        orders: &[OrderHandle],
        options: CommandOptions,
    ) -> Result<Option<OrderHandle>, TaskError> {
        if orders.len() < 2 {
            self.correlation.metrics().inc_commands_suppressed();
            debug!(label = %label, count = orders.len(), "merge suppressed, nothing to merge");
            return Ok(None);
        }

        let engine = Arc::clone(&self.engine);
        let sources = orders.to_vec();
        let merge_label = label.to_string();
        let spec = CommandSpec::new(
            CallKind::Merge,
            move || engine.merge_orders(&merge_label, &sources),
            options,
        )?;

        let merged = self.correlation.execute(&spec).await?;

        let position = self.positions.position(&merged.instrument());
        for source in orders {
            position.remove(source);
        }
        if merged.is_filled() {
            position.add(&merged);
        }
        Ok(Some(merged))
    }

    /// Close an order. Closing an already closed order is a no-op.
    pub async fn close(
        &self,
        order: &OrderHandle,
        options: CommandOptions,
    ) -> Result<OrderHandle, TaskError> {
        let target = order.clone();
        let spec = CommandSpec::new(
            CallKind::Close,
            move || {
                target.close()?;
                Ok(target.clone())
            },
            options,
        )?;

        if order.is_closed() {
            return Ok(self.suppress(&spec, order, "already closed"));
        }

        let closed = self.correlation.execute(&spec).await?;
        if let Some(position) = self.positions.get(&closed.instrument()) {
            position.remove(&closed);
        }
        Ok(closed)
    }

    pub async fn set_label(
        &self,
        order: &OrderHandle,
        label: &str,
        options: CommandOptions,
    ) -> Result<OrderHandle, TaskError> {
        let new_label = label.to_string();
        self.change(
            order,
            CallKind::ChangeLabel,
            order.label(),
            label.to_string(),
            options,
            move |o| o.set_label(&new_label),
        )
        .await
    }

    pub async fn set_good_till_time(
        &self,
        order: &OrderHandle,
        good_till_ms: i64,
        options: CommandOptions,
    ) -> Result<OrderHandle, TaskError> {
        self.change(
            order,
            CallKind::ChangeGtt,
            order.good_till_time(),
            Some(good_till_ms),
            options,
            move |o| o.set_good_till_time(good_till_ms),
        )
        .await
    }

    pub async fn set_requested_amount(
        &self,
        order: &OrderHandle,
        amount: Decimal,
        options: CommandOptions,
    ) -> Result<OrderHandle, TaskError> {
        self.change(
            order,
            CallKind::ChangeAmount,
            order.requested_amount(),
            amount,
            options,
            move |o| o.set_requested_amount(amount),
        )
        .await
    }

    pub async fn set_open_price(
        &self,
        order: &OrderHandle,
        price: Decimal,
        options: CommandOptions,
    ) -> Result<OrderHandle, TaskError> {
        self.change(
            order,
            CallKind::ChangePrice,
            order.open_price(),
            price,
            options,
            move |o| o.set_open_price(price),
        )
        .await
    }

    /// Set or clear (`None`) the stop loss.
    pub async fn set_stop_loss_price(
        &self,
        order: &OrderHandle,
        price: Option<Decimal>,
        options: CommandOptions,
    ) -> Result<OrderHandle, TaskError> {
        self.change(
            order,
            CallKind::ChangeSl,
            order.stop_loss_price(),
            price,
            options,
            move |o| o.set_stop_loss_price(price),
        )
        .await
    }

    /// Set or clear (`None`) the take profit.
    pub async fn set_take_profit_price(
        &self,
        order: &OrderHandle,
        price: Option<Decimal>,
        options: CommandOptions,
    ) -> Result<OrderHandle, TaskError> {
        self.change(
            order,
            CallKind::ChangeTp,
            order.take_profit_price(),
            price,
            options,
            move |o| o.set_take_profit_price(price),
        )
        .await
    }

    /// Merge every idle filled order of `instrument` under `label`.
    pub async fn merge_position(
        &self,
        instrument: &str,
        label: &str,
        options: CommandOptions,
    ) -> Result<Option<OrderHandle>, PositionTaskError> {
        let position = self.positions.position(instrument);
        let selected = position.filter_idle(OrderHandle::is_filled);
        if selected.len() < 2 {
            debug!(
                instrument = %instrument,
                filled = selected.len(),
                "position merge skipped"
            );
            return Ok(None);
        }

        position.mark_active(&selected);
        info!(instrument = %instrument, label = %label, orders = selected.len(), "merging position");

        match self.merge_orders(label, &selected, options).await {
            Ok(merged) => Ok(merged),
            Err(source) => {
                position.mark_idle(&selected);
                warn!(instrument = %instrument, error = %source, "position merge failed");
                Err(PositionTaskError::Merge {
                    instrument: instrument.to_string(),
                    source,
                })
            }
        }
    }

    /// Close every idle filled or opened order of `instrument` concurrently.
    ///
    /// Orders whose close failed go back to idle; the error lists every failure.
    pub async fn close_position(
        &self,
        instrument: &str,
        options: CommandOptions,
    ) -> Result<Vec<OrderHandle>, PositionTaskError> {
        let position = self.positions.position(instrument);
        let selected = position.filter_idle(|o| o.is_filled() || o.is_opened());
        if selected.is_empty() {
            debug!(instrument = %instrument, "position close skipped, nothing open");
            return Ok(Vec::new());
        }

        position.mark_active(&selected);
        info!(instrument = %instrument, orders = selected.len(), "closing position");

        let results = join_all(
            selected
                .iter()
                .map(|order| self.close(order, options.clone())),
        )
        .await;

        let mut closed = Vec::with_capacity(selected.len());
        let mut failed = Vec::new();
        let mut errors = Vec::new();
        for (order, result) in selected.iter().zip(results) {
            match result {
                Ok(order) => closed.push(order),
                Err(e) => {
                    failed.push(order.clone());
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() {
            return Ok(closed);
        }

        position.mark_idle(&failed);
        let error = PositionTaskError::Close {
            instrument: instrument.to_string(),
            total: selected.len(),
            errors,
        };
        warn!(error = %error, "position close failed");
        Err(error)
    }

    async fn change<V, F>(
        &self,
        order: &OrderHandle,
        call_kind: CallKind,
        current: V,
        target: V,
        options: CommandOptions,
        apply: F,
    ) -> Result<OrderHandle, TaskError>
    where
        V: PartialEq + fmt::Debug,
        F: Fn(&OrderHandle) -> Result<(), EngineFault> + Send + Sync + 'static,
    {
        let changed = order.clone();
        let spec = CommandSpec::new(
            call_kind,
            move || {
                apply(&changed)?;
                Ok(changed.clone())
            },
            options,
        )?;

        if current == target {
            trace!(
                call_kind = %call_kind,
                order_id = %order.order_id(),
                value = ?target,
                "requested value equals current value"
            );
            return Ok(self.suppress(&spec, order, "value unchanged"));
        }

        Ok(self.correlation.execute(&spec).await?)
    }

    /// Skip a command that would not change anything. Counts as completed
    /// for the caller: `on_complete` fires with the untouched order.
    fn suppress(&self, spec: &CommandSpec, order: &OrderHandle, reason: &str) -> OrderHandle {
        self.correlation.metrics().inc_commands_suppressed();
        debug!(
            call_kind = %spec.call_kind(),
            order_id = %order.order_id(),
            reason,
            "command suppressed"
        );
        spec.fire_complete(order);
        order.clone()
    }
}

impl fmt::Debug for OrderUtil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderUtil")
            .field("instruments", &self.positions.instruments())
            .finish()
    }
}
