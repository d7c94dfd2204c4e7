//! Paper engine for simulated order handling.
//!
//! Market orders fill immediately, conditional orders stay opened, merges net
//! the filled amounts of their sources, and closes and changes apply at once.
//! Every call emits the notifications a live engine would, synchronously,
//! before it returns. Submit, merge and close rejections and submit faults
//! can be injected.

use order_core::{
    EngineFault, EngineOrder, MessageReason, MessageType, OrderCommand, OrderEngine, OrderHandle,
    OrderId, OrderParams, OrderState, RawNotification,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::gateway::NotificationSink;

/// Counter for generating unique paper order ids.
static PAPER_ORDER_ID: AtomicU64 = AtomicU64::new(1_000_000);

/// Consume one pending injection, if any.
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[derive(Debug, Default)]
struct Injections {
    submit_rejects: AtomicU32,
    submit_faults: AtomicU32,
    merge_rejects: AtomicU32,
    close_rejects: Arc<AtomicU32>,
}

/// In-memory engine binding.
pub struct PaperEngine {
    sink: Arc<dyn NotificationSink>,
    orders: Mutex<HashMap<OrderId, PaperOrder>>,
    injections: Injections,
    submit_calls: AtomicU64,
    merge_calls: AtomicU64,
}

impl PaperEngine {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            orders: Mutex::new(HashMap::new()),
            injections: Injections::default(),
            submit_calls: AtomicU64::new(0),
            merge_calls: AtomicU64::new(0),
        }
    }

    /// Accept the next `n` submits, then reject them.
    pub fn reject_next_submits(&self, n: u32) {
        self.injections.submit_rejects.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` submits synchronously.
    pub fn fail_next_submits(&self, n: u32) {
        self.injections.submit_faults.store(n, Ordering::SeqCst);
    }

    pub fn reject_next_merges(&self, n: u32) {
        self.injections.merge_rejects.store(n, Ordering::SeqCst);
    }

    /// Reject the next `n` closes on any order of this engine.
    pub fn reject_next_closes(&self, n: u32) {
        self.injections.close_rejects.store(n, Ordering::SeqCst);
    }

    pub fn submit_calls(&self) -> u64 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn merge_calls(&self) -> u64 {
        self.merge_calls.load(Ordering::SeqCst)
    }

    /// Order created by this engine.
    pub fn order(&self, id: &OrderId) -> Option<PaperOrder> {
        self.orders.lock().get(id).cloned()
    }

    fn new_order(&self, params: &OrderParams, state: OrderState, amount: Decimal) -> PaperOrder {
        let id = PAPER_ORDER_ID.fetch_add(1, Ordering::Relaxed);
        let sink = Arc::clone(&self.sink);
        let close_rejects = Arc::clone(&self.injections.close_rejects);
        let fields = PaperFields {
            label: params.label.clone(),
            state,
            command: params.command,
            amount,
            requested_amount: params.amount,
            open_price: params.price.unwrap_or(Decimal::ONE),
            stop_loss_price: params.stop_loss_price,
            take_profit_price: params.take_profit_price,
            good_till_time: params.good_till_time,
        };

        let order = PaperOrder(Arc::new(PaperOrderInner {
            id: OrderId::new(id.to_string()),
            instrument: params.instrument.clone(),
            sink,
            close_rejects,
            fields: Mutex::new(fields),
        }));
        self.orders.lock().insert(order.0.id.clone(), order.clone());
        order
    }
}

impl OrderEngine for PaperEngine {
    fn submit_order(&self, params: &OrderParams) -> Result<OrderHandle, EngineFault> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        if take_one(&self.injections.submit_faults) {
            return Err(EngineFault::Disconnected);
        }
        if params.amount <= Decimal::ZERO {
            return Err(EngineFault::InvalidParams(format!(
                "amount must be positive, got {}",
                params.amount
            )));
        }

        let order = self.new_order(params, OrderState::Created, Decimal::ZERO);
        let handle = order.handle();

        if take_one(&self.injections.submit_rejects) {
            order.0.fields.lock().state = OrderState::Canceled;
            order.emit(MessageType::OrderSubmitRejected, vec![]);
            debug!(order_id = %handle.order_id(), "paper submit rejected");
            return Ok(handle);
        }

        {
            // A pending order carries its full ordered amount until it fills.
            let mut fields = order.0.fields.lock();
            fields.state = OrderState::Opened;
            if params.command.is_conditional() {
                fields.amount = params.amount;
            }
        }
        order.emit(MessageType::OrderSubmitOk, vec![]);

        if !params.command.is_conditional() {
            {
                let mut fields = order.0.fields.lock();
                fields.state = OrderState::Filled;
                fields.amount = params.amount;
            }
            order.emit(MessageType::OrderFillOk, vec![MessageReason::OrderFullyFilled]);
        }

        debug!(
            order_id = %handle.order_id(),
            label = %params.label,
            command = ?params.command,
            amount = %params.amount,
            "paper order submitted"
        );
        Ok(handle)
    }

    fn merge_orders(&self, label: &str, orders: &[OrderHandle]) -> Result<OrderHandle, EngineFault> {
        self.merge_calls.fetch_add(1, Ordering::SeqCst);

        if orders.len() < 2 {
            return Err(EngineFault::InvalidParams(format!(
                "merge needs at least 2 orders, got {}",
                orders.len()
            )));
        }
        if let Some(unfilled) = orders.iter().find(|o| !o.is_filled()) {
            return Err(EngineFault::InvalidState {
                order_id: unfilled.order_id().clone(),
                state: unfilled.state(),
            });
        }

        let instrument = orders[0].instrument();
        let net: Decimal = orders.iter().map(order_core::signed_amount).sum();
        let command = if net < Decimal::ZERO {
            OrderCommand::Sell
        } else {
            OrderCommand::Buy
        };
        let params = OrderParams::new(instrument, label, command, net.abs());
        let merged = self.new_order(&params, OrderState::Created, Decimal::ZERO);
        let handle = merged.handle();

        if take_one(&self.injections.merge_rejects) {
            merged.0.fields.lock().state = OrderState::Canceled;
            merged.emit(MessageType::OrdersMergeRejected, vec![]);
            return Ok(handle);
        }

        for source in orders {
            // Handles from another engine are left alone.
            if let Some(order) = self.order(source.order_id()) {
                order.0.fields.lock().state = OrderState::Closed;
                order.emit(
                    MessageType::OrderCloseOk,
                    vec![MessageReason::OrderClosedByMerge],
                );
            }
        }

        {
            let mut fields = merged.0.fields.lock();
            if net.is_zero() {
                fields.state = OrderState::Closed;
            } else {
                fields.state = OrderState::Filled;
                fields.amount = net.abs();
            }
        }
        merged.emit(MessageType::OrdersMergeOk, vec![]);

        debug!(
            order_id = %handle.order_id(),
            label = %label,
            sources = orders.len(),
            net = %net,
            "paper orders merged"
        );
        Ok(handle)
    }
}

#[derive(Debug, Clone)]
struct PaperFields {
    label: String,
    state: OrderState,
    command: OrderCommand,
    amount: Decimal,
    requested_amount: Decimal,
    open_price: Decimal,
    stop_loss_price: Option<Decimal>,
    take_profit_price: Option<Decimal>,
    good_till_time: Option<i64>,
}

struct PaperOrderInner {
    id: OrderId,
    instrument: String,
    sink: Arc<dyn NotificationSink>,
    close_rejects: Arc<AtomicU32>,
    fields: Mutex<PaperFields>,
}

/// Order owned by the paper engine. Clones share the same order.
#[derive(Clone)]
pub struct PaperOrder(Arc<PaperOrderInner>);

impl PaperOrder {
    pub fn handle(&self) -> OrderHandle {
        OrderHandle::new(Arc::new(self.clone()))
    }

    fn emit(&self, message_type: MessageType, reasons: Vec<MessageReason>) {
        self.0
            .sink
            .on_notification(RawNotification::new(self.handle(), message_type, reasons));
    }

    fn change<F>(&self, reason: MessageReason, apply: F) -> Result<(), EngineFault>
    where
        F: FnOnce(&mut PaperFields),
    {
        {
            let mut fields = self.0.fields.lock();
            if fields.state.is_terminal() {
                return Err(EngineFault::InvalidState {
                    order_id: self.0.id.clone(),
                    state: fields.state,
                });
            }
            apply(&mut fields);
        }
        self.emit(MessageType::OrderChangedOk, vec![reason]);
        Ok(())
    }

    /// Fill an opened conditional order, emitting the fill notification.
    pub fn fill(&self) -> Result<(), EngineFault> {
        {
            let mut fields = self.0.fields.lock();
            if fields.state != OrderState::Opened {
                return Err(EngineFault::InvalidState {
                    order_id: self.0.id.clone(),
                    state: fields.state,
                });
            }
            fields.state = OrderState::Filled;
            fields.amount = fields.requested_amount;
        }
        self.emit(MessageType::OrderFillOk, vec![MessageReason::OrderFullyFilled]);
        Ok(())
    }

    /// Close through a stop loss or take profit hit.
    pub fn close_by(&self, reason: MessageReason) -> Result<(), EngineFault> {
        {
            let mut fields = self.0.fields.lock();
            if fields.state != OrderState::Filled {
                return Err(EngineFault::InvalidState {
                    order_id: self.0.id.clone(),
                    state: fields.state,
                });
            }
            fields.state = OrderState::Closed;
        }
        self.emit(MessageType::OrderCloseOk, vec![reason]);
        Ok(())
    }
}

impl std::fmt::Debug for PaperOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperOrder")
            .field("id", &self.0.id)
            .field("instrument", &self.0.instrument)
            .field("fields", &*self.0.fields.lock())
            .finish()
    }
}

impl EngineOrder for PaperOrder {
    fn id(&self) -> OrderId {
        self.0.id.clone()
    }

    fn instrument(&self) -> String {
        self.0.instrument.clone()
    }

    fn label(&self) -> String {
        self.0.fields.lock().label.clone()
    }

    fn state(&self) -> OrderState {
        self.0.fields.lock().state
    }

    fn command(&self) -> OrderCommand {
        self.0.fields.lock().command
    }

    fn amount(&self) -> Decimal {
        self.0.fields.lock().amount
    }

    fn requested_amount(&self) -> Decimal {
        self.0.fields.lock().requested_amount
    }

    fn open_price(&self) -> Decimal {
        self.0.fields.lock().open_price
    }

    fn stop_loss_price(&self) -> Option<Decimal> {
        self.0.fields.lock().stop_loss_price
    }

    fn take_profit_price(&self) -> Option<Decimal> {
        self.0.fields.lock().take_profit_price
    }

    fn good_till_time(&self) -> Option<i64> {
        self.0.fields.lock().good_till_time
    }

    fn close(&self) -> Result<(), EngineFault> {
        let state = self.state();
        if !matches!(state, OrderState::Filled | OrderState::Opened) {
            return Err(EngineFault::InvalidState {
                order_id: self.0.id.clone(),
                state,
            });
        }

        if take_one(&self.0.close_rejects) {
            self.emit(MessageType::OrderCloseRejected, vec![]);
            return Ok(());
        }

        self.0.fields.lock().state = OrderState::Closed;
        self.emit(MessageType::OrderCloseOk, vec![]);
        Ok(())
    }

    fn set_label(&self, label: &str) -> Result<(), EngineFault> {
        self.change(MessageReason::OrderChangedLabel, |f| f.label = label.to_string())
    }

    fn set_good_till_time(&self, good_till_ms: i64) -> Result<(), EngineFault> {
        self.change(MessageReason::OrderChangedGtt, |f| {
            f.good_till_time = Some(good_till_ms)
        })
    }

    fn set_requested_amount(&self, amount: Decimal) -> Result<(), EngineFault> {
        let state = self.state();
        if state != OrderState::Opened {
            return Err(EngineFault::InvalidState {
                order_id: self.0.id.clone(),
                state,
            });
        }
        self.change(MessageReason::OrderChangedAmount, |f| {
            f.requested_amount = amount;
            f.amount = amount;
        })
    }

    fn set_open_price(&self, price: Decimal) -> Result<(), EngineFault> {
        self.change(MessageReason::OrderChangedPrice, |f| f.open_price = price)
    }

    fn set_stop_loss_price(&self, price: Option<Decimal>) -> Result<(), EngineFault> {
        self.change(MessageReason::OrderChangedSl, |f| f.stop_loss_price = price)
    }

    fn set_take_profit_price(&self, price: Option<Decimal>) -> Result<(), EngineFault> {
        self.change(MessageReason::OrderChangedTp, |f| f.take_profit_price = price)
    }
}
