//! In-memory order used by unit tests.

use crate::order::{EngineFault, EngineOrder, OrderCommand, OrderHandle, OrderId, OrderState};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Debug)]
pub struct TestOrder {
    id: OrderId,
    command: OrderCommand,
    inner: Mutex<TestOrderInner>,
}

#[derive(Debug)]
struct TestOrderInner {
    state: OrderState,
    amount: Decimal,
    requested_amount: Decimal,
}

impl TestOrder {
    pub fn handle(id: &str, command: OrderCommand, state: OrderState, amount: Decimal) -> OrderHandle {
        OrderHandle::new(Arc::new(Self {
            id: OrderId::new(id),
            command,
            inner: Mutex::new(TestOrderInner {
                state,
                amount,
                requested_amount: amount,
            }),
        }))
    }

    pub fn filled(id: &str, command: OrderCommand, amount: Decimal) -> OrderHandle {
        Self::handle(id, command, OrderState::Filled, amount)
    }

    pub fn opened(id: &str, command: OrderCommand, requested: Decimal) -> OrderHandle {
        OrderHandle::new(Arc::new(Self {
            id: OrderId::new(id),
            command,
            inner: Mutex::new(TestOrderInner {
                state: OrderState::Opened,
                amount: Decimal::ZERO,
                requested_amount: requested,
            }),
        }))
    }
}

impl EngineOrder for TestOrder {
    fn id(&self) -> OrderId {
        self.id.clone()
    }

    fn instrument(&self) -> String {
        "EURUSD".to_string()
    }

    fn label(&self) -> String {
        format!("Test{}", self.id)
    }

    fn state(&self) -> OrderState {
        self.inner.lock().state
    }

    fn command(&self) -> OrderCommand {
        self.command
    }

    fn amount(&self) -> Decimal {
        self.inner.lock().amount
    }

    fn requested_amount(&self) -> Decimal {
        self.inner.lock().requested_amount
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

    fn close(&self) -> Result<(), EngineFault> {
        self.inner.lock().state = OrderState::Closed;
        Ok(())
    }

    fn set_label(&self, _label: &str) -> Result<(), EngineFault> {
        Ok(())
    }

    fn set_good_till_time(&self, _good_till_ms: i64) -> Result<(), EngineFault> {
        Ok(())
    }

    fn set_requested_amount(&self, amount: Decimal) -> Result<(), EngineFault> {
        self.inner.lock().requested_amount = amount;
        Ok(())
    }

    fn set_open_price(&self, _price: Decimal) -> Result<(), EngineFault> {
        Ok(())
    }

    fn set_stop_loss_price(&self, _price: Option<Decimal>) -> Result<(), EngineFault> {
        Ok(())
    }

    fn set_take_profit_price(&self, _price: Option<Decimal>) -> Result<(), EngineFault> {
        Ok(())
    }
}
