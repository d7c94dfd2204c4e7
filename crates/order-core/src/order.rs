//! Order handles, order parameters and the engine traits.

use num_traits::Signed;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Generate a unique order label with a prefix.
///
/// Format: `{prefix}{uuid}` where uuid is a v4 UUID in simple format (no hyphens),
/// so the label stays alphanumeric when the prefix is.
pub fn generate_order_label(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().as_simple())
}

/// Engine-assigned order identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of an engine order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    /// Submitted, not yet accepted.
    Created,
    /// Accepted, waiting for a fill (conditional orders).
    Opened,
    /// Fully or partially filled; counts toward the position.
    Filled,
    Closed,
    Canceled,
}

impl OrderState {
    /// Check if the order can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Canceled)
    }
}

/// Order command (side plus entry type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderCommand {
    Buy,
    Sell,
    BuyLimit,
    SellLimit,
    BuyStop,
    SellStop,
}

impl OrderCommand {
    pub fn is_long(&self) -> bool {
        matches!(self, Self::Buy | Self::BuyLimit | Self::BuyStop)
    }

    pub fn is_short(&self) -> bool {
        !self.is_long()
    }

    /// Conditional commands rest in the book until their entry price is hit.
    pub fn is_conditional(&self) -> bool {
        !matches!(self, Self::Buy | Self::Sell)
    }

    /// Market command for a direction; `None` for flat.
    pub fn market_for(direction: OrderDirection) -> Option<Self> {
        match direction {
            OrderDirection::Long => Some(Self::Buy),
            OrderDirection::Short => Some(Self::Sell),
            OrderDirection::Flat => None,
        }
    }

    pub fn direction(&self) -> OrderDirection {
        if self.is_long() {
            OrderDirection::Long
        } else {
            OrderDirection::Short
        }
    }
}

/// Net direction of an order or a set of orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderDirection {
    Flat,
    Long,
    Short,
}

impl OrderDirection {
    /// Direction from the sign of a signed amount.
    pub fn from_signed(amount: Decimal) -> Self {
        if Signed::is_positive(&amount) {
            Self::Long
        } else if Signed::is_negative(&amount) {
            Self::Short
        } else {
            Self::Flat
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "FLAT"),
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Synchronous failure reported by the engine binding when issuing a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineFault {
    #[error("engine not connected")]
    Disconnected,

    #[error("order {order_id} is {state:?}, call not allowed")]
    InvalidState { order_id: OrderId, state: OrderState },

    #[error("invalid order parameters: {0}")]
    InvalidParams(String),

    #[error("engine call failed: {0}")]
    Call(String),
}

/// An order owned by the external engine.
///
/// Getters read the engine's current view of the order. The mutators only
/// issue a request: the outcome arrives later as notifications.
pub trait EngineOrder: Send + Sync + fmt::Debug {
    fn id(&self) -> OrderId;
    fn instrument(&self) -> String;
    fn label(&self) -> String;
    fn state(&self) -> OrderState;
    fn command(&self) -> OrderCommand;
    /// Filled amount.
    fn amount(&self) -> Decimal;
    fn requested_amount(&self) -> Decimal;
    fn open_price(&self) -> Decimal;
    fn stop_loss_price(&self) -> Option<Decimal>;
    fn take_profit_price(&self) -> Option<Decimal>;
    /// Good-till time in epoch milliseconds.
    fn good_till_time(&self) -> Option<i64>;

    fn close(&self) -> Result<(), EngineFault>;
    fn set_label(&self, label: &str) -> Result<(), EngineFault>;
    fn set_good_till_time(&self, good_till_ms: i64) -> Result<(), EngineFault>;
    fn set_requested_amount(&self, amount: Decimal) -> Result<(), EngineFault>;
    fn set_open_price(&self, price: Decimal) -> Result<(), EngineFault>;
    fn set_stop_loss_price(&self, price: Option<Decimal>) -> Result<(), EngineFault>;
    fn set_take_profit_price(&self, price: Option<Decimal>) -> Result<(), EngineFault>;
}

/// Identity-comparable handle to an engine order.
///
/// Two handles are equal when they refer to the same engine order id.
#[derive(Clone)]
pub struct OrderHandle {
    id: OrderId,
    inner: Arc<dyn EngineOrder>,
}

impl OrderHandle {
    pub fn new(order: Arc<dyn EngineOrder>) -> Self {
        Self {
            id: order.id(),
            inner: order,
        }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.id
    }

    pub fn is_filled(&self) -> bool {
        self.inner.state() == OrderState::Filled
    }

    pub fn is_opened(&self) -> bool {
        self.inner.state() == OrderState::Opened
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state() == OrderState::Closed
    }
}

impl Deref for OrderHandle {
    type Target = dyn EngineOrder;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl PartialEq for OrderHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OrderHandle {}

impl Hash for OrderHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for OrderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderHandle")
            .field("id", &self.id)
            .field("label", &self.inner.label())
            .field("state", &self.inner.state())
            .finish()
    }
}

/// Filled amount signed by direction (positive = long).
pub fn signed_amount(order: &OrderHandle) -> Decimal {
    let amount = order.amount().abs();
    if order.command().is_long() {
        amount
    } else {
        -amount
    }
}

/// Net direction of a set of orders, weighted by their signed amounts.
pub fn combined_direction<'a>(orders: impl IntoIterator<Item = &'a OrderHandle>) -> OrderDirection {
    let net: Decimal = orders.into_iter().map(signed_amount).sum();
    OrderDirection::from_signed(net)
}

/// Parameters for submitting a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderParams {
    pub instrument: String,
    pub label: String,
    pub command: OrderCommand,
    pub amount: Decimal,
    /// Entry price for conditional orders.
    pub price: Option<Decimal>,
    pub stop_loss_price: Option<Decimal>,
    pub take_profit_price: Option<Decimal>,
    pub good_till_time: Option<i64>,
    pub comment: Option<String>,
}

impl OrderParams {
    pub fn new(
        instrument: impl Into<String>,
        label: impl Into<String>,
        command: OrderCommand,
        amount: Decimal,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            label: label.into(),
            command,
            amount,
            price: None,
            stop_loss_price: None,
            take_profit_price: None,
            good_till_time: None,
            comment: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_command(mut self, command: OrderCommand) -> Self {
        self.command = command;
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_stop_loss_price(mut self, price: Decimal) -> Self {
        self.stop_loss_price = Some(price);
        self
    }

    pub fn with_take_profit_price(mut self, price: Decimal) -> Self {
        self.take_profit_price = Some(price);
        self
    }

    pub fn with_good_till_time(mut self, good_till_ms: i64) -> Self {
        self.good_till_time = Some(good_till_ms);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Binding to the external order-management engine.
///
/// Calls are synchronous and may block; they return as soon as the engine
/// accepted the request. Implementations must tolerate repeated calls with
/// the same arguments.
pub trait OrderEngine: Send + Sync {
    fn submit_order(&self, params: &OrderParams) -> Result<OrderHandle, EngineFault>;

    fn merge_orders(&self, label: &str, orders: &[OrderHandle]) -> Result<OrderHandle, EngineFault>;
}
