//! Command descriptions.
//!
//! `CommandOptions` collects the caller's retry policy and callbacks.
//! `CommandSpec` binds them to a call kind and an engine call. A spec is
//! immutable once built; the correlation engine only reads it.

use crate::error::{CommandError, SpecError};
use crate::executor::OrderCallable;
use common::RetryPolicy;
use order_core::{CallKind, EngineFault, EventType, EventTypeSet, OrderHandle};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Called once when a command starts.
pub type StartCallback = Arc<dyn Fn() + Send + Sync>;
/// Called with the order a command or event refers to.
pub type OrderCallback = Arc<dyn Fn(&OrderHandle) + Send + Sync>;
/// Called once when a command fails for good.
pub type ErrorCallback = Arc<dyn Fn(&CommandError) + Send + Sync>;

/// Retry policy and callbacks for one command.
#[derive(Clone, Default)]
pub struct CommandOptions {
    retry: RetryPolicy,
    on_start: Option<StartCallback>,
    on_complete: Option<OrderCallback>,
    on_error: Option<ErrorCallback>,
    on_event: HashMap<EventType, OrderCallback>,
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn on_start<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(callback));
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&OrderHandle) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CommandError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Callback for one event type. A later registration for the same type
    /// replaces the earlier one.
    pub fn on_event<F>(mut self, event_type: EventType, callback: F) -> Self
    where
        F: Fn(&OrderHandle) + Send + Sync + 'static,
    {
        self.on_event.insert(event_type, Arc::new(callback));
        self
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }
}

impl fmt::Debug for CommandOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOptions")
            .field("retry", &self.retry)
            .field("on_start", &self.on_start.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_event", &self.on_event.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Immutable description of one command.
pub struct CommandSpec {
    call_kind: CallKind,
    event_types: EventTypeSet,
    callable: OrderCallable,
    options: CommandOptions,
}

impl CommandSpec {
    /// Build a spec, rejecting event callbacks outside the kind's event types.
    pub fn new<F>(call_kind: CallKind, callable: F, options: CommandOptions) -> Result<Self, SpecError>
    where
        F: Fn() -> Result<OrderHandle, EngineFault> + Send + Sync + 'static,
    {
        let event_types = call_kind.event_types();

        if let Some(event_type) = options
            .on_event
            .keys()
            .find(|event_type| !event_types.contains(**event_type))
        {
            return Err(SpecError::ForeignEventType {
                call_kind,
                event_type: *event_type,
            });
        }

        Ok(Self {
            call_kind,
            event_types,
            callable: Arc::new(callable),
            options,
        })
    }

    pub fn call_kind(&self) -> CallKind {
        self.call_kind
    }

    pub fn event_types(&self) -> &EventTypeSet {
        &self.event_types
    }

    pub fn retry(&self) -> RetryPolicy {
        self.options.retry
    }

    pub fn callable(&self) -> OrderCallable {
        Arc::clone(&self.callable)
    }

    pub fn has_event_callback(&self, event_type: EventType) -> bool {
        self.options.on_event.contains_key(&event_type)
    }

    pub(crate) fn fire_start(&self) {
        if let Some(callback) = &self.options.on_start {
            callback();
        }
    }

    pub(crate) fn fire_complete(&self, order: &OrderHandle) {
        if let Some(callback) = &self.options.on_complete {
            callback(order);
        }
    }

    pub(crate) fn fire_error(&self, error: &CommandError) {
        if let Some(callback) = &self.options.on_error {
            callback(error);
        }
    }

    pub(crate) fn fire_event(&self, event_type: EventType, order: &OrderHandle) {
        if let Some(callback) = self.options.on_event.get(&event_type) {
            callback(order);
        }
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("call_kind", &self.call_kind)
            .field("options", &self.options)
            .finish()
    }
}
