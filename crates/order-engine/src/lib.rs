//! Command execution and event correlation for an asynchronous order engine.
//!
//! The engine binding accepts commands synchronously and reports their
//! outcome later through notifications that carry no request id. This crate
//! turns each command into one awaitable, retryable completion.
//!
//! - **Executors**: `OrderExecutor` runs engine calls off the async runtime
//!   (`BlockingPoolExecutor`), bounded by a semaphore
//! - **Gateway**: `OrderEventGateway` classifies raw notifications and
//!   multicasts them as `OrderEvent`s
//! - **Commands**: `CommandSpec` + `CommandOptions` describe one intent
//! - **Correlation**: `CorrelationEngine` runs a spec and matches events to it
//! - **Facade**: `OrderUtil` exposes one operation per call kind plus
//!   position-wide merge and close
//! - **Paper engine**: `PaperEngine`, an in-memory binding for tests and demos
//!
//! # Command Lifecycle
//!
//! 1. Subscribe to the gateway
//! 2. Run the engine call on the executor, which returns the order handle
//! 3. Consume events for that order until a done or reject type arrives
//! 4. Retry on reject or fault until the policy is exhausted
//!
//! See the `correlation` module documentation for details.

mod command;
mod correlation;
mod error;
mod executor;
mod gateway;
mod monitor;
mod order_util;
pub mod paper;

pub use command::{CommandOptions, CommandSpec, ErrorCallback, OrderCallback, StartCallback};
pub use correlation::CorrelationEngine;
pub use error::{AttemptError, CommandError, PositionTaskError, SpecError, TaskError};
pub use executor::{BlockingPoolExecutor, InlineExecutor, OrderCallable, OrderExecutor};
pub use gateway::{NotificationSink, OrderEvent, OrderEventGateway};
pub use monitor::spawn_position_monitor;
pub use order_util::OrderUtil;
pub use paper::{PaperEngine, PaperOrder};
