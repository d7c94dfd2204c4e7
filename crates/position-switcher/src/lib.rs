//! Position switcher.
//!
//! A finite state machine that turns buy, sell and flat signals into order
//! command sequences on one instrument, one sequence at a time.
//!
//! - `fsm`: the pure transition table over `SwitchState` and `Trigger`
//! - `PositionSwitcher`: runs the entry actions through `OrderUtil`

pub mod fsm;
mod switcher;

pub use fsm::{BusyAction, SwitchState, Transition, Trigger};
pub use switcher::{PositionSwitcher, SwitchError, SwitcherConfig};
