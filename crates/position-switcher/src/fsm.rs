//! Switcher transition table.
//!
//! Pure functions only. Entry actions live in the switcher, which looks up
//! what to run with `busy_action` after a transition into `Busy`.

use order_core::OrderDirection;
use std::fmt;

/// Switcher state. `Busy` is held while a command sequence is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchState {
    Flat,
    Long,
    Short,
    Busy,
}

impl SwitchState {
    pub fn from_direction(direction: OrderDirection) -> Self {
        match direction {
            OrderDirection::Flat => Self::Flat,
            OrderDirection::Long => Self::Long,
            OrderDirection::Short => Self::Short,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "FLAT"),
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Busy => write!(f, "BUSY"),
        }
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Buy,
    Sell,
    Flat,
    MergeDone,
    CloseDone,
}

/// Outcome of one table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Trigger has no effect in this state.
    Ignore,
    /// Move to a fixed state.
    Enter(SwitchState),
    /// Move to the state matching the position direction at transition time.
    ResolveByDirection,
}

/// Look up the transition for `trigger` in `state`.
pub fn transition(state: SwitchState, trigger: Trigger) -> Transition {
    use SwitchState as S;
    use Trigger as T;

    match (state, trigger) {
        (S::Flat, T::Buy | T::Sell) => Transition::Enter(S::Busy),
        (S::Long, T::Sell | T::Flat) => Transition::Enter(S::Busy),
        (S::Short, T::Buy | T::Flat) => Transition::Enter(S::Busy),
        (S::Busy, T::MergeDone) => Transition::ResolveByDirection,
        (S::Busy, T::CloseDone) => Transition::Enter(S::Flat),
        _ => Transition::Ignore,
    }
}

/// Apply the table, resolving direction-dependent targets with `direction`.
/// `None` means the trigger is ignored.
pub fn next_state<F>(state: SwitchState, trigger: Trigger, direction: F) -> Option<SwitchState>
where
    F: FnOnce() -> OrderDirection,
{
    match transition(state, trigger) {
        Transition::Ignore => None,
        Transition::Enter(next) => Some(next),
        Transition::ResolveByDirection => Some(SwitchState::from_direction(direction())),
    }
}

/// Work started on entering `Busy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyAction {
    /// Bring the net position to the given direction, then merge it.
    Switch(OrderDirection),
    /// Close the whole position.
    Close,
}

impl BusyAction {
    /// Trigger fired when the action ends, successful or not.
    pub fn completion(&self) -> Trigger {
        match self {
            Self::Switch(_) => Trigger::MergeDone,
            Self::Close => Trigger::CloseDone,
        }
    }
}

/// Entry action for a signal trigger.
pub fn busy_action(trigger: Trigger) -> Option<BusyAction> {
    match trigger {
        Trigger::Buy => Some(BusyAction::Switch(OrderDirection::Long)),
        Trigger::Sell => Some(BusyAction::Switch(OrderDirection::Short)),
        Trigger::Flat => Some(BusyAction::Close),
        Trigger::MergeDone | Trigger::CloseDone => None,
    }
}
