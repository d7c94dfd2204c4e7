//! Call kinds, event types and the per-kind event type sets.
//!
//! Every command carries a `CallKind`. The kind fixes which notification
//! types finish the command (`done` / `reject`) and which are only
//! informational. Notifications of any other type on the same order belong
//! to some other command and are ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic classification of an engine notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Notification,

    SubmitOk,
    SubmitConditionalOk,
    SubmitRejected,
    FillRejected,
    PartialFillOk,
    FullyFilled,

    MergeOk,
    MergeCloseOk,
    MergeRejected,

    CloseOk,
    PartialCloseOk,
    CloseRejected,
    ClosedByMerge,
    ClosedBySl,
    ClosedByTp,

    ChangedLabel,
    ChangedGtt,
    ChangedAmount,
    ChangedPrice,
    ChangedSl,
    ChangedTp,
    ChangeLabelRejected,
    ChangeGttRejected,
    ChangeAmountRejected,
    ChangePriceRejected,
    ChangeSlRejected,
    ChangeTpRejected,
    /// Change refused; the engine does not say which attribute.
    ChangedRejected,
}

impl EventType {
    pub const ALL: [EventType; 29] = [
        Self::Notification,
        Self::SubmitOk,
        Self::SubmitConditionalOk,
        Self::SubmitRejected,
        Self::FillRejected,
        Self::PartialFillOk,
        Self::FullyFilled,
        Self::MergeOk,
        Self::MergeCloseOk,
        Self::MergeRejected,
        Self::CloseOk,
        Self::PartialCloseOk,
        Self::CloseRejected,
        Self::ClosedByMerge,
        Self::ClosedBySl,
        Self::ClosedByTp,
        Self::ChangedLabel,
        Self::ChangedGtt,
        Self::ChangedAmount,
        Self::ChangedPrice,
        Self::ChangedSl,
        Self::ChangedTp,
        Self::ChangeLabelRejected,
        Self::ChangeGttRejected,
        Self::ChangeAmountRejected,
        Self::ChangePriceRejected,
        Self::ChangeSlRejected,
        Self::ChangeTpRejected,
        Self::ChangedRejected,
    ];

    /// Platform refusal of some request.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::SubmitRejected
                | Self::FillRejected
                | Self::MergeRejected
                | Self::CloseRejected
                | Self::ChangeLabelRejected
                | Self::ChangeGttRejected
                | Self::ChangeAmountRejected
                | Self::ChangePriceRejected
                | Self::ChangeSlRejected
                | Self::ChangeTpRejected
                | Self::ChangedRejected
        )
    }

    /// The order left the position (closed directly, by merge, or by SL/TP).
    pub fn is_position_exit(&self) -> bool {
        matches!(
            self,
            Self::CloseOk
                | Self::ClosedByMerge
                | Self::ClosedBySl
                | Self::ClosedByTp
                | Self::MergeCloseOk
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Notification => "NOTIFICATION",
            Self::SubmitOk => "SUBMIT_OK",
            Self::SubmitConditionalOk => "SUBMIT_CONDITIONAL_OK",
            Self::SubmitRejected => "SUBMIT_REJECTED",
            Self::FillRejected => "FILL_REJECTED",
            Self::PartialFillOk => "PARTIAL_FILL_OK",
            Self::FullyFilled => "FULLY_FILLED",
            Self::MergeOk => "MERGE_OK",
            Self::MergeCloseOk => "MERGE_CLOSE_OK",
            Self::MergeRejected => "MERGE_REJECTED",
            Self::CloseOk => "CLOSE_OK",
            Self::PartialCloseOk => "PARTIAL_CLOSE_OK",
            Self::CloseRejected => "CLOSE_REJECTED",
            Self::ClosedByMerge => "CLOSED_BY_MERGE",
            Self::ClosedBySl => "CLOSED_BY_SL",
            Self::ClosedByTp => "CLOSED_BY_TP",
            Self::ChangedLabel => "CHANGED_LABEL",
            Self::ChangedGtt => "CHANGED_GTT",
            Self::ChangedAmount => "CHANGED_AMOUNT",
            Self::ChangedPrice => "CHANGED_PRICE",
            Self::ChangedSl => "CHANGED_SL",
            Self::ChangedTp => "CHANGED_TP",
            Self::ChangeLabelRejected => "CHANGE_LABEL_REJECTED",
            Self::ChangeGttRejected => "CHANGE_GTT_REJECTED",
            Self::ChangeAmountRejected => "CHANGE_AMOUNT_REJECTED",
            Self::ChangePriceRejected => "CHANGE_PRICE_REJECTED",
            Self::ChangeSlRejected => "CHANGE_SL_REJECTED",
            Self::ChangeTpRejected => "CHANGE_TP_REJECTED",
            Self::ChangedRejected => "CHANGED_REJECTED",
        };
        f.write_str(name)
    }
}

/// Done / reject / info classification for one call kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTypeSet {
    done: &'static [EventType],
    reject: &'static [EventType],
    info: &'static [EventType],
}

impl EventTypeSet {
    pub const fn new(
        done: &'static [EventType],
        reject: &'static [EventType],
        info: &'static [EventType],
    ) -> Self {
        Self { done, reject, info }
    }

    pub fn done(&self) -> &'static [EventType] {
        self.done
    }

    pub fn reject(&self) -> &'static [EventType] {
        self.reject
    }

    pub fn info(&self) -> &'static [EventType] {
        self.info
    }

    pub fn is_done(&self, event_type: EventType) -> bool {
        self.done.contains(&event_type)
    }

    pub fn is_reject(&self, event_type: EventType) -> bool {
        self.reject.contains(&event_type)
    }

    pub fn is_info(&self, event_type: EventType) -> bool {
        self.info.contains(&event_type)
    }

    /// Done or reject: ends the current attempt.
    pub fn is_finishing(&self, event_type: EventType) -> bool {
        self.is_done(event_type) || self.is_reject(event_type)
    }

    pub fn contains(&self, event_type: EventType) -> bool {
        self.is_finishing(event_type) || self.is_info(event_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = EventType> + '_ {
        self.done
            .iter()
            .chain(self.reject)
            .chain(self.info)
            .copied()
    }
}

const SUBMIT_TYPES: EventTypeSet = EventTypeSet::new(
    &[EventType::FullyFilled, EventType::SubmitConditionalOk],
    &[EventType::FillRejected, EventType::SubmitRejected],
    &[
        EventType::Notification,
        EventType::SubmitOk,
        EventType::PartialFillOk,
    ],
);

const MERGE_TYPES: EventTypeSet = EventTypeSet::new(
    &[EventType::MergeOk, EventType::MergeCloseOk],
    &[EventType::MergeRejected],
    &[EventType::Notification],
);

const CLOSE_TYPES: EventTypeSet = EventTypeSet::new(
    &[EventType::CloseOk],
    &[EventType::CloseRejected],
    &[EventType::Notification, EventType::PartialCloseOk],
);

const CHANGE_LABEL_TYPES: EventTypeSet = EventTypeSet::new(
    &[EventType::ChangedLabel],
    &[EventType::ChangeLabelRejected, EventType::ChangedRejected],
    &[EventType::Notification],
);

const CHANGE_GTT_TYPES: EventTypeSet = EventTypeSet::new(
    &[EventType::ChangedGtt],
    &[EventType::ChangeGttRejected, EventType::ChangedRejected],
    &[EventType::Notification],
);

const CHANGE_AMOUNT_TYPES: EventTypeSet = EventTypeSet::new(
    &[EventType::ChangedAmount],
    &[EventType::ChangeAmountRejected, EventType::ChangedRejected],
    &[EventType::Notification],
);

const CHANGE_PRICE_TYPES: EventTypeSet = EventTypeSet::new(
    &[EventType::ChangedPrice],
    &[EventType::ChangePriceRejected, EventType::ChangedRejected],
    &[EventType::Notification],
);

const CHANGE_SL_TYPES: EventTypeSet = EventTypeSet::new(
    &[EventType::ChangedSl],
    &[EventType::ChangeSlRejected, EventType::ChangedRejected],
    &[EventType::Notification],
);

const CHANGE_TP_TYPES: EventTypeSet = EventTypeSet::new(
    &[EventType::ChangedTp],
    &[EventType::ChangeTpRejected, EventType::ChangedRejected],
    &[EventType::Notification],
);

/// Category of intent a command represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    Submit,
    Merge,
    Close,
    ChangeLabel,
    ChangeGtt,
    ChangeAmount,
    ChangePrice,
    ChangeSl,
    ChangeTp,
}

impl CallKind {
    pub const ALL: [CallKind; 9] = [
        Self::Submit,
        Self::Merge,
        Self::Close,
        Self::ChangeLabel,
        Self::ChangeGtt,
        Self::ChangeAmount,
        Self::ChangePrice,
        Self::ChangeSl,
        Self::ChangeTp,
    ];

    pub fn event_types(&self) -> EventTypeSet {
        match self {
            Self::Submit => SUBMIT_TYPES,
            Self::Merge => MERGE_TYPES,
            Self::Close => CLOSE_TYPES,
            Self::ChangeLabel => CHANGE_LABEL_TYPES,
            Self::ChangeGtt => CHANGE_GTT_TYPES,
            Self::ChangeAmount => CHANGE_AMOUNT_TYPES,
            Self::ChangePrice => CHANGE_PRICE_TYPES,
            Self::ChangeSl => CHANGE_SL_TYPES,
            Self::ChangeTp => CHANGE_TP_TYPES,
        }
    }

    /// Targets an order that already exists.
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Submit | Self::Merge | Self::Close)
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submit => "SUBMIT",
            Self::Merge => "MERGE",
            Self::Close => "CLOSE",
            Self::ChangeLabel => "CHANGE_LABEL",
            Self::ChangeGtt => "CHANGE_GTT",
            Self::ChangeAmount => "CHANGE_AMOUNT",
            Self::ChangePrice => "CHANGE_PRICE",
            Self::ChangeSl => "CHANGE_SL",
            Self::ChangeTp => "CHANGE_TP",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_and_reject_disjoint() {
        for kind in CallKind::ALL {
            let types = kind.event_types();
            for event_type in types.done() {
                assert!(
                    !types.is_reject(*event_type),
                    "{} has {} in both done and reject",
                    kind,
                    event_type
                );
            }
        }
    }

    #[test]
    fn test_finishing_set_not_empty() {
        for kind in CallKind::ALL {
            let types = kind.event_types();
            assert!(!types.done().is_empty(), "{} has no done types", kind);
            assert!(!types.reject().is_empty(), "{} has no reject types", kind);
        }
    }

    #[test]
    fn test_info_not_finishing() {
        for kind in CallKind::ALL {
            let types = kind.event_types();
            for event_type in types.info() {
                assert!(!types.is_finishing(*event_type));
            }
        }
    }

    #[test]
    fn test_reject_types_are_rejections() {
        for kind in CallKind::ALL {
            for event_type in kind.event_types().reject() {
                assert!(event_type.is_rejection());
            }
            for event_type in kind.event_types().done() {
                assert!(!event_type.is_rejection());
            }
        }
    }

    #[test]
    fn test_submit_types() {
        let types = CallKind::Submit.event_types();

        assert!(types.is_done(EventType::FullyFilled));
        assert!(types.is_done(EventType::SubmitConditionalOk));
        assert!(types.is_reject(EventType::SubmitRejected));
        assert!(types.is_reject(EventType::FillRejected));
        assert!(types.is_info(EventType::PartialFillOk));
        assert!(types.is_info(EventType::SubmitOk));
        assert!(!types.contains(EventType::CloseOk));
    }

    #[test]
    fn test_change_kinds_share_generic_reject() {
        for kind in CallKind::ALL.into_iter().filter(CallKind::is_change) {
            assert!(kind.event_types().is_reject(EventType::ChangedRejected));
        }
        assert!(!CallKind::Close.event_types().contains(EventType::ChangedRejected));
    }

    #[test]
    fn test_change_kinds_do_not_overlap() {
        let sl = CallKind::ChangeSl.event_types();
        let tp = CallKind::ChangeTp.event_types();

        assert!(sl.is_done(EventType::ChangedSl));
        assert!(!sl.contains(EventType::ChangedTp));
        assert!(!tp.contains(EventType::ChangedSl));
    }

    #[test]
    fn test_every_event_type_has_a_name() {
        for event_type in EventType::ALL {
            assert!(!event_type.to_string().is_empty());
        }
        assert_eq!(EventType::ChangedRejected.to_string(), "CHANGED_REJECTED");
    }

    #[test]
    fn test_position_exit_types() {
        assert!(EventType::CloseOk.is_position_exit());
        assert!(EventType::ClosedBySl.is_position_exit());
        assert!(EventType::MergeCloseOk.is_position_exit());
        assert!(!EventType::PartialCloseOk.is_position_exit());
        assert!(!EventType::MergeOk.is_position_exit());
    }
}
