use serde::{Deserialize, Serialize};

use crate::domain::event::EventSummary;
use crate::domain::session::DialogueState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueEvent {
    /// An update was requested without naming the event; carries the
    /// look-ahead window returned by the calendar.
    UpdateRequested { candidates: Vec<EventSummary> },
    EventChosen { event_id: String },
    ChoiceUnresolved,
    ChangesApplied,
    ChangesUnresolved,
    CancelRequested,
}

impl DialogueEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpdateRequested { .. } => "update_requested",
            Self::EventChosen { .. } => "event_chosen",
            Self::ChoiceUnresolved => "choice_unresolved",
            Self::ChangesApplied => "changes_applied",
            Self::ChangesUnresolved => "changes_unresolved",
            Self::CancelRequested => "cancel_requested",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueAction {
    PromptForEventChoice,
    PromptForChoiceClarification,
    PromptForChanges,
    PromptForChangesClarification,
    ReportNothingToUpdate,
    ReportAttemptsExhausted,
    ConfirmCancellation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: DialogueState,
    pub to: DialogueState,
    pub event: String,
    pub actions: Vec<DialogueAction>,
}

impl TransitionOutcome {
    pub fn primary_action(&self) -> Option<&DialogueAction> {
        self.actions.first()
    }
}
