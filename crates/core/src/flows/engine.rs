use thiserror::Error;

use crate::domain::session::{DialogueState, Session};
use crate::flows::states::{DialogueAction, DialogueEvent, TransitionOutcome};

pub const DEFAULT_MAX_CHOICE_ATTEMPTS: u32 = 3;
pub const DEFAULT_CANCEL_KEYWORDS: &[&str] =
    &["cancel", "cancelar", "stop", "olvidalo", "olvídalo", "salir"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialoguePolicy {
    /// Unresolved utterances tolerated in an awaiting state before the
    /// sub-dialogue is abandoned.
    pub max_choice_attempts: u32,
    pub cancel_keywords: Vec<String>,
}

impl Default for DialoguePolicy {
    fn default() -> Self {
        Self {
            max_choice_attempts: DEFAULT_MAX_CHOICE_ATTEMPTS,
            cancel_keywords: DEFAULT_CANCEL_KEYWORDS.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

impl DialoguePolicy {
    pub fn with_max_attempts(max_choice_attempts: u32) -> Self {
        Self { max_choice_attempts: max_choice_attempts.max(1), ..Self::default() }
    }

    /// Exact match after trimming, lower-casing, and dropping trailing punctuation.
    pub fn is_cancel(&self, utterance: &str) -> bool {
        let normalized = utterance
            .trim()
            .trim_end_matches(|c: char| c.is_ascii_punctuation())
            .trim()
            .to_lowercase();
        self.cancel_keywords.iter().any(|keyword| *keyword == normalized)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid dialogue transition from {state:?} using event `{event}`")]
    InvalidTransition { state: DialogueState, event: &'static str },
}

#[derive(Clone, Debug, Default)]
pub struct DialogueEngine {
    policy: DialoguePolicy,
}

impl DialogueEngine {
    pub fn new(policy: DialoguePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DialoguePolicy {
        &self.policy
    }

    /// Applies `event` to the session's dialogue fields. On error the session
    /// is left untouched.
    pub fn apply(
        &self,
        session: &mut Session,
        event: DialogueEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        use DialogueAction::{
            ConfirmCancellation, PromptForChanges, PromptForChangesClarification,
            PromptForChoiceClarification, PromptForEventChoice, ReportNothingToUpdate,
        };
        use DialogueState::{AwaitingEventChanges, AwaitingEventChoice, Idle};

        let from = session.state();
        let kind = event.kind();

        let actions = match (from, event) {
            (Idle, DialogueEvent::UpdateRequested { candidates }) => {
                if candidates.is_empty() {
                    vec![ReportNothingToUpdate]
                } else {
                    session.await_event_choice(candidates);
                    vec![PromptForEventChoice]
                }
            }
            (AwaitingEventChoice, DialogueEvent::EventChosen { event_id }) => {
                let known = session.candidate_events().iter().any(|event| event.id == event_id);
                if known {
                    session.await_event_changes(event_id);
                    vec![PromptForChanges]
                } else {
                    self.unresolved(session, PromptForChoiceClarification)
                }
            }
            (AwaitingEventChoice, DialogueEvent::ChoiceUnresolved) => {
                self.unresolved(session, PromptForChoiceClarification)
            }
            (AwaitingEventChanges, DialogueEvent::ChangesApplied) => {
                session.return_to_idle();
                Vec::new()
            }
            (AwaitingEventChanges, DialogueEvent::ChangesUnresolved) => {
                self.unresolved(session, PromptForChangesClarification)
            }
            (AwaitingEventChoice | AwaitingEventChanges, DialogueEvent::CancelRequested) => {
                session.return_to_idle();
                vec![ConfirmCancellation]
            }
            (state, _) => {
                return Err(FlowTransitionError::InvalidTransition { state, event: kind });
            }
        };

        Ok(TransitionOutcome { from, to: session.state(), event: kind.to_string(), actions })
    }

    fn unresolved(&self, session: &mut Session, reprompt: DialogueAction) -> Vec<DialogueAction> {
        let attempts = session.register_failed_attempt();
        if attempts >= self.policy.max_choice_attempts {
            session.return_to_idle();
            vec![DialogueAction::ReportAttemptsExhausted]
        } else {
            vec![reprompt]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DialogueEngine, DialoguePolicy, FlowTransitionError};
    use crate::domain::event::EventSummary;
    use crate::domain::session::{ConversationId, DialogueState, Session};
    use crate::flows::states::{DialogueAction, DialogueEvent};

    fn candidates() -> Vec<EventSummary> {
        vec![
            EventSummary::new("evt-1", "Standup"),
            EventSummary::new("evt-2", "Dentist"),
            EventSummary::new("evt-3", "Dinner with Ana"),
        ]
    }

    fn session() -> Session {
        Session::new(ConversationId("whatsapp:+15550000001".to_string()))
    }

    fn awaiting_choice(engine: &DialogueEngine) -> Session {
        let mut session = session();
        engine
            .apply(&mut session, DialogueEvent::UpdateRequested { candidates: candidates() })
            .expect("idle -> awaiting choice");
        session
    }

    #[test]
    fn update_without_target_stores_candidates() {
        let engine = DialogueEngine::default();
        let mut session = session();

        let outcome = engine
            .apply(&mut session, DialogueEvent::UpdateRequested { candidates: candidates() })
            .expect("transition should apply");

        assert_eq!(outcome.from, DialogueState::Idle);
        assert_eq!(outcome.to, DialogueState::AwaitingEventChoice);
        assert_eq!(outcome.actions, vec![DialogueAction::PromptForEventChoice]);
        assert_eq!(session.candidate_events().len(), 3);
        assert!(session.chosen_event_id().is_none());
        assert!(session.invariants_hold());
    }

    #[test]
    fn empty_window_stays_idle() {
        let engine = DialogueEngine::default();
        let mut session = session();

        let outcome = engine
            .apply(&mut session, DialogueEvent::UpdateRequested { candidates: Vec::new() })
            .expect("transition should apply");

        assert_eq!(outcome.to, DialogueState::Idle);
        assert_eq!(outcome.actions, vec![DialogueAction::ReportNothingToUpdate]);
    }

    #[test]
    fn resolved_choice_moves_to_changes_and_clears_candidates() {
        let engine = DialogueEngine::default();
        let mut session = awaiting_choice(&engine);

        let outcome = engine
            .apply(&mut session, DialogueEvent::EventChosen { event_id: "evt-2".to_string() })
            .expect("transition should apply");

        assert_eq!(outcome.to, DialogueState::AwaitingEventChanges);
        assert_eq!(session.chosen_event_id(), Some("evt-2"));
        assert!(session.candidate_events().is_empty());
        assert!(session.invariants_hold());
    }

    #[test]
    fn unknown_choice_counts_as_unresolved() {
        let engine = DialogueEngine::default();
        let mut session = awaiting_choice(&engine);

        let outcome = engine
            .apply(&mut session, DialogueEvent::EventChosen { event_id: "evt-99".to_string() })
            .expect("transition should apply");

        assert_eq!(outcome.to, DialogueState::AwaitingEventChoice);
        assert_eq!(outcome.actions, vec![DialogueAction::PromptForChoiceClarification]);
        assert_eq!(session.failed_attempts(), 1);
        assert_eq!(session.candidate_events().len(), 3);
    }

    #[test]
    fn attempts_cap_abandons_the_dialogue() {
        let engine = DialogueEngine::new(DialoguePolicy::with_max_attempts(2));
        let mut session = awaiting_choice(&engine);

        let first = engine.apply(&mut session, DialogueEvent::ChoiceUnresolved).expect("first");
        assert_eq!(first.to, DialogueState::AwaitingEventChoice);

        let second = engine.apply(&mut session, DialogueEvent::ChoiceUnresolved).expect("second");
        assert_eq!(second.to, DialogueState::Idle);
        assert_eq!(second.actions, vec![DialogueAction::ReportAttemptsExhausted]);
        assert!(session.candidate_events().is_empty());
        assert_eq!(session.failed_attempts(), 0);
    }

    #[test]
    fn applied_changes_return_to_idle() {
        let engine = DialogueEngine::default();
        let mut session = awaiting_choice(&engine);
        engine
            .apply(&mut session, DialogueEvent::EventChosen { event_id: "evt-1".to_string() })
            .expect("choice");

        let outcome = engine.apply(&mut session, DialogueEvent::ChangesApplied).expect("applied");

        assert_eq!(outcome.from, DialogueState::AwaitingEventChanges);
        assert_eq!(outcome.to, DialogueState::Idle);
        assert!(session.chosen_event_id().is_none());
    }

    #[test]
    fn cancel_works_from_both_awaiting_states() {
        let engine = DialogueEngine::default();

        let mut choosing = awaiting_choice(&engine);
        let outcome = engine.apply(&mut choosing, DialogueEvent::CancelRequested).expect("cancel");
        assert_eq!(outcome.to, DialogueState::Idle);
        assert_eq!(outcome.actions, vec![DialogueAction::ConfirmCancellation]);

        let mut changing = awaiting_choice(&engine);
        engine
            .apply(&mut changing, DialogueEvent::EventChosen { event_id: "evt-3".to_string() })
            .expect("choice");
        engine.apply(&mut changing, DialogueEvent::CancelRequested).expect("cancel");
        assert_eq!(changing.state(), DialogueState::Idle);
        assert!(changing.chosen_event_id().is_none());
    }

    #[test]
    fn out_of_order_events_are_rejected_without_side_effects() {
        let engine = DialogueEngine::default();
        let mut session = session();

        let error = engine
            .apply(&mut session, DialogueEvent::EventChosen { event_id: "evt-1".to_string() })
            .expect_err("idle cannot accept a choice");
        assert_eq!(
            error,
            FlowTransitionError::InvalidTransition {
                state: DialogueState::Idle,
                event: "event_chosen"
            }
        );
        assert_eq!(session.state(), DialogueState::Idle);

        let mut choosing = awaiting_choice(&engine);
        let error = engine
            .apply(&mut choosing, DialogueEvent::UpdateRequested { candidates: candidates() })
            .expect_err("awaiting choice cannot restart");
        assert!(matches!(error, FlowTransitionError::InvalidTransition { .. }));
        assert_eq!(choosing.candidate_events().len(), 3);
    }

    #[test]
    fn cancel_keywords_match_exactly() {
        let policy = DialoguePolicy::default();
        assert!(policy.is_cancel("Cancelar"));
        assert!(policy.is_cancel("  cancel! "));
        assert!(policy.is_cancel("Olvídalo"));
        assert!(!policy.is_cancel("cancel the dentist appointment"));
        assert!(policy.is_cancel("Salir."));
        assert!(!policy.is_cancel("salir ahora"));
    }
}
