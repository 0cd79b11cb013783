use std::sync::Arc;

use chrono::Days;
use tracing::{info, warn};

use relay_core::config::AppConfig;
use relay_core::domain::event::{DateRange, EventSummary};
use relay_core::domain::intent::{CalendarAction, CalendarIntent, SheetAction, SheetIntent};
use relay_core::domain::session::{ConversationId, DialogueState, Session};
use relay_core::domain::time::DATE_FORMAT;
use relay_core::errors::{ApplicationError, DomainError, APOLOGY_MESSAGE};
use relay_core::flows::{
    DialogueAction, DialogueEngine, DialogueEvent, DialoguePolicy, TransitionOutcome,
};
use relay_db::{ConversationLocks, RepositoryError, SessionRepository};

use crate::classifier::IntentClassifier;
use crate::commands::{parse_style_command, style_confirmation, style_usage, StyleCommand};
use crate::executor::{failure_message, ActionExecutor, ResolvedAction};
use crate::llm::{LanguageOracle, OracleClient};
use crate::prompts::{numbered_candidates, Clock};
use crate::responder::{ConversationResponder, Reply};
use crate::tools::{CalendarCollaborator, SpreadsheetCollaborator};

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeSettings {
    pub time_zone: String,
    pub lookahead_days: u32,
    pub default_event_minutes: u32,
    pub chat_temperature: f32,
    pub max_output_tokens: u32,
    pub max_choice_attempts: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            time_zone: config.calendar.time_zone.clone(),
            lookahead_days: config.calendar.lookahead_days,
            default_event_minutes: config.calendar.default_event_minutes,
            chat_temperature: config.llm.chat_temperature,
            max_output_tokens: config.llm.max_output_tokens,
            max_choice_attempts: config.session.max_choice_attempts,
        }
    }
}

/// External collaborators the runtime is wired to.
pub struct RuntimeDeps {
    pub oracle: Arc<dyn LanguageOracle>,
    pub calendar: Arc<dyn CalendarCollaborator>,
    pub sheets: Arc<dyn SpreadsheetCollaborator>,
    pub sessions: Arc<dyn SessionRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct AgentRuntime {
    sessions: Arc<dyn SessionRepository>,
    locks: ConversationLocks,
    engine: DialogueEngine,
    classifier: IntentClassifier,
    executor: ActionExecutor,
    responder: ConversationResponder,
    clock: Arc<dyn Clock>,
    lookahead_days: u32,
    oracle_name: &'static str,
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn missing_fields_message(action: &str, missing: &[&str]) -> String {
    format!("To {action} I still need: {}.", missing.join(", "))
}

impl AgentRuntime {
    pub fn new(deps: RuntimeDeps, settings: RuntimeSettings) -> Self {
        let oracle = OracleClient::new(deps.oracle);
        let oracle_name = oracle.oracle_name();
        Self {
            sessions: deps.sessions,
            locks: ConversationLocks::default(),
            engine: DialogueEngine::new(DialoguePolicy::with_max_attempts(
                settings.max_choice_attempts,
            )),
            classifier: IntentClassifier::new(
                oracle.clone(),
                deps.clock.clone(),
                settings.time_zone.clone(),
            ),
            executor: ActionExecutor::new(
                deps.calendar,
                deps.sheets,
                settings.time_zone.clone(),
                settings.default_event_minutes,
            ),
            responder: ConversationResponder::new(
                oracle,
                deps.clock.clone(),
                settings.time_zone,
                settings.chat_temperature,
                settings.max_output_tokens,
            ),
            clock: deps.clock,
            lookahead_days: settings.lookahead_days,
            oracle_name,
        }
    }

    pub fn oracle_name(&self) -> &'static str {
        self.oracle_name
    }

    pub fn session_backend(&self) -> &'static str {
        self.sessions.backend()
    }

    pub async fn check_session_store(&self) -> Result<(), ApplicationError> {
        self.sessions.ping().await.map_err(persistence)
    }

    /// One inbound-message-to-reply cycle, serialized per conversation.
    pub async fn handle_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        correlation_id: &str,
    ) -> Result<String, ApplicationError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut session = self.sessions.get_or_create(conversation_id).await.map_err(persistence)?;

        info!(
            event_name = "agent.runtime.message_received",
            correlation_id,
            conversation_id = conversation_id.as_str(),
            state = ?session.state(),
            "handling inbound message"
        );

        session.record_user(text);
        let checkpoint = session.clone();

        match self.reply_to(&mut session, text).await {
            Ok(reply) => {
                self.sessions.save(session).await.map_err(persistence)?;
                Ok(reply)
            }
            Err(error) => {
                self.record_failure(checkpoint, correlation_id, &error).await;
                Err(error)
            }
        }
    }

    async fn reply_to(&self, session: &mut Session, text: &str) -> Result<String, ApplicationError> {
        let reply = self.route(session, text).await?;
        let reply = self.responder.respond(session, reply).await;

        if !session.invariants_hold() {
            return Err(DomainError::InvariantViolation(format!(
                "session `{}` left inconsistent in state {:?}",
                session.id(),
                session.state()
            ))
            .into());
        }
        Ok(reply)
    }

    /// Persists the user turn and the apology sent in its place, with the dialogue dropped.
    async fn record_failure(
        &self,
        mut session: Session,
        correlation_id: &str,
        error: &ApplicationError,
    ) {
        warn!(
            event_name = "agent.runtime.message_failed",
            correlation_id,
            conversation_id = session.id().as_str(),
            error = %error,
            "abandoning dialogue after a failed turn"
        );

        session.abandon_dialogue();
        session.record_assistant(APOLOGY_MESSAGE);
        if let Err(save_error) = self.sessions.save(session).await {
            warn!(
                event_name = "agent.runtime.failure_not_recorded",
                correlation_id,
                error = %save_error,
                "could not persist the failed turn"
            );
        }
    }

    async fn route(&self, session: &mut Session, text: &str) -> Result<Reply, ApplicationError> {
        if let Some(command) = parse_style_command(text) {
            return Ok(Reply::Structured(apply_style(session, command)));
        }

        if !session.state().is_idle() {
            if self.engine.policy().is_cancel(text) {
                let outcome = self.transition(session, DialogueEvent::CancelRequested)?;
                return Ok(Reply::Structured(self.render(&outcome, session, None)));
            }
            return self.continue_dialogue(session, text).await;
        }

        let intent = self.classifier.calendar_intent(session, text).await;
        if intent.action != CalendarAction::Other {
            return self.handle_calendar(session, text, intent).await;
        }

        let sheet = self.classifier.sheet_intent(session, text).await;
        if sheet.action != SheetAction::Other {
            return Ok(self.handle_sheet(session, sheet).await);
        }

        Ok(Reply::FreeForm)
    }

    async fn continue_dialogue(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<Reply, ApplicationError> {
        match session.state() {
            DialogueState::AwaitingEventChoice => {
                let chosen = self.classifier.resolve_event_choice(session, text).await;
                let title = chosen.as_deref().and_then(|id| {
                    session
                        .candidate_events()
                        .iter()
                        .find(|event| event.id == id)
                        .map(|event| event.title.clone())
                });
                let event = match chosen {
                    Some(event_id) => DialogueEvent::EventChosen { event_id },
                    None => DialogueEvent::ChoiceUnresolved,
                };
                let outcome = self.transition(session, event)?;
                Ok(Reply::Structured(self.render(&outcome, session, title.as_deref())))
            }
            DialogueState::AwaitingEventChanges => {
                let Some(event_id) = session.chosen_event_id().map(str::to_owned) else {
                    return Err(DomainError::InvariantViolation(
                        "awaiting changes without a chosen event".to_string(),
                    )
                    .into());
                };

                match self.classifier.extract_event_changes(session, text).await {
                    Some(changes) => {
                        let outcome = self
                            .executor
                            .execute(
                                ResolvedAction::UpdateEvent {
                                    id: event_id,
                                    changes: changes.into_changes(),
                                },
                                session.id().as_str(),
                            )
                            .await;
                        self.transition(session, DialogueEvent::ChangesApplied)?;
                        Ok(Reply::Structured(outcome.message))
                    }
                    None => {
                        let outcome = self.transition(session, DialogueEvent::ChangesUnresolved)?;
                        Ok(Reply::Structured(self.render(&outcome, session, None)))
                    }
                }
            }
            DialogueState::Idle => Ok(Reply::FreeForm),
        }
    }

    async fn handle_calendar(
        &self,
        session: &mut Session,
        text: &str,
        intent: CalendarIntent,
    ) -> Result<Reply, ApplicationError> {
        let conversation_id = session.id().as_str().to_owned();

        let action = match intent.action {
            CalendarAction::Create => {
                let mut missing = Vec::new();
                if intent.summary.is_none() {
                    missing.push("a title");
                }
                if intent.start.is_none() {
                    missing.push("a start date and time");
                }
                match (intent.summary, intent.start) {
                    (Some(summary), Some(start)) => {
                        ResolvedAction::CreateEvent { summary, start, end: intent.end }
                    }
                    _ => {
                        return Ok(Reply::Structured(missing_fields_message(
                            "create the event",
                            &missing,
                        )))
                    }
                }
            }
            CalendarAction::List => {
                let range = match intent.range() {
                    Some(range) => range,
                    None => self.classifier.date_range(session, text).await,
                };
                ResolvedAction::ListEvents { range }
            }
            CalendarAction::Update => match intent.target_id.clone() {
                Some(id) => {
                    let changes = intent.changes();
                    if changes.is_empty() {
                        return Ok(Reply::Structured(format!(
                            "What should change for event {id}? Give a new title, start or end time."
                        )));
                    }
                    ResolvedAction::UpdateEvent { id, changes }
                }
                None => return self.start_disambiguation(session).await,
            },
            CalendarAction::Delete => match intent.target_id {
                Some(id) => ResolvedAction::DeleteEvent { id },
                None => {
                    return Ok(Reply::Structured(
                        "Which event should I delete? Please include its id.".to_string(),
                    ))
                }
            },
            CalendarAction::Other => return Ok(Reply::FreeForm),
        };

        let outcome = self.executor.execute(action, &conversation_id).await;
        Ok(Reply::Structured(outcome.message))
    }

    async fn start_disambiguation(&self, session: &mut Session) -> Result<Reply, ApplicationError> {
        let window = self.lookahead_window();
        let candidates: Vec<EventSummary> = match self.executor.upcoming(&window).await {
            Ok(events) => events.iter().map(|event| event.summary()).collect(),
            Err(error) => {
                warn!(
                    event_name = "agent.executor.collaborator_failed",
                    conversation_id = session.id().as_str(),
                    action = "calendar.list",
                    error = %error,
                    "could not load update candidates"
                );
                return Ok(Reply::Structured(failure_message("list your events")));
            }
        };

        let outcome = self.transition(session, DialogueEvent::UpdateRequested { candidates })?;
        Ok(Reply::Structured(self.render(&outcome, session, None)))
    }

    async fn handle_sheet(&self, session: &Session, intent: SheetIntent) -> Reply {
        let action = match (intent.action, intent.name) {
            (SheetAction::CreateSheet, Some(name)) => ResolvedAction::CreateSheet { name },
            (SheetAction::DeleteSheet, Some(name)) => ResolvedAction::DeleteSheet { name },
            (SheetAction::CreateSheet, None) => {
                return Reply::Structured(missing_fields_message("create the sheet", &["a name"]))
            }
            (SheetAction::DeleteSheet, None) => {
                return Reply::Structured(missing_fields_message("delete the sheet", &["a name"]))
            }
            (SheetAction::ListSheets, _) => ResolvedAction::ListSheets,
            (SheetAction::Other, _) => return Reply::FreeForm,
        };

        Reply::Structured(self.executor.execute(action, session.id().as_str()).await.message)
    }

    fn lookahead_window(&self) -> DateRange {
        let today = self.clock.today();
        // Inclusive on both ends, so N days end at today + N - 1.
        let span = u64::from(self.lookahead_days.saturating_sub(1));
        let last = today.checked_add_days(Days::new(span)).unwrap_or(today);
        DateRange::new(today.format(DATE_FORMAT).to_string(), last.format(DATE_FORMAT).to_string())
    }

    fn transition(
        &self,
        session: &mut Session,
        event: DialogueEvent,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let outcome = self.engine.apply(session, event).map_err(DomainError::from)?;
        info!(
            event_name = "agent.dialogue.transition_applied",
            conversation_id = session.id().as_str(),
            from = ?outcome.from,
            to = ?outcome.to,
            dialogue_event = %outcome.event,
            failed_attempts = session.failed_attempts(),
            "dialogue transition applied"
        );
        Ok(outcome)
    }

    fn render(&self, outcome: &TransitionOutcome, session: &Session, title: Option<&str>) -> String {
        match outcome.primary_action() {
            Some(DialogueAction::PromptForEventChoice) => format!(
                "Which event do you want to update?\n{}\nReply with the number or the title.",
                numbered_candidates(session.candidate_events())
            ),
            Some(DialogueAction::PromptForChoiceClarification) => format!(
                "I couldn't tell which event you meant. Please reply with one of these numbers or titles:\n{}",
                numbered_candidates(session.candidate_events())
            ),
            Some(DialogueAction::PromptForChanges) => format!(
                "Got it: \"{}\". What should change? Give a new title, start or end time.",
                title.unwrap_or("that event")
            ),
            Some(DialogueAction::PromptForChangesClarification) => {
                "I couldn't tell what to change. Please give a new title, start or end time."
                    .to_string()
            }
            Some(DialogueAction::ReportNothingToUpdate) => format!(
                "You have no events in the next {} days, so there is nothing to update.",
                self.lookahead_days
            ),
            Some(DialogueAction::ReportAttemptsExhausted) => {
                "I still couldn't work it out, so I've dropped this update. You can start again anytime."
                    .to_string()
            }
            Some(DialogueAction::ConfirmCancellation) => {
                "Okay, I've cancelled the update.".to_string()
            }
            None => "Done.".to_string(),
        }
    }
}

fn apply_style(session: &mut Session, command: StyleCommand) -> String {
    match command {
        StyleCommand::Set(tag) => {
            let reply = style_confirmation(&tag);
            session.set_style(tag);
            reply
        }
        StyleCommand::MissingTag => style_usage(),
    }
}
