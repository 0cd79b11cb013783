use std::sync::Arc;

use tracing::warn;

use relay_core::domain::event::DateRange;
use relay_core::domain::intent::{CalendarIntent, ChangesPayload, EventChoice, SheetIntent};
use relay_core::domain::session::{Session, Style};
use relay_core::domain::time::DATE_FORMAT;
use relay_core::extraction::{extract, Extraction, Payload};

use crate::llm::{CompletionRequest, OracleClient};
use crate::prompts::{self, Clock};

pub const CLASSIFICATION_TEMPERATURE: f32 = 0.0;
pub const CLASSIFICATION_MAX_OUTPUT_TOKENS: u32 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentKind {
    CalendarAction,
    SheetAction,
    DateRange,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CalendarAction => "calendar_action",
            Self::SheetAction => "sheet_action",
            Self::DateRange => "date_range",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Calendar(CalendarIntent),
    Sheet(SheetIntent),
    DateRange(DateRange),
}

/// One oracle call per classification, at temperature zero, piped through
/// the structured extractor. Failures and malformed replies degrade to the
/// schema fallback.
#[derive(Clone)]
pub struct IntentClassifier {
    oracle: OracleClient,
    clock: Arc<dyn Clock>,
    time_zone: String,
}

impl IntentClassifier {
    pub fn new(oracle: OracleClient, clock: Arc<dyn Clock>, time_zone: impl Into<String>) -> Self {
        Self { oracle, clock, time_zone: time_zone.into() }
    }

    pub async fn classify(
        &self,
        session: &Session,
        utterance: &str,
        kind: IntentKind,
    ) -> Classification {
        match kind {
            IntentKind::CalendarAction => {
                Classification::Calendar(self.calendar_intent(session, utterance).await)
            }
            IntentKind::SheetAction => {
                Classification::Sheet(self.sheet_intent(session, utterance).await)
            }
            IntentKind::DateRange => {
                Classification::DateRange(self.date_range(session, utterance).await)
            }
        }
    }

    pub async fn calendar_intent(&self, session: &Session, utterance: &str) -> CalendarIntent {
        let task = prompts::calendar_action_instruction(self.clock.today());
        let purpose = IntentKind::CalendarAction.as_str();
        self.run(session, utterance, task, purpose, CalendarIntent::other).await.into_value()
    }

    pub async fn sheet_intent(&self, session: &Session, utterance: &str) -> SheetIntent {
        let task = prompts::sheet_action_instruction();
        self.run(session, utterance, task, IntentKind::SheetAction.as_str(), SheetIntent::other)
            .await
            .into_value()
    }

    /// Falls back to today..today.
    pub async fn date_range(&self, session: &Session, utterance: &str) -> DateRange {
        let today = self.clock.today().format(DATE_FORMAT).to_string();
        let task = prompts::date_range_instruction(self.clock.today());
        self.run(session, utterance, task, IntentKind::DateRange.as_str(), || {
            DateRange::single_day(today)
        })
        .await
        .into_value()
    }

    /// Resolves the utterance to one of the session's candidate ids. The id is
    /// returned as given by the oracle; membership is checked by the flow
    /// engine.
    pub async fn resolve_event_choice(&self, session: &Session, utterance: &str) -> Option<String> {
        let task = prompts::event_choice_instruction(session.candidate_events());
        let extraction =
            self.run(session, utterance, task, "event_choice", EventChoice::default).await;
        extraction.well_formed.then_some(extraction.value.chosen_event_id).flatten()
    }

    /// `None` when no usable field could be extracted.
    pub async fn extract_event_changes(
        &self,
        session: &Session,
        utterance: &str,
    ) -> Option<ChangesPayload> {
        let task = prompts::event_changes_instruction(self.clock.today());
        let extraction =
            self.run(session, utterance, task, "event_changes", ChangesPayload::default).await;
        extraction.well_formed.then_some(extraction.value)
    }

    async fn run<T>(
        &self,
        session: &Session,
        utterance: &str,
        task: String,
        purpose: &'static str,
        fallback: impl FnOnce() -> T,
    ) -> Extraction<T>
    where
        T: Payload,
    {
        let style = Style::resolve(session.style());
        let tone = prompts::tone_instruction(style, self.clock.now(), &self.time_zone);
        let request = CompletionRequest {
            messages: prompts::stateless_messages(tone, task, utterance),
            temperature: CLASSIFICATION_TEMPERATURE,
            max_output_tokens: CLASSIFICATION_MAX_OUTPUT_TOKENS,
        };

        let raw = self.oracle.ask(request, session.id().as_str(), purpose).await;
        let extraction = extract(&raw, fallback);
        if let Some(failure) = extraction.failure {
            warn!(
                event_name = "agent.extraction.fallback_used",
                conversation_id = session.id().as_str(),
                purpose,
                failure = failure.as_str(),
                "structured payload unusable; using schema fallback"
            );
        }
        extraction
    }
}
