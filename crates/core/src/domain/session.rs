use serde::{Deserialize, Serialize};

use crate::domain::event::EventSummary;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    #[default]
    Idle,
    AwaitingEventChoice,
    AwaitingEventChanges,
}

impl DialogueState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Tone tags with a dedicated instruction. Any other tag stored on a session
/// falls back to [`Style::Neutral`] when the tone is rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    Serious,
    Playful,
    Friendly,
    #[default]
    Neutral,
}

impl Style {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "serious" | "serio" => Some(Self::Serious),
            "playful" | "divertido" => Some(Self::Playful),
            "friendly" | "amigable" => Some(Self::Friendly),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }

    pub fn resolve(tag: Option<&str>) -> Self {
        tag.and_then(Self::from_tag).unwrap_or_default()
    }
}

/// Per-conversation state.
///
/// The dialogue fields are only mutated through the flow engine so that
/// `candidate_events` is non-empty only while awaiting a choice and
/// `chosen_event_id` is set only while awaiting changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: ConversationId,
    history: Vec<Turn>,
    state: DialogueState,
    style: Option<String>,
    candidate_events: Vec<EventSummary>,
    chosen_event_id: Option<String>,
    #[serde(default)]
    failed_attempts: u32,
}

impl Session {
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            history: Vec::new(),
            state: DialogueState::Idle,
            style: None,
            candidate_events: Vec::new(),
            chosen_event_id: None,
            failed_attempts: 0,
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn state(&self) -> DialogueState {
        self.state
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn candidate_events(&self) -> &[EventSummary] {
        &self.candidate_events
    }

    pub fn chosen_event_id(&self) -> Option<&str> {
        self.chosen_event_id.as_deref()
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn record_user(&mut self, text: impl Into<String>) {
        self.history.push(Turn { role: Role::User, text: text.into() });
    }

    pub fn record_assistant(&mut self, text: impl Into<String>) {
        self.history.push(Turn { role: Role::Assistant, text: text.into() });
    }

    pub fn set_style(&mut self, tag: impl Into<String>) {
        self.style = Some(tag.into());
    }

    pub(crate) fn await_event_choice(&mut self, candidates: Vec<EventSummary>) {
        self.state = DialogueState::AwaitingEventChoice;
        self.candidate_events = candidates;
        self.chosen_event_id = None;
        self.failed_attempts = 0;
    }

    pub(crate) fn await_event_changes(&mut self, event_id: String) {
        self.state = DialogueState::AwaitingEventChanges;
        self.candidate_events.clear();
        self.chosen_event_id = Some(event_id);
        self.failed_attempts = 0;
    }

    pub(crate) fn register_failed_attempt(&mut self) -> u32 {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.failed_attempts
    }

    pub(crate) fn return_to_idle(&mut self) {
        self.state = DialogueState::Idle;
        self.candidate_events.clear();
        self.chosen_event_id = None;
        self.failed_attempts = 0;
    }

    /// Drops any in-flight dialogue, keeping history and style.
    pub fn abandon_dialogue(&mut self) {
        self.return_to_idle();
    }

    /// Checks the dialogue invariants; used by stores before persisting.
    pub fn invariants_hold(&self) -> bool {
        let candidates_ok =
            self.candidate_events.is_empty() || self.state == DialogueState::AwaitingEventChoice;
        let chosen_ok =
            self.chosen_event_id.is_none() || self.state == DialogueState::AwaitingEventChanges;
        candidates_ok && chosen_ok
    }
}
