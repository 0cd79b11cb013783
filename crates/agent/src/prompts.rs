//! Instruction builders. The current time is always passed in through a
//! [`Clock`] so prompts are reproducible in tests.

use chrono::{Local, NaiveDate, NaiveDateTime};

use relay_core::domain::event::EventSummary;
use relay_core::domain::session::{Role, Style, Turn};
use relay_core::domain::time::{DATE_FORMAT, DATE_TIME_FORMAT};

use crate::llm::ChatMessage;

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// Parses `YYYY-MM-DDTHH:MM:SS`.
    pub fn parse(raw: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT).ok().map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

fn tone_line(style: Style) -> &'static str {
    match style {
        Style::Serious => "Answer in a serious, professional tone.",
        Style::Playful => "Answer in a playful tone and feel free to add light humour.",
        Style::Friendly => "Answer in a warm, friendly tone.",
        Style::Neutral => "Answer in a neutral, helpful tone.",
    }
}

/// First system instruction of every oracle call.
pub fn tone_instruction(style: Style, now: NaiveDateTime, time_zone: &str) -> String {
    format!(
        "You are a WhatsApp assistant that chats with the user and manages their calendar \
         and spreadsheets. The current date and time is {} ({time_zone}). {} Keep replies short.",
        now.format("%Y-%m-%d %H:%M"),
        tone_line(style),
    )
}

pub fn calendar_action_instruction(today: NaiveDate) -> String {
    format!(
        "Classify the user's message as a calendar request. Today is {today}. \
         Reply with a single JSON object and nothing else, using these keys:\n\
         {{\"action\": \"create\" | \"list\" | \"update\" | \"delete\" | \"other\", \
         \"summary\": string or null, \"start\": \"YYYY-MM-DDTHH:MM:SS\" or null, \
         \"end\": \"YYYY-MM-DDTHH:MM:SS\" or null, \"target_id\": string or null, \
         \"range_start\": \"YYYY-MM-DD\" or null, \"range_end\": \"YYYY-MM-DD\" or null}}\n\
         Use \"other\" when the message is not about the calendar. Only set target_id when \
         the user gives an event id.",
        today = today.format(DATE_FORMAT),
    )
}

pub fn sheet_action_instruction() -> String {
    "Classify the user's message as a spreadsheet request. Reply with a single JSON object \
     and nothing else, using these keys:\n\
     {\"action\": \"create_sheet\" | \"delete_sheet\" | \"list_sheets\" | \"other\", \
     \"name\": string or null}\n\
     Use \"other\" when the message is not about spreadsheets."
        .to_string()
}

pub fn date_range_instruction(today: NaiveDate) -> String {
    format!(
        "Extract the date range the user is asking about. Today is {today}. Reply with a \
         single JSON object and nothing else: {{\"start\": \"YYYY-MM-DD\", \"end\": \"YYYY-MM-DD\"}}. \
         When the user names a single day, use it for both bounds.",
        today = today.format(DATE_FORMAT),
    )
}

/// Numbered list shown to the user and embedded in the choice instruction.
pub fn numbered_candidates(candidates: &[EventSummary]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(index, event)| format!("{}. {} (id: {})", index + 1, event.title, event.id))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn event_choice_instruction(candidates: &[EventSummary]) -> String {
    format!(
        "The user was shown this numbered list of events and asked which one to update:\n\
         {}\n\
         Work out which event the user's message refers to, by number or by title. Reply with \
         a single JSON object and nothing else: {{\"chosen_event_id\": \"<id>\"}}, or \
         {{\"chosen_event_id\": null}} when it is unclear.",
        numbered_candidates(candidates),
    )
}

pub fn event_changes_instruction(today: NaiveDate) -> String {
    format!(
        "The user is describing changes to a calendar event. Today is {today}. Reply with a \
         single JSON object and nothing else: {{\"summary\": string or null, \
         \"start\": \"YYYY-MM-DDTHH:MM:SS\" or null, \"end\": \"YYYY-MM-DDTHH:MM:SS\" or null}}. \
         Leave a key null when the user does not change it.",
        today = today.format(DATE_FORMAT),
    )
}

/// Tone instruction, task instruction, then the single utterance.
pub fn stateless_messages(tone: String, task: String, utterance: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(tone), ChatMessage::system(task), ChatMessage::user(utterance)]
}

/// Tone instruction followed by the whole history, oldest first.
pub fn history_messages(tone: String, history: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(tone));
    messages.extend(history.iter().map(|turn| match turn.role {
        Role::User => ChatMessage::user(turn.text.clone()),
        Role::Assistant => ChatMessage::assistant(turn.text.clone()),
    }));
    messages
}
