//! Intent records produced per utterance. They are never persisted.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::event::{DateRange, EventChanges};
use crate::domain::time::{normalize_date, normalize_date_time};
use crate::extraction::Payload;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "snake_case")]
pub enum CalendarAction {
    Create,
    List,
    Update,
    Delete,
    Other,
}

impl From<String> for CalendarAction {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => Self::Create,
            "list" => Self::List,
            "update" => Self::Update,
            "delete" => Self::Delete,
            _ => Self::Other,
        }
    }
}

impl CalendarAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Other => "other",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "snake_case")]
pub enum SheetAction {
    CreateSheet,
    DeleteSheet,
    ListSheets,
    Other,
}

impl From<String> for SheetAction {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "create_sheet" => Self::CreateSheet,
            "delete_sheet" => Self::DeleteSheet,
            "list_sheets" => Self::ListSheets,
            _ => Self::Other,
        }
    }
}

impl SheetAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateSheet => "create_sheet",
            Self::DeleteSheet => "delete_sheet",
            Self::ListSheets => "list_sheets",
            Self::Other => "other",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarIntent {
    pub action: CalendarAction,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub end: Option<String>,
    #[serde(default, alias = "event_id", deserialize_with = "lenient_string")]
    pub target_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub range_start: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub range_end: Option<String>,
}

impl CalendarIntent {
    pub fn other() -> Self {
        Self {
            action: CalendarAction::Other,
            summary: None,
            start: None,
            end: None,
            target_id: None,
            range_start: None,
            range_end: None,
        }
    }

    pub fn changes(&self) -> EventChanges {
        EventChanges {
            summary: self.summary.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            time_zone: None,
        }
    }

    pub fn range(&self) -> Option<DateRange> {
        match (&self.range_start, &self.range_end) {
            (Some(start), Some(end)) => Some(DateRange::new(start.clone(), end.clone())),
            _ => None,
        }
    }
}

impl Payload for CalendarIntent {
    fn normalize(self) -> Self {
        Self {
            action: self.action,
            summary: self.summary,
            start: self.start.as_deref().and_then(normalize_date_time),
            end: self.end.as_deref().and_then(normalize_date_time),
            target_id: self.target_id,
            range_start: self.range_start.as_deref().and_then(normalize_date),
            range_end: self.range_end.as_deref().and_then(normalize_date),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetIntent {
    pub action: SheetAction,
    #[serde(default, alias = "sheet_name", deserialize_with = "lenient_string")]
    pub name: Option<String>,
}

impl SheetIntent {
    pub fn other() -> Self {
        Self { action: SheetAction::Other, name: None }
    }
}

impl Payload for SheetIntent {}

impl Payload for DateRange {
    fn normalize(self) -> Self {
        Self {
            start: normalize_date(&self.start).unwrap_or_default(),
            end: normalize_date(&self.end).unwrap_or_default(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.start.is_empty() && !self.end.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChoice {
    #[serde(default, deserialize_with = "lenient_string")]
    pub chosen_event_id: Option<String>,
}

impl Payload for EventChoice {
    fn is_complete(&self) -> bool {
        self.chosen_event_id.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub end: Option<String>,
}

impl ChangesPayload {
    pub fn into_changes(self) -> EventChanges {
        EventChanges { summary: self.summary, start: self.start, end: self.end, time_zone: None }
    }
}

impl Payload for ChangesPayload {
    fn normalize(self) -> Self {
        Self {
            summary: self.summary,
            start: self.start.as_deref().and_then(normalize_date_time),
            end: self.end.as_deref().and_then(normalize_date_time),
        }
    }

    fn is_complete(&self) -> bool {
        self.summary.is_some() || self.start.is_some() || self.end.is_some()
    }
}

/// Accepts strings, numbers, and booleans; blank strings and nulls become `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}
