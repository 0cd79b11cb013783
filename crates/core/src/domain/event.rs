use serde::{Deserialize, Serialize};

/// Identifier plus display title of a calendar event, as offered to the user
/// while disambiguating.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub title: String,
}

impl EventSummary {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: Option<String>,
}

impl CalendarEvent {
    pub fn summary(&self) -> EventSummary {
        EventSummary::new(self.id.clone(), self.title.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,
    pub start: String,
    pub end: String,
    pub time_zone: String,
}

/// Partial update; `None` fields are left untouched by the calendar.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChanges {
    pub summary: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub time_zone: Option<String>,
}

impl EventChanges {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.start.is_none() && self.end.is_none()
    }
}

/// Inclusive date bounds (`YYYY-MM-DD`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self { start: start.into(), end: end.into() }
    }

    pub fn single_day(day: impl Into<String>) -> Self {
        let day = day.into();
        Self { start: day.clone(), end: day }
    }
}
