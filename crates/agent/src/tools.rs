//! Calendar and spreadsheet collaborators.
//!
//! The traits are the only surface the executor sees. The in-memory
//! implementations back the local `chat` command and the test suites.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use relay_core::domain::event::{CalendarEvent, DateRange, EventChanges, NewEvent};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait CalendarCollaborator: Send + Sync {
    async fn create(&self, event: NewEvent) -> Result<String, CollaboratorError>;
    /// Events whose start date falls within `range`, chronologically.
    async fn list(&self, range: &DateRange) -> Result<Vec<CalendarEvent>, CollaboratorError>;
    async fn update(&self, id: &str, changes: EventChanges) -> Result<String, CollaboratorError>;
    async fn delete(&self, id: &str) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait SpreadsheetCollaborator: Send + Sync {
    async fn create_sheet(&self, name: &str) -> Result<(), CollaboratorError>;
    async fn delete_sheet(&self, name: &str) -> Result<(), CollaboratorError>;
    async fn list_sheets(&self) -> Result<Vec<String>, CollaboratorError>;
}

#[derive(Default)]
struct CalendarState {
    events: Vec<CalendarEvent>,
    next_id: u64,
}

#[derive(Default)]
pub struct InMemoryCalendar {
    state: Mutex<CalendarState>,
}

impl InMemoryCalendar {
    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        let next_id = events.len() as u64;
        Self { state: Mutex::new(CalendarState { events, next_id }) }
    }

    pub async fn events(&self) -> Vec<CalendarEvent> {
        self.state.lock().await.events.clone()
    }

    pub async fn find(&self, id: &str) -> Option<CalendarEvent> {
        self.state.lock().await.events.iter().find(|event| event.id == id).cloned()
    }
}

fn start_date(start: &str) -> &str {
    start.get(..10).unwrap_or(start)
}

#[async_trait]
impl CalendarCollaborator for InMemoryCalendar {
    async fn create(&self, event: NewEvent) -> Result<String, CollaboratorError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = format!("evt-{}", state.next_id);
        state.events.push(CalendarEvent {
            id: id.clone(),
            title: event.summary,
            start: event.start,
            end: Some(event.end),
        });
        Ok(id)
    }

    async fn list(&self, range: &DateRange) -> Result<Vec<CalendarEvent>, CollaboratorError> {
        let state = self.state.lock().await;
        let mut events: Vec<CalendarEvent> = state
            .events
            .iter()
            .filter(|event| {
                let day = start_date(&event.start);
                day >= range.start.as_str() && day <= range.end.as_str()
            })
            .cloned()
            .collect();
        events.sort_by(|left, right| left.start.cmp(&right.start));
        Ok(events)
    }

    async fn update(&self, id: &str, changes: EventChanges) -> Result<String, CollaboratorError> {
        let mut state = self.state.lock().await;
        let event = state
            .events
            .iter_mut()
            .find(|event| event.id == id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("event `{id}`")))?;

        if let Some(summary) = changes.summary {
            event.title = summary;
        }
        if let Some(start) = changes.start {
            event.start = start;
        }
        if let Some(end) = changes.end {
            event.end = Some(end);
        }
        Ok(event.id.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock().await;
        let before = state.events.len();
        state.events.retain(|event| event.id != id);
        if state.events.len() == before {
            return Err(CollaboratorError::NotFound(format!("event `{id}`")));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySpreadsheet {
    sheets: Mutex<Vec<String>>,
}

impl InMemorySpreadsheet {
    pub fn with_sheets<I, S>(sheets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { sheets: Mutex::new(sheets.into_iter().map(Into::into).collect()) }
    }

    pub async fn sheet_names(&self) -> Vec<String> {
        self.sheets.lock().await.clone()
    }
}

#[async_trait]
impl SpreadsheetCollaborator for InMemorySpreadsheet {
    async fn create_sheet(&self, name: &str) -> Result<(), CollaboratorError> {
        let mut sheets = self.sheets.lock().await;
        if sheets.iter().any(|sheet| sheet == name) {
            return Err(CollaboratorError::Rejected(format!("sheet `{name}` already exists")));
        }
        sheets.push(name.to_string());
        Ok(())
    }

    async fn delete_sheet(&self, name: &str) -> Result<(), CollaboratorError> {
        let mut sheets = self.sheets.lock().await;
        let before = sheets.len();
        sheets.retain(|sheet| sheet != name);
        if sheets.len() == before {
            return Err(CollaboratorError::NotFound(format!("sheet `{name}`")));
        }
        Ok(())
    }

    async fn list_sheets(&self) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.sheets.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use relay_core::domain::event::{CalendarEvent, DateRange, EventChanges, NewEvent};

    use super::{
        CalendarCollaborator, CollaboratorError, InMemoryCalendar, InMemorySpreadsheet,
        SpreadsheetCollaborator,
    };

    fn event(id: &str, title: &str, start: &str) -> CalendarEvent {
        CalendarEvent { id: id.into(), title: title.into(), start: start.into(), end: None }
    }

    #[tokio::test]
    async fn list_filters_by_start_date_inclusively_and_sorts() {
        let calendar = InMemoryCalendar::with_events(vec![
            event("evt-3", "Dinner", "2025-03-12T20:00:00"),
            event("evt-1", "Standup", "2025-03-10T09:00:00"),
            event("evt-2", "Later", "2025-03-20T09:00:00"),
        ]);

        let listed = calendar
            .list(&DateRange::new("2025-03-10", "2025-03-12"))
            .await
            .expect("list events");
        let ids: Vec<_> = listed.iter().map(|event| event.id.as_str()).collect();
        assert_eq!(ids, vec!["evt-1", "evt-3"]);
    }

    #[tokio::test]
    async fn create_update_delete_cycle() {
        let calendar = InMemoryCalendar::default();
        let id = calendar
            .create(NewEvent {
                summary: "Dentist".into(),
                start: "2025-03-11T10:00:00".into(),
                end: "2025-03-11T11:00:00".into(),
                time_zone: "America/Mexico_City".into(),
            })
            .await
            .expect("create");

        calendar
            .update(
                &id,
                EventChanges { summary: Some("Dentist (moved)".into()), ..EventChanges::default() },
            )
            .await
            .expect("update");
        assert_eq!(calendar.find(&id).await.map(|event| event.title).as_deref(), Some("Dentist (moved)"));

        calendar.delete(&id).await.expect("delete");
        assert!(matches!(calendar.delete(&id).await, Err(CollaboratorError::NotFound(_))));
    }

    #[tokio::test]
    async fn sheets_reject_duplicates() {
        let sheets = InMemorySpreadsheet::with_sheets(["Budget"]);
        assert!(matches!(
            sheets.create_sheet("Budget").await,
            Err(CollaboratorError::Rejected(_))
        ));
        sheets.create_sheet("Groceries").await.expect("create sheet");
        sheets.delete_sheet("Budget").await.expect("delete sheet");
        assert_eq!(sheets.list_sheets().await.expect("list"), vec!["Groceries".to_string()]);
    }
}
