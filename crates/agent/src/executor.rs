use std::sync::Arc;

use tracing::{info, warn};

use relay_core::domain::event::{CalendarEvent, DateRange, EventChanges, NewEvent};
use relay_core::domain::time::add_minutes;

use crate::tools::{CalendarCollaborator, CollaboratorError, SpreadsheetCollaborator};

/// An action with every argument it needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedAction {
    CreateEvent { summary: String, start: String, end: Option<String> },
    ListEvents { range: DateRange },
    UpdateEvent { id: String, changes: EventChanges },
    DeleteEvent { id: String },
    CreateSheet { name: String },
    DeleteSheet { name: String },
    ListSheets,
}

impl ResolvedAction {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::CreateEvent { .. } => "create the event",
            Self::ListEvents { .. } => "list your events",
            Self::UpdateEvent { .. } => "update the event",
            Self::DeleteEvent { .. } => "delete the event",
            Self::CreateSheet { .. } => "create the sheet",
            Self::DeleteSheet { .. } => "delete the sheet",
            Self::ListSheets => "list your sheets",
        }
    }

    fn event_name(&self) -> &'static str {
        match self {
            Self::CreateEvent { .. } => "calendar.create",
            Self::ListEvents { .. } => "calendar.list",
            Self::UpdateEvent { .. } => "calendar.update",
            Self::DeleteEvent { .. } => "calendar.delete",
            Self::CreateSheet { .. } => "sheets.create",
            Self::DeleteSheet { .. } => "sheets.delete",
            Self::ListSheets => "sheets.list",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionOutcome {
    pub message: String,
    pub succeeded: bool,
}

impl ActionOutcome {
    fn success(message: String) -> Self {
        Self { message, succeeded: true }
    }

    fn failure(message: String) -> Self {
        Self { message, succeeded: false }
    }
}

/// Fixed reply for a collaborator failure on `operation`.
pub fn failure_message(operation: &str) -> String {
    format!("Sorry, I couldn't {operation} right now. Please try again later.")
}

pub fn format_event_line(event: &CalendarEvent) -> String {
    format!("{} - {} (id: {})", event.start, event.title, event.id)
}

pub fn no_events_message(range: &DateRange) -> String {
    format!("no events found between {} and {}", range.start, range.end)
}

#[derive(Clone)]
pub struct ActionExecutor {
    calendar: Arc<dyn CalendarCollaborator>,
    sheets: Arc<dyn SpreadsheetCollaborator>,
    time_zone: String,
    default_event_minutes: u32,
}

impl ActionExecutor {
    pub fn new(
        calendar: Arc<dyn CalendarCollaborator>,
        sheets: Arc<dyn SpreadsheetCollaborator>,
        time_zone: impl Into<String>,
        default_event_minutes: u32,
    ) -> Self {
        Self { calendar, sheets, time_zone: time_zone.into(), default_event_minutes }
    }

    /// Never fails: collaborator errors become [`failure_message`].
    pub async fn execute(&self, action: ResolvedAction, conversation_id: &str) -> ActionOutcome {
        let operation = action.operation();
        let event_name = action.event_name();

        match self.dispatch(action).await {
            Ok(message) => {
                info!(
                    event_name = "agent.executor.action_completed",
                    conversation_id,
                    action = event_name,
                    "collaborator action completed"
                );
                ActionOutcome::success(message)
            }
            Err(error) => {
                warn!(
                    event_name = "agent.executor.collaborator_failed",
                    conversation_id,
                    action = event_name,
                    error = %error,
                    "collaborator action failed"
                );
                ActionOutcome::failure(failure_message(operation))
            }
        }
    }

    /// Events in `range`, for the disambiguation candidate list.
    pub async fn upcoming(&self, range: &DateRange) -> Result<Vec<CalendarEvent>, CollaboratorError> {
        self.calendar.list(range).await
    }

    fn end_for(&self, start: &str) -> Option<String> {
        add_minutes(start, i64::from(self.default_event_minutes))
    }

    async fn dispatch(&self, action: ResolvedAction) -> Result<String, CollaboratorError> {
        match action {
            ResolvedAction::CreateEvent { summary, start, end } => {
                let end = match end.or_else(|| self.end_for(&start)) {
                    Some(end) => end,
                    None => {
                        return Err(CollaboratorError::Rejected(format!(
                            "start `{start}` is not a date-time"
                        )))
                    }
                };
                let id = self
                    .calendar
                    .create(NewEvent {
                        summary: summary.clone(),
                        start: start.clone(),
                        end: end.clone(),
                        time_zone: self.time_zone.clone(),
                    })
                    .await?;
                Ok(format!("Event created: {summary}, {start} to {end} (id: {id})"))
            }
            ResolvedAction::ListEvents { range } => {
                let events = self.calendar.list(&range).await?;
                if events.is_empty() {
                    return Ok(no_events_message(&range));
                }
                Ok(events.iter().map(format_event_line).collect::<Vec<_>>().join("\n"))
            }
            ResolvedAction::UpdateEvent { id, mut changes } => {
                if changes.end.is_none() {
                    changes.end = changes.start.as_deref().and_then(|start| self.end_for(start));
                }
                changes.time_zone = Some(self.time_zone.clone());
                let id = self.calendar.update(&id, changes).await?;
                Ok(format!("Event updated (id: {id})."))
            }
            ResolvedAction::DeleteEvent { id } => {
                self.calendar.delete(&id).await?;
                Ok(format!("Event deleted (id: {id})."))
            }
            ResolvedAction::CreateSheet { name } => {
                self.sheets.create_sheet(&name).await?;
                Ok(format!("Sheet created: {name}"))
            }
            ResolvedAction::DeleteSheet { name } => {
                self.sheets.delete_sheet(&name).await?;
                Ok(format!("Sheet deleted: {name}"))
            }
            ResolvedAction::ListSheets => {
                let sheets = self.sheets.list_sheets().await?;
                if sheets.is_empty() {
                    return Ok("no sheets found".to_string());
                }
                Ok(sheets.iter().map(|name| format!("- {name}")).collect::<Vec<_>>().join("\n"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use relay_core::domain::event::{CalendarEvent, DateRange, EventChanges, NewEvent};

    use super::{failure_message, ActionExecutor, ResolvedAction};
    use crate::tools::{
        CalendarCollaborator, CollaboratorError, InMemoryCalendar, InMemorySpreadsheet,
    };

    struct BrokenCalendar;

    #[async_trait]
    impl CalendarCollaborator for BrokenCalendar {
        async fn create(&self, _event: NewEvent) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::Unavailable("calendar api returned 500".into()))
        }

        async fn list(&self, _range: &DateRange) -> Result<Vec<CalendarEvent>, CollaboratorError> {
            Err(CollaboratorError::Unavailable("calendar api returned 500".into()))
        }

        async fn update(
            &self,
            _id: &str,
            _changes: EventChanges,
        ) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::Unavailable("calendar api returned 500".into()))
        }

        async fn delete(&self, _id: &str) -> Result<(), CollaboratorError> {
            Err(CollaboratorError::Unavailable("calendar api returned 500".into()))
        }
    }

    fn executor(calendar: Arc<dyn CalendarCollaborator>) -> ActionExecutor {
        sheet_executor(calendar, Arc::new(InMemorySpreadsheet::default()))
    }

    fn sheet_executor(
        calendar: Arc<dyn CalendarCollaborator>,
        sheets: Arc<InMemorySpreadsheet>,
    ) -> ActionExecutor {
        ActionExecutor::new(calendar, sheets, "America/Mexico_City", 60)
    }

    fn event(id: &str, title: &str, start: &str) -> CalendarEvent {
        CalendarEvent { id: id.into(), title: title.into(), start: start.into(), end: None }
    }

    #[tokio::test]
    async fn list_formats_one_line_per_event_in_collaborator_order() {
        let calendar = Arc::new(InMemoryCalendar::with_events(vec![
            event("evt-1", "Standup", "2025-03-10T09:00:00"),
            event("evt-2", "Dentist", "2025-03-10T11:30:00"),
        ]));

        let outcome = executor(calendar)
            .execute(
                ResolvedAction::ListEvents { range: DateRange::single_day("2025-03-10") },
                "c-1",
            )
            .await;

        assert!(outcome.succeeded);
        assert_eq!(
            outcome.message,
            "2025-03-10T09:00:00 - Standup (id: evt-1)\n2025-03-10T11:30:00 - Dentist (id: evt-2)"
        );
    }

    #[tokio::test]
    async fn empty_list_echoes_the_bounds() {
        let outcome = executor(Arc::new(InMemoryCalendar::default()))
            .execute(
                ResolvedAction::ListEvents { range: DateRange::single_day("2025-03-10") },
                "c-1",
            )
            .await;

        assert_eq!(outcome.message, "no events found between 2025-03-10 and 2025-03-10");
    }

    #[tokio::test]
    async fn create_defaults_end_and_stamps_zone() {
        let calendar = Arc::new(InMemoryCalendar::default());
        let outcome = executor(calendar.clone())
            .execute(
                ResolvedAction::CreateEvent {
                    summary: "Dentist".into(),
                    start: "2025-03-11T10:00:00".into(),
                    end: None,
                },
                "c-1",
            )
            .await;

        assert!(outcome.succeeded);
        let events = calendar.events().await;
        assert_eq!(events[0].end.as_deref(), Some("2025-03-11T11:00:00"));
        assert!(outcome.message.contains("Dentist"));
    }

    #[tokio::test]
    async fn collaborator_failure_becomes_fixed_message() {
        let outcome = executor(Arc::new(BrokenCalendar))
            .execute(
                ResolvedAction::CreateEvent {
                    summary: "Dentist".into(),
                    start: "2025-03-11T10:00:00".into(),
                    end: None,
                },
                "c-1",
            )
            .await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.message, failure_message("create the event"));
    }

    #[tokio::test]
    async fn update_fills_end_from_new_start() {
        let calendar = Arc::new(InMemoryCalendar::with_events(vec![event(
            "evt-1",
            "Standup",
            "2025-03-10T09:00:00",
        )]));

        let outcome = executor(calendar.clone())
            .execute(
                ResolvedAction::UpdateEvent {
                    id: "evt-1".into(),
                    changes: EventChanges {
                        start: Some("2025-03-10T15:00:00".into()),
                        ..EventChanges::default()
                    },
                },
                "c-1",
            )
            .await;

        assert_eq!(outcome.message, "Event updated (id: evt-1).");
        let updated = calendar.find("evt-1").await.expect("event still exists");
        assert_eq!(updated.end.as_deref(), Some("2025-03-10T16:00:00"));
    }

    #[tokio::test]
    async fn unknown_event_delete_is_reported_as_failure() {
        let outcome = executor(Arc::new(InMemoryCalendar::default()))
            .execute(ResolvedAction::DeleteEvent { id: "evt-404".into() }, "c-1")
            .await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.message, failure_message("delete the event"));
    }

    #[tokio::test]
    async fn sheets_are_created_listed_and_deleted() {
        let sheets = Arc::new(InMemorySpreadsheet::default());
        let executor = sheet_executor(Arc::new(InMemoryCalendar::default()), sheets.clone());

        let created = executor
            .execute(ResolvedAction::CreateSheet { name: "Budget".into() }, "c-1")
            .await;
        assert!(created.succeeded);
        assert_eq!(created.message, "Sheet created: Budget");

        executor.execute(ResolvedAction::CreateSheet { name: "Trips".into() }, "c-1").await;
        let listed = executor.execute(ResolvedAction::ListSheets, "c-1").await;
        assert_eq!(listed.message, "- Budget\n- Trips");

        let deleted = executor
            .execute(ResolvedAction::DeleteSheet { name: "Budget".into() }, "c-1")
            .await;
        assert_eq!(deleted.message, "Sheet deleted: Budget");
        assert_eq!(sheets.sheet_names().await, vec!["Trips".to_string()]);
    }

    #[tokio::test]
    async fn empty_spreadsheet_lists_no_sheets() {
        let outcome = executor(Arc::new(InMemoryCalendar::default()))
            .execute(ResolvedAction::ListSheets, "c-1")
            .await;

        assert!(outcome.succeeded);
        assert_eq!(outcome.message, "no sheets found");
    }

    #[tokio::test]
    async fn missing_sheet_delete_is_reported_as_failure() {
        let sheets = Arc::new(InMemorySpreadsheet::with_sheets(["Budget"]));
        let outcome = sheet_executor(Arc::new(InMemoryCalendar::default()), sheets.clone())
            .execute(ResolvedAction::DeleteSheet { name: "Trips".into() }, "c-1")
            .await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.message, failure_message("delete the sheet"));
        assert_eq!(sheets.sheet_names().await, vec!["Budget".to_string()]);
    }
}
