pub mod config;
pub mod domain;
pub mod errors;
pub mod extraction;
pub mod flows;

pub use domain::event::{CalendarEvent, DateRange, EventChanges, EventSummary, NewEvent};
pub use domain::intent::{
    CalendarAction, CalendarIntent, ChangesPayload, EventChoice, SheetAction, SheetIntent,
};
pub use domain::session::{ConversationId, DialogueState, Role, Session, Style, Turn};
pub use errors::{ApplicationError, DomainError, InterfaceError, APOLOGY_MESSAGE};
pub use extraction::{extract, Extraction, ExtractionFailure, Payload};
pub use flows::{DialogueAction, DialogueEngine, DialogueEvent, DialoguePolicy, TransitionOutcome};
