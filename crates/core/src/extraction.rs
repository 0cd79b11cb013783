//! Structured payload extraction from oracle output.
//!
//! Oracle replies are expected to contain one JSON object, usually surrounded
//! by prose or code fences. Extraction takes the span between the first `{`
//! and the last `}`, parses it, normalizes it, and checks the schema's
//! required fields. Any failure yields the caller's fallback record; this
//! module never returns an error.

use serde::de::DeserializeOwned;

/// A schema that can be extracted from oracle text.
pub trait Payload: DeserializeOwned {
    /// Canonicalizes parsed fields (trimming, timestamp formats).
    fn normalize(self) -> Self {
        self
    }

    /// Whether the normalized record carries the fields the call site needs.
    fn is_complete(&self) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractionFailure {
    NoObject,
    InvalidJson,
    Incomplete,
}

impl ExtractionFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoObject => "no_object",
            Self::InvalidJson => "invalid_json",
            Self::Incomplete => "incomplete",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction<T> {
    pub value: T,
    pub well_formed: bool,
    pub failure: Option<ExtractionFailure>,
}

impl<T> Extraction<T> {
    fn parsed(value: T) -> Self {
        Self { value, well_formed: true, failure: None }
    }

    fn fallback(value: T, failure: ExtractionFailure) -> Self {
        Self { value, well_formed: false, failure: Some(failure) }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Returns the outermost `{ ... }` span of `text`, if any.
pub fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn extract<T>(text: &str, fallback: impl FnOnce() -> T) -> Extraction<T>
where
    T: Payload,
{
    let Some(span) = object_span(text) else {
        return Extraction::fallback(fallback(), ExtractionFailure::NoObject);
    };

    let parsed = match serde_json::from_str::<T>(span) {
        Ok(parsed) => parsed.normalize(),
        Err(_) => return Extraction::fallback(fallback(), ExtractionFailure::InvalidJson),
    };

    if !parsed.is_complete() {
        return Extraction::fallback(fallback(), ExtractionFailure::Incomplete);
    }

    Extraction::parsed(parsed)
}

#[cfg(test)]
mod tests {
    use super::{extract, object_span, ExtractionFailure};
    use crate::domain::event::DateRange;
    use crate::domain::intent::{
        CalendarAction, CalendarIntent, ChangesPayload, EventChoice, SheetAction, SheetIntent,
    };

    fn today() -> DateRange {
        DateRange::single_day("2025-03-10")
    }

    #[test]
    fn span_covers_outermost_braces() {
        let text = "Sure! {\"a\": {\"b\": 1}} hope that helps }";
        assert_eq!(object_span(text), Some("{\"a\": {\"b\": 1}} hope that helps }"));
        assert_eq!(object_span("no braces here"), None);
        assert_eq!(object_span("} backwards {"), None);
    }

    #[test]
    fn surrounding_prose_does_not_change_the_record() {
        let bare = r#"{"action":"create","summary":"Dentist","start":"2025-03-11T09:00:00"}"#;
        let wrapped = format!("Here is the JSON you asked for:\n```json\n{bare}\n```\nAnything else?");

        let from_bare = extract(bare, CalendarIntent::other);
        let from_wrapped = extract(&wrapped, CalendarIntent::other);

        assert!(from_bare.well_formed);
        assert_eq!(from_bare, from_wrapped);
        assert_eq!(from_wrapped.value.action, CalendarAction::Create);
        assert_eq!(from_wrapped.value.summary.as_deref(), Some("Dentist"));
    }

    #[test]
    fn unparsable_text_yields_schema_defaults() {
        for text in ["", crate::errors::APOLOGY_MESSAGE, "{not json}", "{"] {
            let action = extract(text, CalendarIntent::other);
            assert!(!action.well_formed, "`{text}` should not be well formed");
            assert_eq!(action.value, CalendarIntent::other());

            let range = extract(text, today);
            assert!(!range.well_formed);
            assert_eq!(range.value, today());

            let sheet = extract(text, SheetIntent::other);
            assert_eq!(sheet.value.action, SheetAction::Other);
        }
    }

    #[test]
    fn missing_required_keys_fall_back() {
        let action = extract(r#"{"summary":"Dentist"}"#, CalendarIntent::other);
        assert_eq!(action.failure, Some(ExtractionFailure::InvalidJson));
        assert_eq!(action.value.action, CalendarAction::Other);

        let range = extract(r#"{"start":"2025-03-12"}"#, today);
        assert_eq!(range.value, today());

        let range = extract(r#"{"start":"soon","end":"later"}"#, today);
        assert_eq!(range.failure, Some(ExtractionFailure::Incomplete));
        assert_eq!(range.value, today());
    }

    #[test]
    fn timestamps_are_normalized() {
        let intent = extract(
            r#"{"action":"list","range_start":"2025-03-10T00:00:00","range_end":"2025-03-12"}"#,
            CalendarIntent::other,
        );
        assert_eq!(intent.value.range_start.as_deref(), Some("2025-03-10"));
        assert_eq!(intent.value.range_end.as_deref(), Some("2025-03-12"));

        let changes = extract(r#"{"start":"2025-03-10 15:30"}"#, ChangesPayload::default);
        assert!(changes.well_formed);
        assert_eq!(changes.value.start.as_deref(), Some("2025-03-10T15:30:00"));
    }

    #[test]
    fn empty_choice_is_incomplete() {
        let choice = extract(r#"{"chosen_event_id": null}"#, EventChoice::default);
        assert!(!choice.well_formed);
        assert_eq!(choice.failure, Some(ExtractionFailure::Incomplete));

        let choice = extract(r#"{"chosen_event_id": "evt-2"}"#, EventChoice::default);
        assert_eq!(choice.value.chosen_event_id.as_deref(), Some("evt-2"));
    }
}
