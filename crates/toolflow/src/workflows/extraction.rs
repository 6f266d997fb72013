//! Structured extraction of a calendar event from free text.

use crate::agent::LoopConfig;
use crate::error::Result;
use crate::structured::{StructuredOutput, extract};
use crate::ChatBackend;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const SYSTEM_PROMPT: &str = "Extract the event information.";
pub const DEFAULT_PROMPT: &str = "Alice and Bob are going to a science fair on Friday.";

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub name: String,
    pub date: String,
    pub participants: Vec<String>,
}

impl StructuredOutput for CalendarEvent {}

/// Extract a [`CalendarEvent`] from `text`.
pub async fn extract_event<B: ChatBackend + ?Sized>(
    backend: &B,
    config: &LoopConfig,
    text: &str,
) -> Result<CalendarEvent> {
    extract(backend, config, SYSTEM_PROMPT, text).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mock::MockBackend;

    #[tokio::test]
    async fn extracts_event() {
        let backend = MockBackend::new().with_json(&serde_json::json!({
            "name": "Science Fair",
            "date": "Friday",
            "participants": ["Alice", "Bob"]
        }));
        let event = extract_event(&backend, &LoopConfig::default(), DEFAULT_PROMPT)
            .await
            .unwrap();
        assert_eq!(event.participants, vec!["Alice", "Bob"]);

        let format = backend.requests()[0].response_format.clone().unwrap();
        assert_eq!(format.json_schema.unwrap().name, "CalendarEvent");
    }

    #[tokio::test]
    async fn participants_must_be_a_list() {
        let backend = MockBackend::new().with_json(&serde_json::json!({
            "name": "Science Fair",
            "date": "Friday",
            "participants": "Alice and Bob"
        }));
        let err = extract_event(&backend, &LoopConfig::default(), DEFAULT_PROMPT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SchemaValidation { .. }));
    }
}
