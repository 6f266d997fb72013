//! Schema-validated structured answers.
//!
//! A type implementing [`StructuredOutput`] names a JSON Schema (derived with
//! `schemars`) that the model's answer must follow. The schema is requested
//! through the response format ([`OutputMode`]) and checked again on receipt:
//! [`parse_structured`] validates the payload against the schema before
//! deserializing it, so a non-conforming answer is always an
//! [`Error::SchemaValidation`], never a success.
//!
//! ```
//! use toolflow::structured::{StructuredOutput, parse_structured};
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize, JsonSchema)]
//! struct CalendarEvent {
//!     name: String,
//!     date: String,
//!     participants: Vec<String>,
//! }
//!
//! impl StructuredOutput for CalendarEvent {}
//!
//! let event: CalendarEvent = parse_structured(Some(
//!     r#"{"name":"Science fair","date":"Friday","participants":["Alice","Bob"]}"#,
//! ))
//! .unwrap();
//! assert_eq!(event.participants.len(), 2);
//!
//! assert!(parse_structured::<CalendarEvent>(Some(r#"{"name":"x"}"#)).is_err());
//! ```

use crate::agent::LoopConfig;
use crate::error::{Error, Result};
use crate::{ChatBackend, ChatRequest, Message, ResponseFormat, json_schema_for};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// A record type the model's final answer must conform to.
///
/// Both methods have defaults derived from the `JsonSchema` impl; an empty
/// `impl StructuredOutput for MyType {}` is the usual form.
pub trait StructuredOutput: DeserializeOwned + JsonSchema + Send {
    /// Name sent with the schema. Defaults to the schemars type name.
    fn output_name() -> String {
        <Self as JsonSchema>::schema_name()
    }

    /// The schema the answer is requested with and validated against.
    fn output_schema() -> serde_json::Value {
        json_schema_for::<Self>()
    }
}

/// How a target schema is communicated to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// `response_format: {"type": "json_schema", ...}` carrying the schema.
    JsonSchema { strict: bool },
    /// `response_format: {"type": "json_object"}` plus a system instruction
    /// containing the schema, for models without schema support.
    JsonObject,
}

impl Default for OutputMode {
    fn default() -> Self {
        Self::JsonSchema { strict: false }
    }
}

impl OutputMode {
    /// Attach the schema of `T` to `request`.
    pub fn apply<T: StructuredOutput>(&self, request: &mut ChatRequest) {
        match *self {
            Self::JsonSchema { strict } => {
                request.response_format = Some(ResponseFormat::json_schema(
                    T::output_name(),
                    T::output_schema(),
                    strict,
                ));
            }
            Self::JsonObject => {
                request.response_format = Some(ResponseFormat::json_object());
                request.messages.push(Message::system(format!(
                    "Respond only with a JSON object that conforms to this JSON schema:\n{}",
                    T::output_schema()
                )));
            }
        }
    }
}

/// Validate and deserialize a model answer into `T`.
///
/// Missing or blank content, malformed JSON, schema violations and type
/// mismatches are all [`Error::SchemaValidation`]. A single surrounding
/// markdown code fence is tolerated.
pub fn parse_structured<T: StructuredOutput>(content: Option<&str>) -> Result<T> {
    let name = T::output_name();
    let raw = content
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::schema_validation(&name, "response has no content"))?;

    let value: serde_json::Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| Error::schema_validation(&name, format!("response is not valid JSON: {e}")))?;

    let schema = T::output_schema();
    match jsonschema::validator_for(&schema) {
        Ok(validator) => {
            let errors: Vec<String> = validator
                .iter_errors(&value)
                .map(|e| {
                    let path = e.instance_path().to_string();
                    format!("{}: {e}", if path.is_empty() { "/" } else { path.as_str() })
                })
                .collect();
            if !errors.is_empty() {
                return Err(Error::schema_validation(&name, errors.join("; ")));
            }
        }
        Err(e) => warn!("Schema '{name}' does not compile, relying on typed parsing: {e}"),
    }

    serde_json::from_value(value).map_err(|e| Error::schema_validation(&name, e.to_string()))
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(body) = raw.strip_prefix("```") else {
        return raw;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// One structured call: send `system` + `user` with the schema of `T` and
/// return the validated answer. No tools are declared.
pub async fn extract<T, B>(backend: &B, config: &LoopConfig, system: &str, user: &str) -> Result<T>
where
    T: StructuredOutput,
    B: ChatBackend + ?Sized,
{
    let mut request = config.request(vec![Message::system(system), Message::user(user)]);
    config.output_mode.apply::<T>(&mut request);

    debug!("Structured call for '{}'", T::output_name());
    let completion = backend.chat(&request).await?;

    if completion.has_tool_calls() {
        return Err(Error::schema_validation(
            T::output_name(),
            "model returned tool calls instead of an answer",
        ));
    }
    parse_structured(completion.content.as_deref())
}
