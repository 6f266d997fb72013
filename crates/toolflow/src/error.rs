//! Error kinds surfaced by the client, the tool loop, and the workflows.
//!
//! Nothing in this crate retries or swallows an error: every failure
//! propagates to the immediate caller as one of the [`Error`] variants.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or unusable configuration (e.g. no API key in the environment).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network failure, non-2xx status, or an `error` body from the API.
    #[error("remote call failed{}: {message}", status_suffix(.status))]
    Remote {
        status: Option<u16>,
        message: String,
    },

    /// The model asked for a tool that the toolbox does not declare.
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// Tool-call arguments were not valid JSON or violated the tool's schema.
    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// A local tool function failed.
    #[error("tool '{tool}' failed: {reason}")]
    ToolExecution { tool: String, reason: String },

    /// The model's final answer does not match the requested schema.
    #[error("response does not match schema '{schema}': {reason}")]
    SchemaValidation { schema: String, reason: String },

    /// The static knowledge store could not be read or parsed.
    #[error("knowledge base error: {0}")]
    Knowledge(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            status: None,
            message: message.into(),
        }
    }

    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn tool_execution(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn schema_validation(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaValidation {
            schema: schema.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Remote {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_display_includes_status_when_known() {
        let err = Error::Remote {
            status: Some(401),
            message: "invalid api key".into(),
        };
        assert_eq!(
            err.to_string(),
            "remote call failed (HTTP 401): invalid api key"
        );
        assert_eq!(
            Error::remote("connection reset").to_string(),
            "remote call failed: connection reset"
        );
    }

    #[test]
    fn tool_errors_name_the_tool() {
        let err = Error::invalid_arguments("get_weather", "missing field `latitude`");
        assert!(err.to_string().contains("'get_weather'"));
        assert!(err.to_string().contains("latitude"));

        let err = Error::UnknownTool("launch_rockets".into());
        assert_eq!(err.to_string(), "unknown tool 'launch_rockets'");
    }
}
