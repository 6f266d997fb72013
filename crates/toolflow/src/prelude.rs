//! Convenience re-exports for common `toolflow` types.
//!
//! ```ignore
//! use toolflow::prelude::*;
//! ```
//!
//! Pulls in the client and its config, [`Message`] constructors, the
//! [`ToolLoop`] with its config and event handlers, the [`Toolbox`] trait,
//! structured-output helpers and the fan-out functions. Workflow-specific
//! types live in [`crate::workflows`].

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    ChatBackend, ChatClient, ChatCompletion, ChatRequest, ClientConfig, Error, Message, Result,
    ToolCall, ToolChoice, ToolDef, json_schema_for,
};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    Answer, EventHandler, FnEventHandler, LoggingHandler, LoopConfig, LoopEvent, LoopOutcome,
    NoopHandler, ToolLoop, fan_out, fan_out2,
};

// ── Tools and structured output ─────────────────────────────────────
pub use crate::structured::{OutputMode, StructuredOutput, extract, parse_structured};
pub use crate::tools::{ToolFuture, Toolbox, parse_arguments};
