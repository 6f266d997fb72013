//! Scripted [`ChatBackend`] for deterministic tests and offline runs.
//!
//! [`MockBackend`] answers from two sources, checked in order:
//!
//! 1. a FIFO queue of replies ([`MockBackend::with_reply`] and friends),
//!    consumed one per request;
//! 2. routes keyed on a substring of the system prompt
//!    ([`MockBackend::with_route`]), reusable and order-independent, which
//!    suits concurrent fan-out where request order is not fixed.
//!
//! Every request is recorded and can be inspected with
//! [`MockBackend::requests`].
//!
//! # Example
//!
//! ```
//! use toolflow::mock::{MockBackend, MockReply};
//! use toolflow::ToolCall;
//!
//! let backend = MockBackend::new()
//!     .with_reply(MockReply::tool_calls(vec![ToolCall::new(
//!         "call_1",
//!         "search_kb",
//!         r#"{"question":"What is the return policy?"}"#,
//!     )]))
//!     .with_reply(MockReply::text(r#"{"answer":"30 days","source":1}"#));
//! assert_eq!(backend.remaining(), 2);
//! ```

use crate::error::{Error, Result};
use crate::{ChatBackend, ChatCompletion, ChatFuture, ChatRequest, MessageRole, ToolCall};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Completion(ChatCompletion),
    Fail {
        status: Option<u16>,
        message: String,
    },
}

impl MockReply {
    /// A plain text answer.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Completion(ChatCompletion::text(content))
    }

    /// An answer whose content is `value` serialized as JSON.
    pub fn json(value: &impl Serialize) -> Self {
        let content = serde_json::to_string(value).unwrap_or_else(|_| "null".into());
        Self::text(content)
    }

    /// A response requesting the given tool calls.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self::Completion(ChatCompletion::tool_calls(calls))
    }

    /// A failed call, as if the API returned `status`.
    pub fn error(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Fail {
            status,
            message: message.into(),
        }
    }

    fn into_result(self) -> Result<ChatCompletion> {
        match self {
            Self::Completion(c) => Ok(c),
            Self::Fail { status, message } => Err(Error::Remote { status, message }),
        }
    }
}

/// A [`ChatBackend`] that replays scripted replies and records requests.
#[derive(Debug, Default)]
pub struct MockBackend {
    queue: Mutex<VecDeque<MockReply>>,
    routes: Vec<(String, MockReply)>,
    requests: Mutex<Vec<ChatRequest>>,
    latency: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply. Queued replies are used in order, one per request.
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.lock_queue().push_back(reply);
        self
    }

    pub fn with_text(self, content: impl Into<String>) -> Self {
        self.with_reply(MockReply::text(content))
    }

    pub fn with_json(self, value: &impl Serialize) -> Self {
        self.with_reply(MockReply::json(value))
    }

    pub fn with_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.with_reply(MockReply::tool_calls(calls))
    }

    /// Answer every request whose system prompt contains `needle` with
    /// `reply`. Routes apply once the queue is empty; the first matching
    /// route wins.
    pub fn with_route(mut self, needle: impl Into<String>, reply: MockReply) -> Self {
        self.routes.push((needle.into(), reply));
        self
    }

    /// Delay every reply by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// All requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Number of queued replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lock_queue().len()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<MockReply>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_reply(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        if let Some(reply) = self.lock_queue().pop_front() {
            return reply.into_result();
        }

        let system = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .filter_map(|m| m.content.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        self.routes
            .iter()
            .find(|(needle, _)| system.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone().into_result())
            .unwrap_or_else(|| Err(Error::remote("mock backend has no reply for this request")))
    }
}

impl ChatBackend for MockBackend {
    fn chat<'a>(&'a self, request: &'a ChatRequest) -> ChatFuture<'a> {
        Box::pin(async move {
            self.requests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(request.clone());
            debug!(
                "Mock request #{}: {} message(s)",
                self.request_count(),
                request.messages.len()
            );

            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            self.next_reply(request)
        })
    }
}
