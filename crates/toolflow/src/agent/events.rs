//! Events and handlers for the [`ToolLoop`](super::tool_loop::ToolLoop).
//!
//! The loop reports progress through [`LoopEvent`] variants. Callers
//! implement [`EventHandler`] to observe them for logging, progress output,
//! or test assertions.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |

use tracing::{debug, info};

/// Which request of the loop an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The first request, carrying the tool declarations.
    Initial,
    /// The request carrying the tool results.
    FollowUp,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Initial => write!(f, "initial"),
            Phase::FollowUp => write!(f, "follow-up"),
        }
    }
}

/// Events emitted by the loop during a run.
#[derive(Debug)]
pub enum LoopEvent<'a> {
    /// A request is about to be sent.
    RequestSent { phase: Phase, messages: usize },
    /// The model requested tool calls.
    ToolCallsReceived { count: usize },
    /// A single tool is about to be executed.
    ToolExecuting { name: &'a str, arguments: &'a str },
    /// A single tool finished executing.
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a str,
    },
    /// Token usage reported by the API for one request.
    TokenUsage {
        phase: Phase,
        prompt_tokens: u32,
        completion_tokens: u32,
    },
    /// The loop produced its answer. `direct` is true when the model
    /// answered without calling any tool.
    Answered { direct: bool },
}

/// Handler for loop events. The default implementation ignores everything.
///
/// # Example
///
/// ```ignore
/// struct Progress;
///
/// impl EventHandler for Progress {
///     fn on_event(&self, event: &LoopEvent<'_>) {
///         if let LoopEvent::ToolExecuting { name, .. } = event {
///             eprintln!("calling {name}...");
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &LoopEvent<'_>) {
        let _ = event;
    }
}

/// A no-op event handler.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let LoopEvent::ToolResult { name, result, .. } = event {
///         println!("{name} -> {result}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&LoopEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&LoopEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&LoopEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &LoopEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &LoopEvent<'_>) {
        match event {
            LoopEvent::RequestSent { phase, messages } => {
                debug!("Sending {phase} request ({messages} message(s))");
            }
            LoopEvent::ToolCallsReceived { count } => {
                info!("Model requested {count} tool call(s)");
            }
            LoopEvent::ToolExecuting { name, .. } => {
                debug!("Executing tool: {name}");
            }
            LoopEvent::ToolResult { name, result, .. } => {
                debug!("Tool {name} result: {} bytes", result.len());
            }
            LoopEvent::TokenUsage {
                phase,
                prompt_tokens,
                completion_tokens,
            } => {
                debug!("Tokens ({phase}): prompt={prompt_tokens}, completion={completion_tokens}");
            }
            LoopEvent::Answered { direct: true } => {
                info!("Model answered without calling a tool");
            }
            LoopEvent::Answered { direct: false } => {
                info!("Final answer received");
            }
        }
    }
}
