//! The tool-calling request loop.
//!
//! [`ToolLoop`] turns a system prompt and a user message into an answer,
//! running at most one round of tool invocation:
//!
//! 1. Send the messages with the toolbox's declarations (`tool_choice`
//!    from [`LoopConfig`], `auto` by default).
//! 2. If the model answers without calling a tool, stop and return
//!    [`Answer::Direct`]. No tool runs.
//! 3. Otherwise resolve **every** requested call through
//!    [`Toolbox::resolve`] before executing any of them, then execute them
//!    one at a time in the order the model returned them. The first failure
//!    aborts the run; no partial results are sent.
//! 4. Append one tool-result message per call and send the follow-up
//!    request (`tool_choice: none`), asking for the target schema when one
//!    is given. The validated answer is returned as [`Answer::Final`].

use super::config::LoopConfig;
use super::events::{EventHandler, LoopEvent, NoopHandler, Phase};
use crate::error::{Error, Result};
use crate::structured::{StructuredOutput, parse_structured};
use crate::tools::{Toolbox, encode_result, log_tool_call};
use crate::{ChatBackend, ChatCompletion, ChatRequest, Message, ToolChoice};
use tracing::{debug, info};

/// What a loop run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer<T> {
    /// The model answered the initial request without calling a tool.
    Direct(String),
    /// The validated answer to the follow-up request.
    Final(T),
}

impl<T> Answer<T> {
    pub fn is_direct(&self) -> bool {
        matches!(self, Answer::Direct(_))
    }

    /// The follow-up answer, if tools were called.
    pub fn into_final(self) -> Option<T> {
        match self {
            Answer::Final(v) => Some(v),
            Answer::Direct(_) => None,
        }
    }
}

/// The answer plus the full transcript and accounting for one run.
#[derive(Debug, Clone)]
pub struct LoopOutcome<T> {
    pub answer: Answer<T>,
    /// Every message of the conversation, including the initial ones, the
    /// assistant tool-call turn, the tool results and the final answer.
    pub messages: Vec<Message>,
    /// Number of tools executed.
    pub tools_executed: usize,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// The tool-calling loop.
///
/// Borrows the backend, toolbox and event handler; bind them to `let`
/// bindings before building the loop.
///
/// ```ignore
/// let client = ChatClient::from_env()?;
/// let toolbox = KnowledgeToolbox::new("data/kb.json");
/// let answer = ToolLoop::new(&client, &toolbox, LoopConfig::new(client.model()))
///     .with_event_handler(&LoggingHandler)
///     .run_structured::<KbResponse>(SYSTEM_PROMPT, "What is the return policy?")
///     .await?;
/// ```
pub struct ToolLoop<'a, B: ChatBackend + ?Sized, X: Toolbox> {
    backend: &'a B,
    toolbox: &'a X,
    config: LoopConfig,
    event_handler: &'a dyn EventHandler,
}

impl<'a, B: ChatBackend + ?Sized, X: Toolbox> ToolLoop<'a, B, X> {
    pub fn new(backend: &'a B, toolbox: &'a X, config: LoopConfig) -> Self {
        Self {
            backend,
            toolbox,
            config,
            event_handler: &NoopHandler,
        }
    }

    /// Attach an event handler.
    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    /// Run with a free-text final answer.
    pub async fn run(self, system: &str, user: &str) -> Result<Answer<String>> {
        let messages = vec![Message::system(system), Message::user(user)];
        Ok(self.run_messages(messages).await?.answer)
    }

    /// Run with a final answer validated against `T`'s schema.
    pub async fn run_structured<T: StructuredOutput>(
        self,
        system: &str,
        user: &str,
    ) -> Result<Answer<T>> {
        let messages = vec![Message::system(system), Message::user(user)];
        Ok(self.run_messages_structured::<T>(messages).await?.answer)
    }

    /// Run over an explicit message list with a free-text final answer.
    pub async fn run_messages(self, messages: Vec<Message>) -> Result<LoopOutcome<String>> {
        self.drive(messages, |_| {}, |completion| {
            if completion.has_tool_calls() {
                return Err(Error::remote(
                    "empty response: follow-up requested more tool calls",
                ));
            }
            completion
                .content
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| Error::remote("empty response: follow-up returned no content"))
        })
        .await
    }

    /// Run over an explicit message list with a final answer validated
    /// against `T`'s schema.
    pub async fn run_messages_structured<T: StructuredOutput>(
        self,
        messages: Vec<Message>,
    ) -> Result<LoopOutcome<T>> {
        let mode = self.config.output_mode;
        self.drive(
            messages,
            |request| mode.apply::<T>(request),
            |completion| {
                if completion.has_tool_calls() {
                    return Err(Error::schema_validation(
                        T::output_name(),
                        "follow-up requested more tool calls instead of an answer",
                    ));
                }
                parse_structured::<T>(completion.content.as_deref())
            },
        )
        .await
    }

    async fn drive<T>(
        self,
        mut messages: Vec<Message>,
        prepare_follow_up: impl FnOnce(&mut ChatRequest),
        finish: impl FnOnce(ChatCompletion) -> Result<T>,
    ) -> Result<LoopOutcome<T>> {
        let definitions = self.toolbox.definitions();
        let mut prompt_tokens = 0u32;
        let mut completion_tokens = 0u32;

        info!(
            "Tool loop started: model={}, tools={}",
            self.config.model,
            definitions.len()
        );

        // ── Initial request ──
        let mut request = self.config.request(messages.clone());
        if !definitions.is_empty() {
            request.tools = Some(definitions.clone());
            request.tool_choice = Some(self.config.tool_choice);
        }
        let completion = self.send(Phase::Initial, &request).await?;
        self.record_usage(Phase::Initial, &completion, &mut prompt_tokens, &mut completion_tokens);

        if !completion.has_tool_calls() {
            let text = completion
                .content
                .ok_or_else(|| Error::remote("empty response: no content and no tool calls"))?;
            messages.push(Message::assistant_text(text.clone()));
            self.event_handler
                .on_event(&LoopEvent::Answered { direct: true });
            return Ok(LoopOutcome {
                answer: Answer::Direct(text),
                messages,
                tools_executed: 0,
                prompt_tokens,
                completion_tokens,
            });
        }

        let calls = completion.tool_calls;
        self.event_handler
            .on_event(&LoopEvent::ToolCallsReceived { count: calls.len() });

        // ── Resolve everything before running anything ──
        let mut resolved = Vec::with_capacity(calls.len());
        for call in &calls {
            log_tool_call(&call.function.name, &call.function.arguments);
            let typed = self
                .toolbox
                .resolve(&call.function.name, &call.function.arguments)?;
            resolved.push((call, typed));
        }

        // ── Execute in model order, fail fast ──
        let mut results = Vec::with_capacity(resolved.len());
        for (call, typed) in resolved {
            self.event_handler.on_event(&LoopEvent::ToolExecuting {
                name: &call.function.name,
                arguments: &call.function.arguments,
            });
            let value = self.toolbox.invoke(typed).await?;
            let encoded = encode_result(&value);
            self.event_handler.on_event(&LoopEvent::ToolResult {
                name: &call.function.name,
                call_id: &call.id,
                result: &encoded,
            });
            results.push(Message::tool_result(call.id.clone(), encoded));
        }
        let tools_executed = results.len();

        messages.push(Message::assistant_tool_calls(completion.content, calls));
        messages.extend(results);

        // ── Follow-up request ──
        let mut request = self.config.request(messages.clone());
        request.tools = Some(definitions);
        request.tool_choice = Some(ToolChoice::None);
        prepare_follow_up(&mut request);

        let completion = self.send(Phase::FollowUp, &request).await?;
        self.record_usage(Phase::FollowUp, &completion, &mut prompt_tokens, &mut completion_tokens);

        if let Some(ref content) = completion.content {
            messages.push(Message::assistant_text(content.clone()));
        }
        let answer = finish(completion)?;
        self.event_handler
            .on_event(&LoopEvent::Answered { direct: false });

        Ok(LoopOutcome {
            answer: Answer::Final(answer),
            messages,
            tools_executed,
            prompt_tokens,
            completion_tokens,
        })
    }

    async fn send(&self, phase: Phase, request: &ChatRequest) -> Result<ChatCompletion> {
        self.event_handler.on_event(&LoopEvent::RequestSent {
            phase,
            messages: request.messages.len(),
        });
        let completion = self.backend.chat(request).await?;
        debug!(
            "{phase} response: {} tool call(s), finish_reason={}",
            completion.tool_calls.len(),
            completion.finish_reason.as_deref().unwrap_or("-")
        );
        Ok(completion)
    }

    fn record_usage(
        &self,
        phase: Phase,
        completion: &ChatCompletion,
        prompt_total: &mut u32,
        completion_total: &mut u32,
    ) {
        if let Some(ref usage) = completion.usage {
            let prompt = usage.prompt_tokens.unwrap_or(0);
            let generated = usage.completion_tokens.unwrap_or(0);
            *prompt_total = prompt_total.saturating_add(prompt);
            *completion_total = completion_total.saturating_add(generated);
            self.event_handler.on_event(&LoopEvent::TokenUsage {
                phase,
                prompt_tokens: prompt,
                completion_tokens: generated,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::events::FnEventHandler;
    use crate::mock::{MockBackend, MockReply};
    use crate::tools::{ToolFuture, parse_arguments};
    use crate::{MessageRole, ToolCall, ToolDef, UsageInfo};
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Deserialize, JsonSchema)]
    #[serde(deny_unknown_fields)]
    struct LookupArgs {
        key: String,
    }

    enum StoreCall {
        Lookup(LookupArgs),
        Fail,
    }

    /// Key/value lookups plus a tool that always fails.
    struct Store {
        lookup: ToolDef,
        fail: ToolDef,
        executed: Mutex<Vec<String>>,
    }

    impl Store {
        fn new() -> Self {
            Self {
                lookup: ToolDef::strict_for::<LookupArgs>("lookup", "Look up a key"),
                fail: ToolDef::new(
                    "fail",
                    "Always fails",
                    serde_json::json!({"type": "object", "properties": {}}),
                ),
                executed: Mutex::new(Vec::new()),
            }
        }

        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    impl Toolbox for Store {
        type Call = StoreCall;

        fn definitions(&self) -> Vec<ToolDef> {
            vec![self.lookup.clone(), self.fail.clone()]
        }

        fn resolve(&self, name: &str, arguments: &str) -> Result<StoreCall> {
            match name {
                "lookup" => Ok(StoreCall::Lookup(parse_arguments(&self.lookup, arguments)?)),
                "fail" => Ok(StoreCall::Fail),
                other => Err(Error::UnknownTool(other.to_string())),
            }
        }

        fn invoke(&self, call: StoreCall) -> ToolFuture<'_> {
            Box::pin(async move {
                match call {
                    StoreCall::Lookup(args) => {
                        self.executed.lock().unwrap().push(args.key.clone());
                        Ok(serde_json::json!({"key": args.key, "value": 42}))
                    }
                    StoreCall::Fail => Err(Error::tool_execution("fail", "disk on fire")),
                }
            })
        }
    }

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Summary {
        value: i64,
    }
    impl StructuredOutput for Summary {}

    fn lookup(id: &str, key: &str) -> ToolCall {
        ToolCall::new(id, "lookup", format!(r#"{{"key":"{key}"}}"#))
    }

    #[tokio::test]
    async fn no_tool_call_returns_direct_text() {
        let backend = MockBackend::new().with_text("I can only answer store questions.");
        let store = Store::new();

        let answer = ToolLoop::new(&backend, &store, LoopConfig::default())
            .run_structured::<Summary>("sys", "What's the weather?")
            .await
            .unwrap();

        assert_eq!(
            answer,
            Answer::Direct("I can only answer store questions.".into())
        );
        assert!(store.executed().is_empty());
        assert_eq!(backend.request_count(), 1);

        let sent = &backend.requests()[0];
        assert_eq!(sent.tools.as_ref().map(|t| t.len()), Some(2));
        assert_eq!(sent.tool_choice, Some(ToolChoice::Auto));
        assert!(sent.response_format.is_none());
    }

    #[tokio::test]
    async fn tool_call_then_structured_follow_up() {
        let backend = MockBackend::new()
            .with_tool_calls(vec![lookup("call_1", "a")])
            .with_text(r#"{"value": 42}"#);
        let store = Store::new();

        let outcome = ToolLoop::new(&backend, &store, LoopConfig::default())
            .run_messages_structured::<Summary>(vec![Message::system("s"), Message::user("u")])
            .await
            .unwrap();

        assert_eq!(outcome.answer, Answer::Final(Summary { value: 42 }));
        assert_eq!(outcome.tools_executed, 1);
        assert_eq!(store.executed(), vec!["a".to_string()]);

        let roles: Vec<_> = outcome.messages.iter().map(|m| m.role.clone()).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Assistant,
            ]
        );
        assert_eq!(outcome.messages[3].tool_call_id.as_deref(), Some("call_1"));

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        let follow_up = &requests[1];
        assert_eq!(follow_up.messages.len(), 4);
        assert_eq!(follow_up.tool_choice, Some(ToolChoice::None));
        let format = follow_up.response_format.as_ref().unwrap();
        assert_eq!(format.json_schema.as_ref().unwrap().name, "Summary");
    }

    #[tokio::test]
    async fn every_call_is_answered_in_model_order() {
        let backend = MockBackend::new()
            .with_tool_calls(vec![lookup("c1", "first"), lookup("c2", "second")])
            .with_text("done");
        let store = Store::new();

        let outcome = ToolLoop::new(&backend, &store, LoopConfig::default())
            .run_messages(vec![Message::user("u")])
            .await
            .unwrap();

        assert_eq!(outcome.answer, Answer::Final("done".to_string()));
        assert_eq!(store.executed(), vec!["first", "second"]);
        let ids: Vec<_> = outcome
            .messages
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn unknown_tool_aborts_before_any_execution() {
        let backend = MockBackend::new()
            .with_tool_calls(vec![
                lookup("c1", "a"),
                ToolCall::new("c2", "launch_rockets", "{}"),
            ])
            .with_text("never sent");
        let store = Store::new();

        let err = ToolLoop::new(&backend, &store, LoopConfig::default())
            .run("s", "u")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownTool(ref n) if n == "launch_rockets"));
        assert!(store.executed().is_empty());
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn invalid_arguments_abort_without_follow_up() {
        let backend = MockBackend::new()
            .with_tool_calls(vec![ToolCall::new("c1", "lookup", r#"{"key": 7}"#)])
            .with_text("never sent");
        let store = Store::new();

        let err = ToolLoop::new(&backend, &store, LoopConfig::default())
            .run("s", "u")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidArguments { ref tool, .. } if tool == "lookup"));
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn tool_failure_stops_remaining_calls() {
        let backend = MockBackend::new()
            .with_tool_calls(vec![
                ToolCall::new("c1", "fail", "{}"),
                lookup("c2", "after"),
            ])
            .with_text("never sent");
        let store = Store::new();

        let err = ToolLoop::new(&backend, &store, LoopConfig::default())
            .run("s", "u")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ToolExecution { .. }));
        assert!(store.executed().is_empty());
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn non_conforming_final_answer_is_rejected() {
        let backend = MockBackend::new()
            .with_tool_calls(vec![lookup("c1", "a")])
            .with_text(r#"{"value": "forty-two"}"#);
        let store = Store::new();

        let err = ToolLoop::new(&backend, &store, LoopConfig::default())
            .run_structured::<Summary>("s", "u")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SchemaValidation { .. }));
    }

    #[tokio::test]
    async fn token_totals_saturate() {
        let huge = || UsageInfo {
            prompt_tokens: Some(u32::MAX),
            completion_tokens: Some(u32::MAX - 1),
            total_tokens: None,
        };
        let backend = MockBackend::new()
            .with_reply(MockReply::Completion(ChatCompletion {
                usage: Some(huge()),
                ..ChatCompletion::tool_calls(vec![lookup("c1", "a")])
            }))
            .with_reply(MockReply::Completion(ChatCompletion {
                usage: Some(huge()),
                ..ChatCompletion::text("done")
            }));
        let store = Store::new();

        let outcome = ToolLoop::new(&backend, &store, LoopConfig::default())
            .run_messages(vec![Message::user("u")])
            .await
            .unwrap();
        assert_eq!(outcome.prompt_tokens, u32::MAX);
        assert_eq!(outcome.completion_tokens, u32::MAX);
    }

    #[tokio::test]
    async fn empty_follow_up_is_an_error_for_text_targets() {
        let backend = MockBackend::new()
            .with_tool_calls(vec![lookup("c1", "a")])
            .with_reply(MockReply::Completion(ChatCompletion::default()));
        let store = Store::new();

        let err = ToolLoop::new(&backend, &store, LoopConfig::default())
            .run("s", "u")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote { .. }));
    }

    #[tokio::test]
    async fn remote_failure_propagates() {
        let backend = MockBackend::new().with_reply(MockReply::error(Some(429), "rate limited"));
        let store = Store::new();

        let err = ToolLoop::new(&backend, &store, LoopConfig::default())
            .run("s", "u")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote { status: Some(429), .. }));
    }

    #[tokio::test]
    async fn events_cover_the_run() {
        let backend = MockBackend::new()
            .with_tool_calls(vec![lookup("c1", "a")])
            .with_text("done");
        let store = Store::new();
        let requests = AtomicUsize::new(0);
        let results = AtomicUsize::new(0);
        let handler = FnEventHandler::new(|event| match event {
            LoopEvent::RequestSent { .. } => {
                requests.fetch_add(1, Ordering::SeqCst);
            }
            LoopEvent::ToolResult { call_id, .. } => {
                assert_eq!(*call_id, "c1");
                results.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        });

        ToolLoop::new(&backend, &store, LoopConfig::default())
            .with_event_handler(&handler)
            .run("s", "u")
            .await
            .unwrap();

        assert_eq!(requests.load(Ordering::SeqCst), 2);
        assert_eq!(results.load(Ordering::SeqCst), 1);
    }
}
