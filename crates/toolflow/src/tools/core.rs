//! Toolbox abstraction for LLM function-calling.
//!
//! A [`Toolbox`] is a closed set of tools. It exports the declarations sent to
//! the model, turns a model-supplied `(name, arguments)` pair into a typed
//! call at a single dispatch point ([`Toolbox::resolve`]), and runs resolved
//! calls ([`Toolbox::invoke`]).
//!
//! Argument parsing goes through [`parse_arguments`]: the raw string must be
//! JSON, must satisfy the declared parameter schema, and must deserialize into
//! the call's typed argument struct. Any failure is
//! [`Error::InvalidArguments`].

use crate::ToolDef;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info, trace, warn};

/// Boxed future returned by [`Toolbox::invoke`].
///
/// Resolves to the JSON-serializable tool result, or
/// [`Error::ToolExecution`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send + 'a>>;

// ── Toolbox trait ──────────────────────────────────────────────────

/// A closed set of tools an LLM may call.
///
/// `Call` is normally an enum with one variant per tool, each carrying the
/// tool's typed arguments. Because every model-supplied name goes through
/// [`resolve`](Toolbox::resolve) before anything executes, an unknown name
/// or bad arguments are caught without side effects.
///
/// # Example
///
/// ```ignore
/// enum KbCall {
///     Search(SearchArgs),
/// }
///
/// impl Toolbox for Kb {
///     type Call = KbCall;
///
///     fn definitions(&self) -> Vec<ToolDef> {
///         vec![self.search_def.clone()]
///     }
///
///     fn resolve(&self, name: &str, arguments: &str) -> Result<KbCall> {
///         match name {
///             "search_kb" => Ok(KbCall::Search(parse_arguments(&self.search_def, arguments)?)),
///             other => Err(Error::UnknownTool(other.to_string())),
///         }
///     }
///
///     fn invoke(&self, call: KbCall) -> ToolFuture<'_> {
///         Box::pin(async move {
///             match call {
///                 KbCall::Search(args) => self.search(args).await,
///             }
///         })
///     }
/// }
/// ```
pub trait Toolbox: Send + Sync {
    /// A resolved, typed tool invocation.
    type Call: Send;

    /// The tool declarations sent to the LLM API.
    fn definitions(&self) -> Vec<ToolDef>;

    /// Map a model-supplied tool name and raw JSON arguments to a typed call.
    ///
    /// Fails with [`Error::UnknownTool`] when `name` is not declared, and
    /// with [`Error::InvalidArguments`] when the arguments do not parse under
    /// the tool's schema.
    fn resolve(&self, name: &str, arguments: &str) -> Result<Self::Call>;

    /// Execute a resolved call.
    ///
    /// Uses a boxed future so that the trait is dyn-compatible.
    fn invoke(&self, call: Self::Call) -> ToolFuture<'_>;

    /// Names of the declared tools, in declaration order.
    fn tool_names(&self) -> Vec<String> {
        self.definitions()
            .into_iter()
            .map(|d| d.function.name)
            .collect()
    }
}

// ── Argument handling ──────────────────────────────────────────────

/// Parse and validate raw JSON arguments against a tool's declared schema.
///
/// Returns the parsed JSON value on success. Every schema violation is listed
/// in the error reason with its JSON pointer.
pub fn validate_arguments(def: &ToolDef, arguments: &str) -> Result<serde_json::Value> {
    let name = def.name();
    let value: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| Error::invalid_arguments(name, format!("invalid JSON: {e}")))?;

    let validator = match jsonschema::validator_for(&def.function.parameters) {
        Ok(v) => v,
        Err(e) => {
            // Typed deserialization still guards the call.
            warn!("[tool] {name}: parameter schema does not compile, skipping validation: {e}");
            return Ok(value);
        }
    };

    let errors: Vec<String> = validator
        .iter_errors(&value)
        .map(|e| format!("{}: {e}", display_pointer(&e.instance_path().to_string())))
        .collect();

    if errors.is_empty() {
        Ok(value)
    } else {
        Err(Error::invalid_arguments(name, errors.join("; ")))
    }
}

/// Parse raw JSON arguments into a typed struct, validating them against the
/// declared schema first.
///
/// # Example
///
/// ```
/// use toolflow::ToolDef;
/// use toolflow::tools::parse_arguments;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// #[serde(deny_unknown_fields)]
/// struct SearchArgs {
///     question: String,
/// }
///
/// let def = ToolDef::strict_for::<SearchArgs>("search_kb", "Search the knowledge base");
/// let args: SearchArgs = parse_arguments(&def, r#"{"question": "returns?"}"#).unwrap();
/// assert_eq!(args.question, "returns?");
///
/// assert!(parse_arguments::<SearchArgs>(&def, r#"{"question": 1}"#).is_err());
/// ```
pub fn parse_arguments<A: DeserializeOwned>(def: &ToolDef, arguments: &str) -> Result<A> {
    let value = validate_arguments(def, arguments)?;
    serde_json::from_value(value).map_err(|e| Error::invalid_arguments(def.name(), e.to_string()))
}

/// Encode a tool result as the JSON content of a tool-result message.
/// Strings are quoted like any other value.
pub fn encode_result(value: &serde_json::Value) -> String {
    value.to_string()
}

fn display_pointer(pointer: &str) -> &str {
    if pointer.is_empty() { "/" } else { pointer }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.chars().count() > 120 { "..." } else { "" }
    );
    debug!("[tool] {name} full args ({} bytes)", arguments.len());
    trace!("[tool] {name} arguments: {arguments}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct AddArgs {
        a: i64,
        b: i64,
    }

    #[derive(Debug, PartialEq)]
    enum MathCall {
        Add(AddArgs),
    }

    struct Math {
        add: ToolDef,
        invocations: AtomicUsize,
    }

    impl Math {
        fn new() -> Self {
            Self {
                add: ToolDef::strict_for::<AddArgs>("add", "Add two integers"),
                invocations: AtomicUsize::new(0),
            }
        }
    }

    impl Toolbox for Math {
        type Call = MathCall;

        fn definitions(&self) -> Vec<ToolDef> {
            vec![self.add.clone()]
        }

        fn resolve(&self, name: &str, arguments: &str) -> Result<MathCall> {
            match name {
                "add" => Ok(MathCall::Add(parse_arguments(&self.add, arguments)?)),
                other => Err(Error::UnknownTool(other.to_string())),
            }
        }

        fn invoke(&self, call: MathCall) -> ToolFuture<'_> {
            Box::pin(async move {
                self.invocations.fetch_add(1, Ordering::SeqCst);
                match call {
                    MathCall::Add(AddArgs { a, b }) => Ok(serde_json::json!({"sum": a + b})),
                }
            })
        }
    }

    #[test]
    fn resolve_valid_arguments() {
        let math = Math::new();
        let call = math.resolve("add", r#"{"a": 2, "b": 3}"#).unwrap();
        assert_eq!(call, MathCall::Add(AddArgs { a: 2, b: 3 }));
        assert_eq!(math.invocations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn resolve_unknown_tool() {
        let err = Math::new().resolve("divide", "{}").unwrap_err();
        assert!(matches!(err, Error::UnknownTool(ref n) if n == "divide"));
    }

    #[test]
    fn resolve_rejects_malformed_json() {
        let err = Math::new().resolve("add", "{a: 2").unwrap_err();
        match err {
            Error::InvalidArguments { tool, reason } => {
                assert_eq!(tool, "add");
                assert!(reason.contains("invalid JSON"));
            }
            other => panic!("expected InvalidArguments, got {other:?}"),
        }
    }

    #[test]
    fn resolve_rejects_schema_violations() {
        let math = Math::new();
        // Wrong type.
        assert!(matches!(
            math.resolve("add", r#"{"a": "two", "b": 3}"#),
            Err(Error::InvalidArguments { .. })
        ));
        // Missing field.
        assert!(matches!(
            math.resolve("add", r#"{"a": 2}"#),
            Err(Error::InvalidArguments { .. })
        ));
        // Unknown field on a strict tool.
        assert!(matches!(
            math.resolve("add", r#"{"a": 2, "b": 3, "c": 4}"#),
            Err(Error::InvalidArguments { .. })
        ));
    }

    #[test]
    fn schema_errors_carry_instance_path() {
        let math = Math::new();
        let err = validate_arguments(&math.add, r#"{"a": "two", "b": 3}"#).unwrap_err();
        assert!(err.to_string().contains("/a"), "got: {err}");
    }

    #[tokio::test]
    async fn invoke_runs_resolved_call() {
        let math = Math::new();
        let call = math.resolve("add", r#"{"a": 40, "b": 2}"#).unwrap();
        let result = math.invoke(call).await.unwrap();
        assert_eq!(result, serde_json::json!({"sum": 42}));
        assert_eq!(math.invocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tool_names_follow_declarations() {
        assert_eq!(Math::new().tool_names(), vec!["add".to_string()]);
    }

    #[test]
    fn encode_result_is_always_json() {
        let encoded = encode_result(&serde_json::json!("plain"));
        assert_eq!(encoded, r#""plain""#);
        let decoded: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, "plain");
        assert_eq!(
            encode_result(&serde_json::json!({"temperature_2m": 3.1})),
            r#"{"temperature_2m":3.1}"#
        );
    }
}
