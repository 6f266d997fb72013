//! Tool abstractions for LLM function-calling.
//!
//! Every set of local functions the model may call is a [`Toolbox`]
//! implementor: a closed set of tools with one dispatch point that maps a
//! model-supplied name to a typed call.
//!
//! # Submodules
//!
//! - [`core`]: [`Toolbox`] trait, [`ToolFuture`], argument validation
//!   ([`parse_arguments`], [`validate_arguments`]) and call logging.

pub mod core;

pub use core::{
    ToolFuture, Toolbox, encode_result, log_tool_call, parse_arguments, validate_arguments,
};
