//! The tool-calling loop and the parallel fan-out pattern.
//!
//! # Submodules
//!
//! - [`tool_loop`]: [`ToolLoop`], [`Answer`], [`LoopOutcome`].
//! - [`config`]: [`LoopConfig`] request settings.
//! - [`events`]: [`LoopEvent`] and the [`EventHandler`] implementations.
//! - [`parallel`]: [`fan_out`] and [`fan_out2`].

pub mod config;
pub mod events;
pub mod parallel;
pub mod tool_loop;

pub use config::LoopConfig;
pub use events::{EventHandler, FnEventHandler, LoggingHandler, LoopEvent, NoopHandler, Phase};
pub use parallel::{fan_out, fan_out2};
pub use tool_loop::{Answer, LoopOutcome, ToolLoop};
