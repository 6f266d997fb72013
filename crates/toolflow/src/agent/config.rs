//! Configuration for the [`ToolLoop`](super::tool_loop::ToolLoop) and for
//! single structured calls.
//!
//! # Examples
//!
//! ```
//! use toolflow::agent::LoopConfig;
//! use toolflow::ToolChoice;
//!
//! let config = LoopConfig::new("llama-3.3-70b-versatile")
//!     .with_temperature(0.0)
//!     .with_max_tokens(512)
//!     .with_tool_choice(ToolChoice::Required);
//! assert_eq!(config.tool_choice, ToolChoice::Required);
//! ```

use crate::structured::OutputMode;
use crate::{ChatRequest, Message, ToolChoice};

/// Per-run request settings.
///
/// Build with [`LoopConfig::new()`] and chain `.with_*()` methods, or use
/// struct update syntax with `..LoopConfig::default()`.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Model identifier (e.g. `"llama-3.3-70b-versatile"`).
    pub model: String,
    /// Maximum tokens per LLM response. `None` leaves the provider default.
    pub max_tokens: Option<u32>,
    /// Sampling temperature. `None` leaves the provider default.
    pub temperature: Option<f32>,
    /// Tool-choice policy for the initial request. Default: `auto`.
    pub tool_choice: ToolChoice,
    /// How the target schema of a structured answer is requested.
    pub output_mode: OutputMode,
}

impl LoopConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the maximum tokens per LLM response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the tool-choice policy for the initial request.
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    pub fn with_output_mode(mut self, output_mode: OutputMode) -> Self {
        self.output_mode = output_mode;
        self
    }

    /// A request over `messages` carrying this config's model and sampling
    /// settings, with no tools and no response format.
    pub fn request(&self, messages: Vec<Message>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            ..Default::default()
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            model: crate::DEFAULT_MODEL.to_string(),
            max_tokens: None,
            temperature: None,
            tool_choice: ToolChoice::Auto,
            output_mode: OutputMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LoopConfig::default();
        assert_eq!(config.model, crate::DEFAULT_MODEL);
        assert_eq!(config.tool_choice, ToolChoice::Auto);
        assert!(config.max_tokens.is_none());
        assert!(config.temperature.is_none());
    }

    #[test]
    fn request_carries_sampling_settings() {
        let config = LoopConfig::new("m").with_temperature(0.2).with_max_tokens(64);
        let req = config.request(vec![Message::user("hi")]);
        assert_eq!(req.model, "m");
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(req.max_tokens, Some(64));
        assert!(req.tools.is_none());
        assert!(req.response_format.is_none());
    }
}
