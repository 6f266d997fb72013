//! A single plain completion.

use crate::agent::LoopConfig;
use crate::error::{Error, Result};
use crate::{ChatBackend, Message};

pub const SYSTEM_PROMPT: &str = "You're a helpful assistant.";
pub const DEFAULT_PROMPT: &str = "Write a limerick about the Python programming language.";

/// Send `system` + `user` and return the model's text.
pub async fn complete<B: ChatBackend + ?Sized>(
    backend: &B,
    config: &LoopConfig,
    system: &str,
    user: &str,
) -> Result<String> {
    let request = config.request(vec![Message::system(system), Message::user(user)]);
    let completion = backend.chat(&request).await?;
    completion
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| Error::remote("empty response: no content"))
}
