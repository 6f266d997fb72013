//! Knowledge-base assistant: a tool loop over a static JSON store.
//!
//! `search_kb(question)` does not search; it returns the whole store and
//! lets the model pick the answer. The final answer is a [`KbResponse`]
//! citing the record id it came from.

use crate::agent::{Answer, EventHandler, LoopConfig, ToolLoop};
use crate::error::{Error, Result};
use crate::knowledge::KnowledgeBase;
use crate::structured::StructuredOutput;
use crate::tools::{ToolFuture, Toolbox, parse_arguments};
use crate::{ChatBackend, ToolDef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions from the \
                                 knowledge base about our e-commerce store.";
pub const DEFAULT_PROMPT: &str = "What is the return policy?";

const TOOL_NAME: &str = "search_kb";

/// Arguments of `search_kb`.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SearchArgs {
    pub question: String,
}

/// Final answer of the retrieval workflow.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct KbResponse {
    /// The answer to the user's question.
    pub answer: String,
    /// The record id of the answer.
    pub source: u64,
}

impl StructuredOutput for KbResponse {}

#[derive(Debug, Clone, PartialEq)]
pub enum KnowledgeCall {
    SearchKb(SearchArgs),
}

/// Toolbox exposing `search_kb` over the store at `path`.
///
/// The file is read on every call.
pub struct KnowledgeToolbox {
    path: PathBuf,
    search_kb: ToolDef,
}

impl KnowledgeToolbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            search_kb: ToolDef::strict_for::<SearchArgs>(
                TOOL_NAME,
                "Answer users question about policies and procedures from the knowledge base.",
            ),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the whole knowledge base. The question is not used.
    pub fn search_kb(&self, args: &SearchArgs) -> Result<serde_json::Value> {
        tracing::debug!("search_kb: returning full store for {:?}", args.question);
        let kb = KnowledgeBase::load(&self.path)
            .map_err(|e| Error::tool_execution(TOOL_NAME, e.to_string()))?;
        Ok(kb.to_json())
    }
}

impl Toolbox for KnowledgeToolbox {
    type Call = KnowledgeCall;

    fn definitions(&self) -> Vec<ToolDef> {
        vec![self.search_kb.clone()]
    }

    fn resolve(&self, name: &str, arguments: &str) -> Result<KnowledgeCall> {
        match name {
            TOOL_NAME => Ok(KnowledgeCall::SearchKb(parse_arguments(
                &self.search_kb,
                arguments,
            )?)),
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }

    fn invoke(&self, call: KnowledgeCall) -> ToolFuture<'_> {
        Box::pin(async move {
            match call {
                KnowledgeCall::SearchKb(args) => self.search_kb(&args),
            }
        })
    }
}

/// Ask the knowledge-base assistant `question`.
pub async fn ask<B: ChatBackend + ?Sized>(
    backend: &B,
    toolbox: &KnowledgeToolbox,
    config: LoopConfig,
    handler: &dyn EventHandler,
    question: &str,
) -> Result<Answer<KbResponse>> {
    ToolLoop::new(backend, toolbox, config)
        .with_event_handler(handler)
        .run_structured::<KbResponse>(SYSTEM_PROMPT, question)
        .await
}
