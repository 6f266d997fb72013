//! Static JSON knowledge base.
//!
//! The store is a JSON document holding a list of [`KnowledgeRecord`]s,
//! either as a bare array or wrapped as `{"records": [...]}`. It is read in
//! full on every load; there is no index and no search.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One question/answer entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeRecord {
    pub id: u64,
    pub question: String,
    pub answer: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Wrapped { records: Vec<KnowledgeRecord> },
    Bare(Vec<KnowledgeRecord>),
}

/// The loaded knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    records: Vec<KnowledgeRecord>,
}

impl KnowledgeBase {
    pub fn new(records: Vec<KnowledgeRecord>) -> Self {
        Self { records }
    }

    /// Read and parse the knowledge base at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Knowledge(format!("failed to read {}: {e}", path.display())))?;
        let kb = Self::parse(&data).map_err(|e| {
            Error::Knowledge(format!("invalid knowledge base {}: {e}", path.display()))
        })?;
        debug!("Loaded {} knowledge record(s) from {}", kb.len(), path.display());
        Ok(kb)
    }

    /// Parse a knowledge base document.
    pub fn from_json(data: &str) -> Result<Self> {
        Self::parse(data).map_err(|e| Error::Knowledge(format!("invalid knowledge base: {e}")))
    }

    fn parse(data: &str) -> serde_json::Result<Self> {
        let records = match serde_json::from_str::<Document>(data)? {
            Document::Wrapped { records } | Document::Bare(records) => records,
        };
        Ok(Self { records })
    }

    pub fn records(&self) -> &[KnowledgeRecord] {
        &self.records
    }

    pub fn get(&self, id: u64) -> Option<&KnowledgeRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The whole store as a `{"records": [...]}` JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "records": self.records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const WRAPPED: &str = r#"{"records": [
        {"id": 1, "question": "What is the return policy?", "answer": "30 days."},
        {"id": 2, "question": "Do you ship internationally?", "answer": "Yes."}
    ]}"#;

    #[test]
    fn parses_wrapped_and_bare_documents() {
        let kb = KnowledgeBase::from_json(WRAPPED).unwrap();
        assert_eq!(kb.len(), 2);
        assert_eq!(kb.get(2).unwrap().answer, "Yes.");

        let bare = KnowledgeBase::from_json(
            r#"[{"id": 7, "question": "q", "answer": "a"}]"#,
        )
        .unwrap();
        assert_eq!(bare.records()[0].id, 7);
    }

    #[test]
    fn malformed_document_is_knowledge_error() {
        let err = KnowledgeBase::from_json(r#"{"records": [{"id": "one"}]}"#).unwrap_err();
        assert!(matches!(err, Error::Knowledge(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(WRAPPED.as_bytes()).unwrap();
        let kb = KnowledgeBase::load(file.path()).unwrap();
        assert_eq!(kb.len(), 2);
        assert_eq!(kb.to_json()["records"][0]["id"], 1);
    }

    #[test]
    fn missing_file_is_knowledge_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = KnowledgeBase::load(dir.path().join("kb.json")).unwrap_err();
        assert!(matches!(err, Error::Knowledge(_)));
        assert!(err.to_string().contains("kb.json"));
    }
}
