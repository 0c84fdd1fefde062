//! Reference documents — pre-fetched source material that grounds answers.
//!
//! The cache is built once at startup (see `gradrelay-reference`) and is
//! immutable afterwards, so it is shared behind an `Arc` without locking.

use serde::{Deserialize, Serialize};
use crate::error::FetchError;

/// Visible text of one reference source, or the reason it could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDocument {
    /// The configured source (a URL).
    pub source: String,

    /// Extracted text, or a human-readable error message when the fetch failed.
    pub text: String,

    /// Set when `text` is an error message rather than content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

impl ReferenceDocument {
    pub fn fetched(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            fetch_error: None,
        }
    }

    /// Stand-in document for a source that failed to load.
    pub fn failed(error: &FetchError) -> Self {
        Self {
            source: error.source_id().to_string(),
            text: format!("Error: could not load {}: {error}", error.source_id()),
            fetch_error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.fetch_error.is_some()
    }
}

/// Every configured source mapped to exactly one document, in configured order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceCache {
    documents: Vec<ReferenceDocument>,
}

impl ReferenceCache {
    /// Build from documents already in configured source order. A later
    /// document for the same source replaces the earlier one in place.
    pub fn from_documents(documents: impl IntoIterator<Item = ReferenceDocument>) -> Self {
        let mut cache = Self::default();
        for doc in documents {
            match cache.documents.iter_mut().find(|d| d.source == doc.source) {
                Some(existing) => *existing = doc,
                None => cache.documents.push(doc),
            }
        }
        cache
    }

    /// Look up the document for a source.
    ///
    /// Returns `None` only for sources that were never configured; a source
    /// whose fetch failed still has its error document.
    pub fn get(&self, source: &str) -> Option<&ReferenceDocument> {
        self.documents.iter().find(|d| d.source == source)
    }

    /// Documents in configured source order.
    pub fn documents(&self) -> &[ReferenceDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of sources that are holding an error document.
    pub fn failed_count(&self) -> usize {
        self.documents.iter().filter(|d| d.is_error()).count()
    }

    /// Concatenate every document in configured order, each under a
    /// `[source]` header.
    pub fn render(&self) -> String {
        self.documents
            .iter()
            .map(|d| format!("[{}]\n{}", d.source, d.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
