//! Document synchronization types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::LANGUAGE_ID;

/// Language identifiers whose documents are synchronized with the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentSelector(Vec<String>);

impl DocumentSelector {
    #[must_use]
    pub fn new(languages: Vec<String>) -> Self {
        Self(languages)
    }

    #[must_use]
    pub fn matches(&self, language_id: &str) -> bool {
        self.0.iter().any(|lang| lang == language_id)
    }

    #[must_use]
    pub fn languages(&self) -> &[String] {
        &self.0
    }
}

impl Default for DocumentSelector {
    fn default() -> Self {
        Self(vec![LANGUAGE_ID.to_string()])
    }
}

/// An open text document as the host sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    pub uri: String,
    pub language_id: String,
    pub text: String,
}

impl TextDocument {
    #[must_use]
    pub fn new(
        uri: impl Into<String>,
        language_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            language_id: language_id.into(),
            text: text.into(),
        }
    }
}

/// LSP `FileChangeType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileChangeType {
    Created = 1,
    Changed = 2,
    Deleted = 3,
}

impl FileChangeType {
    #[must_use]
    pub const fn as_lsp(self) -> u8 {
        self as u8
    }
}

/// A filesystem change to report to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileChangeType,
}

impl FileEvent {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, kind: FileChangeType) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}
