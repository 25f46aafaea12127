//! Document reference data structure.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::ParsedDocument;

/// Category a document reference was published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Legal,
    Technical,
    Additional,
    General,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Legal => "legal",
            DocumentKind::Technical => "technical",
            DocumentKind::Additional => "additional",
            DocumentKind::General => "general",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document attached to a licitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Storage-assigned id, unset until created
    pub id: Option<String>,

    /// Storage id of the owning licitation
    pub licitation_id: String,

    /// Source document identifier (file name or generated token)
    pub doc_id: String,

    pub url: String,
    pub kind: DocumentKind,
}

impl Document {
    pub fn from_parsed(parsed: &ParsedDocument, licitation_id: impl Into<String>) -> Self {
        Self {
            id: None,
            licitation_id: licitation_id.into(),
            doc_id: parsed.doc_id.clone(),
            url: parsed.url.clone(),
            kind: parsed.kind,
        }
    }

    pub fn apply_update(&mut self, parsed: &ParsedDocument) {
        self.url = parsed.url.clone();
        self.kind = parsed.kind;
    }
}
