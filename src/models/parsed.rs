// src/models/parsed.rs

//! Normalized feed entries produced by the mapper.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DocumentKind, LicitationFields, LotFields, PartyFields};

/// Contracting authority as extracted from one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedParty {
    pub nif: String,
    /// The owning entry's `updated` timestamp
    pub updated: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: PartyFields,
}

/// One lot of an entry; the synthetic lot `"0"` when the entry has no lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLot {
    pub lot_id: String,
    pub ext_id: String,
    #[serde(flatten)]
    pub fields: LotFields,
}

/// A document reference, deduplicated by `(doc_id, url)` within an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub doc_id: String,
    pub url: String,
    pub kind: DocumentKind,
}

/// Publication request block of a notice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRequest {
    pub agency_id: Option<String>,
    pub sent_date: Option<String>,
    pub sent_time: Option<String>,
}

/// A document published with a notice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeDocument {
    pub issue_date: Option<String>,
    pub doc_type: Option<String>,
    pub doc_name: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
}

/// A publication notice (`DOC_CN`, `DOC_PIN`, `DOC_CAN_ADJ`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedNotice {
    pub code: Option<String>,
    pub media: Option<String>,
    pub publication_request: Option<PublicationRequest>,
    #[serde(default)]
    pub documents: Vec<NoticeDocument>,
}

/// One feed entry mapped into the domain representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEntry {
    /// Permanent entry identifier
    pub entry_id: String,
    pub updated: DateTime<Utc>,
    pub party: Option<ParsedParty>,
    #[serde(flatten)]
    pub fields: LicitationFields,
    pub lots: Vec<ParsedLot>,
    /// Lots with an award result, see `TenderResult::DESISTED`
    pub lots_adj: u32,
    pub documents: Vec<ParsedDocument>,
    pub notices: Vec<ParsedNotice>,
}

impl ParsedEntry {
    pub fn status(&self) -> Option<&str> {
        self.fields.status_code.as_deref()
    }

    pub fn cpvs(&self) -> &[String] {
        &self.fields.cpvs
    }
}

/// Deletion marker observed in a feed page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDeletedEntry {
    pub entry_id: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}
