// src/models/mod.rs

//! Domain models for the synchronization engine.
//!
//! Stored entities (licitation, lot, document, party, event, cursor), the
//! normalized entries the feed mapper produces, and configuration.

/// Overwrite each listed `Option` field of `$target` with the value on
/// `$incoming` when that value is set.
macro_rules! merge_set_fields {
    ($target:expr, $incoming:expr; $($field:ident),+ $(,)?) => {
        $(
            if $incoming.$field.is_some() {
                $target.$field = $incoming.$field.clone();
            }
        )+
    };
}

mod config;
mod document;
mod event;
mod licitation;
mod lot;
mod parsed;
mod party;
mod tender;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Re-export all public types
pub use config::{
    Config, FeedConfig, HttpConfig, LoggingConfig, NotifierConfig, StorageConfig, split_prefixes,
};
pub use document::{Document, DocumentKind};
pub use event::{Event, EventKind};
pub use licitation::{Licitation, LicitationFields, status};
pub use lot::{Lot, LotFields, NO_LOT_ID, lot_ext_id};
pub use parsed::{
    NoticeDocument, ParsedDeletedEntry, ParsedDocument, ParsedEntry, ParsedLot, ParsedNotice,
    ParsedParty, PublicationRequest,
};
pub use party::{Party, PartyFields};
pub use tender::TenderResult;

/// High-water mark of the feed history already processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Feed-level `updated` timestamp of the newest processed page
    pub last_extracted: DateTime<Utc>,

    /// Entries kept by the run that set this cursor
    pub entries_processed: usize,
}
