//! Record store abstractions.
//!
//! The reconciler talks to six narrow store traits, one per entity plus the
//! cursor. Backends implement all of them and are bundled into [`Stores`].
//!
//! ## Backends
//!
//! - [`MemoryStore`]: in-process maps with sequential ids, used by tests and dry runs
//! - [`LocalStorage`]: JSON files under a directory
//!
//! ```text
//! storage/
//! ├── cursor.json
//! ├── licitations.json
//! ├── parties.json
//! ├── lots.json
//! ├── documents.json
//! └── events.json
//! ```

pub mod local;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Cursor, Document, Event, Licitation, Lot, Party};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::{MemoryStore, WriteCounts};

/// High-water mark persistence.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Last stored cursor, if any run ever stored one.
    async fn get_last(&self) -> Result<Option<Cursor>>;

    async fn advance(&self, last_extracted: DateTime<Utc>, entries_processed: usize) -> Result<()>;
}

#[async_trait]
pub trait LicitationStore: Send + Sync {
    async fn get_by_external_id(&self, entry_id: &str) -> Result<Option<Licitation>>;

    /// Insert a new licitation and return its assigned id.
    async fn create(&self, licitation: &Licitation) -> Result<String>;

    async fn save(&self, licitation: &Licitation) -> Result<()>;
}

#[async_trait]
pub trait PartyStore: Send + Sync {
    async fn get_by_tax_id(&self, nif: &str) -> Result<Option<Party>>;

    /// Insert a new party and return its assigned id.
    async fn create(&self, party: &Party) -> Result<String>;

    async fn save(&self, party: &Party) -> Result<()>;
}

#[async_trait]
pub trait LotStore: Send + Sync {
    async fn get_by_licitation(&self, licitation: &Licitation) -> Result<Vec<Lot>>;

    async fn create(&self, lots: &[Lot]) -> Result<()>;

    async fn save(&self, lots: &[Lot]) -> Result<()>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_by_licitation(&self, licitation: &Licitation) -> Result<Vec<Document>>;

    async fn create(&self, documents: &[Document]) -> Result<()>;

    async fn save(&self, documents: &[Document]) -> Result<()>;
}

/// Append-only event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, events: &[Event]) -> Result<()>;
}

/// Handles to every store the synchronization run needs.
#[derive(Clone)]
pub struct Stores {
    pub cursor: Arc<dyn CursorStore>,
    pub licitations: Arc<dyn LicitationStore>,
    pub parties: Arc<dyn PartyStore>,
    pub lots: Arc<dyn LotStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub events: Arc<dyn EventStore>,
}

impl Stores {
    /// Use one backend for every store.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: CursorStore
            + LicitationStore
            + PartyStore
            + LotStore
            + DocumentStore
            + EventStore
            + 'static,
    {
        Self {
            cursor: backend.clone(),
            licitations: backend.clone(),
            parties: backend.clone(),
            lots: backend.clone(),
            documents: backend.clone(),
            events: backend,
        }
    }
}
