//! In-memory store backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Cursor, Document, Event, Licitation, Lot, Party};
use crate::storage::{
    CursorStore, DocumentStore, EventStore, LicitationStore, LotStore, PartyStore,
};

/// Number of records written per entity since the store was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub licitations_created: usize,
    pub licitations_saved: usize,
    pub parties_created: usize,
    pub parties_saved: usize,
    pub lots_created: usize,
    pub lots_saved: usize,
    pub documents_created: usize,
    pub documents_saved: usize,
    pub events_appended: usize,
    pub cursor_advances: usize,
}

impl WriteCounts {
    /// Entity writes, excluding cursor advances.
    pub fn entity_writes(&self) -> usize {
        self.licitations_created
            + self.licitations_saved
            + self.parties_created
            + self.parties_saved
            + self.lots_created
            + self.lots_saved
            + self.documents_created
            + self.documents_saved
            + self.events_appended
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    cursor: Option<Cursor>,
    licitations: Vec<Licitation>,
    parties: Vec<Party>,
    lots: Vec<Lot>,
    documents: Vec<Document>,
    events: Vec<Event>,
    counts: WriteCounts,
}

impl State {
    fn assign_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// Store backend keeping every record in process memory.
///
/// Ids are sequential (`lic-1`, `party-2`, ...) so test runs are reproducible.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn require_id(id: &Option<String>, kind: &str) -> Result<String> {
    id.clone()
        .ok_or_else(|| AppError::storage(format!("cannot save {kind} without an id")))
}

/// Replace the record carrying the same id.
fn replace_by_id<T>(records: &mut [T], id_of: impl Fn(&T) -> Option<&str>, id: &str, record: T) -> Result<()> {
    let slot = records
        .iter_mut()
        .find(|r| id_of(r) == Some(id))
        .ok_or_else(|| AppError::storage(format!("no stored record with id {id}")))?;
    *slot = record;
    Ok(())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a cursor.
    pub fn with_cursor(last_extracted: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(State {
                cursor: Some(Cursor {
                    last_extracted,
                    entries_processed: 0,
                }),
                ..State::default()
            }),
        }
    }

    pub async fn cursor(&self) -> Option<Cursor> {
        self.state.lock().await.cursor.clone()
    }

    pub async fn licitations(&self) -> Vec<Licitation> {
        self.state.lock().await.licitations.clone()
    }

    pub async fn parties(&self) -> Vec<Party> {
        self.state.lock().await.parties.clone()
    }

    pub async fn lots(&self) -> Vec<Lot> {
        self.state.lock().await.lots.clone()
    }

    pub async fn documents(&self) -> Vec<Document> {
        self.state.lock().await.documents.clone()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.state.lock().await.events.clone()
    }

    pub async fn write_counts(&self) -> WriteCounts {
        self.state.lock().await.counts
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn get_last(&self) -> Result<Option<Cursor>> {
        Ok(self.state.lock().await.cursor.clone())
    }

    async fn advance(&self, last_extracted: DateTime<Utc>, entries_processed: usize) -> Result<()> {
        let mut state = self.state.lock().await;
        state.cursor = Some(Cursor {
            last_extracted,
            entries_processed,
        });
        state.counts.cursor_advances += 1;
        Ok(())
    }
}

#[async_trait]
impl LicitationStore for MemoryStore {
    async fn get_by_external_id(&self, entry_id: &str) -> Result<Option<Licitation>> {
        let state = self.state.lock().await;
        Ok(state
            .licitations
            .iter()
            .find(|l| l.entry_id == entry_id)
            .cloned())
    }

    async fn create(&self, licitation: &Licitation) -> Result<String> {
        let mut state = self.state.lock().await;
        let id = state.assign_id("lic");
        let mut record = licitation.clone();
        record.id = Some(id.clone());
        state.licitations.push(record);
        state.counts.licitations_created += 1;
        Ok(id)
    }

    async fn save(&self, licitation: &Licitation) -> Result<()> {
        let id = require_id(&licitation.id, "licitation")?;
        let mut state = self.state.lock().await;
        replace_by_id(&mut state.licitations, |l| l.id.as_deref(), &id, licitation.clone())?;
        state.counts.licitations_saved += 1;
        Ok(())
    }
}

#[async_trait]
impl PartyStore for MemoryStore {
    async fn get_by_tax_id(&self, nif: &str) -> Result<Option<Party>> {
        let state = self.state.lock().await;
        Ok(state.parties.iter().find(|p| p.nif == nif).cloned())
    }

    async fn create(&self, party: &Party) -> Result<String> {
        let mut state = self.state.lock().await;
        let id = state.assign_id("party");
        let mut record = party.clone();
        record.id = Some(id.clone());
        state.parties.push(record);
        state.counts.parties_created += 1;
        Ok(id)
    }

    async fn save(&self, party: &Party) -> Result<()> {
        let id = require_id(&party.id, "party")?;
        let mut state = self.state.lock().await;
        replace_by_id(&mut state.parties, |p| p.id.as_deref(), &id, party.clone())?;
        state.counts.parties_saved += 1;
        Ok(())
    }
}

#[async_trait]
impl LotStore for MemoryStore {
    async fn get_by_licitation(&self, licitation: &Licitation) -> Result<Vec<Lot>> {
        let state = self.state.lock().await;
        Ok(state
            .lots
            .iter()
            .filter(|lot| Some(lot.licitation_id.as_str()) == licitation.id.as_deref())
            .cloned()
            .collect())
    }

    async fn create(&self, lots: &[Lot]) -> Result<()> {
        let mut state = self.state.lock().await;
        for lot in lots {
            let mut record = lot.clone();
            record.id = Some(state.assign_id("lot"));
            state.lots.push(record);
            state.counts.lots_created += 1;
        }
        Ok(())
    }

    async fn save(&self, lots: &[Lot]) -> Result<()> {
        let mut state = self.state.lock().await;
        for lot in lots {
            let id = require_id(&lot.id, "lot")?;
            replace_by_id(&mut state.lots, |l| l.id.as_deref(), &id, lot.clone())?;
            state.counts.lots_saved += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_by_licitation(&self, licitation: &Licitation) -> Result<Vec<Document>> {
        let state = self.state.lock().await;
        Ok(state
            .documents
            .iter()
            .filter(|doc| Some(doc.licitation_id.as_str()) == licitation.id.as_deref())
            .cloned()
            .collect())
    }

    async fn create(&self, documents: &[Document]) -> Result<()> {
        let mut state = self.state.lock().await;
        for doc in documents {
            let mut record = doc.clone();
            record.id = Some(state.assign_id("doc"));
            state.documents.push(record);
            state.counts.documents_created += 1;
        }
        Ok(())
    }

    async fn save(&self, documents: &[Document]) -> Result<()> {
        let mut state = self.state.lock().await;
        for doc in documents {
            let id = require_id(&doc.id, "document")?;
            replace_by_id(&mut state.documents, |d| d.id.as_deref(), &id, doc.clone())?;
            state.counts.documents_saved += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append(&self, events: &[Event]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.events.extend_from_slice(events);
        state.counts.events_appended += events.len();
        Ok(())
    }
}
