//! Local filesystem storage implementation.
//!
//! Every collection lives in one JSON array file under the root directory and
//! is rewritten atomically on each write.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Run configuration
//! ├── cursor.json           # High-water mark
//! ├── licitations.json
//! ├── parties.json
//! ├── lots.json
//! ├── documents.json
//! └── events.json           # Append-only
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Cursor, Document, Event, Licitation, Lot, Party};
use crate::storage::{
    CursorStore, DocumentStore, EventStore, LicitationStore, LotStore, PartyStore,
};

const CURSOR: &str = "cursor.json";
const LICITATIONS: &str = "licitations.json";
const PARTIES: &str = "parties.json";
const LOTS: &str = "lots.json";
const DOCUMENTS: &str = "documents.json";
const EVENTS: &str = "events.json";

/// Local filesystem storage backend.
pub struct LocalStorage {
    root_dir: PathBuf,
    // Serializes read-modify-write cycles on the collection files.
    write_lock: Mutex<()>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read a collection file, empty when it does not exist yet.
    async fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        Ok(self.read_json(key).await?.unwrap_or_default())
    }

    /// Append records to a collection.
    async fn append_records<T>(&self, key: &str, records: Vec<T>) -> Result<()>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        if records.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut all: Vec<T> = self.read_collection(key).await?;
        let added = records.len();
        all.extend(records);
        self.write_json(key, &all).await?;
        log::debug!("{}: appended {} record(s), {} total", key, added, all.len());
        Ok(())
    }

    /// Replace stored records sharing an id with the given ones.
    async fn replace_records<T>(
        &self,
        key: &str,
        records: &[T],
        id_of: fn(&T) -> Option<&str>,
    ) -> Result<()>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync,
    {
        if records.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut all: Vec<T> = self.read_collection(key).await?;
        for record in records {
            let id = id_of(record)
                .ok_or_else(|| AppError::storage(format!("{key}: cannot save a record without id")))?;
            let slot = all
                .iter_mut()
                .find(|stored| id_of(stored) == Some(id))
                .ok_or_else(|| AppError::storage(format!("{key}: no stored record with id {id}")))?;
            *slot = record.clone();
        }
        self.write_json(key, &all).await
    }

    fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

fn licitation_id(l: &Licitation) -> Option<&str> {
    l.id.as_deref()
}

fn party_id(p: &Party) -> Option<&str> {
    p.id.as_deref()
}

fn lot_id(l: &Lot) -> Option<&str> {
    l.id.as_deref()
}

fn document_id(d: &Document) -> Option<&str> {
    d.id.as_deref()
}

#[async_trait]
impl CursorStore for LocalStorage {
    async fn get_last(&self) -> Result<Option<Cursor>> {
        self.read_json(CURSOR).await
    }

    async fn advance(&self, last_extracted: DateTime<Utc>, entries_processed: usize) -> Result<()> {
        let cursor = Cursor {
            last_extracted,
            entries_processed,
        };
        self.write_json(CURSOR, &cursor).await?;
        log::info!("Cursor advanced to {}", last_extracted.to_rfc3339());
        Ok(())
    }
}

#[async_trait]
impl LicitationStore for LocalStorage {
    async fn get_by_external_id(&self, entry_id: &str) -> Result<Option<Licitation>> {
        let all: Vec<Licitation> = self.read_collection(LICITATIONS).await?;
        Ok(all.into_iter().find(|l| l.entry_id == entry_id))
    }

    async fn create(&self, licitation: &Licitation) -> Result<String> {
        let id = Self::new_id();
        let mut record = licitation.clone();
        record.id = Some(id.clone());
        self.append_records(LICITATIONS, vec![record]).await?;
        Ok(id)
    }

    async fn save(&self, licitation: &Licitation) -> Result<()> {
        self.replace_records(LICITATIONS, std::slice::from_ref(licitation), licitation_id)
            .await
    }
}

#[async_trait]
impl PartyStore for LocalStorage {
    async fn get_by_tax_id(&self, nif: &str) -> Result<Option<Party>> {
        let all: Vec<Party> = self.read_collection(PARTIES).await?;
        Ok(all.into_iter().find(|p| p.nif == nif))
    }

    async fn create(&self, party: &Party) -> Result<String> {
        let id = Self::new_id();
        let mut record = party.clone();
        record.id = Some(id.clone());
        self.append_records(PARTIES, vec![record]).await?;
        Ok(id)
    }

    async fn save(&self, party: &Party) -> Result<()> {
        self.replace_records(PARTIES, std::slice::from_ref(party), party_id)
            .await
    }
}

#[async_trait]
impl LotStore for LocalStorage {
    async fn get_by_licitation(&self, licitation: &Licitation) -> Result<Vec<Lot>> {
        let Some(id) = licitation.id.as_deref() else {
            return Ok(Vec::new());
        };
        let all: Vec<Lot> = self.read_collection(LOTS).await?;
        Ok(all.into_iter().filter(|l| l.licitation_id == id).collect())
    }

    async fn create(&self, lots: &[Lot]) -> Result<()> {
        let records = lots
            .iter()
            .map(|lot| Lot {
                id: Some(Self::new_id()),
                ..lot.clone()
            })
            .collect();
        self.append_records(LOTS, records).await
    }

    async fn save(&self, lots: &[Lot]) -> Result<()> {
        self.replace_records(LOTS, lots, lot_id).await
    }
}

#[async_trait]
impl DocumentStore for LocalStorage {
    async fn get_by_licitation(&self, licitation: &Licitation) -> Result<Vec<Document>> {
        let Some(id) = licitation.id.as_deref() else {
            return Ok(Vec::new());
        };
        let all: Vec<Document> = self.read_collection(DOCUMENTS).await?;
        Ok(all.into_iter().filter(|d| d.licitation_id == id).collect())
    }

    async fn create(&self, documents: &[Document]) -> Result<()> {
        let records = documents
            .iter()
            .map(|doc| Document {
                id: Some(Self::new_id()),
                ..doc.clone()
            })
            .collect();
        self.append_records(DOCUMENTS, records).await
    }

    async fn save(&self, documents: &[Document]) -> Result<()> {
        self.replace_records(DOCUMENTS, documents, document_id).await
    }
}

#[async_trait]
impl EventStore for LocalStorage {
    async fn append(&self, events: &[Event]) -> Result<()> {
        self.append_records(EVENTS, events.to_vec()).await
    }
}
