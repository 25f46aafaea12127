// src/pipeline/reconcile.rs

//! Reconciliation of one parsed entry against stored state.
//!
//! Decides create-versus-update for the licitation, matches lots by lot id and
//! documents by document id, refreshes the contracting party, and derives the
//! domain events the change implies. All writes for an entry happen here.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{
    Document, Event, EventKind, Licitation, Lot, ParsedEntry, ParsedParty, Party, status,
};
use crate::storage::Stores;
use crate::utils::time::parse_instant;

/// Whether an entry created or updated its licitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
}

/// Why an entry was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Stored licitation is as new as the entry or newer
    Stale,
    /// Stored licitation carries no storage id
    MissingLicitationId,
    /// Contracting party is not stored or has no storage id
    MissingParty,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::Stale => "stale entry",
            SkipReason::MissingLicitationId => "stored licitation has no id",
            SkipReason::MissingParty => "contracting party missing or without id",
        };
        f.write_str(reason)
    }
}

/// Everything one applied entry wrote.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub action: ReconcileAction,

    /// Licitation as written
    pub licitation: Licitation,

    /// Stored licitation before the update, `None` on creation
    pub previous: Option<Licitation>,

    /// Party as written, `None` when it was left untouched
    pub party: Option<Party>,

    pub lots_created: Vec<Lot>,
    pub lots_updated: Vec<Lot>,
    pub documents_created: Vec<Document>,
    pub documents_updated: Vec<Document>,

    /// Derived events in emission order
    pub events: Vec<Event>,
}

/// Outcome of reconciling one entry.
#[derive(Debug)]
pub enum EntryOutcome {
    Applied(Box<Reconciliation>),
    Skipped(SkipReason),
}

/// Applies parsed entries onto the record store.
pub struct Reconciler<'a> {
    stores: &'a Stores,
}

impl<'a> Reconciler<'a> {
    pub fn new(stores: &'a Stores) -> Self {
        Self { stores }
    }

    /// Reconcile one entry. Safe to repeat: a second pass over the same entry
    /// is classified stale and writes nothing.
    pub async fn reconcile(&self, entry: &ParsedEntry) -> Result<EntryOutcome> {
        let parsed_party = entry.party.as_ref().ok_or_else(|| {
            AppError::malformed(&entry.entry_id, "no NIF-identified contracting party")
        })?;

        let stored = self
            .stores
            .licitations
            .get_by_external_id(&entry.entry_id)
            .await?;
        let party = self.stores.parties.get_by_tax_id(&parsed_party.nif).await?;

        match stored {
            None => self.create(entry, parsed_party, party).await,
            Some(licitation) => self.update(entry, parsed_party, licitation, party).await,
        }
    }

    async fn create(
        &self,
        entry: &ParsedEntry,
        parsed_party: &ParsedParty,
        party: Option<Party>,
    ) -> Result<EntryOutcome> {
        let (party_id, written_party) = match party {
            None => {
                let mut created = Party::from_parsed(parsed_party);
                let id = self.stores.parties.create(&created).await?;
                created.id = Some(id.clone());
                (id, Some(created))
            }
            Some(mut existing) => {
                let Some(id) = existing.id.clone() else {
                    return Ok(EntryOutcome::Skipped(SkipReason::MissingParty));
                };
                if existing.is_stale_against(parsed_party) {
                    existing.apply_update(parsed_party);
                    self.stores.parties.save(&existing).await?;
                    (id, Some(existing))
                } else {
                    (id, None)
                }
            }
        };

        let mut licitation = Licitation::from_parsed(entry, party_id);
        let licitation_id = self.stores.licitations.create(&licitation).await?;
        licitation.id = Some(licitation_id.clone());

        let lots: Vec<Lot> = entry
            .lots
            .iter()
            .map(|parsed| Lot::from_parsed(parsed, licitation_id.as_str()))
            .collect();
        let documents: Vec<Document> = entry
            .documents
            .iter()
            .map(|parsed| Document::from_parsed(parsed, licitation_id.as_str()))
            .collect();
        self.stores.lots.create(&lots).await?;
        self.stores.documents.create(&documents).await?;

        let mut events: Vec<Event> = lots
            .iter()
            .filter(|lot| lot.has_winner())
            .map(|lot| {
                Event::lot_awarded(
                    licitation_id.as_str(),
                    lot.lot_id.as_str(),
                    lot.awarded_at().unwrap_or(licitation.updated),
                )
            })
            .collect();
        if let Some(event) = creation_status_event(&licitation, &licitation_id, lots.len()) {
            events.push(event);
        }
        self.stores.events.append(&events).await?;

        Ok(EntryOutcome::Applied(Box::new(Reconciliation {
            action: ReconcileAction::Created,
            licitation,
            previous: None,
            party: written_party,
            lots_created: lots,
            lots_updated: Vec::new(),
            documents_created: documents,
            documents_updated: Vec::new(),
            events,
        })))
    }

    async fn update(
        &self,
        entry: &ParsedEntry,
        parsed_party: &ParsedParty,
        mut licitation: Licitation,
        party: Option<Party>,
    ) -> Result<EntryOutcome> {
        let Some(licitation_id) = licitation.id.clone() else {
            return Ok(EntryOutcome::Skipped(SkipReason::MissingLicitationId));
        };
        let Some(mut party) = party.filter(|p| p.id.is_some()) else {
            return Ok(EntryOutcome::Skipped(SkipReason::MissingParty));
        };
        if licitation.updated >= entry.updated {
            return Ok(EntryOutcome::Skipped(SkipReason::Stale));
        }

        let previous = licitation.clone();
        let previous_adj = licitation.lots_adj;
        let mut stored_lots = self.stores.lots.get_by_licitation(&licitation).await?;
        let mut stored_documents = self.stores.documents.get_by_licitation(&licitation).await?;

        let mut events = Vec::new();
        if let Some(kind) = transition_event(previous.status(), entry.status()) {
            events.push(Event::new(kind, licitation_id.as_str(), entry.updated));
        }

        licitation.apply_update(entry);

        let mut lots_created = Vec::new();
        let mut touched_lots = Vec::new();
        for parsed in &entry.lots {
            match stored_lots.iter().position(|lot| lot.lot_id == parsed.lot_id) {
                None => lots_created.push(Lot::from_parsed(parsed, licitation_id.as_str())),
                Some(index) => {
                    let lot = &mut stored_lots[index];
                    if !lot.has_winner() && parsed.fields.result.has_winner() {
                        let at = parsed
                            .fields
                            .result
                            .award_date
                            .as_deref()
                            .and_then(parse_instant)
                            .unwrap_or(licitation.updated);
                        events.push(Event::lot_awarded(licitation_id.as_str(), lot.lot_id.as_str(), at));
                    }
                    lot.apply_update(parsed);
                    touch(&mut touched_lots, index);
                }
            }
        }

        let mut documents_created = Vec::new();
        let mut touched_documents = Vec::new();
        for parsed in &entry.documents {
            match stored_documents.iter().position(|doc| doc.doc_id == parsed.doc_id) {
                None => {
                    documents_created.push(Document::from_parsed(parsed, licitation_id.as_str()))
                }
                Some(index) => {
                    stored_documents[index].apply_update(parsed);
                    touch(&mut touched_documents, index);
                }
            }
        }

        let total_lots = (stored_lots.len() + lots_created.len()) as u32;
        if previous_adj < total_lots && licitation.lots_adj == total_lots {
            events.push(Event::new(
                EventKind::Awarded,
                licitation_id.as_str(),
                licitation.awarded_at(),
            ));
        }

        party.apply_update(parsed_party);

        let lots_updated = pick(&stored_lots, &touched_lots);
        let documents_updated = pick(&stored_documents, &touched_documents);

        self.stores.parties.save(&party).await?;
        self.stores.licitations.save(&licitation).await?;
        self.stores.lots.save(&lots_updated).await?;
        self.stores.lots.create(&lots_created).await?;
        self.stores.documents.save(&documents_updated).await?;
        self.stores.documents.create(&documents_created).await?;
        self.stores.events.append(&events).await?;

        Ok(EntryOutcome::Applied(Box::new(Reconciliation {
            action: ReconcileAction::Updated,
            licitation,
            previous: Some(previous),
            party: Some(party),
            lots_created,
            lots_updated,
            documents_created,
            documents_updated,
            events,
        })))
    }
}

fn pick<T: Clone>(records: &[T], positions: &[usize]) -> Vec<T> {
    positions.iter().filter_map(|&i| records.get(i).cloned()).collect()
}

/// Remember a touched position once.
fn touch(positions: &mut Vec<usize>, index: usize) {
    if !positions.contains(&index) {
        positions.push(index);
    }
}

/// Status event for a newly created licitation.
fn creation_status_event(
    licitation: &Licitation,
    licitation_id: &str,
    total_lots: usize,
) -> Option<Event> {
    let (kind, at): (EventKind, DateTime<Utc>) = match licitation.status()? {
        status::PUBLISHED => (EventKind::Created, licitation.published_at()),
        status::EVALUATION => (EventKind::FinishedSubmissionPeriod, licitation.updated),
        status::AWARDED if licitation.lots_adj as usize == total_lots => {
            (EventKind::Awarded, licitation.updated)
        }
        status::RESOLVED => (EventKind::Resolved, licitation.updated),
        _ => return None,
    };
    Some(Event::new(kind, licitation_id, at))
}

/// Status transition event between the stored and the incoming status.
fn transition_event(previous: Option<&str>, incoming: Option<&str>) -> Option<EventKind> {
    match (previous, incoming) {
        (Some(status::PUBLISHED), Some(status::EVALUATION)) => {
            Some(EventKind::FinishedSubmissionPeriod)
        }
        (prev, Some(status::RESOLVED)) if prev != Some(status::RESOLVED) => {
            Some(EventKind::Resolved)
        }
        _ => None,
    }
}
