// src/pipeline/notify.rs

//! Per-licitation aggregation of what a run changed.
//!
//! Every applied reconciliation is folded into one [`Notification`] keyed by
//! the licitation's external id. Items keep first-seen order, and items with
//! neither events nor field changes are dropped on output.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::feed::tree::parse_amount;
use crate::models::{Document, Event, EventKind, Licitation, Lot};
use crate::pipeline::reconcile::{ReconcileAction, Reconciliation};
use crate::utils::time::parse_instant;

/// One event as shown in a digest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotifiedEvent {
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
    pub lot_id: Option<String>,
    pub lot_name: Option<String>,
}

/// A licitation field whose normalized value differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// Everything a run did to one licitation.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub licitation_id: String,
    pub entry_id: String,
    pub title: Option<String>,
    pub platform_url: Option<String>,
    pub status_code: Option<String>,
    pub is_new: bool,
    pub events: Vec<NotifiedEvent>,
    pub changes: Vec<FieldChange>,
    pub awarded_lots: Vec<Lot>,
    pub new_documents: Vec<Document>,
}

impl Notification {
    fn is_empty(&self) -> bool {
        self.events.is_empty() && self.changes.is_empty()
    }
}

/// Run-wide notification accumulator.
#[derive(Debug, Default)]
pub struct Notifications {
    items: Vec<Notification>,
    by_entry: HashMap<String, usize>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one applied reconciliation into the aggregate.
    pub fn record(&mut self, rec: &Reconciliation) {
        let lic = &rec.licitation;
        let index = match self.by_entry.get(&lic.entry_id) {
            Some(&i) => i,
            None => {
                self.items.push(Notification {
                    licitation_id: lic.id.clone().unwrap_or_default(),
                    entry_id: lic.entry_id.clone(),
                    title: None,
                    platform_url: None,
                    status_code: None,
                    is_new: rec.action == ReconcileAction::Created,
                    events: Vec::new(),
                    changes: Vec::new(),
                    awarded_lots: Vec::new(),
                    new_documents: Vec::new(),
                });
                self.by_entry
                    .insert(lic.entry_id.clone(), self.items.len() - 1);
                self.items.len() - 1
            }
        };
        let item = &mut self.items[index];

        // Header fields follow the latest snapshot.
        item.title = lic.fields.title.clone();
        item.platform_url = lic.fields.platform_url.clone();
        item.status_code = lic.fields.status_code.clone();

        let touched_lots: Vec<&Lot> = rec.lots_created.iter().chain(&rec.lots_updated).collect();
        for event in &rec.events {
            let lot = event
                .lot_id
                .as_deref()
                .and_then(|id| touched_lots.iter().find(|l| l.lot_id == id));
            item.events.push(notified(event, lot.copied()));
            if let Some(lot) = lot {
                if event.kind == EventKind::LotAwarded {
                    item.awarded_lots.push((*lot).clone());
                }
            }
        }

        if let Some(previous) = &rec.previous {
            for change in licitation_changes(previous, lic) {
                match item.changes.iter_mut().find(|c| c.field == change.field) {
                    Some(existing) => existing.after = change.after,
                    None => item.changes.push(change),
                }
            }
        }

        item.new_documents
            .extend(rec.documents_created.iter().cloned());
    }

    /// Number of licitations recorded, including empty ones.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Flat list of items that carry at least one event or change.
    pub fn into_items(self) -> Vec<Notification> {
        self.items.into_iter().filter(|n| !n.is_empty()).collect()
    }
}

fn notified(event: &Event, lot: Option<&Lot>) -> NotifiedEvent {
    NotifiedEvent {
        kind: event.kind,
        created_at: event.created_at,
        lot_id: event.lot_id.clone(),
        lot_name: lot.and_then(|l| l.fields.name.clone()),
    }
}

/// How a field is normalized before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Date,
    Amount,
    CodeSet,
    Text,
}

fn field_kind(field: &str) -> FieldKind {
    match field {
        "published_date" | "award_date" | "availability_end_date" | "submission_end_date" => {
            FieldKind::Date
        }
        "estimated_overall_cost"
        | "cost_with_taxes"
        | "cost_without_taxes"
        | "lower_tender_amount"
        | "higher_tender_amount"
        | "award_tax_exclusive"
        | "award_payable_amount" => FieldKind::Amount,
        "cpvs" => FieldKind::CodeSet,
        _ => FieldKind::Text,
    }
}

/// Display form of a leaf value.
fn display(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(|v| display(Some(v)))
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        other => Some(other.to_string()),
    }
}

fn code_set(value: Option<&Value>) -> BTreeSet<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| display(Some(v)))
            .collect(),
        other => display(other).into_iter().collect(),
    }
}

fn same_value(kind: FieldKind, before: Option<&Value>, after: Option<&Value>) -> bool {
    let (b, a) = (display(before), display(after));
    match kind {
        FieldKind::Date => match (b.as_deref().and_then(parse_instant), a.as_deref().and_then(parse_instant)) {
            (Some(x), Some(y)) => x == y,
            _ => b == a,
        },
        FieldKind::Amount => match (b.as_deref().and_then(parse_amount), a.as_deref().and_then(parse_amount)) {
            (Some(x), Some(y)) => (x - y).abs() < 0.005,
            _ => b == a,
        },
        FieldKind::CodeSet => code_set(before) == code_set(after),
        FieldKind::Text => b == a,
    }
}

/// Field-level differences between two snapshots of one licitation.
///
/// `updated` is bookkeeping and never reported.
pub fn licitation_changes(previous: &Licitation, current: &Licitation) -> Vec<FieldChange> {
    let (Ok(Value::Object(before)), Ok(Value::Object(after))) = (
        serde_json::to_value(&previous.fields),
        serde_json::to_value(&current.fields),
    ) else {
        return Vec::new();
    };

    let fields: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    let mut changes: Vec<FieldChange> = fields
        .into_iter()
        .filter(|field| !same_value(field_kind(field), before.get(*field), after.get(*field)))
        .map(|field| FieldChange {
            field: field.clone(),
            before: display(before.get(field)),
            after: display(after.get(field)),
        })
        .collect();

    if previous.lots_adj != current.lots_adj {
        changes.push(FieldChange {
            field: "lots_adj".into(),
            before: Some(previous.lots_adj.to_string()),
            after: Some(current.lots_adj.to_string()),
        });
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LicitationFields, status};

    fn licitation(fields: LicitationFields) -> Licitation {
        Licitation {
            id: Some("lic-1".into()),
            entry_id: "urn:1".into(),
            party_id: "party-1".into(),
            updated: parse_instant("2025-03-27T10:00:00Z").unwrap(),
            lots_adj: 0,
            fields,
        }
    }

    #[test]
    fn test_changes_normalize_dates_amounts_and_cpvs() {
        let before = licitation(LicitationFields {
            status_code: Some(status::PUBLISHED.into()),
            published_date: Some("2025-03-01+01:00".into()),
            submission_end_date: Some("2025-04-10".into()),
            cost_with_taxes: Some(1210.0),
            cpvs: vec!["34110000".into(), "34144900".into()],
            title: Some(" Vehicle leasing ".into()),
            ..LicitationFields::default()
        });
        let mut after = before.clone();
        after.updated = parse_instant("2025-03-28T10:00:00Z").unwrap();
        after.fields.published_date = Some("2025-02-28T23:00:00Z".into());
        after.fields.submission_end_date = Some("2025-04-10T00:00:00Z".into());
        after.fields.cpvs = vec!["34144900".into(), "34110000".into()];
        after.fields.title = Some("Vehicle leasing".into());

        assert!(licitation_changes(&before, &after).is_empty());

        after.fields.status_code = Some(status::EVALUATION.into());
        after.fields.cost_with_taxes = Some(1300.0);
        after.lots_adj = 1;
        let changes = licitation_changes(&before, &after);
        let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["cost_with_taxes", "status_code", "lots_adj"]);
        assert_eq!(changes[1].before.as_deref(), Some("PUB"));
        assert_eq!(changes[1].after.as_deref(), Some("EV"));
    }

    #[test]
    fn test_changes_report_new_values() {
        let before = licitation(LicitationFields::default());
        let after = licitation(LicitationFields {
            summary: Some("Status: EV".into()),
            ..LicitationFields::default()
        });
        assert_eq!(
            licitation_changes(&before, &after),
            vec![FieldChange {
                field: "summary".into(),
                before: None,
                after: Some("Status: EV".into()),
            }]
        );
    }
}
