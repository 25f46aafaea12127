// src/models/licitation.rs

//! Licitation (contract folder) data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ParsedEntry, TenderResult};
use crate::utils::time::parse_instant;

/// Lifecycle status codes that drive event derivation.
pub mod status {
    /// Published, open for submissions
    pub const PUBLISHED: &str = "PUB";
    /// Submission period over, under evaluation
    pub const EVALUATION: &str = "EV";
    /// Awarded
    pub const AWARDED: &str = "ADJ";
    /// Resolved
    pub const RESOLVED: &str = "RES";
}

/// Descriptive licitation fields carried by both feed entries and stored records.
///
/// Every field is optional so that an incoming entry can be applied onto a
/// stored record without clearing what the entry leaves out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LicitationFields {
    pub status_code: Option<String>,
    pub published_date: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub platform_url: Option<String>,

    // Procurement
    pub type_code: Option<u32>,
    pub subtype_code: Option<u32>,
    pub estimated_overall_cost: Option<f64>,
    pub cost_with_taxes: Option<f64>,
    pub cost_without_taxes: Option<f64>,
    #[serde(default)]
    pub cpvs: Vec<String>,
    pub place: Option<String>,
    pub realized_city: Option<String>,
    pub realized_zip: Option<String>,
    pub realized_country: Option<String>,
    pub estimated_duration: Option<String>,

    #[serde(flatten)]
    pub result: TenderResult,

    // Tendering process
    pub procedure_code: Option<u32>,
    pub urgency_code: Option<u32>,
    pub part_presentation_code: Option<u32>,
    pub contracting_system_code: Option<u32>,
    pub submission_method_code: Option<u32>,
    pub over_threshold_indicator: Option<bool>,

    // Deadlines
    pub availability_end_date: Option<String>,
    pub availability_end_time: Option<String>,
    pub submission_end_date: Option<String>,
    pub submission_end_time: Option<String>,
}

impl LicitationFields {
    /// Overwrite the fields that are set on `incoming`.
    pub fn merge(&mut self, incoming: &LicitationFields) {
        merge_set_fields!(self, incoming;
            status_code,
            published_date,
            title,
            summary,
            platform_url,
            type_code,
            subtype_code,
            estimated_overall_cost,
            cost_with_taxes,
            cost_without_taxes,
            place,
            realized_city,
            realized_zip,
            realized_country,
            estimated_duration,
            procedure_code,
            urgency_code,
            part_presentation_code,
            contracting_system_code,
            submission_method_code,
            over_threshold_indicator,
            availability_end_date,
            availability_end_time,
            submission_end_date,
            submission_end_time,
        );
        if !incoming.cpvs.is_empty() {
            self.cpvs = incoming.cpvs.clone();
        }
        self.result.merge(&incoming.result);
    }
}

/// A tender folder as held in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Licitation {
    /// Storage-assigned id, unset until created
    pub id: Option<String>,

    /// Permanent feed entry identifier
    pub entry_id: String,

    /// Storage id of the contracting authority
    pub party_id: String,

    /// Feed `updated` timestamp of the last applied entry
    pub updated: DateTime<Utc>,

    /// Number of lots with an award result
    pub lots_adj: u32,

    #[serde(flatten)]
    pub fields: LicitationFields,
}

impl Licitation {
    /// Build a new licitation from a parsed feed entry.
    pub fn from_parsed(entry: &ParsedEntry, party_id: impl Into<String>) -> Self {
        Self {
            id: None,
            entry_id: entry.entry_id.clone(),
            party_id: party_id.into(),
            updated: entry.updated,
            lots_adj: entry.lots_adj,
            fields: entry.fields.clone(),
        }
    }

    /// Apply a newer feed entry onto this record.
    pub fn apply_update(&mut self, entry: &ParsedEntry) {
        self.updated = entry.updated;
        self.lots_adj = entry.lots_adj;
        self.fields.merge(&entry.fields);
    }

    pub fn status(&self) -> Option<&str> {
        self.fields.status_code.as_deref()
    }

    pub fn has_status(&self, code: &str) -> bool {
        self.status() == Some(code)
    }

    /// Instant the licitation was first published, falling back to `updated`.
    pub fn published_at(&self) -> DateTime<Utc> {
        self.fields
            .published_date
            .as_deref()
            .and_then(parse_instant)
            .unwrap_or(self.updated)
    }

    /// Instant of the licitation-level award, falling back to `updated`.
    pub fn awarded_at(&self) -> DateTime<Utc> {
        self.fields
            .result
            .award_date
            .as_deref()
            .and_then(parse_instant)
            .unwrap_or(self.updated)
    }
}
