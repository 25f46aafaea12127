// src/models/party.rs

//! Contracting authority data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ParsedParty;

/// Contact and address metadata of a contracting authority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartyFields {
    /// Buyer profile URL on the publishing platform
    pub profile_url: Option<String>,
    pub website: Option<String>,
    /// Administrative registry code
    pub dir3: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub zip: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl PartyFields {
    pub fn merge(&mut self, incoming: &PartyFields) {
        merge_set_fields!(self, incoming;
            profile_url,
            website,
            dir3,
            name,
            address,
            zip,
            city,
            country_code,
            country,
            phone,
            email,
        );
    }
}

/// A contracting authority, shared by every licitation it publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    /// Storage-assigned id, unset until created
    pub id: Option<String>,

    /// Tax id, globally unique
    pub nif: String,

    /// Feed timestamp of the entry this party was last refreshed from
    pub updated: DateTime<Utc>,

    #[serde(flatten)]
    pub fields: PartyFields,
}

impl Party {
    pub fn from_parsed(parsed: &ParsedParty) -> Self {
        Self {
            id: None,
            nif: parsed.nif.clone(),
            updated: parsed.updated,
            fields: parsed.fields.clone(),
        }
    }

    /// Whether `incoming` carries newer data than this record.
    pub fn is_stale_against(&self, incoming: &ParsedParty) -> bool {
        self.updated < incoming.updated
    }

    pub fn apply_update(&mut self, incoming: &ParsedParty) {
        self.updated = incoming.updated;
        self.fields.merge(&incoming.fields);
    }
}
