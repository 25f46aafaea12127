// src/models/lot.rs

//! Lot data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ParsedLot, TenderResult};
use crate::utils::time::parse_instant;

/// Lot id of the synthetic lot standing for a licitation without lot breakdown.
pub const NO_LOT_ID: &str = "0";

/// Stable composite key of a lot, independent of storage ids.
pub fn lot_ext_id(lot_id: &str, entry_id: &str) -> String {
    format!("{lot_id}_{entry_id}")
}

/// Descriptive lot fields carried by both feed entries and stored records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LotFields {
    pub name: Option<String>,
    pub cost_with_taxes: Option<f64>,
    pub cost_without_taxes: Option<f64>,
    #[serde(default)]
    pub cpvs: Vec<String>,
    pub place: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,

    #[serde(flatten)]
    pub result: TenderResult,
}

impl LotFields {
    /// Overwrite the fields that are set on `incoming`.
    pub fn merge(&mut self, incoming: &LotFields) {
        merge_set_fields!(self, incoming;
            name,
            cost_with_taxes,
            cost_without_taxes,
            place,
            city,
            zip,
            country,
        );
        if !incoming.cpvs.is_empty() {
            self.cpvs = incoming.cpvs.clone();
        }
        self.result.merge(&incoming.result);
    }
}

/// A lot as held in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    /// Storage-assigned id, unset until created
    pub id: Option<String>,

    /// Storage id of the owning licitation
    pub licitation_id: String,

    /// Lot id as published in the feed (`"0"` for the synthetic lot)
    pub lot_id: String,

    /// `"<lot_id>_<licitation entry id>"`
    pub ext_id: String,

    #[serde(flatten)]
    pub fields: LotFields,
}

impl Lot {
    /// Build a new lot for the given licitation from a parsed lot.
    pub fn from_parsed(parsed: &ParsedLot, licitation_id: impl Into<String>) -> Self {
        Self {
            id: None,
            licitation_id: licitation_id.into(),
            lot_id: parsed.lot_id.clone(),
            ext_id: parsed.ext_id.clone(),
            fields: parsed.fields.clone(),
        }
    }

    /// Apply a newer parsed lot onto this record.
    pub fn apply_update(&mut self, parsed: &ParsedLot) {
        self.fields.merge(&parsed.fields);
    }

    pub fn has_winner(&self) -> bool {
        self.fields.result.has_winner()
    }

    /// Instant of the lot award, if the feed published a parseable date.
    pub fn awarded_at(&self) -> Option<DateTime<Utc>> {
        self.fields.result.award_date.as_deref().and_then(parse_instant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed_lot(lot_id: &str) -> ParsedLot {
        ParsedLot {
            lot_id: lot_id.into(),
            ext_id: lot_ext_id(lot_id, "https://example.org/entry/9"),
            fields: LotFields {
                name: Some(format!("Lot {lot_id}")),
                cpvs: vec!["34410000".into()],
                ..LotFields::default()
            },
        }
    }

    #[test]
    fn test_ext_id_format() {
        assert_eq!(lot_ext_id("2", "urn:x"), "2_urn:x");
        assert_eq!(
            parsed_lot(NO_LOT_ID).ext_id,
            "0_https://example.org/entry/9"
        );
    }

    #[test]
    fn test_apply_update_sets_winner() {
        let mut lot = Lot::from_parsed(&parsed_lot("2"), "lic1");
        assert!(!lot.has_winner());

        let mut incoming = parsed_lot("2");
        incoming.fields.result.winning_nif = Some("B00000000".into());
        incoming.fields.result.award_date = Some("2025-06-02".into());
        lot.apply_update(&incoming);

        assert!(lot.has_winner());
        assert_eq!(lot.fields.name.as_deref(), Some("Lot 2"));
        assert_eq!(lot.awarded_at(), parse_instant("2025-06-02"));
    }
}
