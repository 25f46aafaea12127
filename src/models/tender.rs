//! Tender result shared by licitations and lots.

use serde::{Deserialize, Serialize};

/// Outcome of the tendering for a licitation or one of its lots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenderResult {
    /// Result code from the feed's controlled vocabulary
    pub result_code: Option<u32>,
    pub award_date: Option<String>,
    pub received_tender_quantity: Option<u32>,
    pub lower_tender_amount: Option<f64>,
    pub higher_tender_amount: Option<f64>,

    /// Tax id of the winning bidder
    pub winning_nif: Option<String>,
    pub winning_name: Option<String>,
    pub winning_city: Option<String>,
    pub winning_zip: Option<String>,
    pub winning_country: Option<String>,

    pub award_tax_exclusive: Option<f64>,
    pub award_payable_amount: Option<f64>,
}

impl TenderResult {
    /// Result code for a lot the contracting authority desisted from.
    /// Such a lot is not awarded and never counts toward `lots_adj`.
    pub const DESISTED: u32 = 3;

    /// Result code for a tender declared void.
    pub const DECLARED_VOID: u32 = 4;

    /// Whether a winner has been identified.
    pub fn has_winner(&self) -> bool {
        self.winning_nif.is_some()
    }

    pub fn is_desisted(&self) -> bool {
        self.result_code == Some(Self::DESISTED)
    }

    pub fn is_declared_void(&self) -> bool {
        self.result_code == Some(Self::DECLARED_VOID)
    }

    /// Keep only the result code, dropping every other result field.
    pub fn code_only(&self) -> Self {
        Self {
            result_code: self.result_code,
            ..Self::default()
        }
    }

    /// Overwrite the fields that are set on `incoming`.
    pub fn merge(&mut self, incoming: &TenderResult) {
        merge_set_fields!(self, incoming;
            result_code,
            award_date,
            received_tender_quantity,
            lower_tender_amount,
            higher_tender_amount,
            winning_nif,
            winning_name,
            winning_city,
            winning_zip,
            winning_country,
            award_tax_exclusive,
            award_payable_amount,
        );
    }
}
