//! Domain events derived from feed changes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "licitation_created")]
    Created,
    #[serde(rename = "licitation_finished_submission_period")]
    FinishedSubmissionPeriod,
    #[serde(rename = "licitation_lot_awarded")]
    LotAwarded,
    #[serde(rename = "licitation_awarded")]
    Awarded,
    #[serde(rename = "licitation_resolved")]
    Resolved,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "licitation_created",
            EventKind::FinishedSubmissionPeriod => "licitation_finished_submission_period",
            EventKind::LotAwarded => "licitation_lot_awarded",
            EventKind::Awarded => "licitation_awarded",
            EventKind::Resolved => "licitation_resolved",
        }
    }

    /// Human-readable label for digests.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Created => "New licitation",
            EventKind::FinishedSubmissionPeriod => "Submission period finished",
            EventKind::LotAwarded => "Lot awarded",
            EventKind::Awarded => "Licitation awarded",
            EventKind::Resolved => "Licitation resolved",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable fact about a licitation.
///
/// `created_at` always comes from feed data, never from the wall clock,
/// so replays derive identical events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub licitation_id: String,
    pub lot_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind, licitation_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            licitation_id: licitation_id.into(),
            lot_id: None,
            created_at,
        }
    }

    pub fn lot_awarded(
        licitation_id: impl Into<String>,
        lot_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: EventKind::LotAwarded,
            licitation_id: licitation_id.into(),
            lot_id: Some(lot_id.into()),
            created_at,
        }
    }
}
