//! Pipeline entry points for synchronization runs.
//!
//! - `run_sync`: Walk new feed pages, reconcile kept entries, advance the cursor, deliver the digest
//! - `Pager`: Cursor-bounded walk over the feed's `next` chain
//! - `Reconciler`: Create-or-update of one entry with event derivation
//! - `Notifications`: Per-licitation aggregation of a run's changes

pub mod notify;
pub mod pager;
pub mod reconcile;
pub mod run;

pub use notify::{FieldChange, NotifiedEvent, Notification, Notifications, licitation_changes};
pub use pager::{CpvFilter, PageWalk, Pager};
pub use reconcile::{EntryOutcome, ReconcileAction, Reconciler, Reconciliation, SkipReason};
pub use run::{RunContext, RunReport, RunStats, run_sync};
