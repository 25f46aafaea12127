// src/pipeline/run.rs

//! One synchronization run: walk, reconcile, advance, notify.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::pipeline::notify::Notifications;
use crate::pipeline::pager::{CpvFilter, Pager};
use crate::pipeline::reconcile::{EntryOutcome, ReconcileAction, Reconciler, SkipReason};
use crate::services::{AtomFetcher, Notifier};
use crate::storage::Stores;
use crate::utils;

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub pages_fetched: usize,
    pub entries_seen: usize,
    pub entries_kept: usize,
    pub entries_filtered: usize,
    pub entries_rejected: usize,
    pub deleted_seen: usize,

    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub events_emitted: usize,
}

/// State threaded through one run.
#[derive(Debug)]
pub struct RunContext {
    pub run_id: String,
    pub started: DateTime<Utc>,
    pub stats: RunStats,
    pub notifications: Notifications,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started: Utc::now(),
            stats: RunStats::default(),
            notifications: Notifications::new(),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started: DateTime<Utc>,
    pub stats: RunStats,
    /// Cursor value persisted by this run, if it advanced
    pub cursor: Option<DateTime<Utc>>,
    /// Pagination stopped on a page failure
    pub interrupted: bool,
    /// Licitations handed to the notifier
    pub notified: usize,
}

/// Run one synchronization pass.
///
/// Only a missing cursor or a failing cursor read aborts the run. Page
/// failures end pagination, entry failures are logged and counted, and
/// notifier failures are logged after all writes are done.
pub async fn run_sync(
    config: &Config,
    stores: &Stores,
    fetcher: &dyn AtomFetcher,
    notifier: &dyn Notifier,
) -> Result<RunReport> {
    let timer = Instant::now();
    let mut ctx = RunContext::new();
    utils::log::header(&format!("Licitation sync {}", ctx.run_id));

    let cursor = stores
        .cursor
        .get_last()
        .await?
        .ok_or(AppError::MissingCursor)?;
    log::info!(
        "[{}] Resuming from cursor {}",
        ctx.run_id,
        cursor.last_extracted.to_rfc3339()
    );

    // Pages
    utils::log::step(1, 3, "Walking feed pages");
    let pager = Pager::new(fetcher, CpvFilter::new(config.feed.watched_prefixes()));
    let walk = pager.walk(&config.feed.url, cursor.last_extracted, &ctx).await;
    ctx.stats.pages_fetched = walk.pages_fetched;
    ctx.stats.entries_seen = walk.entries_seen;
    ctx.stats.entries_kept = walk.entries.len();
    ctx.stats.entries_filtered = walk.filtered_out();
    ctx.stats.entries_rejected = walk.rejected;
    ctx.stats.deleted_seen = walk.deleted.len();

    // Entries
    utils::log::step(2, 3, "Reconciling entries");
    let reconciler = Reconciler::new(stores);
    for entry in &walk.entries {
        ctx.stats.processed += 1;
        match reconciler.reconcile(entry).await {
            Ok(EntryOutcome::Applied(rec)) => {
                match rec.action {
                    ReconcileAction::Created => ctx.stats.created += 1,
                    ReconcileAction::Updated => ctx.stats.updated += 1,
                }
                ctx.stats.events_emitted += rec.events.len();
                log::debug!(
                    "[{}] {:?} {} with {} events",
                    ctx.run_id,
                    rec.action,
                    entry.entry_id,
                    rec.events.len()
                );
                ctx.notifications.record(&rec);
            }
            Ok(EntryOutcome::Skipped(reason)) => {
                ctx.stats.skipped += 1;
                if reason == SkipReason::Stale {
                    log::debug!("[{}] Skipped {}: {}", ctx.run_id, entry.entry_id, reason);
                } else {
                    log::warn!("[{}] Skipped {}: {}", ctx.run_id, entry.entry_id, reason);
                }
            }
            Err(e) => {
                ctx.stats.failed += 1;
                log::error!("[{}] Failed to process {}: {}", ctx.run_id, entry.entry_id, e);
            }
        }
    }

    let mut advanced = None;
    match walk.new_cursor {
        Some(at) if !walk.interrupted => {
            match stores.cursor.advance(at, walk.entries.len()).await {
                Ok(()) => advanced = Some(at),
                Err(e) => log::error!("[{}] Failed to advance cursor: {}", ctx.run_id, e),
            }
        }
        Some(_) => log::warn!(
            "[{}] Pagination interrupted, cursor left at {}",
            ctx.run_id,
            cursor.last_extracted.to_rfc3339()
        ),
        None => log::info!("[{}] No newer pages, cursor unchanged", ctx.run_id),
    }

    // Digest
    utils::log::step(3, 3, "Delivering digest");
    let items = std::mem::take(&mut ctx.notifications).into_items();
    let notified = items.len();
    if items.is_empty() {
        log::info!("[{}] Nothing to notify", ctx.run_id);
    } else if let Err(e) = notifier.send(&items).await {
        log::error!("[{}] Failed to deliver digest: {}", ctx.run_id, e);
    }

    let stats = &ctx.stats;
    utils::log::summary(
        "Sync completed",
        &[
            ("Run", ctx.run_id.clone()),
            ("Pages fetched", stats.pages_fetched.to_string()),
            (
                "Entries",
                format!(
                    "{} seen, {} kept, {} filtered, {} rejected",
                    stats.entries_seen,
                    stats.entries_kept,
                    stats.entries_filtered,
                    stats.entries_rejected
                ),
            ),
            ("Deleted markers", stats.deleted_seen.to_string()),
            (
                "Processed",
                format!(
                    "{} ({} created, {} updated, {} skipped, {} failed)",
                    stats.processed, stats.created, stats.updated, stats.skipped, stats.failed
                ),
            ),
            ("Events", stats.events_emitted.to_string()),
            ("Notified", notified.to_string()),
            (
                "Cursor",
                advanced
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "unchanged".to_string()),
            ),
            ("Duration", format!("{:.2?}", timer.elapsed())),
        ],
    );
    if !walk.interrupted {
        utils::log::success("Sync finished");
    }

    Ok(RunReport {
        run_id: ctx.run_id,
        started: ctx.started,
        stats: ctx.stats,
        cursor: advanced,
        interrupted: walk.interrupted,
        notified,
    })
}
