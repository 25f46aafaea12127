// src/pipeline/pager.rs

//! Cursor-driven walk over the feed's `next` chain.
//!
//! Pages are fetched newest first. Walking stops at the first page whose
//! feed-level `updated` is not strictly newer than the stored cursor, when a
//! page has no `next` link, or when a page fails to fetch or decode.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{ParsedDeletedEntry, ParsedEntry};
use crate::feed::decode_page;
use crate::pipeline::run::RunContext;
use crate::services::AtomFetcher;
use crate::utils;
use crate::utils::time::truncate_to_second;

/// Keeps entries carrying at least one CPV code under a watched prefix.
#[derive(Debug, Clone)]
pub struct CpvFilter {
    prefixes: Vec<String>,
}

impl CpvFilter {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// Plain string-prefix test. An empty code list never matches.
    pub fn matches(&self, cpvs: &[String]) -> bool {
        cpvs.iter()
            .any(|cpv| self.prefixes.iter().any(|p| cpv.starts_with(p.as_str())))
    }
}

/// What one walk accumulated.
#[derive(Debug, Default)]
pub struct PageWalk {
    /// Kept entries, newest page first
    pub entries: Vec<ParsedEntry>,
    pub deleted: Vec<ParsedDeletedEntry>,

    /// First page's `updated`, truncated to seconds
    pub new_cursor: Option<DateTime<Utc>>,

    pub pages_fetched: usize,
    /// Entries decoded on fetched pages, kept or not
    pub entries_seen: usize,
    /// Entries dropped for missing required fields
    pub rejected: usize,

    /// Walk stopped on a page failure rather than a clean end
    pub interrupted: bool,
}

impl PageWalk {
    /// Entries that decoded but matched no watched prefix.
    pub fn filtered_out(&self) -> usize {
        self.entries_seen - self.rejected - self.entries.len()
    }
}

pub struct Pager<'a> {
    fetcher: &'a dyn AtomFetcher,
    filter: CpvFilter,
}

impl<'a> Pager<'a> {
    pub fn new(fetcher: &'a dyn AtomFetcher, filter: CpvFilter) -> Self {
        Self { fetcher, filter }
    }

    /// Walk from `seed` until the cursor cutoff. Page failures end the walk
    /// and are reported through [`PageWalk::interrupted`], never raised.
    pub async fn walk(&self, seed: &str, cursor: DateTime<Utc>, ctx: &RunContext) -> PageWalk {
        let cutoff = truncate_to_second(cursor);
        let mut walk = PageWalk::default();
        let mut visited = HashSet::new();
        let mut next = Some(seed.to_string());

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                log::warn!("[{}] Page {} already visited, stopping", ctx.run_id, url);
                break;
            }

            let page = match self.fetcher.fetch(&url).await {
                Ok(raw) => decode_page(&raw),
                Err(e) => Err(e),
            };
            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    log::error!("[{}] Failed to process page {}: {}", ctx.run_id, url, e);
                    walk.interrupted = true;
                    break;
                }
            };
            walk.pages_fetched += 1;

            let updated = truncate_to_second(page.updated);
            if updated <= cutoff {
                log::info!(
                    "[{}] Page {} updated {} is not newer than cursor {}, stopping",
                    ctx.run_id,
                    url,
                    updated.to_rfc3339(),
                    cutoff.to_rfc3339()
                );
                break;
            }
            if walk.new_cursor.is_none() {
                walk.new_cursor = Some(updated);
            }

            walk.entries_seen += page.entries.len();
            let before = walk.entries.len();
            for entry in page.entries {
                match entry {
                    Ok(entry) if self.filter.matches(entry.cpvs()) => walk.entries.push(entry),
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("[{}] Rejected entry on {}: {}", ctx.run_id, url, e);
                        walk.rejected += 1;
                    }
                }
            }
            for deleted in &page.deleted {
                log::debug!(
                    "[{}] Deleted entry {} ({})",
                    ctx.run_id,
                    deleted.entry_id,
                    deleted.reason.as_deref().unwrap_or("no reason")
                );
            }
            walk.deleted.extend(page.deleted);

            log::info!(
                "[{}] Page {}: kept {} entries",
                ctx.run_id,
                url,
                walk.entries.len() - before
            );

            next = page.next.map(|href| utils::resolve(&url, &href));
        }

        walk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FeedBuilder, MapFetcher, TestEntry};
    use crate::utils::time::parse_instant;

    const SEED: &str = "https://feed.example.org/atom/licitaciones.atom";
    const PAGE2: &str = "https://feed.example.org/atom/licitaciones_20250401.atom";
    const PAGE3: &str = "https://feed.example.org/atom/licitaciones_20250301.atom";

    fn pager<'a>(fetcher: &'a MapFetcher, prefixes: &[&str]) -> Pager<'a> {
        Pager::new(
            fetcher,
            CpvFilter::new(prefixes.iter().map(|p| p.to_string()).collect()),
        )
    }

    fn entry(id: &str, updated: &str, cpvs: &[&str]) -> TestEntry {
        TestEntry::new(id, updated).party("P4613300E").cpvs(cpvs)
    }

    fn three_pages() -> MapFetcher {
        MapFetcher::new()
            .page(
                SEED,
                FeedBuilder::new("2025-05-01T10:00:00.750+02:00")
                    .next(PAGE2)
                    .entry(entry("urn:5", "2025-05-01T09:00:00+02:00", &["34110000"]))
                    .entry(entry("urn:4", "2025-04-30T09:00:00+02:00", &["45000000"]))
                    .deleted("urn:0", "2025-04-30T08:00:00+02:00", Some("ANULADA"))
                    .build(),
            )
            .page(
                PAGE2,
                FeedBuilder::new("2025-04-01T10:00:00+02:00")
                    .next(PAGE3)
                    .entry(entry("urn:3", "2025-04-01T09:00:00+02:00", &["34144900", "50110000"]))
                    .build(),
            )
            .page(
                PAGE3,
                FeedBuilder::new("2025-03-01T10:00:00+01:00")
                    .entry(entry("urn:2", "2025-03-01T09:00:00+01:00", &["34110000"]))
                    .build(),
            )
    }

    #[test]
    fn test_cpv_filter() {
        let filter = CpvFilter::new(vec!["341".into(), "5011".into()]);
        assert!(filter.matches(&["34110000".into()]));
        assert!(filter.matches(&["45000000".into(), "50110000".into()]));
        assert!(!filter.matches(&["45000000".into()]));
        assert!(!filter.matches(&[]));
        assert!(!CpvFilter::new(Vec::new()).matches(&["34110000".into()]));
    }

    #[tokio::test]
    async fn test_walk_stops_at_cursor() {
        let fetcher = three_pages();
        let ctx = RunContext::new();
        let walk = pager(&fetcher, &["341"])
            .walk(SEED, parse_instant("2025-03-15T00:00:00Z").unwrap(), &ctx)
            .await;

        let ids: Vec<&str> = walk.entries.iter().map(|e| e.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["urn:5", "urn:3"]);
        assert_eq!(walk.pages_fetched, 3);
        assert_eq!(walk.entries_seen, 3);
        assert_eq!(walk.filtered_out(), 1);
        assert_eq!(walk.deleted.len(), 1);
        assert_eq!(walk.new_cursor, parse_instant("2025-05-01T08:00:00Z"));
        assert!(!walk.interrupted);
        assert_eq!(fetcher.requests(), vec![SEED, PAGE2, PAGE3]);
    }

    #[tokio::test]
    async fn test_cutoff_compares_whole_seconds() {
        let fetcher = MapFetcher::new().page(
            SEED,
            FeedBuilder::new("2025-05-01T10:00:00.900Z")
                .entry(entry("urn:5", "2025-05-01T09:00:00Z", &["34110000"]))
                .build(),
        );
        let ctx = RunContext::new();
        let walk = pager(&fetcher, &["341"])
            .walk(SEED, parse_instant("2025-05-01T10:00:00.100Z").unwrap(), &ctx)
            .await;

        assert!(walk.entries.is_empty());
        assert_eq!(walk.entries_seen, 0);
        assert_eq!(walk.new_cursor, None);
        assert!(!walk.interrupted);
    }

    #[tokio::test]
    async fn test_relative_next_link_is_resolved() {
        let fetcher = MapFetcher::new()
            .page(
                SEED,
                FeedBuilder::new("2025-05-01T10:00:00Z")
                    .next("licitaciones_20250401.atom")
                    .build(),
            )
            .page(PAGE2, FeedBuilder::new("2025-04-01T10:00:00Z").build());
        let ctx = RunContext::new();
        let walk = pager(&fetcher, &["341"])
            .walk(SEED, parse_instant("2025-01-01T00:00:00Z").unwrap(), &ctx)
            .await;

        assert_eq!(fetcher.requests(), vec![SEED, PAGE2]);
        assert_eq!(walk.pages_fetched, 2);
    }

    #[tokio::test]
    async fn test_page_failure_keeps_accumulated_entries() {
        let fetcher = three_pages().failing(PAGE2);
        let ctx = RunContext::new();
        let walk = pager(&fetcher, &["341"])
            .walk(SEED, parse_instant("2025-01-01T00:00:00Z").unwrap(), &ctx)
            .await;

        assert!(walk.interrupted);
        assert_eq!(walk.entries.len(), 1);
        assert_eq!(walk.pages_fetched, 1);
        assert_eq!(fetcher.requests(), vec![SEED, PAGE2]);
    }

    #[tokio::test]
    async fn test_undecodable_page_interrupts() {
        let fetcher = MapFetcher::new().page(SEED, "<feed><entry></feed>");
        let ctx = RunContext::new();
        let walk = pager(&fetcher, &["341"])
            .walk(SEED, parse_instant("2025-01-01T00:00:00Z").unwrap(), &ctx)
            .await;

        assert!(walk.interrupted);
        assert_eq!(walk.pages_fetched, 0);
        assert_eq!(walk.new_cursor, None);
    }

    #[tokio::test]
    async fn test_next_loop_is_broken() {
        let fetcher = MapFetcher::new().page(
            SEED,
            FeedBuilder::new("2025-05-01T10:00:00Z").next(SEED).build(),
        );
        let ctx = RunContext::new();
        let walk = pager(&fetcher, &["341"])
            .walk(SEED, parse_instant("2025-01-01T00:00:00Z").unwrap(), &ctx)
            .await;

        assert_eq!(fetcher.requests(), vec![SEED]);
        assert!(!walk.interrupted);
    }

    #[tokio::test]
    async fn test_malformed_entry_is_rejected() {
        let fetcher = MapFetcher::new().page(
            SEED,
            FeedBuilder::new("2025-05-01T10:00:00Z")
                .entry(entry("urn:5", "", &["34110000"]))
                .entry(entry("urn:6", "2025-05-01T09:00:00Z", &["34110000"]))
                .build(),
        );
        let ctx = RunContext::new();
        let walk = pager(&fetcher, &["341"])
            .walk(SEED, parse_instant("2025-01-01T00:00:00Z").unwrap(), &ctx)
            .await;

        assert_eq!(walk.rejected, 1);
        assert_eq!(walk.entries.len(), 1);
        assert_eq!(walk.filtered_out(), 0);
    }
}
