//! Collaborators at the edge of the synchronization engine.
//!
//! - Feed transport (`AtomFetcher`, `HttpAtomFetcher`)
//! - Digest delivery (`Notifier`, `WebhookNotifier`, `LogNotifier`)

pub mod fetcher;
pub mod notifier;

pub use fetcher::{AtomFetcher, HttpAtomFetcher};
pub use notifier::{Digest, LogNotifier, Notifier, WebhookNotifier, notifier_from_config, render_digest};
