// src/services/notifier.rs

//! Digest delivery.
//!
//! A run hands its non-empty notification list to a [`Notifier`]. The webhook
//! notifier renders a subject, a plain-text body and an HTML body and POSTs
//! them as one JSON document; the log notifier writes the plain-text body to
//! the log.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use quick_xml::escape::escape;
use serde::Serialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, HttpConfig};
use crate::pipeline::notify::Notification;
use crate::services::fetcher::create_async_client;

/// Header carrying the webhook API key.
pub const API_KEY_HEADER: &str = "x-make-apikey";

/// Delivers a run's notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, items: &[Notification]) -> Result<()>;
}

/// Rendered digest, also the webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Human-readable licitation status.
pub fn status_label(code: &str) -> &str {
    match code {
        "PRE" => "Prior notice",
        "PUB" => "Open for submissions",
        "EV" => "Under evaluation",
        "ADJ" => "Awarded",
        "RES" => "Resolved",
        "ANUL" => "Cancelled",
        other => other,
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

fn event_detail(lot_name: Option<&str>, lot_id: Option<&str>) -> Option<String> {
    let bits: Vec<String> = [
        lot_name.map(|n| format!("lot: {n}")),
        lot_id.map(|id| format!("lot id: {id}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    (!bits.is_empty()).then(|| bits.join(", "))
}

/// Render the digest for a non-empty notification list.
pub fn render_digest(items: &[Notification], date: NaiveDate) -> Digest {
    let events: usize = items.iter().map(|n| n.events.len()).sum();
    let headline = format!(
        "{}, {}",
        plural(items.len(), "licitation"),
        plural(events, "event")
    );
    let subject = format!("Licitations: {headline} ({})", date.format("%Y-%m-%d"));

    Digest {
        subject,
        text: render_text(items, &headline),
        html: render_html(items, &headline, date),
    }
}

fn render_text(items: &[Notification], headline: &str) -> String {
    let mut lines = vec![format!("Licitation digest: {headline}"), String::new()];
    for item in items {
        lines.push(format!("* {}", item.title.as_deref().unwrap_or("(untitled)")));
        if let Some(url) = &item.platform_url {
            lines.push(format!("  URL: {url}"));
        }
        if let Some(code) = &item.status_code {
            lines.push(format!("  Status: {}", status_label(code)));
        }
        lines.push(format!("  Ref: {}", item.entry_id));

        for event in &item.events {
            lines.push(
                match event_detail(event.lot_name.as_deref(), event.lot_id.as_deref()) {
                    Some(detail) => format!("  - {} ({detail})", event.kind.label()),
                    None => format!("  - {}", event.kind.label()),
                },
            );
        }

        if !item.changes.is_empty() {
            lines.push("  Changes:".to_string());
            for change in &item.changes {
                lines.push(format!(
                    "    . {}: {}",
                    change.field,
                    change.after.as_deref().unwrap_or("")
                ));
            }
        }
        for doc in &item.new_documents {
            lines.push(format!("  New {} document: {}", doc.kind, doc.url));
        }
        lines.push(String::new());
    }
    lines.join("\n").trim_end().to_string()
}

fn render_html(items: &[Notification], headline: &str, date: NaiveDate) -> String {
    let mut rows = String::new();
    for item in items {
        let title = item.title.as_deref().unwrap_or("(untitled)");
        let status = item
            .status_code
            .as_deref()
            .map(|code| format!("Status: {} &middot; ", escape(status_label(code))))
            .unwrap_or_default();

        rows.push_str(&format!(
            "<tr><td style=\"padding:16px;border-top:1px solid #e2e8f0;\">\
             <div style=\"font-size:16px;font-weight:600;\">{}</div>\
             <div style=\"font-size:12px;color:#64748b;\">{}Ref: {}</div>",
            escape(title),
            status,
            escape(item.entry_id.as_str())
        ));

        if !item.events.is_empty() {
            rows.push_str("<ul>");
            for event in &item.events {
                let detail = event_detail(event.lot_name.as_deref(), event.lot_id.as_deref())
                    .map(|d| format!(" ({})", escape(d.as_str())))
                    .unwrap_or_default();
                rows.push_str(&format!("<li>{}{}</li>", escape(event.kind.label()), detail));
            }
            rows.push_str("</ul>");
        }

        if !item.changes.is_empty() {
            rows.push_str("<div style=\"font-size:13px;\"><b>Changes:</b><ul>");
            for change in &item.changes {
                rows.push_str(&format!(
                    "<li><span style=\"color:#475569\">{}:</span> {}</li>",
                    escape(change.field.as_str()),
                    escape(change.after.as_deref().unwrap_or(""))
                ));
            }
            rows.push_str("</ul></div>");
        }

        if let Some(url) = &item.platform_url {
            rows.push_str(&format!("<a href=\"{}\">View on platform</a>", escape(url.as_str())));
        }
        rows.push_str("</td></tr>");
    }

    format!(
        "<!doctype html><html><meta charset=\"utf-8\"><body style=\"margin:0;background:#f8fafc;\">\
         <table width=\"680\" cellspacing=\"0\" cellpadding=\"0\" style=\"background:#ffffff;\">\
         <tr><td style=\"padding:20px 24px;background:#0f172a;color:#e2e8f0;\">\
         <div style=\"font-size:18px;font-weight:700;\">Licitation digest: {}</div>\
         <div style=\"font-size:12px;\">{}</div></td></tr>{}\
         </table></body></html>",
        escape(headline),
        date.format("%A, %d %B %Y"),
        rows
    )
}

/// POSTs the digest as JSON to a webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
    api_key: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, api_key: impl Into<String>, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(http)?,
            url: Url::parse(url)?,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, items: &[Notification]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let digest = render_digest(items, Utc::now().date_naive());

        let response = self
            .client
            .post(self.url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&digest)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::notifier(format!("webhook returned {status}: {body}")));
        }
        log::info!("Digest delivered: {}", digest.subject);
        Ok(())
    }
}

/// Writes the plain-text digest to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, items: &[Notification]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let digest = render_digest(items, Utc::now().date_naive());
        log::info!("{}", digest.subject);
        for line in digest.text.lines() {
            log::info!("  {}", line);
        }
        Ok(())
    }
}

/// Webhook notifier when one is configured, log notifier otherwise.
pub fn notifier_from_config(config: &Config) -> Result<Box<dyn Notifier>> {
    match &config.notifier.webhook_url {
        Some(url) => {
            let api_key = config
                .notifier
                .api_key
                .clone()
                .ok_or_else(|| AppError::config("notifier.webhook_url requires notifier.api_key"))?;
            Ok(Box::new(WebhookNotifier::new(url, api_key, &config.http)?))
        }
        None => Ok(Box::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;
    use crate::pipeline::notify::{FieldChange, NotifiedEvent};
    use crate::utils::time::parse_instant;

    fn item(title: &str) -> Notification {
        Notification {
            licitation_id: "lic-1".into(),
            entry_id: "https://contratos.example.org/entry/1".into(),
            title: Some(title.into()),
            platform_url: Some("https://contratos.example.org/detalle?id=1&v=2".into()),
            status_code: Some("EV".into()),
            is_new: false,
            events: vec![NotifiedEvent {
                kind: EventKind::LotAwarded,
                created_at: parse_instant("2025-04-28").unwrap(),
                lot_id: Some("2".into()),
                lot_name: Some("Vans".into()),
            }],
            changes: vec![FieldChange {
                field: "status_code".into(),
                before: Some("PUB".into()),
                after: Some("EV".into()),
            }],
            awarded_lots: Vec::new(),
            new_documents: Vec::new(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 2).unwrap()
    }

    #[test]
    fn test_subject_counts() {
        let one = render_digest(&[item("A")], date());
        assert_eq!(one.subject, "Licitations: 1 licitation, 1 event (2025-05-02)");

        let two = render_digest(&[item("A"), item("B")], date());
        assert_eq!(two.subject, "Licitations: 2 licitations, 2 events (2025-05-02)");
    }

    #[test]
    fn test_text_body() {
        let digest = render_digest(&[item("Vehicle leasing")], date());
        assert!(digest.text.contains("* Vehicle leasing"));
        assert!(digest.text.contains("  Status: Under evaluation"));
        assert!(digest.text.contains("  - Lot awarded (lot: Vans, lot id: 2)"));
        assert!(digest.text.contains("    . status_code: EV"));
    }

    #[test]
    fn test_text_body_layout() {
        let digest = render_digest(&[item("A"), item("B")], date());
        let expected = [
            "Licitation digest: 2 licitations, 2 events",
            "",
            "* A",
            "  URL: https://contratos.example.org/detalle?id=1&v=2",
            "  Status: Under evaluation",
            "  Ref: https://contratos.example.org/entry/1",
            "  - Lot awarded (lot: Vans, lot id: 2)",
            "  Changes:",
            "    . status_code: EV",
            "",
            "* B",
        ];
        let lines: Vec<&str> = digest.text.lines().take(expected.len()).collect();
        assert_eq!(lines, expected);
        assert!(digest.text.ends_with("    . status_code: EV"));
    }

    #[test]
    fn test_html_is_escaped() {
        let digest = render_digest(&[item("Fleet <2025> & co")], date());
        assert!(digest.html.contains("Fleet &lt;2025&gt; &amp; co"));
        assert!(!digest.html.contains("<2025>"));
        assert!(digest.html.contains("id=1&amp;v=2"));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label("ADJ"), "Awarded");
        assert_eq!(status_label("ANUL"), "Cancelled");
        assert_eq!(status_label("XYZ"), "XYZ");
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        assert!(notifier_from_config(&config).is_ok());

        config.notifier.webhook_url = Some("https://hook.example.org/abc".into());
        assert!(matches!(
            notifier_from_config(&config),
            Err(AppError::Config(_))
        ));

        config.notifier.api_key = Some("secret".into());
        assert!(notifier_from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_empty_list_sends_nothing() {
        let notifier = WebhookNotifier::new(
            "http://127.0.0.1:9/hook",
            "secret",
            &Config::default().http,
        )
        .unwrap();
        assert!(notifier.send(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_fails() {
        let notifier = WebhookNotifier::new(
            "http://127.0.0.1:9/hook",
            "secret",
            &Config::default().http,
        )
        .unwrap();
        assert!(notifier.send(&[item("A")]).await.is_err());
    }
}
