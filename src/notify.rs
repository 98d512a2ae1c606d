//! Change notifications
//!
//! Delivery is left to an external mailer. [`OutboxNotifier`] drops each
//! message as a JSON file into a directory that the mailer drains.

use crate::error::NotifyError;
use crate::pipeline::ReportPayload;
use crate::report::escape_html;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// A rendered notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

impl Message {
    /// Build the change email for `repository` from a pipeline payload
    pub fn for_report(
        from: impl Into<String>,
        to: Vec<String>,
        repository: &str,
        payload: &ReportPayload,
    ) -> Self {
        Self {
            from: from.into(),
            to,
            subject: format!("Benchmarks for {repository}"),
            html_body: compose_body(payload),
        }
    }
}

/// Email body: the HTML report (or the raw benchmarks on a first run)
/// followed by the snapshot locators
pub fn compose_body(payload: &ReportPayload) -> String {
    let mut body = String::new();

    if !payload.html_benchmarks.is_empty() {
        body.push_str(&payload.html_benchmarks);
        body.push_str("\n\n");
    } else if !payload.benchmarks.is_empty() {
        body.push_str("<pre>");
        body.push_str(&escape_html(&payload.benchmarks));
        body.push_str("</pre>\n\n");
    }

    body.push_str("<br />\n");
    if !payload.urls.is_empty() {
        body.push_str("The respective URLs are:\n<br />\n");
        for (variant, locator) in &payload.urls {
            body.push_str(&format!(
                "{} : {}\n<br />\n",
                escape_html(variant),
                escape_html(locator)
            ));
        }
    }

    body
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), NotifyError>;
}

/// Writes messages to `{outbox}/{unix_millis}-{seq}.json`
#[derive(Debug)]
pub struct OutboxNotifier {
    outbox: PathBuf,
    sequence: AtomicU64,
}

impl OutboxNotifier {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self {
            outbox: outbox.into(),
            sequence: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        if message.to.is_empty() {
            return Err(NotifyError::Delivery("no recipients".to_string()));
        }

        tokio::fs::create_dir_all(&self.outbox).await?;
        let name = format!(
            "{}-{}.json",
            chrono::Utc::now().timestamp_millis(),
            self.sequence.fetch_add(1, Ordering::Relaxed)
        );
        let path = self.outbox.join(name);
        tokio::fs::write(&path, serde_json::to_vec_pretty(message)?).await?;

        tracing::info!(
            to = %message.to.join(","),
            subject = %message.subject,
            path = %path.display(),
            "Notification queued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn payload(html: &str) -> ReportPayload {
        let mut urls = BTreeMap::new();
        urls.insert("latest".to_string(), "mem://b/repo/benchmarks/latest".to_string());
        urls.insert(
            "latest-results".to_string(),
            "mem://b/repo/benchmarks/latest-results".to_string(),
        );
        ReportPayload {
            urls,
            benchmarks: "BenchmarkFoo-8 600 ns/op".to_string(),
            html_benchmarks: html.to_string(),
        }
    }

    #[test]
    fn test_compose_body_with_html_report() {
        let body = compose_body(&payload("<table>rows</table>"));

        assert!(body.starts_with("<table>rows</table>"));
        assert!(body.contains("The respective URLs are:"));
        assert!(body.contains("latest : mem://b/repo/benchmarks/latest\n"));
        assert!(body.contains("latest-results : mem://b/repo/benchmarks/latest-results"));
    }

    #[test]
    fn test_compose_body_first_run_uses_raw_text() {
        let body = compose_body(&payload(""));
        assert!(body.starts_with("<pre>BenchmarkFoo-8 600 ns/op</pre>"));
    }

    #[test]
    fn test_compose_body_escapes_quotes_in_locators() {
        let mut report = payload("");
        report
            .urls
            .insert("latest".to_string(), "file:///srv/\"a\"/it's<b>".to_string());

        let body = compose_body(&report);
        assert!(body.contains("latest : file:///srv/&quot;a&quot;/it&#39;s&lt;b&gt;\n"));
        assert!(!body.contains("\"a\""));
    }

    #[test]
    fn test_message_subject() {
        let message = Message::for_report(
            "bench@example.com",
            vec!["dev@example.com".to_string()],
            "github.com/acme/widgets",
            &payload(""),
        );
        assert_eq!(message.subject, "Benchmarks for github.com/acme/widgets");
        assert_eq!(message.from, "bench@example.com");
    }

    #[tokio::test]
    async fn test_outbox_notifier_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = OutboxNotifier::new(dir.path().join("outbox"));
        let message = Message::for_report(
            "bench@example.com",
            vec!["dev@example.com".to_string()],
            "repo",
            &payload("<b>x</b>"),
        );

        notifier.send(&message).await.unwrap();
        notifier.send(&message).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path().join("outbox"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 2);

        let stored: Message = serde_json::from_slice(&std::fs::read(&files[0]).unwrap()).unwrap();
        assert_eq!(stored, message);
    }

    #[tokio::test]
    async fn test_outbox_notifier_requires_recipients() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = OutboxNotifier::new(dir.path());
        let message = Message::for_report("a@b", vec![], "repo", &payload(""));

        assert!(matches!(
            notifier.send(&message).await,
            Err(NotifyError::Delivery(_))
        ));
    }
}
