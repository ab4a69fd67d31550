//! Completion reports for finished scans.
//!
//! The default [`OutboxNotifier`] writes each report into an outbox
//! directory so an external mailer can pick it up. Delivery failures are
//! logged and never retried; a report is a convenience, not part of the
//! durable result.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Recipient address failed validation
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Minimal shape check for a recipient address.
///
/// Requires an `@`, a `.` somewhere after it, and at least six characters
/// overall. Anything stricter belongs to the mailer, not to us.
pub fn validate_recipient(recipient: &str) -> Result<(), NotifyError> {
    let at = recipient.find('@');
    let valid = match at {
        Some(pos) => recipient.len() >= 6 && recipient[pos..].contains('.'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(NotifyError::InvalidRecipient(recipient.to_string()))
    }
}

/// A file attached to a report.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Suggested filename
    pub filename: String,
    /// Raw content
    pub content: Vec<u8>,
}

/// Delivery channel for completion reports.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one report.
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        attachments: &[Attachment],
    ) -> Result<(), NotifyError>;
}

/// Writes reports into an outbox directory for an external mailer.
///
/// Each report becomes `<stamp>-<recipient>.txt` plus one file per
/// attachment under the same stamp.
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    /// Notifier targeting `dir`.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        attachments: &[Attachment],
    ) -> Result<(), NotifyError> {
        validate_recipient(recipient)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| NotifyError::Io(e.to_string()))?;

        let stamp = chrono::Utc::now().timestamp_millis();
        let safe_recipient = recipient.replace(['@', '/'], "_");
        let message_path = self.dir.join(format!("{stamp}-{safe_recipient}.txt"));
        let message = format!("To: {recipient}\nSubject: {subject}\n\n{body}\n");
        std::fs::write(&message_path, message).map_err(|e| NotifyError::Io(e.to_string()))?;

        for attachment in attachments {
            let path = self.dir.join(format!("{stamp}-{}", attachment.filename));
            std::fs::write(&path, &attachment.content)
                .map_err(|e| NotifyError::Io(e.to_string()))?;
        }

        info!(recipient, subject, attachments = attachments.len(), "report written to outbox");
        Ok(())
    }
}
