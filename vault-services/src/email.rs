//! Outgoing email.
//!
//! Emails are queued on a bounded channel and delivered one at a time by a
//! single background task. Queueing never blocks the caller: when the queue
//! is full the email is logged and dropped. Delivery results are only
//! logged and published on the event bus; nothing is retried.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vault_core::config::EmailConfig;
use vault_core::constants::{placeholders, DEFAULT_MIME_TYPE, SMTP_TIMEOUT_SECS};
use vault_core::error::{VaultError, VaultResult};

use crate::event_bus::{AppEvent, EventBus};

/// A file to attach, referenced by `file://` URI or plain path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub uri: String,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

impl EmailAttachment {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(self.uri.strip_prefix("file://").unwrap_or(&self.uri))
    }

    pub fn effective_mime_type(&self) -> &str {
        self.mime_type
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
    }

    pub fn effective_file_name(&self) -> &str {
        self.file_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(placeholders::ATTACHMENT_NAME)
    }
}

/// One email waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<EmailAttachment>,
}

impl OutgoingEmail {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: EmailAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Trimmed subject, or the no-subject placeholder.
    pub fn effective_subject(&self) -> &str {
        match self.subject.trim() {
            "" => placeholders::EMPTY_SUBJECT,
            s => s,
        }
    }

    /// Trimmed body, or the empty-message placeholder.
    pub fn effective_body(&self) -> &str {
        match self.body.trim() {
            "" => placeholders::EMPTY_BODY,
            b => b,
        }
    }
}

/// Attachment bytes read from disk, ready to go into a message.
#[derive(Debug, Clone)]
pub struct LoadedAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Read every attachment that can be read. Unreadable ones are logged and left out.
pub async fn load_attachments(attachments: &[EmailAttachment]) -> Vec<LoadedAttachment> {
    let mut loaded = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        let path = attachment.path();
        match tokio::fs::read(&path).await {
            Ok(bytes) => loaded.push(LoadedAttachment {
                file_name: attachment.effective_file_name().to_string(),
                mime_type: attachment.effective_mime_type().to_string(),
                bytes,
            }),
            Err(e) => warn!("unable to read attachment {}: {e}", path.display()),
        }
    }
    loaded
}

/// Build the MIME message: from the SMTP username to every configured
/// recipient, plain text, or multipart/mixed when attachments are present.
pub fn build_message(
    config: &EmailConfig,
    email: &OutgoingEmail,
    attachments: Vec<LoadedAttachment>,
) -> VaultResult<Message> {
    let from: Mailbox = config
        .username
        .trim()
        .parse()
        .map_err(|e| VaultError::Email(format!("invalid sender address: {e}")))?;

    let mut builder = Message::builder().from(from).subject(email.effective_subject());
    let recipients = config.recipients();
    if recipients.is_empty() {
        return Err(VaultError::Email("no recipient configured".into()));
    }
    for recipient in recipients {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| VaultError::Email(format!("invalid recipient {recipient}: {e}")))?;
        builder = builder.to(to);
    }

    let body = email.effective_body().to_string();
    let message = if attachments.is_empty() {
        builder.header(ContentType::TEXT_PLAIN).body(body)
    } else {
        let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(body));
        for attachment in attachments {
            let content_type = ContentType::parse(&attachment.mime_type)
                .or_else(|_| ContentType::parse(DEFAULT_MIME_TYPE))
                .map_err(|e| VaultError::Email(format!("invalid content type: {e}")))?;
            multipart = multipart
                .singlepart(Attachment::new(attachment.file_name).body(attachment.bytes, content_type));
        }
        builder.multipart(multipart)
    };

    message.map_err(|e| VaultError::Email(format!("failed to build message: {e}")))
}

/// Something that can deliver an email.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, config: &EmailConfig, email: &OutgoingEmail) -> VaultResult<()>;
}

/// SMTP delivery through lettre, with STARTTLS when the config asks for TLS.
#[derive(Debug, Default, Clone)]
pub struct SmtpMailTransport;

impl SmtpMailTransport {
    fn transport(config: &EmailConfig) -> VaultResult<AsyncSmtpTransport<Tokio1Executor>> {
        let credentials = Credentials::new(config.username.trim().to_string(), config.password.clone());
        let timeout = Some(Duration::from_secs(SMTP_TIMEOUT_SECS));

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(config.host.trim())
                .map_err(|e| VaultError::Email(format!("smtp relay {}: {e}", config.host)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.trim())
        };

        Ok(builder
            .port(config.port)
            .credentials(credentials)
            .timeout(timeout)
            .build())
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn deliver(&self, config: &EmailConfig, email: &OutgoingEmail) -> VaultResult<()> {
        let attachments = load_attachments(&email.attachments).await;
        let message = build_message(config, email, attachments)?;
        let transport = Self::transport(config)?;
        transport
            .send(message)
            .await
            .map_err(|e| VaultError::Email(format!("smtp send failed: {e}")))?;
        Ok(())
    }
}

enum EmailJob {
    Deliver {
        config: EmailConfig,
        email: OutgoingEmail,
    },
    Shutdown,
}

/// Handle to the single email worker. Cloning shares the same queue.
#[derive(Clone)]
pub struct EmailSender {
    tx: mpsc::Sender<EmailJob>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    event_bus: EventBus,
}

impl EmailSender {
    /// Start the worker task. Must be called inside a tokio runtime.
    pub fn spawn(transport: Arc<dyn MailTransport>, capacity: usize, event_bus: EventBus) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(transport, rx, event_bus.clone()));
        info!("email worker started (queue capacity {})", capacity.max(1));
        Self {
            tx,
            worker: Arc::new(Mutex::new(Some(handle))),
            event_bus,
        }
    }

    /// Queue an email without waiting. Returns false when it was dropped.
    pub fn send(&self, config: EmailConfig, email: OutgoingEmail) -> bool {
        let subject = email.effective_subject().to_string();
        match self.tx.try_send(EmailJob::Deliver { config, email }) {
            Ok(()) => {
                debug!("queued email \"{subject}\"");
                self.event_bus.emit(AppEvent::EmailQueued { subject });
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("email queue full, dropping \"{subject}\"");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("email worker stopped, dropping \"{subject}\"");
                false
            }
        }
    }

    /// Deliver everything already queued, then stop the worker. Every
    /// clone refuses new emails once the worker has closed the queue.
    pub async fn shutdown(&self) {
        let handle = self.worker.lock().await.take();
        let Some(handle) = handle else {
            return;
        };
        if self.tx.send(EmailJob::Shutdown).await.is_err() {
            debug!("email worker already stopped");
        }
        if let Err(e) = handle.await {
            error!("email worker panicked: {e}");
        }
        info!("email worker stopped");
    }
}

async fn run_worker(
    transport: Arc<dyn MailTransport>,
    mut rx: mpsc::Receiver<EmailJob>,
    event_bus: EventBus,
) {
    while let Some(job) = rx.recv().await {
        let (config, email) = match job {
            EmailJob::Deliver { config, email } => (config, email),
            EmailJob::Shutdown => {
                // Refuse new jobs but still deliver the ones already accepted.
                rx.close();
                continue;
            }
        };
        let subject = email.effective_subject().to_string();
        match transport.deliver(&config, &email).await {
            Ok(()) => {
                info!("email \"{subject}\" sent");
                event_bus.emit(AppEvent::EmailSent { subject });
            }
            Err(e) => {
                error!("failed to send email \"{subject}\": {e}");
                event_bus.emit(AppEvent::EmailFailed {
                    subject,
                    error: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn config() -> EmailConfig {
        EmailConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "vault@example.com".into(),
            password: "pw".into(),
            recipient: "me@example.com, backup@example.com".into(),
            use_tls: true,
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl MailTransport for Recorder {
        async fn deliver(&self, _config: &EmailConfig, email: &OutgoingEmail) -> VaultResult<()> {
            self.sent.lock().unwrap().push(email.effective_subject().to_string());
            if email.subject == "fail" {
                return Err(VaultError::Email("boom".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_placeholders() {
        let email = OutgoingEmail::new("  ", "\n");
        assert_eq!(email.effective_subject(), "(No subject)");
        assert_eq!(email.effective_body(), "(Empty message)");
        let email = OutgoingEmail::new(" Hi ", " there ");
        assert_eq!(email.effective_subject(), "Hi");
        assert_eq!(email.effective_body(), "there");
    }

    #[test]
    fn test_attachment_defaults() {
        let att = EmailAttachment {
            uri: "file:///tmp/x.jpg".into(),
            mime_type: None,
            file_name: Some(" ".into()),
        };
        assert_eq!(att.path(), PathBuf::from("/tmp/x.jpg"));
        assert_eq!(att.effective_mime_type(), "application/octet-stream");
        assert_eq!(att.effective_file_name(), "attachment");
    }

    #[test]
    fn test_build_plain_message() {
        let msg = build_message(&config(), &OutgoingEmail::new("Subject", "Body"), Vec::new()).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("Subject: Subject"));
        assert!(raw.contains("From: vault@example.com"));
        assert!(raw.contains("backup@example.com"));
        assert!(raw.contains("Body"));
    }

    #[test]
    fn test_build_multipart_message() {
        let loaded = vec![LoadedAttachment {
            file_name: "cat.jpg".into(),
            mime_type: "image/jpeg".into(),
            bytes: vec![1, 2, 3],
        }];
        let msg = build_message(&config(), &OutgoingEmail::new("S", "B"), loaded).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("cat.jpg"));
        assert!(raw.contains("image/jpeg"));
    }

    #[test]
    fn test_build_rejects_bad_sender() {
        let mut cfg = config();
        cfg.username = "not an address".into();
        assert!(build_message(&cfg, &OutgoingEmail::new("S", "B"), Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_unreadable_attachment_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("good.txt");
        std::fs::write(&good, "data").unwrap();
        let attachments = vec![
            EmailAttachment { uri: good.to_string_lossy().into_owned(), mime_type: None, file_name: None },
            EmailAttachment { uri: "file:///definitely/missing".into(), mime_type: None, file_name: None },
        ];
        let loaded = load_attachments(&attachments).await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].bytes, b"data");
    }

    #[tokio::test]
    async fn test_worker_delivers_in_order_and_drains() {
        let recorder = Arc::new(Recorder::default());
        let bus = EventBus::new(32);
        let mut events = bus.subscribe();
        let sender = EmailSender::spawn(recorder.clone(), 8, bus);

        assert!(sender.send(config(), OutgoingEmail::new("one", "")));
        assert!(sender.send(config(), OutgoingEmail::new("fail", "")));
        assert!(sender.send(config(), OutgoingEmail::new("two", "")));
        sender.shutdown().await;

        assert_eq!(*recorder.sent.lock().unwrap(), vec!["one", "fail", "two"]);
        assert!(!sender.send(config(), OutgoingEmail::new("late", "")));

        let mut failed = 0;
        while let Ok(event) = events.try_recv() {
            if let AppEvent::EmailFailed { subject, .. } = event {
                assert_eq!(subject, "fail");
                failed += 1;
            }
        }
        assert_eq!(failed, 1);
    }

    #[tokio::test]
    async fn test_send_racing_shutdown_is_delivered_or_refused() {
        let recorder = Arc::new(Recorder::default());
        let sender = EmailSender::spawn(recorder.clone(), 8, EventBus::new(8));
        let clone = sender.clone();

        // Shutdown is queued but the worker has not reached it yet.
        assert!(sender.tx.try_send(EmailJob::Shutdown).is_ok());
        assert!(clone.send(config(), OutgoingEmail::new("late", "")));

        sender.shutdown().await;
        assert_eq!(*recorder.sent.lock().unwrap(), vec!["late"]);
        assert!(!clone.send(config(), OutgoingEmail::new("after", "")));
    }
}
