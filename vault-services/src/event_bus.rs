//! Typed event bus for intra-service communication.
//!
//! Uses tokio broadcast channels to decouple services from one another.
//! Any service can emit events without knowing who is listening, and any
//! number of subscribers can independently consume events.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Application-level state changes that other components care about.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A document was written to the vault (user action or capture).
    DocumentSaved {
        document_id: i64,
        category: String,
    },
    /// Documents were removed.
    DocumentsDeleted {
        count: usize,
    },
    /// Message sync progress update.
    SyncProgress {
        phase: String,
        current: u64,
        total: Option<u64>,
    },
    /// A message sync finished and the message tables may have changed.
    MessagesUpdated {
        sms_processed: u64,
        mms_processed: u64,
        new_messages: u64,
        attachments_saved: u64,
    },
    /// An email was accepted by the outgoing queue.
    EmailQueued {
        subject: String,
    },
    /// The SMTP server accepted an email.
    EmailSent {
        subject: String,
    },
    /// Delivering an email failed. It is not retried.
    EmailFailed {
        subject: String,
        error: String,
    },
}

/// Application-wide event bus backed by a tokio broadcast channel.
///
/// Every subscriber gets every event. Slow subscribers that fall behind
/// receive a `Lagged` error and may miss events.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to receive application events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: AppEvent) {
        let label = event_label(&event);
        match self.sender.send(event) {
            Ok(count) => {
                debug!("event_bus: emitted {label} to {count} subscriber(s)");
            }
            Err(_) => {
                debug!("event_bus: no subscribers for {label}");
            }
        }
    }

    /// Get the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Human-readable label for an event (for logging).
fn event_label(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::DocumentSaved { .. } => "DocumentSaved",
        AppEvent::DocumentsDeleted { .. } => "DocumentsDeleted",
        AppEvent::SyncProgress { .. } => "SyncProgress",
        AppEvent::MessagesUpdated { .. } => "MessagesUpdated",
        AppEvent::EmailQueued { .. } => "EmailQueued",
        AppEvent::EmailSent { .. } => "EmailSent",
        AppEvent::EmailFailed { .. } => "EmailFailed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(AppEvent::DocumentSaved {
            document_id: 7,
            category: "messages".into(),
        });

        match rx.recv().await.unwrap() {
            AppEvent::DocumentSaved { document_id, category } => {
                assert_eq!(document_id, 7);
                assert_eq!(category, "messages");
            }
            _ => panic!("unexpected event type"),
        }
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(AppEvent::DocumentsDeleted { count: 42 });

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();

        match (e1, e2) {
            (AppEvent::DocumentsDeleted { count: c1 }, AppEvent::DocumentsDeleted { count: c2 }) => {
                assert_eq!(c1, 42);
                assert_eq!(c2, 42);
            }
            _ => panic!("unexpected event types"),
        }
    }

    #[tokio::test]
    async fn test_event_bus_no_subscribers() {
        let bus = EventBus::new(16);
        bus.emit(AppEvent::EmailSent { subject: "s".into() });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_labels() {
        assert_eq!(
            event_label(&AppEvent::MessagesUpdated {
                sms_processed: 0,
                mms_processed: 0,
                new_messages: 0,
                attachments_saved: 0,
            }),
            "MessagesUpdated"
        );
        assert_eq!(
            event_label(&AppEvent::EmailFailed { subject: String::new(), error: String::new() }),
            "EmailFailed"
        );
    }
}
