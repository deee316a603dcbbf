// ABOUTME: Local state fed by the sync connection: chat messages and notifications.
// ABOUTME: Two append-only logs with explicit clear/remove, read by the UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Display name stamped on every assistant-originated message.
pub const ASSISTANT_NAME: &str = "AI Assistant";

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    Human,
    Assistant,
}

/// A chat log entry. Appended in arrival order, never mutated or removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub text: String,
    /// Ticket (topic room) the message belongs to
    pub ticket_id: String,
    pub origin: MessageOrigin,
    pub author_name: String,
    pub timestamp: DateTime<Utc>,
    /// Assistant confidence in [0, 1]; never set on human messages
    pub confidence: Option<f64>,
}

/// What triggered a notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    TicketCreated,
    CallInitiated,
    Escalation,
    AgentJoined,
    AgentLeft,
}

/// A notification log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Human-readable text derived from the triggering event
    pub summary: String,
    /// Original event data, opaque to the sync layer
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    pub fn new(kind: NotificationKind, summary: String, payload: Value) -> Self {
        Self {
            kind,
            summary,
            payload,
            timestamp: Utc::now(),
            read: false,
        }
    }
}

/// The two logs the rest of the application reads.
///
/// The connection task is the sole event writer; UI-triggered clear/remove
/// go through the same lock the client holds, so entries are never
/// reordered or deduplicated. Logs are unbounded and survive a
/// disconnect/reconnect cycle.
#[derive(Debug, Default)]
pub struct SyncState {
    messages: Vec<Message>,
    notifications: Vec<Notification>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn append_notification(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Empty the notification log.
    pub fn clear_notifications(&mut self) {
        self.notifications.clear();
    }

    /// Remove the notification at `index`, preserving relative order of the
    /// rest. Out-of-range indices are ignored.
    pub fn remove_notification(&mut self, index: usize) {
        if index < self.notifications.len() {
            self.notifications.remove(index);
        }
    }

    /// Count of notifications not yet marked read.
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }
}

// =============================================================================
// Tests
// =============================================================================
