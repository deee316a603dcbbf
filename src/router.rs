// ABOUTME: Routes inbound server events into the local state logs.
// ABOUTME: Exhaustive match over the closed event set; one log entry per event.

use chrono::Utc;
use deskwire_proto::ServerEvent;
use serde::Serialize;
use serde_json::Value;

use crate::state::{
    Message, MessageOrigin, Notification, NotificationKind, SyncState, ASSISTANT_NAME,
};

/// Apply one inbound event to the state.
///
/// Every event appends exactly one entry to one of the two logs. Unknown
/// event names never reach this point; they fail to parse at the
/// connection and are dropped there.
pub fn apply_event(state: &mut SyncState, event: ServerEvent) {
    match event {
        ServerEvent::NewMessage(p) => {
            state.append_message(Message {
                text: p.message,
                ticket_id: p.ticket_id,
                origin: MessageOrigin::Human,
                author_name: p.user_name.unwrap_or_default(),
                timestamp: Utc::now(),
                confidence: None,
            });
        }
        ServerEvent::AiResponse(p) => {
            // Author name is forced; whatever the wire carries is ignored
            state.append_message(Message {
                text: p.message,
                ticket_id: p.ticket_id,
                origin: MessageOrigin::Assistant,
                author_name: ASSISTANT_NAME.to_string(),
                timestamp: Utc::now(),
                confidence: p.confidence,
            });
        }
        ServerEvent::NewTicket(p) => {
            let summary = format!("New ticket: {}", p.subject);
            state.append_notification(Notification::new(
                NotificationKind::TicketCreated,
                summary,
                payload_value(&p),
            ));
        }
        ServerEvent::CallInitiated(p) => {
            let summary = format!("Call initiated for {}", p.customer_name);
            state.append_notification(Notification::new(
                NotificationKind::CallInitiated,
                summary,
                payload_value(&p),
            ));
        }
        ServerEvent::EscalationNeeded(p) => {
            let summary = format!("Escalation needed for ticket: {}", p.ticket_id);
            state.append_notification(Notification::new(
                NotificationKind::Escalation,
                summary,
                payload_value(&p),
            ));
        }
        ServerEvent::AgentJoined(p) => {
            let summary = format!("{} joined", p.agent_name);
            state.append_notification(Notification::new(
                NotificationKind::AgentJoined,
                summary,
                payload_value(&p),
            ));
        }
        ServerEvent::AgentLeft(p) => {
            let summary = format!("{} left", p.agent_name);
            state.append_notification(Notification::new(
                NotificationKind::AgentLeft,
                summary,
                payload_value(&p),
            ));
        }
    }
}

/// Re-serialize a payload so the notification keeps the original event data.
fn payload_value<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

// =============================================================================
// Tests
// =============================================================================
