// ABOUTME: Wire protocol types for the Deskwire realtime sync connection.
// ABOUTME: Defines ServerEvent (inbound) and ClientCommand (outbound) tagged enums.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Inbound events (server -> client)
// =============================================================================

/// One inbound event per WebSocket text frame, tagged by event name.
///
/// The tag set is closed: an event name outside this enum fails to
/// deserialize and the caller drops the frame. This is a best-effort relay,
/// not a validated protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Chat message authored by a human agent or customer
    NewMessage(ChatPayload),
    /// Chat message produced by the assistant backend
    AiResponse(ChatPayload),
    /// A ticket was created
    NewTicket(TicketPayload),
    /// An outbound call was started for a customer
    CallInitiated(CallPayload),
    /// A ticket needs escalation to a human
    EscalationNeeded(EscalationPayload),
    /// An agent came online
    AgentJoined(AgentPresencePayload),
    /// An agent went offline
    AgentLeft(AgentPresencePayload),
}

/// Payload for `new_message` and `ai_response`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    /// Message text
    pub message: String,
    /// Ticket (topic room) the message belongs to
    pub ticket_id: String,
    /// Display name of the author; absent on assistant responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Assistant confidence in [0, 1]; only present on `ai_response`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Payload for `new_ticket`. Fields beyond `subject` are carried opaquely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketPayload {
    pub subject: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload for `call_initiated`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallPayload {
    pub customer_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload for `escalation_needed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EscalationPayload {
    pub ticket_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload for `agent_joined` and `agent_left`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentPresencePayload {
    pub agent_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Outbound commands (client -> server)
// =============================================================================

/// One outbound command per WebSocket text frame, tagged by event name.
///
/// All commands are fire-and-forget; the server sends no acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientCommand {
    #[serde(rename_all = "camelCase")]
    SendMessage {
        message: String,
        ticket_id: String,
        #[serde(rename = "isAIMessage")]
        is_ai_message: bool,
    },
    #[serde(rename_all = "camelCase")]
    RequestCall {
        customer_phone: String,
        purpose: String,
        priority: String,
    },
    /// Free-form ticket fields; the server owns the schema
    CreateTicket(Map<String, Value>),
    #[serde(rename_all = "camelCase")]
    AssignTicket { ticket_id: String, agent_id: String },
    AgentStatus { status: String, availability: String },
    #[serde(rename_all = "camelCase")]
    JoinTicket { ticket_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveTicket { ticket_id: String },
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_message_deserialize() {
        let json = r#"{"event": "new_message", "message": "hi", "ticketId": "T1", "userName": "harper"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::NewMessage(p) => {
                assert_eq!(p.message, "hi");
                assert_eq!(p.ticket_id, "T1");
                assert_eq!(p.user_name.as_deref(), Some("harper"));
                assert!(p.confidence.is_none());
            }
            other => panic!("expected NewMessage, got {:?}", other),
        }
    }

    #[test]
    fn test_ai_response_deserialize_with_confidence() {
        let json = r#"{"event": "ai_response", "message": "try restarting", "ticketId": "T2", "confidence": 0.82}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::AiResponse(p) => {
                assert_eq!(p.ticket_id, "T2");
                assert_eq!(p.confidence, Some(0.82));
                assert!(p.user_name.is_none());
            }
            other => panic!("expected AiResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_new_ticket_keeps_extra_fields() {
        let json = r#"{"event": "new_ticket", "subject": "Login broken", "priority": "high", "customerId": "C9"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::NewTicket(p) => {
                assert_eq!(p.subject, "Login broken");
                assert_eq!(p.extra.get("priority"), Some(&json!("high")));
                assert_eq!(p.extra.get("customerId"), Some(&json!("C9")));
            }
            other => panic!("expected NewTicket, got {:?}", other),
        }
    }

    #[test]
    fn test_escalation_deserialize() {
        let json = r#"{"event": "escalation_needed", "ticketId": "T7"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::EscalationNeeded(p) => assert_eq!(p.ticket_id, "T7"),
            other => panic!("expected EscalationNeeded, got {:?}", other),
        }
    }

    #[test]
    fn test_agent_presence_both_directions() {
        let joined: ServerEvent =
            serde_json::from_str(r#"{"event": "agent_joined", "agentName": "sam"}"#).unwrap();
        assert!(matches!(joined, ServerEvent::AgentJoined(_)));

        let left: ServerEvent =
            serde_json::from_str(r#"{"event": "agent_left", "agentName": "sam"}"#).unwrap();
        assert!(matches!(left, ServerEvent::AgentLeft(_)));
    }

    #[test]
    fn test_unknown_event_tag_rejected() {
        let json = r#"{"event": "typing_indicator", "ticketId": "T1"}"#;
        let result = serde_json::from_str::<ServerEvent>(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_event_missing_tag_rejected() {
        let result = serde_json::from_str::<ServerEvent>(r#"{"message": "hi"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_send_message_serialize() {
        let cmd = ClientCommand::SendMessage {
            message: "hello".to_string(),
            ticket_id: "T1".to_string(),
            is_ai_message: false,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"event\":\"send_message\""));
        assert!(json.contains("\"ticketId\":\"T1\""));
        assert!(json.contains("\"isAIMessage\":false"));
    }

    #[test]
    fn test_request_call_serialize() {
        let cmd = ClientCommand::RequestCall {
            customer_phone: "+910000000000".to_string(),
            purpose: "support".to_string(),
            priority: "medium".to_string(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"event\":\"request_call\""));
        assert!(json.contains("\"customerPhone\":\"+910000000000\""));
        assert!(json.contains("\"purpose\":\"support\""));
        assert!(json.contains("\"priority\":\"medium\""));
    }

    #[test]
    fn test_create_ticket_free_form() {
        let mut fields = Map::new();
        fields.insert("subject".to_string(), json!("VPN down"));
        fields.insert("priority".to_string(), json!("urgent"));
        let cmd = ClientCommand::CreateTicket(fields);
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"event\":\"create_ticket\""));
        assert!(json.contains("\"subject\":\"VPN down\""));
        assert!(json.contains("\"priority\":\"urgent\""));
    }

    #[test]
    fn test_agent_status_tag_spelling() {
        let cmd = ClientCommand::AgentStatus {
            status: "online".to_string(),
            availability: "available".to_string(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"event\":\"agent_status\""));
    }

    #[test]
    fn test_join_and_leave_ticket_serialize() {
        let join = ClientCommand::JoinTicket {
            ticket_id: "T3".to_string(),
        };
        let json = serde_json::to_string(&join).unwrap();
        assert!(json.contains("\"event\":\"join_ticket\""));
        assert!(json.contains("\"ticketId\":\"T3\""));

        let leave = ClientCommand::LeaveTicket {
            ticket_id: "T3".to_string(),
        };
        let json = serde_json::to_string(&leave).unwrap();
        assert!(json.contains("\"event\":\"leave_ticket\""));
    }

    #[test]
    fn test_command_round_trip() {
        let cmd = ClientCommand::AssignTicket {
            ticket_id: "T5".to_string(),
            agent_id: "A2".to_string(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let back: ClientCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, back);
    }
}
