// ABOUTME: Owns the WebSocket connection lifecycle and the outbound command surface.
// ABOUTME: One connection per session; start/stop entry points driven by the session provider.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use uuid::Uuid;

use deskwire_proto::{ClientCommand, ServerEvent};

use crate::config::ServerConfig;
use crate::router::apply_event;
use crate::state::{Message as ChatMessage, Notification, SyncState};

/// Default purpose attached to a call request when the caller gives none.
pub const DEFAULT_CALL_PURPOSE: &str = "support";
/// Default priority attached to a call request when the caller gives none.
pub const DEFAULT_CALL_PRIORITY: &str = "medium";

/// Connection lifecycle states.
///
/// `Connecting` is transient; callers that only care about the outcome can
/// treat anything other than `Connected` as offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Opaque identity handle supplied by the session provider.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub id: String,
    pub display_name: String,
}

type SharedState = Arc<Mutex<SyncState>>;

/// Handle to the connection task of the active session.
struct Connection {
    outbound_tx: mpsc::Sender<ClientCommand>,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Realtime sync client for the support CRM.
///
/// The session provider drives the lifecycle explicitly: `start` when a user
/// session begins, `stop` when it ends. Inbound events land in the state
/// logs; outbound commands are fire-and-forget and silently dropped while
/// not connected, so they are safe to invoke at any time.
pub struct SyncClient {
    config: ServerConfig,
    state: SharedState,
    status_tx: watch::Sender<ConnectionStatus>,
    conn: Option<Connection>,
}

impl SyncClient {
    pub fn new(config: ServerConfig) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            config,
            state: Arc::new(Mutex::new(SyncState::new())),
            status_tx,
            conn: None,
        }
    }

    /// Open the session connection, authenticating with `credential` on the
    /// handshake. Returns immediately; watch `status` for the outcome. A
    /// rejected handshake is logged and leaves the status `Disconnected`,
    /// with no retry.
    ///
    /// At most one connection exists per session: if one is already live
    /// this is a no-op. Must be called from within a Tokio runtime.
    pub fn start(&mut self, identity: &AgentIdentity, credential: &str) {
        if let Some(conn) = &self.conn {
            if !conn.task.is_finished() {
                tracing::warn!("Session already has a live connection; ignoring start");
                return;
            }
        }

        let connection_id = Uuid::new_v4();
        tracing::info!(
            agent_id = %identity.id,
            agent_name = %identity.display_name,
            %connection_id,
            "Starting sync session"
        );

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_buffer);

        let task = tokio::spawn(run_connection(
            self.config.clone(),
            credential.to_string(),
            connection_id,
            Arc::clone(&self.state),
            self.status_tx.clone(),
            cancel_rx,
            outbound_rx,
        ));

        self.conn = Some(Connection {
            outbound_tx,
            cancel_tx,
            task,
        });
    }

    /// Close any open connection immediately and unconditionally. This is
    /// the only path that releases the transport; it works mid-handshake
    /// and discards any buffered-but-unsent commands.
    pub async fn stop(&mut self) {
        let Some(conn) = self.conn.take() else {
            tracing::debug!("stop called with no active session");
            return;
        };

        let _ = conn.cancel_tx.send(true);
        if let Err(e) = conn.task.await {
            tracing::error!(error = %e, "Connection task failed during shutdown");
        }
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
        tracing::info!("Sync session stopped");
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    /// Subscribe to status transitions.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    // =========================================================================
    // State reads and UI-triggered mutations
    // =========================================================================

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state().messages().to_vec()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state().notifications().to_vec()
    }

    pub fn unread_notifications(&self) -> usize {
        self.state().unread_count()
    }

    pub fn clear_notifications(&self) {
        self.state().clear_notifications();
    }

    pub fn remove_notification(&self, index: usize) {
        self.state().remove_notification(index);
    }

    fn state(&self) -> MutexGuard<'_, SyncState> {
        lock_state(&self.state)
    }

    // =========================================================================
    // Outbound command surface: fire-and-forget, gated on connection status
    // =========================================================================

    pub fn send_message(&self, text: &str, ticket_id: &str) {
        self.dispatch(ClientCommand::SendMessage {
            message: text.to_string(),
            ticket_id: ticket_id.to_string(),
            is_ai_message: false,
        });
    }

    pub fn request_call(&self, phone: &str, purpose: Option<&str>, priority: Option<&str>) {
        self.dispatch(ClientCommand::RequestCall {
            customer_phone: phone.to_string(),
            purpose: purpose.unwrap_or(DEFAULT_CALL_PURPOSE).to_string(),
            priority: priority.unwrap_or(DEFAULT_CALL_PRIORITY).to_string(),
        });
    }

    pub fn create_ticket(&self, fields: Map<String, Value>) {
        self.dispatch(ClientCommand::CreateTicket(fields));
    }

    pub fn assign_ticket(&self, ticket_id: &str, agent_id: &str) {
        self.dispatch(ClientCommand::AssignTicket {
            ticket_id: ticket_id.to_string(),
            agent_id: agent_id.to_string(),
        });
    }

    pub fn update_agent_status(&self, status: &str, availability: &str) {
        self.dispatch(ClientCommand::AgentStatus {
            status: status.to_string(),
            availability: availability.to_string(),
        });
    }

    /// Subscribe the connection to a ticket's event stream.
    pub fn join_ticket(&self, ticket_id: &str) {
        self.dispatch(ClientCommand::JoinTicket {
            ticket_id: ticket_id.to_string(),
        });
    }

    /// Unsubscribe the connection from a ticket's event stream.
    pub fn leave_ticket(&self, ticket_id: &str) {
        self.dispatch(ClientCommand::LeaveTicket {
            ticket_id: ticket_id.to_string(),
        });
    }

    /// Hand a command to the connection task if connected; drop it
    /// otherwise. No queueing: callers that need delivery feedback must
    /// check `status` themselves.
    fn dispatch(&self, command: ClientCommand) {
        let Some(conn) = &self.conn else {
            tracing::debug!(?command, "Dropping command: no active session");
            return;
        };
        if self.status() != ConnectionStatus::Connected {
            tracing::debug!(?command, "Dropping command: not connected");
            return;
        }
        if let Err(e) = conn.outbound_tx.try_send(command) {
            tracing::warn!(error = %e, "Dropping command: outbound channel unavailable");
        }
    }
}

fn lock_state(state: &SharedState) -> MutexGuard<'_, SyncState> {
    // Recover the guard if a writer panicked; appends leave the logs intact
    state.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// Connection task
// =============================================================================

async fn run_connection(
    config: ServerConfig,
    credential: String,
    connection_id: Uuid,
    state: SharedState,
    status_tx: watch::Sender<ConnectionStatus>,
    mut cancel_rx: watch::Receiver<bool>,
    mut outbound_rx: mpsc::Receiver<ClientCommand>,
) {
    status_tx.send_replace(ConnectionStatus::Connecting);

    let request = match authenticated_request(&config.url, &credential) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(%connection_id, error = %e, "Failed to build connection request");
            status_tx.send_replace(ConnectionStatus::Disconnected);
            return;
        }
    };

    tracing::info!(%connection_id, url = %config.url, "Connecting to sync server");
    let connect = tokio::time::timeout(
        Duration::from_secs(config.connect_timeout_secs),
        connect_async(request),
    );

    let ws_stream = tokio::select! {
        _ = wait_cancelled(&mut cancel_rx) => {
            tracing::info!(%connection_id, "Session ended during handshake");
            status_tx.send_replace(ConnectionStatus::Disconnected);
            return;
        }
        result = connect => match result {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(e)) => {
                // Covers rejected credentials: the server refuses the
                // upgrade and the session stays offline, with no retry
                tracing::error!(%connection_id, error = %e, "Handshake failed");
                status_tx.send_replace(ConnectionStatus::Disconnected);
                return;
            }
            Err(_) => {
                tracing::error!(
                    %connection_id,
                    timeout_secs = config.connect_timeout_secs,
                    "Handshake timed out"
                );
                status_tx.send_replace(ConnectionStatus::Disconnected);
                return;
            }
        },
    };

    tracing::info!(%connection_id, "Connected to sync server");
    status_tx.send_replace(ConnectionStatus::Connected);

    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            _ = wait_cancelled(&mut cancel_rx) => {
                tracing::info!(%connection_id, "Session ended; closing connection");
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            Some(command) = outbound_rx.recv() => {
                let json = match serde_json::to_string(&command) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(%connection_id, error = %e, "Failed to serialize command");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    tracing::error!(%connection_id, error = %e, "Send failed; closing connection");
                    break;
                }
            }
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => handle_frame(&state, &text),
                Some(Ok(Message::Close(_))) => {
                    tracing::info!(%connection_id, "Server closed the connection");
                    break;
                }
                Some(Ok(_)) => {} // pings, pongs, binary frames
                Some(Err(e)) => {
                    // Logged for observability; an actual drop surfaces as
                    // stream end on the next poll
                    tracing::error!(%connection_id, error = %e, "Transport error");
                }
                None => {
                    tracing::info!(%connection_id, "Connection dropped");
                    break;
                }
            },
        }
    }

    status_tx.send_replace(ConnectionStatus::Disconnected);
}

/// Parse and apply one inbound frame. Unrecognized or malformed events are
/// dropped: this is a best-effort relay, not a validated protocol.
fn handle_frame(state: &SharedState, text: &str) {
    match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => {
            let mut state = lock_state(state);
            apply_event(&mut state, event);
        }
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unrecognized event");
        }
    }
}

/// Build the upgrade request with the bearer credential attached; the
/// upgrade doubles as the authentication handshake.
fn authenticated_request(url: &str, credential: &str) -> Result<Request> {
    let mut request = url.into_client_request().context("Invalid server URL")?;
    let value = HeaderValue::from_str(&format!("Bearer {credential}"))
        .context("Credential is not a valid header value")?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

async fn wait_cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow() {
            return;
        }
        // A dropped sender means the owning session is gone; treat as cancel
        if cancel_rx.changed().await.is_err() {
            return;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn test_client() -> SyncClient {
        SyncClient::new(ServerConfig::default())
    }

    #[test]
    fn test_new_client_starts_disconnected() {
        let client = test_client();
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert!(!client.is_connected());
        assert!(client.messages().is_empty());
        assert!(client.notifications().is_empty());
    }

    #[test]
    fn test_commands_without_session_are_silently_dropped() {
        let client = test_client();
        client.send_message("hello", "T1");
        client.request_call("+910000000000", None, None);
        client.assign_ticket("T1", "A1");
        client.update_agent_status("online", "available");
        client.join_ticket("T1");
        client.leave_ticket("T1");
        // No session, no panic, no state change
        assert!(client.messages().is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let mut client = test_client();
        client.stop().await;
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_authenticated_request_sets_bearer_header() {
        let request = authenticated_request("ws://localhost:5000/ws", "tok-123").unwrap();
        let auth = request.headers().get(AUTHORIZATION).unwrap();
        assert_eq!(auth.to_str().unwrap(), "Bearer tok-123");
    }

    #[test]
    fn test_authenticated_request_rejects_bad_url() {
        assert!(authenticated_request("not a url", "tok").is_err());
    }

    #[test]
    fn test_ui_notification_mutations() {
        let client = test_client();
        {
            let mut state = client.state();
            state.append_notification(crate::state::Notification::new(
                crate::state::NotificationKind::TicketCreated,
                "New ticket: a".to_string(),
                serde_json::json!({}),
            ));
            state.append_notification(crate::state::Notification::new(
                crate::state::NotificationKind::Escalation,
                "Escalation needed for ticket: b".to_string(),
                serde_json::json!({}),
            ));
        }
        assert_eq!(client.unread_notifications(), 2);

        client.remove_notification(0);
        assert_eq!(client.notifications().len(), 1);
        assert_eq!(
            client.notifications()[0].summary,
            "Escalation needed for ticket: b"
        );

        client.clear_notifications();
        assert!(client.notifications().is_empty());
        assert_eq!(client.unread_notifications(), 0);
    }
}
