// ABOUTME: Root library module exposing the realtime sync client.
// ABOUTME: Provides access to config, client, router, and state modules.

pub mod client;
pub mod config;
pub mod router;
pub mod state;

pub use client::{AgentIdentity, ConnectionStatus, SyncClient};

// Re-export wire types for convenience
pub use deskwire_proto::{ClientCommand, ServerEvent};
