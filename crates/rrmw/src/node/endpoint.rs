// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Connection endpoints.
//!
//! An [`Endpoint`] is one side of a logical connection between two nodes:
//! a local id, the peer's id and node identity, and the transport serving
//! the connection. [`ClientEndpoint`] adds request/response correlation for
//! outgoing calls; [`ServerEndpoint`] dispatches incoming requests to the
//! service the client connected to.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::message::{Message, MessageEntry, MessageEntryType, MessageErrorType, MessageHeader};
use crate::node::RobotRaconteurNode;
use crate::nodeid::NodeID;

// ============================================================================
// Endpoint state
// ============================================================================

/// Shared connection state of one endpoint.
///
/// Fields use interior mutability: identities are learned during the connect
/// handshake and the receive stamp is updated on every inbound message.
#[derive(Debug)]
pub struct Endpoint {
    local_endpoint: AtomicU32,
    remote_endpoint: AtomicU32,
    transport: AtomicU32,
    remote_node_id: Mutex<NodeID>,
    remote_node_name: Mutex<String>,
    last_message_received: Mutex<Instant>,
}

impl Endpoint {
    pub fn new() -> Self {
        Endpoint {
            local_endpoint: AtomicU32::new(0),
            remote_endpoint: AtomicU32::new(0),
            transport: AtomicU32::new(0),
            remote_node_id: Mutex::new(NodeID::any()),
            remote_node_name: Mutex::new(String::new()),
            last_message_received: Mutex::new(Instant::now()),
        }
    }

    pub fn local_endpoint(&self) -> u32 {
        self.local_endpoint.load(Ordering::Relaxed)
    }

    pub(crate) fn set_local_endpoint(&self, id: u32) {
        self.local_endpoint.store(id, Ordering::Relaxed);
    }

    pub fn remote_endpoint(&self) -> u32 {
        self.remote_endpoint.load(Ordering::Relaxed)
    }

    pub fn set_remote_endpoint(&self, id: u32) {
        self.remote_endpoint.store(id, Ordering::Relaxed);
    }

    /// Id of the transport serving this endpoint, as assigned at transport
    /// registration.
    pub fn transport(&self) -> u32 {
        self.transport.load(Ordering::Relaxed)
    }

    pub fn set_transport(&self, id: u32) {
        self.transport.store(id, Ordering::Relaxed);
    }

    pub fn remote_node_id(&self) -> NodeID {
        *self.remote_node_id.lock()
    }

    pub fn set_remote_node_id(&self, id: NodeID) {
        *self.remote_node_id.lock() = id;
    }

    pub fn remote_node_name(&self) -> String {
        self.remote_node_name.lock().clone()
    }

    pub fn set_remote_node_name(&self, name: &str) {
        *self.remote_node_name.lock() = name.to_string();
    }

    /// Time since the last inbound message on this endpoint.
    pub fn idle_time(&self) -> Duration {
        self.last_message_received.lock().elapsed()
    }

    pub(crate) fn touch(&self) {
        *self.last_message_received.lock() = Instant::now();
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new()
    }
}

/// Inbound message sink of a registered endpoint.
#[async_trait]
pub trait EndpointHandler: Send + Sync {
    fn endpoint(&self) -> &Endpoint;

    /// Handle one inbound message addressed to this endpoint. The node has
    /// already validated the receiver identity and updated the receive
    /// stamp.
    async fn message_received(&self, message: Message) -> Result<()>;
}

// ============================================================================
// Client endpoint
// ============================================================================

/// Client side of a service connection.
///
/// Outgoing request entries are stamped with a sequential request id and
/// paired with their responses through a pending-request table.
#[derive(Debug)]
pub struct ClientEndpoint {
    endpoint: Endpoint,
    node: Weak<RobotRaconteurNode>,
    service_name: String,
    request_id: AtomicU32,
    pending: DashMap<u32, oneshot::Sender<MessageEntry>>,
}

impl ClientEndpoint {
    pub(crate) fn new(node: &Arc<RobotRaconteurNode>, service_name: &str) -> Arc<Self> {
        Arc::new(ClientEndpoint {
            endpoint: Endpoint::new(),
            node: Arc::downgrade(node),
            service_name: service_name.to_string(),
            request_id: AtomicU32::new(1),
            pending: DashMap::new(),
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn node(&self) -> Result<Arc<RobotRaconteurNode>> {
        self.node
            .upgrade()
            .ok_or_else(|| Error::Connection("node has been released".to_string()))
    }

    /// Send one request entry and wait for the paired response.
    ///
    /// Used for both special requests (connect, disconnect, service
    /// queries) and function calls. The response entry is returned after
    /// its error field has been checked; a remote error becomes an `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when no response arrives within
    /// `timeout`, [`Error::Cancelled`] when `cancel` fires first, or the
    /// error the remote node reported.
    pub async fn request(
        &self,
        mut entry: MessageEntry,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<MessageEntry> {
        let node = self.node()?;
        let member = entry.member_name.clone();
        let request_id = self.request_id.fetch_add(1, Ordering::Relaxed);
        entry.request_id = request_id;

        let mut message = Message::new();
        message.header = MessageHeader {
            sender_node_id: node.node_id(),
            receiver_node_id: self.endpoint.remote_node_id(),
            sender_node_name: node.node_name(),
            receiver_node_name: self.endpoint.remote_node_name(),
            sender_endpoint: self.endpoint.local_endpoint(),
            receiver_endpoint: self.endpoint.remote_endpoint(),
        };
        message.entries.push(entry);

        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);

        if let Err(e) = node.send_message(&message, cancel).await {
            self.pending.remove(&request_id);
            return Err(e);
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                self.pending.remove(&request_id);
                return Err(Error::Cancelled);
            }
            r = tokio::time::timeout(timeout, rx) => r,
        };
        self.pending.remove(&request_id);

        match result {
            Ok(Ok(response)) => match response.extract_error() {
                Some(e) => Err(e),
                None => Ok(response),
            },
            Ok(Err(_)) => Err(Error::Connection("reply channel closed".to_string())),
            Err(_) => Err(Error::Timeout(format!("request '{}'", member))),
        }
    }

    /// Disconnect from the service and remove the endpoint. The disconnect
    /// notification is best effort; a dead peer does not block the close.
    pub async fn close(&self, cancel: &CancellationToken) -> Result<()> {
        if let Ok(node) = self.node() {
            let mut entry = MessageEntry::new(MessageEntryType::DisconnectClient, "");
            entry.service_path = self.service_name.clone();
            let _ = self
                .request(entry, Duration::from_millis(500), cancel)
                .await;
            node.delete_endpoint(self.endpoint.local_endpoint(), cancel)
                .await;
        }
        Ok(())
    }
}

#[async_trait]
impl EndpointHandler for ClientEndpoint {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn message_received(&self, message: Message) -> Result<()> {
        let header = message.header;
        for entry in message.entries {
            if entry.entry_type.is_request() {
                log::debug!(
                    "[ENDPOINT] client endpoint {} dropping request entry {:?}",
                    self.endpoint.local_endpoint(),
                    entry.entry_type
                );
                continue;
            }
            // The connect response carries the freshly minted server-side
            // endpoint id and the server's real identity in its header.
            if entry.entry_type == MessageEntryType::ConnectClientRet
                && entry.error == MessageErrorType::None
            {
                self.endpoint.set_remote_endpoint(header.sender_endpoint);
                self.endpoint.set_remote_node_id(header.sender_node_id);
                self.endpoint.set_remote_node_name(&header.sender_node_name);
            }
            match self.pending.remove(&entry.request_id) {
                Some((_, tx)) => {
                    // Ignore send error - requester may have timed out
                    drop(tx.send(entry));
                }
                None => {
                    log::debug!(
                        "[ENDPOINT] client endpoint {} has no pending request {}",
                        self.endpoint.local_endpoint(),
                        entry.request_id
                    );
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Server endpoint
// ============================================================================

/// Server side of a client connection, created by the connect handshake and
/// bound to one service.
pub struct ServerEndpoint {
    endpoint: Endpoint,
    node: Weak<RobotRaconteurNode>,
    service_name: String,
}

impl ServerEndpoint {
    pub(crate) fn new(node: &Arc<RobotRaconteurNode>, service_name: &str) -> Arc<Self> {
        Arc::new(ServerEndpoint {
            endpoint: Endpoint::new(),
            node: Arc::downgrade(node),
            service_name: service_name.to_string(),
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

#[async_trait]
impl EndpointHandler for ServerEndpoint {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn message_received(&self, message: Message) -> Result<()> {
        let Some(node) = self.node.upgrade() else {
            return Ok(());
        };

        let mut response = Message::new();
        response.header = MessageHeader {
            sender_node_id: node.node_id(),
            receiver_node_id: message.header.sender_node_id,
            sender_node_name: node.node_name(),
            receiver_node_name: message.header.sender_node_name.clone(),
            sender_endpoint: self.endpoint.local_endpoint(),
            receiver_endpoint: self.endpoint.remote_endpoint(),
        };

        for entry in &message.entries {
            if !entry.entry_type.is_request() {
                log::debug!(
                    "[ENDPOINT] server endpoint {} dropping non-request entry {:?}",
                    self.endpoint.local_endpoint(),
                    entry.entry_type
                );
                continue;
            }
            let result = match node.get_service(&self.service_name) {
                Some(context) => {
                    context
                        .process_request(entry, self.endpoint.local_endpoint())
                        .await
                }
                None => Err(Error::ServiceNotFound(self.service_name.clone())),
            };
            let response_entry = match result {
                Ok(e) => e,
                Err(e) => entry.error_response(&e),
            };
            response.entries.push(response_entry);
        }

        if !response.entries.is_empty() {
            let cancel = CancellationToken::new();
            node.send_message(&response, &cancel).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_fields_default_and_update() {
        let e = Endpoint::new();
        assert_eq!(e.local_endpoint(), 0);
        assert_eq!(e.remote_endpoint(), 0);
        assert!(e.remote_node_id().is_any());
        e.set_local_endpoint(42);
        e.set_remote_endpoint(7);
        e.set_transport(3);
        let id = NodeID::new_random();
        e.set_remote_node_id(id);
        e.set_remote_node_name("peer");
        assert_eq!(e.local_endpoint(), 42);
        assert_eq!(e.remote_endpoint(), 7);
        assert_eq!(e.transport(), 3);
        assert_eq!(e.remote_node_id(), id);
        assert_eq!(e.remote_node_name(), "peer");
    }

    #[test]
    fn touch_resets_idle_time() {
        let e = Endpoint::new();
        std::thread::sleep(Duration::from_millis(20));
        assert!(e.idle_time() >= Duration::from_millis(20));
        e.touch();
        assert!(e.idle_time() < Duration::from_millis(20));
    }
}
