// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Transport abstraction for node-to-node messaging.
//!
//! A transport owns the wire connections of one scheme family (TCP, local
//! sockets, intra-process). The node routes outgoing messages to a transport
//! through the endpoint table and hands incoming messages back to
//! [`crate::node::RobotRaconteurNode::message_received`].

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::discovery::NodeDiscoveryInfo;
use crate::error::Result;
use crate::message::Message;
use crate::node::Endpoint;

/// One registered transport. Registered with
/// [`crate::node::RobotRaconteurNode::register_transport`], which assigns the
/// node-lifetime transport id used in the endpoint table.
#[async_trait]
pub trait Transport: Send + Sync {
    /// True when this transport can originate connections.
    fn is_client(&self) -> bool;

    /// Whether `url` names a scheme and address this transport can reach.
    fn can_connect_service(&self, url: &str) -> bool;

    /// Open a connection for `local_endpoint` to the node addressed by
    /// `url`.
    async fn create_transport_connection(
        &self,
        url: &str,
        local_endpoint: u32,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Close the connection serving `endpoint`.
    async fn close_transport_connection(
        &self,
        endpoint: &Endpoint,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Send one message over the connection of the message's sender
    /// endpoint.
    async fn send_message(&self, message: &Message, cancel: &CancellationToken) -> Result<()>;

    /// Probe the health of the connection serving `endpoint_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Connection`] when the connection is gone.
    fn check_connection(&self, endpoint_id: u32) -> Result<()>;

    /// Nodes this transport has detected on its attached networks.
    async fn get_detected_nodes(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeDiscoveryInfo>>;

    /// Called when the node's local service set changes. Transports that
    /// announce the node re-announce with the new service nonce.
    fn local_node_services_changed(&self) {}

    /// Release all connections and background work.
    async fn close(&self) -> Result<()>;
}
