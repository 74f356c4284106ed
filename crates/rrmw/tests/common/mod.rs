// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Test doubles shared by the integration tests: an in-process loopback
//! transport linking two nodes, a transport that records what it is asked
//! to send, and a small service object.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use rrmw::node::Endpoint;
use rrmw::{
    Error, Message, MessageElement, MessageEntry, NodeDiscoveryInfo, Result, RobotRaconteurNode,
    ServiceObject, Transport,
};

// ============================================================================
// Loopback transport
// ============================================================================

/// One half of an in-process link between two nodes.
///
/// Messages sent through this transport are queued and delivered to the
/// peer node's receive path by a pump task, so request/response traffic
/// flows exactly as it would over a wire transport.
pub struct LoopbackTransport {
    /// URL prefix of the peer this transport reaches.
    peer_prefix: String,
    tx: mpsc::UnboundedSender<Message>,
    detected: Mutex<Vec<NodeDiscoveryInfo>>,
    services_changed: AtomicUsize,
}

impl LoopbackTransport {
    /// Replace the node list reported by `get_detected_nodes`.
    pub fn set_detected_nodes(&self, nodes: Vec<NodeDiscoveryInfo>) {
        *self.detected.lock() = nodes;
    }

    /// Number of `local_node_services_changed` notifications received.
    pub fn services_changed_count(&self) -> usize {
        self.services_changed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn is_client(&self) -> bool {
        true
    }

    fn can_connect_service(&self, url: &str) -> bool {
        url.starts_with(&self.peer_prefix)
    }

    async fn create_transport_connection(
        &self,
        url: &str,
        _local_endpoint: u32,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        if self.can_connect_service(url) {
            Ok(())
        } else {
            Err(Error::Connection(format!("cannot reach '{}'", url)))
        }
    }

    async fn close_transport_connection(
        &self,
        _endpoint: &Endpoint,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, message: &Message, _cancel: &CancellationToken) -> Result<()> {
        self.tx
            .send(message.clone())
            .map_err(|_| Error::Connection("loopback peer is gone".to_string()))
    }

    fn check_connection(&self, _endpoint_id: u32) -> Result<()> {
        Ok(())
    }

    async fn get_detected_nodes(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Vec<NodeDiscoveryInfo>> {
        Ok(self.detected.lock().clone())
    }

    fn local_node_services_changed(&self) {
        self.services_changed.fetch_add(1, Ordering::SeqCst);
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn spawn_pump(mut rx: mpsc::UnboundedReceiver<Message>, peer: Weak<RobotRaconteurNode>, peer_transport: u32) {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Some(node) = peer.upgrade() else {
                break;
            };
            node.message_received(message, peer_transport).await;
        }
    });
}

/// Link two nodes with a loopback transport pair.
///
/// `a_reaches` and `b_reaches` are the URL prefixes each side accepts for
/// outgoing connections, e.g. `rr+intra://server`.
pub fn link_nodes(
    a: &Arc<RobotRaconteurNode>,
    a_reaches: &str,
    b: &Arc<RobotRaconteurNode>,
    b_reaches: &str,
) -> (Arc<LoopbackTransport>, Arc<LoopbackTransport>) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    let ta = Arc::new(LoopbackTransport {
        peer_prefix: a_reaches.to_string(),
        tx: a_tx,
        detected: Mutex::new(Vec::new()),
        services_changed: AtomicUsize::new(0),
    });
    let tb = Arc::new(LoopbackTransport {
        peer_prefix: b_reaches.to_string(),
        tx: b_tx,
        detected: Mutex::new(Vec::new()),
        services_changed: AtomicUsize::new(0),
    });
    let a_id = a.register_transport(ta.clone());
    let b_id = b.register_transport(tb.clone());
    spawn_pump(a_rx, Arc::downgrade(b), b_id);
    spawn_pump(b_rx, Arc::downgrade(a), a_id);
    (ta, tb)
}

// ============================================================================
// Recording transport
// ============================================================================

/// Transport that keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Message>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingTransport::default())
    }

    /// Drain the recorded messages.
    pub fn take_sent(&self) -> Vec<Message> {
        std::mem::take(&mut *self.sent.lock())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn is_client(&self) -> bool {
        false
    }

    fn can_connect_service(&self, _url: &str) -> bool {
        false
    }

    async fn create_transport_connection(
        &self,
        url: &str,
        _local_endpoint: u32,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(Error::Connection(format!("cannot reach '{}'", url)))
    }

    async fn close_transport_connection(
        &self,
        _endpoint: &Endpoint,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, message: &Message, _cancel: &CancellationToken) -> Result<()> {
        self.sent.lock().push(message.clone());
        Ok(())
    }

    fn check_connection(&self, _endpoint_id: u32) -> Result<()> {
        Ok(())
    }

    async fn get_detected_nodes(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Vec<NodeDiscoveryInfo>> {
        Ok(Vec::new())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Test service
// ============================================================================

pub const TESTSVC_ROBDEF: &str = concat!(
    "service experimental.testsvc\n",
    "stdver 0.9\n",
    "\n",
    "object Calc\n",
    "    property int32 x\n",
    "    function int32 add(int32 a, int32 b)\n",
    "end\n",
    "\n",
    "object SciCalc\n",
    "    implements Calc\n",
    "    property int32 x\n",
    "    function int32 add(int32 a, int32 b)\n",
    "    function double log(double v)\n",
    "end\n",
);

/// Backing object for the `Calc`/`SciCalc` test service.
pub struct CalcObject {
    type_name: String,
}

impl CalcObject {
    pub fn new(object_name: &str) -> Arc<Self> {
        Arc::new(CalcObject {
            type_name: format!("experimental.testsvc.{}", object_name),
        })
    }
}

#[async_trait]
impl ServiceObject for CalcObject {
    fn object_type(&self) -> String {
        self.type_name.clone()
    }

    async fn call(&self, member_name: &str, entry: &MessageEntry) -> Result<MessageElement> {
        match member_name {
            "add" => {
                let a = entry
                    .expect_element("a")?
                    .value
                    .as_i32()
                    .ok_or_else(|| Error::DataType("parameter 'a' must be int32".to_string()))?;
                let b = entry
                    .expect_element("b")?
                    .value
                    .as_i32()
                    .ok_or_else(|| Error::DataType("parameter 'b' must be int32".to_string()))?;
                Ok(MessageElement::int32("return", a.wrapping_add(b)))
            }
            other => Err(Error::MemberNotFound(format!(
                "member '{}' not found",
                other
            ))),
        }
    }
}
