// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! # Node directory and message routing
//!
//! The [`RobotRaconteurNode`] is the entry point to the middleware. It owns
//! the directories that connect everything else together:
//!
//! - registered transports, keyed by a node-lifetime sequential id
//! - registered service definition factories, keyed by definition name
//! - published services, keyed by instance name
//! - live connection endpoints, keyed by a random 32-bit id
//! - the discovered-node table fed by transport announcements
//!
//! Inbound traffic enters through [`RobotRaconteurNode::message_received`],
//! which validates the receiver identity, answers control-plane special
//! requests directly, and forwards everything else to the addressed
//! endpoint. Outbound traffic leaves through
//! [`RobotRaconteurNode::send_message`], which resolves the sending
//! endpoint's transport and hands the message over.
//!
//! Each directory is protected by its own lock, held only for the table
//! access itself. Transport I/O always happens after the relevant `Arc` has
//! been cloned out and the lock released.

mod endpoint;
mod special;

pub use endpoint::{ClientEndpoint, Endpoint, EndpointHandler, ServerEndpoint};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::discovery::{NodeDiscovery, NodeDiscoveryInfo, NodeInfo2, ServiceInfo2};
use crate::error::{Error, Result};
use crate::message::{Message, MessageEntry, MessageEntryType, MessageErrorType, MessageHeader};
use crate::nodeid::NodeID;
use crate::robdef::verify_service_definitions;
use crate::service::{
    SecurityPolicy, ServerContext, ServiceFactory, ServiceIndexObject, ServiceObject,
    TextServiceFactory, SERVICE_INDEX_NAME, SERVICE_INDEX_ROBDEF,
};
use crate::transport::Transport;
use crate::url::parse_connection_url;

/// Default deadline for request/response operations.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Endpoints with no inbound traffic for this long are closed by the
/// periodic cleanup task.
pub const ENDPOINT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(600);

/// Cadence of the background cleanup task (discovery sweep and endpoint
/// inactivity check).
const CLEANUP_PERIOD: Duration = Duration::from_secs(5);

const SERVICE_STATE_NONCE_LEN: usize = 16;

fn node_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z][a-zA-Z0-9_.\-]*$")
            .unwrap_or_else(|e| panic!("node name regex: {}", e))
    })
}

fn generate_nonce() -> String {
    (0..SERVICE_STATE_NONCE_LEN)
        .map(|_| fastrand::alphanumeric())
        .collect()
}

// ============================================================================
// Node
// ============================================================================

/// One middleware node: identity, directories, and message routing.
///
/// Construct with [`RobotRaconteurNode::new`], which returns an
/// `Arc<RobotRaconteurNode>`; entity-creating methods take `&Arc<Self>`.
/// The node identity is write-once: [`set_node_id`](Self::set_node_id) and
/// [`set_node_name`](Self::set_node_name) fail once a value is in place,
/// and reading an unset id generates a random one on first use.
pub struct RobotRaconteurNode {
    node_id: OnceLock<NodeID>,
    node_name: OnceLock<String>,
    endpoints: Mutex<HashMap<u32, Arc<dyn EndpointHandler>>>,
    transports: RwLock<HashMap<u32, Arc<dyn Transport>>>,
    /// Next transport id. Sequential from 1 and never reused.
    next_transport_id: AtomicU32,
    service_factories: RwLock<HashMap<String, Arc<dyn ServiceFactory>>>,
    services: RwLock<HashMap<String, Arc<ServerContext>>>,
    /// Random token regenerated whenever the service set changes.
    /// Transports re-announce when they observe a new value.
    service_state_nonce: ArcSwap<String>,
    discovery: NodeDiscovery,
    is_shutdown: AtomicBool,
}

impl RobotRaconteurNode {
    /// Create a node with empty directories and the service index published.
    ///
    /// When called inside a tokio runtime, a background task sweeps stale
    /// discovery records and inactive endpoints every few seconds; without a
    /// runtime the node still works but no periodic cleanup runs.
    pub fn new() -> Arc<Self> {
        let node = Arc::new_cyclic(|weak| RobotRaconteurNode {
            node_id: OnceLock::new(),
            node_name: OnceLock::new(),
            endpoints: Mutex::new(HashMap::new()),
            transports: RwLock::new(HashMap::new()),
            next_transport_id: AtomicU32::new(1),
            service_factories: RwLock::new(HashMap::new()),
            services: RwLock::new(HashMap::new()),
            service_state_nonce: ArcSwap::from_pointee(generate_nonce()),
            discovery: NodeDiscovery::new(weak.clone()),
            is_shutdown: AtomicBool::new(false),
        });
        node.install_service_index();
        node.start_cleanup_task();
        node
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Node identity, generated randomly on first read if never set.
    pub fn node_id(&self) -> NodeID {
        *self.node_id.get_or_init(NodeID::new_random)
    }

    /// Set the node identity. Write-once.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidArgument`] for the zero wildcard id and
    /// [`Error::InvalidOperation`] when an identity is already in place,
    /// including one auto-generated by a prior [`node_id`](Self::node_id)
    /// read.
    pub fn set_node_id(&self, id: NodeID) -> Result<()> {
        if id.is_any() {
            return Err(Error::InvalidArgument(
                "NodeID may not be the zero wildcard".to_string(),
            ));
        }
        self.node_id
            .set(id)
            .map_err(|_| Error::InvalidOperation("NodeID is already set".to_string()))
    }

    /// Node name, or empty when never set.
    pub fn node_name(&self) -> String {
        self.node_name.get().cloned().unwrap_or_default()
    }

    /// Set the node name. Write-once.
    pub fn set_node_name(&self, name: &str) -> Result<()> {
        if !node_name_regex().is_match(name) {
            return Err(Error::InvalidArgument(format!(
                "invalid node name: '{}'",
                name
            )));
        }
        self.node_name
            .set(name.to_string())
            .map_err(|_| Error::InvalidOperation("NodeName is already set".to_string()))
    }

    fn is_for_this_node(&self, header: &MessageHeader) -> bool {
        if header.receiver_node_id.is_any() {
            header.receiver_node_name.is_empty() || header.receiver_node_name == self.node_name()
        } else {
            header.receiver_node_id == self.node_id()
        }
    }

    // ========================================================================
    // Transports
    // ========================================================================

    /// Register a transport and return its id. Ids are sequential from 1
    /// for the lifetime of the node and never reused.
    pub fn register_transport(&self, transport: Arc<dyn Transport>) -> u32 {
        let id = self.next_transport_id.fetch_add(1, Ordering::Relaxed);
        self.transports.write().insert(id, transport);
        log::debug!("[NODE] registered transport {}", id);
        id
    }

    pub(crate) fn transport(&self, transport_id: u32) -> Option<Arc<dyn Transport>> {
        self.transports.read().get(&transport_id).cloned()
    }

    pub(crate) fn transports_snapshot(&self) -> Vec<Arc<dyn Transport>> {
        self.transports.read().values().cloned().collect()
    }

    /// Ask the transport serving an endpoint to verify the connection is
    /// still alive.
    pub fn check_connection(&self, endpoint_id: u32) -> Result<()> {
        let handler = self
            .endpoints
            .lock()
            .get(&endpoint_id)
            .cloned()
            .ok_or_else(|| {
                Error::InvalidEndpoint(format!("endpoint {} is not registered", endpoint_id))
            })?;
        let transport_id = handler.endpoint().transport();
        let transport = self.transport(transport_id).ok_or_else(|| {
            Error::Connection(format!("transport {} is not registered", transport_id))
        })?;
        transport.check_connection(endpoint_id)
    }

    // ========================================================================
    // Service types and services
    // ========================================================================

    /// Register a service definition factory.
    ///
    /// The definition is verified together with every definition already
    /// registered, so imports must be registered before their importers.
    /// Re-registering a name is rejected.
    pub fn register_service_type(&self, factory: Arc<dyn ServiceFactory>) -> Result<()> {
        let name = factory.service_name().to_string();
        let mut factories = self.service_factories.write();
        if factories.contains_key(&name) {
            return Err(Error::InvalidOperation(format!(
                "service type '{}' is already registered",
                name
            )));
        }
        let mut defs: Vec<_> = factories.values().map(|f| f.definition().clone()).collect();
        defs.push(factory.definition().clone());
        for warning in verify_service_definitions(&defs)? {
            log::warn!("[NODE] service definition warning: {}", warning);
        }
        log::debug!("[NODE] registered service type '{}'", name);
        factories.insert(name, factory);
        Ok(())
    }

    /// Look up a registered service definition factory.
    pub fn get_service_type(&self, name: &str) -> Option<Arc<dyn ServiceFactory>> {
        self.service_factories.read().get(name).cloned()
    }

    /// Publish a service backed by `root_object`.
    ///
    /// `service_type` names a definition registered through
    /// [`register_service_type`](Self::register_service_type), and the root
    /// object's reported type must be an object declared in it. A service
    /// already published under `name` is swapped out and closed, so the
    /// directory never holds two contexts for one name and lookups never
    /// observe the name missing during a replacement.
    pub async fn register_service(
        self: &Arc<Self>,
        name: &str,
        service_type: &str,
        root_object: Arc<dyn ServiceObject>,
        policy: Option<SecurityPolicy>,
    ) -> Result<Arc<ServerContext>> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::InvalidArgument(format!(
                "invalid service name: '{}'",
                name
            )));
        }
        let context = self.build_service_context(name, service_type, root_object, policy)?;

        // Single critical section: the name always resolves to some context,
        // and a concurrent registration under the same name cannot displace a
        // context without it being closed here.
        let displaced = self
            .services
            .write()
            .insert(name.to_string(), context.clone());
        if let Some(old) = displaced {
            log::debug!("[NODE] replacing service '{}'", name);
            old.close(&CancellationToken::new()).await;
        }
        self.update_service_state_nonce();
        log::info!(
            "[NODE] registered service '{}' of type {}",
            name,
            context.root_object_type()
        );
        Ok(context)
    }

    fn build_service_context(
        self: &Arc<Self>,
        name: &str,
        service_type: &str,
        root_object: Arc<dyn ServiceObject>,
        policy: Option<SecurityPolicy>,
    ) -> Result<Arc<ServerContext>> {
        let factory = self.get_service_type(service_type).ok_or_else(|| {
            Error::InvalidOperation(format!(
                "service type '{}' is not registered",
                service_type
            ))
        })?;
        let object_type = root_object.object_type();
        let (def_name, object_name) = object_type.rsplit_once('.').ok_or_else(|| {
            Error::ServiceDefinition(format!(
                "object type '{}' is not fully qualified",
                object_type
            ))
        })?;
        if def_name != service_type {
            return Err(Error::ServiceDefinition(format!(
                "object type '{}' does not belong to service definition '{}'",
                object_type, service_type
            )));
        }
        if factory.definition().find_object(object_name).is_none() {
            return Err(Error::ServiceDefinition(format!(
                "object '{}' not found in service definition '{}'",
                object_name, service_type
            )));
        }
        Ok(ServerContext::new(
            Arc::downgrade(self),
            name,
            object_name,
            factory,
            root_object,
            policy,
        ))
    }

    /// Look up a published service.
    pub fn get_service(&self, name: &str) -> Option<Arc<ServerContext>> {
        self.services.read().get(name).cloned()
    }

    /// Close and unpublish a service.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ServiceNotFound`] when no service is published
    /// under `name`.
    pub async fn close_service(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        let context = self
            .services
            .write()
            .remove(name)
            .ok_or_else(|| Error::ServiceNotFound(name.to_string()))?;
        context.close(cancel).await;
        self.update_service_state_nonce();
        Ok(())
    }

    pub(crate) fn service_contexts(&self) -> Vec<Arc<ServerContext>> {
        let mut contexts: Vec<_> = self.services.read().values().cloned().collect();
        contexts.sort_by(|a, b| a.service_name().cmp(b.service_name()));
        contexts
    }

    /// Current service-state nonce. Changes whenever the set of published
    /// services changes; transports use it to decide when to re-announce.
    pub fn service_state_nonce(&self) -> String {
        self.service_state_nonce.load().as_ref().clone()
    }

    fn update_service_state_nonce(&self) {
        let previous = self.service_state_nonce.load_full();
        let mut nonce = generate_nonce();
        while nonce == *previous {
            nonce = generate_nonce();
        }
        self.service_state_nonce.store(Arc::new(nonce));
        for transport in self.transports_snapshot() {
            transport.local_node_services_changed();
        }
    }

    fn install_service_index(self: &Arc<Self>) {
        let factory = TextServiceFactory::new(SERVICE_INDEX_ROBDEF)
            .unwrap_or_else(|e| panic!("service index definition: {}", e));
        self.register_service_type(Arc::new(factory))
            .unwrap_or_else(|e| panic!("service index registration: {}", e));
        let index = ServiceIndexObject::new(Arc::downgrade(self));
        let context = self
            .build_service_context(SERVICE_INDEX_NAME, SERVICE_INDEX_NAME, index, None)
            .unwrap_or_else(|e| panic!("service index context: {}", e));
        self.services
            .write()
            .insert(SERVICE_INDEX_NAME.to_string(), context);
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    /// Insert a handler under a fresh random endpoint id and stamp the id
    /// into its endpoint state.
    pub(crate) fn register_endpoint(&self, handler: Arc<dyn EndpointHandler>) -> u32 {
        let mut endpoints = self.endpoints.lock();
        loop {
            let id = fastrand::u32(1..u32::MAX);
            if let std::collections::hash_map::Entry::Vacant(slot) = endpoints.entry(id) {
                handler.endpoint().set_local_endpoint(id);
                slot.insert(handler);
                return id;
            }
        }
    }

    pub(crate) fn get_endpoint(&self, endpoint_id: u32) -> Option<Arc<dyn EndpointHandler>> {
        self.endpoints.lock().get(&endpoint_id).cloned()
    }

    /// Close and remove an endpoint. Best effort and idempotent: transport
    /// close failures and double removal are both swallowed.
    pub async fn delete_endpoint(&self, endpoint_id: u32, cancel: &CancellationToken) {
        let handler = self.endpoints.lock().get(&endpoint_id).cloned();
        if let Some(handler) = handler {
            if let Some(transport) = self.transport(handler.endpoint().transport()) {
                if let Err(e) = transport
                    .close_transport_connection(handler.endpoint(), cancel)
                    .await
                {
                    log::debug!(
                        "[NODE] transport close for endpoint {} failed: {}",
                        endpoint_id,
                        e
                    );
                }
            }
        }
        self.endpoints.lock().remove(&endpoint_id);
    }

    // ========================================================================
    // Message routing
    // ========================================================================

    /// Send a message originating from one of this node's endpoints.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Connection`] when the sender identity is not
    /// this node or the endpoint's transport is gone, and
    /// [`Error::InvalidEndpoint`] when the sending endpoint is not
    /// registered.
    pub async fn send_message(&self, message: &Message, cancel: &CancellationToken) -> Result<()> {
        if message.header.sender_node_id != self.node_id() {
            return Err(Error::Connection("could not route message".to_string()));
        }
        let handler = self
            .endpoints
            .lock()
            .get(&message.header.sender_endpoint)
            .cloned()
            .ok_or_else(|| {
                Error::InvalidEndpoint(format!(
                    "endpoint {} is not registered",
                    message.header.sender_endpoint
                ))
            })?;
        let transport_id = handler.endpoint().transport();
        let transport = self.transport(transport_id).ok_or_else(|| {
            Error::Connection(format!("transport {} is not registered", transport_id))
        })?;
        transport.send_message(message, cancel).await
    }

    /// Entry point for every message a transport delivers to this node.
    ///
    /// A message for a different node is answered with a `NodeNotFound`
    /// error return, special requests are dispatched directly, and anything
    /// else is handed to the addressed endpoint. Failures never propagate
    /// back to the transport.
    pub async fn message_received(self: &Arc<Self>, message: Message, via_transport: u32) {
        if !self.is_for_this_node(&message.header) {
            log::debug!(
                "[NODE] message for node {} received by {}",
                message.header.receiver_node_id,
                self.node_id()
            );
            let ret = message.generate_error_return(
                MessageErrorType::NodeNotFound,
                "RobotRaconteur.NodeNotFound",
                "Could not find route to remote node",
            );
            if !ret.entries.is_empty() {
                self.send_via_transport(&ret, via_transport).await;
            }
            return;
        }

        if message
            .first_entry_type()
            .map(|t| t.is_special_request())
            .unwrap_or(false)
        {
            if let Some(response) = self.process_special_request(&message, via_transport).await {
                self.send_via_transport(&response, via_transport).await;
            }
            return;
        }

        let handler = self
            .endpoints
            .lock()
            .get(&message.header.receiver_endpoint)
            .cloned();
        match handler {
            Some(handler) => {
                handler.endpoint().touch();
                if let Err(e) = handler.message_received(message).await {
                    log::debug!("[NODE] endpoint receive handler failed: {}", e);
                }
            }
            None => {
                let ret = message.generate_error_return(
                    MessageErrorType::InvalidEndpoint,
                    "RobotRaconteur.InvalidEndpoint",
                    "Invalid destination endpoint",
                );
                if !ret.entries.is_empty() {
                    self.send_via_transport(&ret, via_transport).await;
                }
            }
        }
    }

    /// Fire-and-forget send over a specific transport, bypassing endpoint
    /// resolution. Used for error returns and special-request responses.
    pub(crate) async fn send_via_transport(&self, message: &Message, transport_id: u32) {
        match self.transport(transport_id) {
            Some(transport) => {
                let cancel = CancellationToken::new();
                if let Err(e) = transport.send_message(message, &cancel).await {
                    log::debug!("[NODE] send via transport {} failed: {}", transport_id, e);
                }
            }
            None => {
                log::debug!("[NODE] transport {} is not registered", transport_id);
            }
        }
    }

    // ========================================================================
    // Client connections
    // ========================================================================

    /// Connect to a service, trying each candidate URL in order.
    ///
    /// Every URL must name a target service in its `service=` query. The
    /// first successful connect-handshake wins; the error from the last
    /// failed candidate is returned when all fail. Cancellation is checked
    /// before each new attempt.
    pub async fn connect_service(
        self: &Arc<Self>,
        urls: &[String],
        cancel: &CancellationToken,
    ) -> Result<Arc<ClientEndpoint>> {
        if urls.is_empty() {
            return Err(Error::InvalidArgument(
                "no candidate connection URLs".to_string(),
            ));
        }
        let mut last_error = None;
        for url in urls {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.try_connect_url(url, cancel).await {
                Ok(client) => return Ok(client),
                Err(e) => {
                    log::debug!("[NODE] connection to {} failed: {}", url, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(Error::Cancelled))
    }

    async fn try_connect_url(
        self: &Arc<Self>,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<ClientEndpoint>> {
        let parsed = parse_connection_url(url)?;
        if parsed.service.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "connection URL '{}' does not name a service",
                url
            )));
        }
        let transport = {
            let transports = self.transports.read();
            transports
                .iter()
                .find(|(_, t)| t.can_connect_service(url))
                .map(|(id, t)| (*id, t.clone()))
        };
        let Some((transport_id, transport)) = transport else {
            return Err(Error::Connection(format!(
                "no registered transport accepts URL '{}'",
                url
            )));
        };

        let client = ClientEndpoint::new(self, &parsed.service);
        client.endpoint().set_transport(transport_id);
        if let Some(id) = parsed.nodeid {
            client.endpoint().set_remote_node_id(id);
        }
        client.endpoint().set_remote_node_name(&parsed.nodename);
        let local_endpoint = self.register_endpoint(client.clone());

        if let Err(e) = transport
            .create_transport_connection(url, local_endpoint, cancel)
            .await
        {
            self.delete_endpoint(local_endpoint, cancel).await;
            return Err(e);
        }

        let mut entry = MessageEntry::new(MessageEntryType::ConnectClient, "");
        entry.service_path = parsed.service.clone();
        if let Err(e) = client.request(entry, DEFAULT_REQUEST_TIMEOUT, cancel).await {
            self.delete_endpoint(local_endpoint, cancel).await;
            return Err(e);
        }
        log::debug!(
            "[NODE] connected to service '{}' at {} as endpoint {}",
            parsed.service,
            url,
            local_endpoint
        );
        Ok(client)
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Feed a raw discovery announcement packet into the discovered-node
    /// table. Malformed packets are ignored.
    pub fn node_announce_packet_received(&self, packet: &str) {
        self.discovery.node_announce_packet_received(packet);
    }

    /// Merge an already-parsed discovery record into the discovered-node
    /// table.
    pub fn node_detected(&self, info: NodeDiscoveryInfo) {
        self.discovery.node_detected(info);
    }

    /// Snapshot of the discovered-node table.
    pub fn detected_nodes(&self) -> Vec<NodeDiscoveryInfo> {
        self.discovery.detected_nodes()
    }

    /// Drop discovery records whose URLs have all gone stale.
    pub fn clean_discovered_nodes(&self) {
        self.discovery.clean_discovered_nodes();
    }

    /// Find services of a given fully qualified object type on the network.
    pub async fn find_service_by_type(
        self: &Arc<Self>,
        service_type: &str,
        schemes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<ServiceInfo2>> {
        self.discovery
            .find_service_by_type(service_type, schemes, cancel)
            .await
    }

    /// Find a discovered node by exact identity.
    pub async fn find_node_by_id(
        &self,
        node_id: &NodeID,
        schemes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeInfo2>> {
        self.discovery.find_node_by_id(node_id, schemes, cancel).await
    }

    /// Find discovered nodes by name.
    pub async fn find_node_by_name(
        &self,
        name: &str,
        schemes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeInfo2>> {
        self.discovery.find_node_by_name(name, schemes, cancel).await
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn start_cleanup_task(self: &Arc<Self>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::debug!("[NODE] no async runtime, periodic cleanup disabled");
            return;
        };
        let weak = Arc::downgrade(self);
        handle.spawn(async move {
            loop {
                tokio::time::sleep(CLEANUP_PERIOD).await;
                let Some(node) = weak.upgrade() else {
                    break;
                };
                if node.is_shutdown.load(Ordering::Relaxed) {
                    break;
                }
                node.discovery.clean_discovered_nodes();
                node.sweep_inactive_endpoints().await;
            }
        });
    }

    async fn sweep_inactive_endpoints(&self) {
        let stale: Vec<u32> = self
            .endpoints
            .lock()
            .iter()
            .filter(|(_, h)| h.endpoint().idle_time() > ENDPOINT_INACTIVITY_TIMEOUT)
            .map(|(id, _)| *id)
            .collect();
        let cancel = CancellationToken::new();
        for endpoint_id in stale {
            log::debug!("[NODE] closing inactive endpoint {}", endpoint_id);
            self.delete_endpoint(endpoint_id, &cancel).await;
        }
    }

    /// Shut the node down: close every service, endpoint, and transport.
    ///
    /// Idempotent; individual close failures are swallowed so every
    /// resource gets its close attempt.
    pub async fn shutdown(&self) {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("[NODE] node {} shutting down", self.node_id());
        let cancel = CancellationToken::new();

        let services: Vec<Arc<ServerContext>> =
            self.services.write().drain().map(|(_, c)| c).collect();
        for context in services {
            context.close(&cancel).await;
        }

        let endpoint_ids: Vec<u32> = self.endpoints.lock().keys().copied().collect();
        for endpoint_id in endpoint_ids {
            self.delete_endpoint(endpoint_id, &cancel).await;
        }

        let transports: Vec<Arc<dyn Transport>> =
            self.transports.write().drain().map(|(_, t)| t).collect();
        for transport in transports {
            if let Err(e) = transport.close().await {
                log::debug!("[NODE] transport close failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_is_write_once() {
        let node = RobotRaconteurNode::new();
        let id = NodeID::new_random();
        node.set_node_id(id).unwrap();
        assert_eq!(node.node_id(), id);
        assert!(node.set_node_id(NodeID::new_random()).is_err());
    }

    #[test]
    fn node_id_generates_on_first_read() {
        let node = RobotRaconteurNode::new();
        let id = node.node_id();
        assert!(!id.is_any());
        assert_eq!(node.node_id(), id);
        assert!(node.set_node_id(NodeID::new_random()).is_err());
    }

    #[test]
    fn zero_node_id_rejected() {
        let node = RobotRaconteurNode::new();
        assert!(node.set_node_id(NodeID::any()).is_err());
    }

    #[test]
    fn node_name_is_validated_and_write_once() {
        let node = RobotRaconteurNode::new();
        assert!(node.set_node_name("7bad").is_err());
        assert!(node.set_node_name("").is_err());
        node.set_node_name("example.test_node").unwrap();
        assert_eq!(node.node_name(), "example.test_node");
        assert!(node.set_node_name("other").is_err());
    }

    #[test]
    fn transport_ids_are_sequential_from_one() {
        struct Never;
        #[async_trait::async_trait]
        impl Transport for Never {
            fn is_client(&self) -> bool {
                false
            }
            fn can_connect_service(&self, _url: &str) -> bool {
                false
            }
            async fn create_transport_connection(
                &self,
                _url: &str,
                _local_endpoint: u32,
                _cancel: &CancellationToken,
            ) -> Result<()> {
                Err(Error::Connection("not supported".to_string()))
            }
            async fn close_transport_connection(
                &self,
                _endpoint: &Endpoint,
                _cancel: &CancellationToken,
            ) -> Result<()> {
                Ok(())
            }
            async fn send_message(
                &self,
                _message: &Message,
                _cancel: &CancellationToken,
            ) -> Result<()> {
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
        let node = RobotRaconteurNode::new();
        assert_eq!(node.register_transport(Arc::new(Never)), 1);
        assert_eq!(node.register_transport(Arc::new(Never)), 2);
        assert_eq!(node.register_transport(Arc::new(Never)), 3);
    }

    #[test]
    fn service_index_is_published_at_startup() {
        let node = RobotRaconteurNode::new();
        let context = node.get_service(SERVICE_INDEX_NAME).unwrap();
        assert_eq!(
            context.root_object_type(),
            "RobotRaconteurServiceIndex.ServiceIndex"
        );
        assert!(node.get_service_type(SERVICE_INDEX_NAME).is_some());
    }

    #[test]
    fn nonce_has_expected_shape() {
        let node = RobotRaconteurNode::new();
        let nonce = node.service_state_nonce();
        assert_eq!(nonce.len(), SERVICE_STATE_NONCE_LEN);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
