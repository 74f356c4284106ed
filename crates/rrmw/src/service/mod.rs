// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! # Published services
//!
//! A [`ServerContext`] is one published service: a name, a verified service
//! definition supplied by a [`ServiceFactory`], a root [`ServiceObject`]
//! that answers member calls, an attribute map, and the set of connected
//! client endpoints. Contexts are created through
//! [`RobotRaconteurNode::register_service`](crate::node::RobotRaconteurNode::register_service)
//! and torn down by [`ServerContext::close`], which notifies every client
//! before the endpoints are removed.

mod index;

pub use index::{ServiceIndexObject, SERVICE_INDEX_NAME};
pub(crate) use index::SERVICE_INDEX_ROBDEF;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::message::{
    Message, MessageElement, MessageEntry, MessageEntryType, MessageHeader,
};
use crate::node::{EndpointHandler, RobotRaconteurNode, ServerEndpoint};
use crate::robdef::{MemberDefinition, ServiceDefinition};

// ============================================================================
// Contracts
// ============================================================================

/// Source of one service definition: its name, raw text, and parsed form.
///
/// Marshalling of user data stays behind this seam; the node core only
/// needs the definition itself.
pub trait ServiceFactory: Send + Sync {
    /// Name of the service definition this factory describes.
    fn service_name(&self) -> &str;

    /// Raw definition text, as served to clients requesting the
    /// definition.
    fn def_string(&self) -> String;

    /// Parsed definition.
    fn definition(&self) -> &ServiceDefinition;
}

/// Server-side implementation object behind a published service.
#[async_trait]
pub trait ServiceObject: Send + Sync {
    /// Fully qualified type of this object, `DefinitionName.ObjectName`.
    fn object_type(&self) -> String;

    /// Invoke a function member. The returned element is placed in the
    /// response entry; name it `return`.
    async fn call(&self, member_name: &str, entry: &MessageEntry) -> Result<MessageElement>;
}

/// Access policy attached to a service at registration.
///
/// The core honors the `requirevaliduser` policy by refusing anonymous
/// connect requests; other keys travel with the service for outer layers
/// to interpret.
#[derive(Debug, Clone, Default)]
pub struct SecurityPolicy {
    pub policies: HashMap<String, String>,
}

impl SecurityPolicy {
    pub fn new(policies: HashMap<String, String>) -> Self {
        SecurityPolicy { policies }
    }

    pub(crate) fn requires_valid_user(&self) -> bool {
        self.policies
            .get("requirevaliduser")
            .map(|v| v == "true")
            .unwrap_or(false)
    }
}

// ============================================================================
// Text-backed factory
// ============================================================================

/// [`ServiceFactory`] built directly from definition text.
pub struct TextServiceFactory {
    text: String,
    definition: ServiceDefinition,
}

impl TextServiceFactory {
    /// Parse definition text into a factory.
    ///
    /// Parse warnings (deprecated syntax) are logged, not surfaced.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Parse`] when the text does not parse.
    pub fn new(text: &str) -> Result<Self> {
        let mut warnings = Vec::new();
        let definition = ServiceDefinition::from_string_with_warnings(text, &mut warnings)?;
        for warning in &warnings {
            log::warn!("[SERVICE] definition '{}': {}", definition.name, warning);
        }
        Ok(TextServiceFactory {
            text: text.to_string(),
            definition,
        })
    }
}

impl ServiceFactory for TextServiceFactory {
    fn service_name(&self) -> &str {
        &self.definition.name
    }

    fn def_string(&self) -> String {
        self.text.clone()
    }

    fn definition(&self) -> &ServiceDefinition {
        &self.definition
    }
}

// ============================================================================
// Server context
// ============================================================================

/// One published service instance.
pub struct ServerContext {
    node: Weak<RobotRaconteurNode>,
    service_name: String,
    /// Unqualified name of the root object's entry in the definition.
    object_name: String,
    factory: Arc<dyn ServiceFactory>,
    root_object: Arc<dyn ServiceObject>,
    attributes: RwLock<Vec<MessageElement>>,
    client_endpoints: Mutex<HashMap<u32, Arc<ServerEndpoint>>>,
    policy: Option<SecurityPolicy>,
    closed: AtomicBool,
}

impl ServerContext {
    pub(crate) fn new(
        node: Weak<RobotRaconteurNode>,
        service_name: &str,
        object_name: &str,
        factory: Arc<dyn ServiceFactory>,
        root_object: Arc<dyn ServiceObject>,
        policy: Option<SecurityPolicy>,
    ) -> Arc<Self> {
        Arc::new(ServerContext {
            node,
            service_name: service_name.to_string(),
            object_name: object_name.to_string(),
            factory,
            root_object,
            attributes: RwLock::new(Vec::new()),
            client_endpoints: Mutex::new(HashMap::new()),
            policy,
            closed: AtomicBool::new(false),
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Fully qualified type of the root object.
    pub fn root_object_type(&self) -> String {
        format!("{}.{}", self.factory.service_name(), self.object_name)
    }

    /// Fully qualified types the root object declares it implements.
    pub fn root_object_implements(&self) -> Vec<String> {
        let def = self.factory.definition();
        match def.find_object(&self.object_name) {
            Some(entry) => entry
                .implements
                .iter()
                .map(|name| {
                    if name.contains('.') {
                        name.clone()
                    } else {
                        format!("{}.{}", def.name, name)
                    }
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Raw text of the backing service definition.
    pub fn def_string(&self) -> String {
        self.factory.def_string()
    }

    /// Snapshot of the service attribute map.
    pub fn attributes(&self) -> Vec<MessageElement> {
        self.attributes.read().clone()
    }

    /// Replace the service attribute map reported to clients.
    pub fn set_attributes(&self, attributes: Vec<MessageElement>) {
        *self.attributes.write() = attributes;
    }

    pub(crate) fn requires_authentication(&self) -> bool {
        self.policy
            .as_ref()
            .map(|p| p.requires_valid_user())
            .unwrap_or(false)
    }

    pub(crate) fn add_client(&self, endpoint: Arc<ServerEndpoint>) {
        let id = endpoint.endpoint().local_endpoint();
        self.client_endpoints.lock().insert(id, endpoint);
    }

    pub(crate) fn remove_client(&self, endpoint_id: u32) -> Option<Arc<ServerEndpoint>> {
        self.client_endpoints.lock().remove(&endpoint_id)
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.client_endpoints.lock().len()
    }

    /// True once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Answer one request entry arriving through a connected client
    /// endpoint.
    pub(crate) async fn process_request(
        &self,
        entry: &MessageEntry,
        endpoint_id: u32,
    ) -> Result<MessageEntry> {
        if !self.client_endpoints.lock().contains_key(&endpoint_id) {
            return Err(Error::InvalidEndpoint(format!(
                "endpoint {} is not a client of service '{}'",
                endpoint_id, self.service_name
            )));
        }
        match entry.entry_type {
            MessageEntryType::FunctionCallReq => self.process_function_call(entry).await,
            other => Err(Error::InvalidOperation(format!(
                "entry type {:?} is not supported by service '{}'",
                other, self.service_name
            ))),
        }
    }

    async fn process_function_call(&self, entry: &MessageEntry) -> Result<MessageEntry> {
        if entry.service_path != self.service_name {
            return Err(Error::ObjectNotFound(entry.service_path.clone()));
        }
        let def = self.factory.definition();
        let object = def.find_object(&self.object_name).ok_or_else(|| {
            Error::ObjectNotFound(format!(
                "object '{}' not found in service definition '{}'",
                self.object_name,
                def.name
            ))
        })?;
        match object.get_member(&entry.member_name) {
            Some(MemberDefinition::Function(_)) => {}
            Some(_) => {
                return Err(Error::InvalidOperation(format!(
                    "member '{}' is not a function",
                    entry.member_name
                )))
            }
            None => {
                return Err(Error::MemberNotFound(format!(
                    "member '{}' not found",
                    entry.member_name
                )))
            }
        }
        let element = self.root_object.call(&entry.member_name, entry).await?;
        let mut response = entry.response();
        response.add_element(element);
        Ok(response)
    }

    /// Close the service: notify every connected client and remove their
    /// endpoints. Idempotent; send and close failures are swallowed so
    /// every client gets its notification attempt.
    pub async fn close(&self, cancel: &CancellationToken) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let clients: Vec<Arc<ServerEndpoint>> = self
            .client_endpoints
            .lock()
            .drain()
            .map(|(_, c)| c)
            .collect();
        let Some(node) = self.node.upgrade() else {
            return;
        };
        for client in clients {
            let mut entry = MessageEntry::new(MessageEntryType::ServiceClosed, "");
            entry.service_path = self.service_name.clone();
            let mut message = Message::new();
            message.header = MessageHeader {
                sender_node_id: node.node_id(),
                receiver_node_id: client.endpoint().remote_node_id(),
                sender_node_name: node.node_name(),
                receiver_node_name: client.endpoint().remote_node_name(),
                sender_endpoint: client.endpoint().local_endpoint(),
                receiver_endpoint: client.endpoint().remote_endpoint(),
            };
            message.entries.push(entry);
            if let Err(e) = node.send_message(&message, cancel).await {
                log::debug!(
                    "[SERVICE] service closed notification for endpoint {} failed: {}",
                    client.endpoint().local_endpoint(),
                    e
                );
            }
            node.delete_endpoint(client.endpoint().local_endpoint(), cancel)
                .await;
        }
        log::info!("[SERVICE] service '{}' closed", self.service_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_factory_parses_and_serves_text() {
        let text = "service example.basic\n\nobject Thing\n    property int32 x\nend\n";
        let factory = TextServiceFactory::new(text).unwrap();
        assert_eq!(factory.service_name(), "example.basic");
        assert_eq!(factory.def_string(), text);
        assert!(factory.definition().find_object("Thing").is_some());
    }

    #[test]
    fn text_factory_rejects_bad_text() {
        assert!(TextServiceFactory::new("object Thing\nend\n").is_err());
    }

    #[test]
    fn security_policy_valid_user_flag() {
        let mut policies = HashMap::new();
        assert!(!SecurityPolicy::new(policies.clone()).requires_valid_user());
        policies.insert("requirevaliduser".to_string(), "true".to_string());
        assert!(SecurityPolicy::new(policies).requires_valid_user());
    }
}
