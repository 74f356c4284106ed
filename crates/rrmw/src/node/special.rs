// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Control-plane special-request dispatch.
//!
//! Special requests are the session operations a node answers itself,
//! without involving a registered endpoint: identity and liveness probes,
//! service definition and attribute queries, and the connect/disconnect
//! handshake. Every request entry in the inbound message produces exactly
//! one response entry of the paired type; per-entry failures become error
//! responses, never panics or dropped entries.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::message::{Message, MessageElement, MessageEntry, MessageEntryType, MessageHeader};
use crate::node::{EndpointHandler, RobotRaconteurNode, ServerEndpoint};
use crate::service::ServerContext;

impl RobotRaconteurNode {
    /// Answer one special-request message.
    ///
    /// Returns `None` when the message holds no request entries to answer.
    /// The response travels back over the transport the request arrived on,
    /// so it never depends on a registered endpoint.
    pub(crate) async fn process_special_request(
        self: &Arc<Self>,
        message: &Message,
        via_transport: u32,
    ) -> Option<Message> {
        let mut response = Message::new();
        response.header = MessageHeader {
            sender_node_id: self.node_id(),
            receiver_node_id: message.header.sender_node_id,
            sender_node_name: self.node_name(),
            receiver_node_name: message.header.sender_node_name.clone(),
            sender_endpoint: message.header.receiver_endpoint,
            receiver_endpoint: message.header.sender_endpoint,
        };

        for entry in &message.entries {
            if !entry.entry_type.is_request() {
                continue;
            }
            let result = match entry.entry_type {
                MessageEntryType::GetNodeInfo | MessageEntryType::ConnectionTest => {
                    Ok(entry.response())
                }
                MessageEntryType::ObjectTypeName => self.special_object_type_name(entry),
                MessageEntryType::GetServiceDesc => self.special_get_service_desc(entry),
                MessageEntryType::GetServiceAttributes => {
                    self.special_get_service_attributes(entry)
                }
                MessageEntryType::NodeCheckCapability => {
                    let mut ret = entry.response();
                    ret.add_element(MessageElement::uint32("return", 0));
                    Ok(ret)
                }
                MessageEntryType::ConnectClient => {
                    self.special_connect_client(entry, message, via_transport, &mut response)
                }
                MessageEntryType::DisconnectClient => {
                    self.special_disconnect_client(entry, message).await
                }
                other => Err(Error::Protocol(format!(
                    "special request {:?} not supported",
                    other
                ))),
            };
            response
                .entries
                .push(result.unwrap_or_else(|e| entry.error_response(&e)));
        }

        if response.entries.is_empty() {
            None
        } else {
            Some(response)
        }
    }

    /// Resolve the service context named by the first segment of a service
    /// path.
    fn service_at_path<'a>(&self, service_path: &'a str) -> Result<(Arc<ServerContext>, &'a str)> {
        let root = service_path.split('.').next().unwrap_or(service_path);
        let context = self
            .get_service(root)
            .ok_or_else(|| Error::ServiceNotFound(root.to_string()))?;
        Ok((context, root))
    }

    fn special_object_type_name(&self, entry: &MessageEntry) -> Result<MessageEntry> {
        let (context, root) = self
            .service_at_path(&entry.service_path)
            .map_err(|_| Error::ObjectNotFound(entry.service_path.clone()))?;
        if entry.service_path != root {
            // Sub-object paths resolve through the service's object tree,
            // which lives above this layer.
            return Err(Error::ObjectNotFound(entry.service_path.clone()));
        }
        let mut ret = entry.response();
        ret.add_element(MessageElement::string(
            "objecttype",
            &context.root_object_type(),
        ));
        Ok(ret)
    }

    fn special_get_service_desc(&self, entry: &MessageEntry) -> Result<MessageEntry> {
        if let Some(element) = entry.find_element("servicetype") {
            let name = element.value.as_str().ok_or_else(|| {
                Error::DataType("element 'servicetype' must be a string".to_string())
            })?;
            let factory = self
                .get_service_type(name)
                .ok_or_else(|| Error::ServiceNotFound(format!("service type '{}'", name)))?;
            let mut ret = entry.response();
            ret.add_element(MessageElement::string("servicedef", &factory.def_string()));
            return Ok(ret);
        }
        let (context, _) = self.service_at_path(&entry.service_path)?;
        let mut ret = entry.response();
        ret.add_element(MessageElement::string("servicedef", &context.def_string()));
        ret.add_element(MessageElement::map("attributes", context.attributes()));
        Ok(ret)
    }

    fn special_get_service_attributes(&self, entry: &MessageEntry) -> Result<MessageEntry> {
        let (context, _) = self.service_at_path(&entry.service_path)?;
        let mut ret = entry.response();
        ret.add_element(MessageElement::map("attributes", context.attributes()));
        Ok(ret)
    }

    fn special_connect_client(
        self: &Arc<Self>,
        entry: &MessageEntry,
        message: &Message,
        via_transport: u32,
        response: &mut Message,
    ) -> Result<MessageEntry> {
        let service_name = &entry.service_path;
        let context = self
            .get_service(service_name)
            .ok_or_else(|| Error::ServiceNotFound(service_name.clone()))?;
        if context.requires_authentication() {
            return Err(Error::Authentication(
                "service requires a valid user".to_string(),
            ));
        }

        let server = ServerEndpoint::new(self, service_name);
        server.endpoint().set_transport(via_transport);
        server
            .endpoint()
            .set_remote_node_id(message.header.sender_node_id);
        server
            .endpoint()
            .set_remote_node_name(&message.header.sender_node_name);
        server
            .endpoint()
            .set_remote_endpoint(message.header.sender_endpoint);
        let local_endpoint = self.register_endpoint(server.clone());
        context.add_client(server);

        // The client learns its server-side endpoint from the response
        // header.
        response.header.sender_endpoint = local_endpoint;
        log::debug!(
            "[NODE] client {} connected to service '{}' as endpoint {}",
            message.header.sender_node_id,
            service_name,
            local_endpoint
        );
        Ok(entry.response())
    }

    async fn special_disconnect_client(
        self: &Arc<Self>,
        entry: &MessageEntry,
        message: &Message,
    ) -> Result<MessageEntry> {
        let endpoint_id = message.header.receiver_endpoint;
        if let Ok((context, _)) = self.service_at_path(&entry.service_path) {
            context.remove_client(endpoint_id);
        }
        self.delete_endpoint(endpoint_id, &CancellationToken::new())
            .await;
        log::debug!("[NODE] client endpoint {} disconnected", endpoint_id);
        Ok(entry.response())
    }
}
