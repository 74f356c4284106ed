// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! # In-memory message model
//!
//! A [`Message`] is the unit handed between transports and the node: one
//! addressing [`MessageHeader`] plus a list of [`MessageEntry`] operations.
//! Each entry carries a type tag, a request id for correlation, a service
//! path, and named [`MessageElement`] values.
//!
//! This model covers routing and the control plane only. The byte-level
//! codec lives in the transports; this layer never sees encoded frames.
//!
//! ## Error returns
//!
//! When a message cannot be delivered, the node mirrors every request entry
//! (odd type value) into a `type + 1` response entry carrying the error code
//! and the `errorname`/`errorstring` element pair. See
//! [`Message::generate_error_return`].

mod wire;

pub use wire::{MessageEntryType, MessageErrorType};

use crate::error::{Error, Result};
use crate::nodeid::NodeID;

/// Addressing header of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    pub sender_node_id: NodeID,
    pub receiver_node_id: NodeID,
    pub sender_node_name: String,
    pub receiver_node_name: String,
    pub sender_endpoint: u32,
    pub receiver_endpoint: u32,
}

impl Default for MessageHeader {
    fn default() -> Self {
        MessageHeader {
            sender_node_id: NodeID::any(),
            receiver_node_id: NodeID::any(),
            sender_node_name: String::new(),
            receiver_node_name: String::new(),
            sender_endpoint: 0,
            receiver_endpoint: 0,
        }
    }
}

/// One addressed message: header plus entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub header: MessageHeader,
    pub entries: Vec<MessageEntry>,
}

impl Message {
    pub fn new() -> Self {
        Message::default()
    }

    /// First entry, if any. Routing decisions key off the first entry type.
    pub fn first_entry_type(&self) -> Option<MessageEntryType> {
        self.entries.first().map(|e| e.entry_type)
    }

    /// Build the error-return message for an undeliverable message.
    ///
    /// The header is swapped so the return travels back to the sender, and
    /// every request entry (odd type value) is mirrored into a `type + 1`
    /// response with the same request id and service path, carrying `err`
    /// and the `errorname`/`errorstring` pair. Response entries in the
    /// faulting message are not mirrored; a message with no request entries
    /// produces an empty entry list and should not be sent.
    pub fn generate_error_return(
        &self,
        err: MessageErrorType,
        error_name: &str,
        error_string: &str,
    ) -> Message {
        let mut ret = Message::new();
        ret.header.sender_node_id = self.header.receiver_node_id;
        ret.header.receiver_node_id = self.header.sender_node_id;
        ret.header.sender_node_name = self.header.receiver_node_name.clone();
        ret.header.receiver_node_name = self.header.sender_node_name.clone();
        ret.header.sender_endpoint = self.header.receiver_endpoint;
        ret.header.receiver_endpoint = self.header.sender_endpoint;
        for entry in &self.entries {
            if !entry.entry_type.is_request() {
                continue;
            }
            let mut eret = MessageEntry::new(entry.entry_type.response(), &entry.member_name);
            eret.request_id = entry.request_id;
            eret.service_path = entry.service_path.clone();
            eret.set_error(err, error_name, error_string);
            ret.entries.push(eret);
        }
        ret
    }
}

/// One operation within a message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEntry {
    pub entry_type: MessageEntryType,
    /// Dotted path of the target object, starting at the service name.
    pub service_path: String,
    pub member_name: String,
    /// Correlates a response with its request on one endpoint pair.
    pub request_id: u32,
    pub error: MessageErrorType,
    pub metadata: String,
    pub elements: Vec<MessageElement>,
}

impl MessageEntry {
    pub fn new(entry_type: MessageEntryType, member_name: &str) -> Self {
        MessageEntry {
            entry_type,
            service_path: String::new(),
            member_name: member_name.to_string(),
            request_id: 0,
            error: MessageErrorType::None,
            metadata: String::new(),
            elements: Vec::new(),
        }
    }

    /// Build the successful response skeleton for a request entry,
    /// preserving the request id and service path.
    pub fn response(&self) -> MessageEntry {
        let mut ret = MessageEntry::new(self.entry_type.response(), &self.member_name);
        ret.request_id = self.request_id;
        ret.service_path = self.service_path.clone();
        ret
    }

    /// Build the failed response for a request entry.
    pub fn error_response(&self, e: &Error) -> MessageEntry {
        let (code, name) = e.to_wire();
        let message = e.to_string();
        let mut ret = self.response();
        ret.set_error(code, name, &message);
        ret
    }

    /// Mark this entry as failed and attach the error element pair.
    pub fn set_error(&mut self, err: MessageErrorType, error_name: &str, error_string: &str) {
        self.error = err;
        self.elements
            .push(MessageElement::string("errorname", error_name));
        self.elements
            .push(MessageElement::string("errorstring", error_string));
    }

    /// Reconstruct the [`Error`] carried by a failed response entry.
    pub fn extract_error(&self) -> Option<Error> {
        if self.error == MessageErrorType::None {
            return None;
        }
        let name = self
            .find_element("errorname")
            .and_then(|e| e.value.as_str())
            .unwrap_or("RobotRaconteur.UnknownError");
        let message = self
            .find_element("errorstring")
            .and_then(|e| e.value.as_str())
            .unwrap_or("unknown remote error");
        Some(Error::from_wire(self.error, name, message))
    }

    pub fn add_element(&mut self, element: MessageElement) -> &mut Self {
        self.elements.push(element);
        self
    }

    pub fn find_element(&self, name: &str) -> Option<&MessageElement> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Like [`find_element`](Self::find_element) but a miss is a protocol
    /// error naming the missing element.
    pub fn expect_element(&self, name: &str) -> Result<&MessageElement> {
        self.find_element(name)
            .ok_or_else(|| Error::Protocol(format!("message element '{}' not found", name)))
    }
}

/// One named value within an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageElement {
    pub name: String,
    pub value: ElementValue,
}

impl MessageElement {
    pub fn new(name: &str, value: ElementValue) -> Self {
        MessageElement {
            name: name.to_string(),
            value,
        }
    }

    pub fn string(name: &str, value: &str) -> Self {
        Self::new(name, ElementValue::String(value.to_string()))
    }

    pub fn int32(name: &str, value: i32) -> Self {
        Self::new(name, ElementValue::Int32(value))
    }

    pub fn uint32(name: &str, value: u32) -> Self {
        Self::new(name, ElementValue::UInt32(value))
    }

    pub fn double(name: &str, value: f64) -> Self {
        Self::new(name, ElementValue::Double(value))
    }

    pub fn list(name: &str, items: Vec<MessageElement>) -> Self {
        Self::new(name, ElementValue::List(items))
    }

    pub fn map(name: &str, entries: Vec<MessageElement>) -> Self {
        Self::new(name, ElementValue::Map(entries))
    }
}

/// Value tree carried by message elements.
///
/// Lists hold positional children; maps hold children keyed by element name.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    String(String),
    Int32(i32),
    UInt32(u32),
    Double(f64),
    Bytes(Vec<u8>),
    List(Vec<MessageElement>),
    Map(Vec<MessageElement>),
}

impl ElementValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ElementValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ElementValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ElementValue::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ElementValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MessageElement]> {
        match self {
            ElementValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[MessageElement]> {
        match self {
            ElementValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a child of a map value by element name.
    pub fn map_get(&self, name: &str) -> Option<&MessageElement> {
        self.as_map()?.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_entry(t: MessageEntryType, request_id: u32) -> MessageEntry {
        let mut e = MessageEntry::new(t, "m");
        e.request_id = request_id;
        e.service_path = "svc.path".to_string();
        e
    }

    #[test]
    fn error_return_mirrors_only_request_entries() {
        let mut m = Message::new();
        m.header.sender_node_id = NodeID::new_random();
        m.header.receiver_node_id = NodeID::new_random();
        m.header.sender_endpoint = 42;
        m.header.receiver_endpoint = 99;
        m.entries.push(request_entry(MessageEntryType::ConnectClient, 1));
        m.entries
            .push(request_entry(MessageEntryType::ConnectionTestRet, 2));
        m.entries
            .push(request_entry(MessageEntryType::FunctionCallReq, 3));

        let ret = m.generate_error_return(
            MessageErrorType::NodeNotFound,
            "RobotRaconteur.NodeNotFound",
            "Could not find route to remote node",
        );

        assert_eq!(ret.entries.len(), 2);
        assert_eq!(ret.header.receiver_endpoint, 42);
        assert_eq!(ret.header.sender_endpoint, 99);
        assert_eq!(ret.header.receiver_node_id, m.header.sender_node_id);

        let first = &ret.entries[0];
        assert_eq!(first.entry_type, MessageEntryType::ConnectClientRet);
        assert_eq!(first.request_id, 1);
        assert_eq!(first.service_path, "svc.path");
        assert_eq!(first.error, MessageErrorType::NodeNotFound);
        assert_eq!(
            first.find_element("errorname").and_then(|e| e.value.as_str()),
            Some("RobotRaconteur.NodeNotFound")
        );
        assert_eq!(ret.entries[1].entry_type, MessageEntryType::FunctionCallRes);
        assert_eq!(ret.entries[1].request_id, 3);
    }

    #[test]
    fn extract_error_round_trips() {
        let req = request_entry(MessageEntryType::FunctionCallReq, 7);
        let resp = req.error_response(&Error::ServiceNotFound("svc".to_string()));
        assert_eq!(resp.entry_type, MessageEntryType::FunctionCallRes);
        assert_eq!(resp.request_id, 7);
        match resp.extract_error() {
            Some(Error::ServiceNotFound(msg)) => {
                assert_eq!(msg, "Service not found: svc");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn successful_entry_extracts_no_error() {
        let req = request_entry(MessageEntryType::ConnectionTest, 1);
        assert!(req.response().extract_error().is_none());
    }

    #[test]
    fn map_lookup_by_name() {
        let value = ElementValue::Map(vec![
            MessageElement::string("a", "1"),
            MessageElement::int32("b", 2),
        ]);
        assert_eq!(value.map_get("b").and_then(|e| e.value.as_i32()), Some(2));
        assert!(value.map_get("c").is_none());
    }
}
