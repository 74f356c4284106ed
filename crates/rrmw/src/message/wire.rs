// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Wire-level enumerations for message entries.
//!
//! Entry types follow the request/response pairing convention: requests use
//! odd values and the matching response is always `request + 1`. Unknown
//! values survive through the `Other` escape so a node can route traffic it
//! does not itself consume.

/// Type tag of one [`MessageEntry`](super::MessageEntry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageEntryType {
    /// Empty entry.
    Null,
    /// Stream-level operation between transport peers.
    StreamOp,
    StreamOpRet,
    StreamCheckCapability,
    StreamCheckCapabilityRet,
    /// Request the text of a service definition.
    GetServiceDesc,
    GetServiceDescRet,
    /// Request the fully qualified type of the object at a service path.
    ObjectTypeName,
    ObjectTypeNameRet,
    /// Notification that a service is closing.
    ServiceClosed,
    ServiceClosedRet,
    /// Open a client connection to a service.
    ConnectClient,
    ConnectClientRet,
    /// Close a client connection.
    DisconnectClient,
    DisconnectClientRet,
    /// Liveness probe.
    ConnectionTest,
    ConnectionTestRet,
    /// Identity probe answered by every reachable node.
    GetNodeInfo,
    GetNodeInfoRet,
    ReconnectClient,
    ReconnectClientRet,
    /// Query a numbered node capability flag.
    NodeCheckCapability,
    NodeCheckCapabilityRet,
    /// Request the attribute map of a service.
    GetServiceAttributes,
    GetServiceAttributesRet,
    /// Invoke a function member.
    FunctionCallReq,
    FunctionCallRes,
    /// Any entry type this layer does not interpret.
    Other(u16),
}

impl MessageEntryType {
    /// Numeric wire value.
    pub fn to_u16(self) -> u16 {
        match self {
            MessageEntryType::Null => 0,
            MessageEntryType::StreamOp => 1,
            MessageEntryType::StreamOpRet => 2,
            MessageEntryType::StreamCheckCapability => 3,
            MessageEntryType::StreamCheckCapabilityRet => 4,
            MessageEntryType::GetServiceDesc => 101,
            MessageEntryType::GetServiceDescRet => 102,
            MessageEntryType::ObjectTypeName => 103,
            MessageEntryType::ObjectTypeNameRet => 104,
            MessageEntryType::ServiceClosed => 105,
            MessageEntryType::ServiceClosedRet => 106,
            MessageEntryType::ConnectClient => 107,
            MessageEntryType::ConnectClientRet => 108,
            MessageEntryType::DisconnectClient => 109,
            MessageEntryType::DisconnectClientRet => 110,
            MessageEntryType::ConnectionTest => 111,
            MessageEntryType::ConnectionTestRet => 112,
            MessageEntryType::GetNodeInfo => 113,
            MessageEntryType::GetNodeInfoRet => 114,
            MessageEntryType::ReconnectClient => 115,
            MessageEntryType::ReconnectClientRet => 116,
            MessageEntryType::NodeCheckCapability => 117,
            MessageEntryType::NodeCheckCapabilityRet => 118,
            MessageEntryType::GetServiceAttributes => 119,
            MessageEntryType::GetServiceAttributesRet => 120,
            MessageEntryType::FunctionCallReq => 1121,
            MessageEntryType::FunctionCallRes => 1122,
            MessageEntryType::Other(v) => v,
        }
    }

    /// Decode a numeric wire value. Never fails; unknown values map to `Other`.
    pub fn from_u16(v: u16) -> Self {
        match v {
            0 => MessageEntryType::Null,
            1 => MessageEntryType::StreamOp,
            2 => MessageEntryType::StreamOpRet,
            3 => MessageEntryType::StreamCheckCapability,
            4 => MessageEntryType::StreamCheckCapabilityRet,
            101 => MessageEntryType::GetServiceDesc,
            102 => MessageEntryType::GetServiceDescRet,
            103 => MessageEntryType::ObjectTypeName,
            104 => MessageEntryType::ObjectTypeNameRet,
            105 => MessageEntryType::ServiceClosed,
            106 => MessageEntryType::ServiceClosedRet,
            107 => MessageEntryType::ConnectClient,
            108 => MessageEntryType::ConnectClientRet,
            109 => MessageEntryType::DisconnectClient,
            110 => MessageEntryType::DisconnectClientRet,
            111 => MessageEntryType::ConnectionTest,
            112 => MessageEntryType::ConnectionTestRet,
            113 => MessageEntryType::GetNodeInfo,
            114 => MessageEntryType::GetNodeInfoRet,
            115 => MessageEntryType::ReconnectClient,
            116 => MessageEntryType::ReconnectClientRet,
            117 => MessageEntryType::NodeCheckCapability,
            118 => MessageEntryType::NodeCheckCapabilityRet,
            119 => MessageEntryType::GetServiceAttributes,
            120 => MessageEntryType::GetServiceAttributesRet,
            1121 => MessageEntryType::FunctionCallReq,
            1122 => MessageEntryType::FunctionCallRes,
            other => MessageEntryType::Other(other),
        }
    }

    /// Requests carry odd wire values.
    pub fn is_request(self) -> bool {
        let v = self.to_u16();
        v != 0 && v % 2 == 1
    }

    /// The paired response type, `request + 1`.
    pub fn response(self) -> Self {
        Self::from_u16(self.to_u16() + 1)
    }

    /// True for the session control requests the node answers itself
    /// (connect, disconnect, probes, service queries). These occupy the odd
    /// values in 101..=119.
    pub fn is_special_request(self) -> bool {
        let v = self.to_u16();
        (101..=119).contains(&v) && v % 2 == 1
    }
}

/// Error code carried in a message entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageErrorType {
    /// Entry completed without error.
    None,
    ConnectionError,
    ProtocolError,
    ServiceNotFound,
    ObjectNotFound,
    InvalidEndpoint,
    /// No route from the receiving node to the addressed node.
    NodeNotFound,
    ServiceError,
    MemberNotFound,
    DataTypeError,
    UnknownError,
    InvalidOperation,
    InvalidArgument,
    InternalError,
    RequestTimeout,
    OperationCancelled,
    AuthenticationError,
    PermissionDenied,
    /// Any code this layer does not interpret.
    Other(u16),
}

impl MessageErrorType {
    /// Numeric wire value.
    pub fn to_u16(self) -> u16 {
        match self {
            MessageErrorType::None => 0,
            MessageErrorType::ConnectionError => 1,
            MessageErrorType::ProtocolError => 2,
            MessageErrorType::ServiceNotFound => 3,
            MessageErrorType::ObjectNotFound => 4,
            MessageErrorType::InvalidEndpoint => 5,
            MessageErrorType::NodeNotFound => 7,
            MessageErrorType::ServiceError => 8,
            MessageErrorType::MemberNotFound => 9,
            MessageErrorType::DataTypeError => 12,
            MessageErrorType::UnknownError => 16,
            MessageErrorType::InvalidOperation => 17,
            MessageErrorType::InvalidArgument => 18,
            MessageErrorType::InternalError => 21,
            MessageErrorType::RequestTimeout => 101,
            MessageErrorType::OperationCancelled => 111,
            MessageErrorType::AuthenticationError => 150,
            MessageErrorType::PermissionDenied => 152,
            MessageErrorType::Other(v) => v,
        }
    }

    /// Decode a numeric wire value. Never fails; unknown values map to `Other`.
    pub fn from_u16(v: u16) -> Self {
        match v {
            0 => MessageErrorType::None,
            1 => MessageErrorType::ConnectionError,
            2 => MessageErrorType::ProtocolError,
            3 => MessageErrorType::ServiceNotFound,
            4 => MessageErrorType::ObjectNotFound,
            5 => MessageErrorType::InvalidEndpoint,
            7 => MessageErrorType::NodeNotFound,
            8 => MessageErrorType::ServiceError,
            9 => MessageErrorType::MemberNotFound,
            12 => MessageErrorType::DataTypeError,
            16 => MessageErrorType::UnknownError,
            17 => MessageErrorType::InvalidOperation,
            18 => MessageErrorType::InvalidArgument,
            21 => MessageErrorType::InternalError,
            101 => MessageErrorType::RequestTimeout,
            111 => MessageErrorType::OperationCancelled,
            150 => MessageErrorType::AuthenticationError,
            152 => MessageErrorType::PermissionDenied,
            other => MessageErrorType::Other(other),
        }
    }
}
