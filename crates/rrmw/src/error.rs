// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Error types shared across the node, discovery, and definition layers.
//!
//! One public [`Error`] enum covers the whole crate. Errors that travel on
//! the wire map to a [`MessageErrorType`] code plus a dotted error name
//! (`RobotRaconteur.ConnectionError` style); see [`Error::to_wire`] and
//! [`Error::from_wire`].

use crate::message::MessageErrorType;

/// Crate-wide error type.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Definition Errors
    // ========================================================================
    /// Service definition text failed to parse. Line numbers are 1-based.
    Parse { line: usize, message: String },
    /// Service definition parsed but failed semantic verification.
    ServiceDefinition(String),
    /// Numeric or structural data did not match the declared type.
    DataType(String),

    // ========================================================================
    // Routing Errors
    // ========================================================================
    /// Message could not be routed to or from a transport.
    Connection(String),
    /// Referenced endpoint is not registered with this node.
    InvalidEndpoint(String),
    /// Message addressed to a node this node cannot reach.
    NodeNotFound(String),
    /// Named service is not registered with this node.
    ServiceNotFound(String),
    /// Service path did not resolve to an object.
    ObjectNotFound(String),
    /// Named member does not exist on the target object.
    MemberNotFound(String),
    /// Request violated the message protocol.
    Protocol(String),

    // ========================================================================
    // Operation Errors
    // ========================================================================
    /// Deadline elapsed before the operation completed.
    Timeout(String),
    /// Operation was cancelled through its cancellation token.
    Cancelled,
    /// Operation is not valid in the current node state.
    InvalidOperation(String),
    /// Caller passed an argument outside the accepted domain.
    InvalidArgument(String),
    /// Credentials missing or rejected.
    Authentication(String),
    /// I/O error with underlying cause.
    IoError(std::io::Error),

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// Error returned by a remote node, preserving its wire code and name.
    Remote {
        code: MessageErrorType,
        name: String,
        message: String,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Definition
            Error::Parse { line, message } => {
                write!(f, "Parse error on line {}: {}", line, message)
            }
            Error::ServiceDefinition(msg) => write!(f, "Service definition error: {}", msg),
            Error::DataType(msg) => write!(f, "Data type error: {}", msg),
            // Routing
            Error::Connection(msg) => write!(f, "Connection error: {}", msg),
            Error::InvalidEndpoint(msg) => write!(f, "Invalid endpoint: {}", msg),
            Error::NodeNotFound(msg) => write!(f, "Node not found: {}", msg),
            Error::ServiceNotFound(msg) => write!(f, "Service not found: {}", msg),
            Error::ObjectNotFound(msg) => write!(f, "Object not found: {}", msg),
            Error::MemberNotFound(msg) => write!(f, "Member not found: {}", msg),
            Error::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            // Operation
            Error::Timeout(msg) => write!(f, "Operation timed out: {}", msg),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Authentication(msg) => write!(f, "Authentication error: {}", msg),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            // Remote
            Error::Remote { name, message, .. } => write!(f, "{}: {}", name, message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}

impl Error {
    /// Wire error code and dotted error name for this error.
    ///
    /// Used when a request fails and the failure must be mirrored back to
    /// the sender as an error-return entry.
    pub fn to_wire(&self) -> (MessageErrorType, &str) {
        match self {
            Error::Parse { .. } | Error::ServiceDefinition(_) => (
                MessageErrorType::ServiceError,
                "RobotRaconteur.ServiceError",
            ),
            Error::DataType(_) => (MessageErrorType::DataTypeError, "RobotRaconteur.DataTypeError"),
            Error::Connection(_) | Error::IoError(_) => (
                MessageErrorType::ConnectionError,
                "RobotRaconteur.ConnectionError",
            ),
            Error::InvalidEndpoint(_) => (
                MessageErrorType::InvalidEndpoint,
                "RobotRaconteur.InvalidEndpoint",
            ),
            Error::NodeNotFound(_) => {
                (MessageErrorType::NodeNotFound, "RobotRaconteur.NodeNotFound")
            }
            Error::ServiceNotFound(_) => (
                MessageErrorType::ServiceNotFound,
                "RobotRaconteur.ServiceNotFound",
            ),
            Error::ObjectNotFound(_) => (
                MessageErrorType::ObjectNotFound,
                "RobotRaconteur.ObjectNotFound",
            ),
            Error::MemberNotFound(_) => (
                MessageErrorType::MemberNotFound,
                "RobotRaconteur.MemberNotFound",
            ),
            Error::Protocol(_) => (
                MessageErrorType::ProtocolError,
                "RobotRaconteur.ProtocolError",
            ),
            Error::Timeout(_) => (
                MessageErrorType::RequestTimeout,
                "RobotRaconteur.RequestTimeout",
            ),
            Error::Cancelled => (
                MessageErrorType::OperationCancelled,
                "RobotRaconteur.OperationCancelled",
            ),
            Error::InvalidOperation(_) => (
                MessageErrorType::InvalidOperation,
                "RobotRaconteur.InvalidOperation",
            ),
            Error::InvalidArgument(_) => (
                MessageErrorType::InvalidArgument,
                "RobotRaconteur.InvalidArgument",
            ),
            Error::Authentication(_) => (
                MessageErrorType::AuthenticationError,
                "RobotRaconteur.AuthenticationError",
            ),
            Error::Remote { code, .. } => (*code, self.remote_name()),
        }
    }

    fn remote_name(&self) -> &str {
        match self {
            Error::Remote { name, .. } => name.as_str(),
            _ => "RobotRaconteur.UnknownError",
        }
    }

    /// Reconstruct an error from wire parts received in an error-return entry.
    ///
    /// Codes produced by this node's own routing layer map back onto their
    /// local variants so callers can match on them; anything else is kept as
    /// [`Error::Remote`] with the original name and code.
    pub fn from_wire(code: MessageErrorType, name: &str, message: &str) -> Self {
        match code {
            MessageErrorType::ConnectionError => Error::Connection(message.to_string()),
            MessageErrorType::InvalidEndpoint => Error::InvalidEndpoint(message.to_string()),
            MessageErrorType::NodeNotFound => Error::NodeNotFound(message.to_string()),
            MessageErrorType::ServiceNotFound => Error::ServiceNotFound(message.to_string()),
            MessageErrorType::ObjectNotFound => Error::ObjectNotFound(message.to_string()),
            MessageErrorType::MemberNotFound => Error::MemberNotFound(message.to_string()),
            MessageErrorType::ProtocolError => Error::Protocol(message.to_string()),
            MessageErrorType::RequestTimeout => Error::Timeout(message.to_string()),
            MessageErrorType::DataTypeError => Error::DataType(message.to_string()),
            MessageErrorType::AuthenticationError => Error::Authentication(message.to_string()),
            MessageErrorType::InvalidOperation => Error::InvalidOperation(message.to_string()),
            MessageErrorType::InvalidArgument => Error::InvalidArgument(message.to_string()),
            MessageErrorType::OperationCancelled => Error::Cancelled,
            _ => Error::Remote {
                code,
                name: name.to_string(),
                message: message.to_string(),
            },
        }
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_reports_line() {
        let e = Error::Parse {
            line: 12,
            message: "unknown keyword".to_string(),
        };
        assert_eq!(e.to_string(), "Parse error on line 12: unknown keyword");
    }

    #[test]
    fn wire_mapping_round_trips_routing_errors() {
        let e = Error::NodeNotFound("could not find route".to_string());
        let (code, name) = e.to_wire();
        assert_eq!(code, MessageErrorType::NodeNotFound);
        assert_eq!(name, "RobotRaconteur.NodeNotFound");
        match Error::from_wire(code, name, "could not find route") {
            Error::NodeNotFound(msg) => assert_eq!(msg, "could not find route"),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn locally_produced_codes_map_back_onto_local_variants() {
        for e in [
            Error::InvalidOperation("not registered".to_string()),
            Error::InvalidArgument("bad name".to_string()),
            Error::Cancelled,
        ] {
            let (code, name) = e.to_wire();
            let back = Error::from_wire(code, name, &e.to_string());
            assert_eq!(
                std::mem::discriminant(&back),
                std::mem::discriminant(&e),
                "asymmetric mapping for {:?}",
                e
            );
        }
    }

    #[test]
    fn unknown_wire_code_preserved_as_remote() {
        let e = Error::from_wire(MessageErrorType::UnknownError, "experimental.Oops", "boom");
        let (code, name) = e.to_wire();
        assert_eq!(code, MessageErrorType::UnknownError);
        assert_eq!(name, "experimental.Oops");
        assert_eq!(e.to_string(), "experimental.Oops: boom");
    }

    #[test]
    fn io_error_source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let e: Error = io.into();
        assert!(std::error::Error::source(&e).is_some());
    }
}
