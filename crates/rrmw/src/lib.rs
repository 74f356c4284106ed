// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! # rrmw - Robot Raconteur middleware node core
//!
//! A pure Rust implementation of the Robot Raconteur object-oriented RPC
//! middleware core: service definition parsing and verification, node
//! identity and message routing, service publication, and ad-hoc node
//! discovery. Designed for robotics and automation systems that expose
//! device APIs as typed service objects.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rrmw::{RobotRaconteurNode, Result};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let node = RobotRaconteurNode::new();
//!     node.set_node_name("example_node")?;
//!
//!     // Register transports here, then publish services or connect to
//!     // peers. Every node serves its own service index from the start.
//!     let nodes = node.detected_nodes();
//!     println!("{} nodes discovered", nodes.len());
//!
//!     node.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +------------------------------------------------------------------+
//! |                      Application Layer                           |
//! |     ServiceObject impls        |     ClientEndpoint requests     |
//! +------------------------------------------------------------------+
//! |                         Node Core                                |
//! |  Identity | Endpoint Table | Service Table | Special Requests    |
//! +------------------------------------------------------------------+
//! |          Discovery             |          robdef                 |
//! |  Announce Registry | find_*    |  Parse | Verify | Round-trip    |
//! +------------------------------------------------------------------+
//! |                      Transport Layer                             |
//! |        Transport trait impls (TCP, local, intra-process)         |
//! +------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RobotRaconteurNode`] | Node identity, routing tables, and lifecycle |
//! | [`ServiceDefinition`] | Parsed `.robdef` service definition |
//! | [`ServerContext`] | One published service and its connected clients |
//! | [`ClientEndpoint`] | Client side of a service connection |
//! | [`ServiceInfo2`] | One service found on the network |
//! | [`Transport`] | Wire connections for one URL scheme family |
//!
//! ## Modules Overview
//!
//! - [`node`] - Node core: identity, endpoints, routing, special requests
//! - [`robdef`] - Service definition parser and verifier
//! - [`service`] - Service publication and the built-in service index
//! - [`discovery`] - Discovered-node registry and network lookups
//! - [`message`] - Message, entry, and element data model
//! - [`transport`] - Transport trait implemented by wire providers

/// Discovered-node registry and network lookups (`FindServiceByType` etc.).
pub mod discovery;
/// Error type shared across the crate.
pub mod error;
/// Multi-dimensional array block copy with bounds checking.
pub mod marray;
/// Message, entry, and element data model with wire type codes.
pub mod message;
/// Node core: identity, endpoint table, routing, special request handling.
pub mod node;
/// 128-bit node identity.
pub mod nodeid;
/// Service definition (`.robdef`) parsing, verification, and printing.
pub mod robdef;
/// Service publication: factories, objects, contexts, the service index.
pub mod service;
/// High-resolution timestamps for messages and wire clocks.
pub mod timespec;
/// Transport trait implemented by wire providers.
pub mod transport;
/// Connection URL parsing and canonical short forms.
pub mod url;

pub use discovery::{
    build_announce_packet, NodeDiscovery, NodeDiscoveryInfo, NodeDiscoveryInfoUrl, NodeInfo2,
    ServiceInfo2, NODE_ANNOUNCE_MAGIC,
};
pub use error::{Error, Result};
pub use marray::{MultiDimArray, MultiDimCopyIndices};
pub use message::{
    ElementValue, Message, MessageElement, MessageEntry, MessageEntryType, MessageErrorType,
    MessageHeader,
};
pub use node::{
    ClientEndpoint, Endpoint, EndpointHandler, RobotRaconteurNode, ServerEndpoint,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use nodeid::NodeID;
pub use robdef::{verify_service_definitions, ServiceDefinition};
pub use service::{
    SecurityPolicy, ServerContext, ServiceFactory, ServiceObject, TextServiceFactory,
    SERVICE_INDEX_NAME,
};
pub use timespec::TimeSpec;
pub use transport::Transport;
pub use url::{parse_connection_url, ParsedConnectionUrl};

/// rrmw version string.
pub const VERSION: &str = "0.9.0";
