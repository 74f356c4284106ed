// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Node identity (128-bit globally unique identifier).

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::Error;

/// 128-bit globally unique node identifier.
///
/// Canonical text form is braced and hyphenated,
/// `{b35b8b9e-9632-4e1c-a922-7f77b53854d4}`. Discovery URLs use the plain
/// hyphenated form without braces. The all-zero value is the `Any` wildcard
/// that matches every receiver; it is never assigned to a node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeID(Uuid);

impl NodeID {
    /// Generate a fresh random (RFC 4122 v4) identity.
    pub fn new_random() -> Self {
        NodeID(Uuid::new_v4())
    }

    /// The all-zero wildcard identity.
    pub const fn any() -> Self {
        NodeID(Uuid::nil())
    }

    /// True for the all-zero wildcard.
    pub fn is_any(&self) -> bool {
        self.0.is_nil()
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        NodeID(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Hyphenated form without braces, as used in `?nodeid=` URL queries.
    pub fn to_plain_string(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}

impl fmt::Debug for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for NodeID {
    type Err = Error;

    /// Accepts braced, hyphenated, and bare 32-hex forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(NodeID)
            .map_err(|_| Error::InvalidArgument(format!("invalid NodeID: '{}'", s)))
    }
}
