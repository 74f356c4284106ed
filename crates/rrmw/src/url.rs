// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Connection URL parsing.
//!
//! Candidate URLs look like
//! `rr+tcp://host:port/path?nodeid=<uuid>&nodename=<name>&service=<svc>`.
//! The scheme selects a transport, the authority and path select the peer,
//! and the query pins the expected node identity and target service.

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::nodeid::NodeID;

/// Decomposed connection URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedConnectionUrl {
    pub scheme: String,
    /// Host part, possibly empty for local transports. IPv6 literals keep
    /// their brackets.
    pub host: String,
    pub port: Option<u16>,
    /// Path including its leading slash, or empty.
    pub path: String,
    /// Expected identity of the target node, when pinned.
    pub nodeid: Option<NodeID>,
    /// Expected name of the target node, or empty.
    pub nodename: String,
    /// Target service name, or empty.
    pub service: String,
}

impl ParsedConnectionUrl {
    /// Canonical short form: `scheme://host[:port]path?nodeid=<plain-uuid>`.
    ///
    /// Used by discovery lookups to report one stable URL per node and
    /// transport, dropping the name/service pins of the announced original.
    pub fn short_form(&self, node_id: &NodeID) -> String {
        let mut out = format!("{}://{}", self.scheme, self.host);
        if let Some(port) = self.port {
            out.push_str(&format!(":{}", port));
        }
        out.push_str(&self.path);
        out.push_str(&format!("?nodeid={}", node_id.to_plain_string()));
        out
    }
}

/// Parse a connection URL.
///
/// # Errors
///
/// Returns [`Error::Connection`] when the URL has no scheme, a malformed
/// authority, or an unparseable port. Unknown query keys are ignored.
pub fn parse_connection_url(url: &str) -> Result<ParsedConnectionUrl> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| Error::Connection(format!("invalid connection URL: '{}'", url)))?;
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '+')
    {
        return Err(Error::Connection(format!(
            "invalid URL scheme: '{}'",
            scheme
        )));
    }

    let (address, query) = match rest.split_once('?') {
        Some((a, q)) => (a, Some(q)),
        None => (rest, None),
    };

    let (authority, path) = match address.find('/') {
        Some(idx) => (&address[..idx], &address[idx..]),
        None => (address, ""),
    };

    let (host, port_text) = split_authority(authority, url)?;
    let port = match port_text {
        Some(p) => Some(
            p.parse::<u16>()
                .map_err(|_| Error::Connection(format!("invalid URL port: '{}'", p)))?,
        ),
        None => None,
    };

    let mut parsed = ParsedConnectionUrl {
        scheme: scheme.to_string(),
        host: host.to_string(),
        port,
        path: path.to_string(),
        nodeid: None,
        nodename: String::new(),
        service: String::new(),
    };

    if let Some(query) = query {
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "nodeid" => {
                    parsed.nodeid = Some(NodeID::from_str(value)?);
                }
                "nodename" => parsed.nodename = value.to_string(),
                "service" => parsed.service = value.to_string(),
                _ => {}
            }
        }
    }

    Ok(parsed)
}

/// Split `host[:port]`, keeping brackets on IPv6 literals.
fn split_authority<'a>(authority: &'a str, url: &str) -> Result<(&'a str, Option<&'a str>)> {
    if let Some(rest) = authority.strip_prefix('[') {
        let close = rest
            .find(']')
            .ok_or_else(|| Error::Connection(format!("invalid connection URL: '{}'", url)))?;
        let host = &authority[..close + 2];
        let after = &rest[close + 1..];
        return match after.strip_prefix(':') {
            Some(port) => Ok((host, Some(port))),
            None if after.is_empty() => Ok((host, None)),
            None => Err(Error::Connection(format!(
                "invalid connection URL: '{}'",
                url
            ))),
        };
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => Ok((host, Some(port))),
        None => Ok((authority, None)),
    }
}
