// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! # Discovery registry
//!
//! Transports feed this registry with node announcements, either as raw
//! three-line packets or as already-parsed [`NodeDiscoveryInfo`] records.
//! Each discovered node carries the set of URLs it was seen on, stamped
//! with the time of the last announcement; a periodic sweep drops URLs not
//! refreshed within [`DISCOVERY_URL_MAX_AGE`] and forgets nodes with no
//! URLs left.
//!
//! The `find_*` lookups first refresh the table from every registered
//! transport. [`NodeDiscovery::find_service_by_type`] then connects to each
//! candidate node's service index concurrently and filters the reported
//! services by type; a node that fails its index query is evicted from the
//! table outright.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::message::{MessageElement, MessageEntry, MessageEntryType};
use crate::node::{RobotRaconteurNode, DEFAULT_REQUEST_TIMEOUT};
use crate::nodeid::NodeID;
use crate::service::SERVICE_INDEX_NAME;
use crate::url::parse_connection_url;

/// First line of every announcement packet.
pub const NODE_ANNOUNCE_MAGIC: &str = "Robot Raconteur Node Discovery Packet";

/// Discovery URLs older than this are dropped by the sweep.
pub const DISCOVERY_URL_MAX_AGE: Duration = Duration::from_secs(60);

/// Deadline for refreshing the table from the registered transports.
const DISCOVERY_REFRESH_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Records
// ============================================================================

/// One URL a node was announced on.
#[derive(Debug, Clone)]
pub struct NodeDiscoveryInfoUrl {
    pub url: String,
    pub last_announce_time: Instant,
}

/// One discovered node.
#[derive(Debug, Clone)]
pub struct NodeDiscoveryInfo {
    pub node_id: NodeID,
    pub node_name: String,
    pub urls: Vec<NodeDiscoveryInfoUrl>,
}

/// One service found by [`NodeDiscovery::find_service_by_type`].
#[derive(Debug, Clone)]
pub struct ServiceInfo2 {
    pub name: String,
    pub root_object_type: String,
    pub root_object_implements: Vec<String>,
    pub connection_url: Vec<String>,
    pub attributes: Vec<MessageElement>,
    pub node_id: NodeID,
    pub node_name: String,
}

impl ServiceInfo2 {
    fn matches_type(&self, service_type: &str) -> bool {
        self.root_object_type == service_type
            || self
                .root_object_implements
                .iter()
                .any(|t| t == service_type)
    }
}

/// One node found by [`NodeDiscovery::find_node_by_id`] or
/// [`NodeDiscovery::find_node_by_name`].
#[derive(Debug, Clone)]
pub struct NodeInfo2 {
    pub node_id: NodeID,
    pub node_name: String,
    pub connection_url: Vec<String>,
}

/// Build the three-line announcement packet for a node URL.
pub fn build_announce_packet(node_id: &NodeID, node_name: &str, url: &str) -> String {
    format!("{}\n{},{}\n{}\n", NODE_ANNOUNCE_MAGIC, node_id, node_name, url)
}

/// Parse an announcement packet. Anything malformed yields `None`.
fn parse_announce_packet(packet: &str) -> Option<NodeDiscoveryInfo> {
    let mut lines: Vec<&str> = packet
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .collect();
    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    if lines.len() != 3 || lines[0] != NODE_ANNOUNCE_MAGIC {
        return None;
    }
    let (id_text, name) = lines[1].split_once(',')?;
    let node_id: NodeID = id_text.trim().parse().ok()?;
    if node_id.is_any() {
        return None;
    }
    let url = lines[2].trim();
    parse_connection_url(url).ok()?;
    Some(NodeDiscoveryInfo {
        node_id,
        node_name: name.trim().to_string(),
        urls: vec![NodeDiscoveryInfoUrl {
            url: url.to_string(),
            last_announce_time: Instant::now(),
        }],
    })
}

// ============================================================================
// Registry
// ============================================================================

/// Discovered-node table and network lookups.
pub struct NodeDiscovery {
    node: Weak<RobotRaconteurNode>,
    detected_nodes: Mutex<HashMap<NodeID, NodeDiscoveryInfo>>,
}

impl NodeDiscovery {
    pub(crate) fn new(node: Weak<RobotRaconteurNode>) -> Self {
        NodeDiscovery {
            node,
            detected_nodes: Mutex::new(HashMap::new()),
        }
    }

    /// Feed a raw announcement packet. Malformed packets are dropped
    /// without error.
    pub fn node_announce_packet_received(&self, packet: &str) {
        if let Some(info) = parse_announce_packet(packet) {
            self.merge(info);
        }
    }

    /// Merge an already-parsed discovery record. URL timestamps in `info`
    /// are not trusted; every URL is restamped as it enters the table.
    pub fn node_detected(&self, info: NodeDiscoveryInfo) {
        if info.node_id.is_any() {
            return;
        }
        self.merge(info);
    }

    fn merge(&self, mut info: NodeDiscoveryInfo) {
        let now = Instant::now();
        let mut table = self.detected_nodes.lock();
        match table.entry(info.node_id) {
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                let known = slot.get_mut();
                known.node_name = info.node_name;
                for url in info.urls {
                    match known.urls.iter_mut().find(|u| u.url == url.url) {
                        Some(existing) => existing.last_announce_time = now,
                        None => known.urls.push(NodeDiscoveryInfoUrl {
                            url: url.url,
                            last_announce_time: now,
                        }),
                    }
                }
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                for url in &mut info.urls {
                    url.last_announce_time = now;
                }
                log::debug!(
                    "[DISCOVERY] detected node {} '{}'",
                    info.node_id,
                    info.node_name
                );
                slot.insert(info);
            }
        }
    }

    /// Snapshot of the table.
    pub fn detected_nodes(&self) -> Vec<NodeDiscoveryInfo> {
        self.detected_nodes.lock().values().cloned().collect()
    }

    /// Drop URLs last announced more than [`DISCOVERY_URL_MAX_AGE`] ago,
    /// and nodes left with no URLs.
    pub fn clean_discovered_nodes(&self) {
        self.sweep(Instant::now());
    }

    fn sweep(&self, now: Instant) {
        let mut table = self.detected_nodes.lock();
        table.retain(|node_id, info| {
            info.urls.retain(|u| {
                now.saturating_duration_since(u.last_announce_time) <= DISCOVERY_URL_MAX_AGE
            });
            if info.urls.is_empty() {
                log::debug!("[DISCOVERY] node {} expired", node_id);
                false
            } else {
                true
            }
        });
    }

    fn evict(&self, node_id: &NodeID) {
        if self.detected_nodes.lock().remove(node_id).is_some() {
            log::debug!("[DISCOVERY] evicted node {} after failed query", node_id);
        }
    }

    /// Refresh the table by querying every registered transport for the
    /// nodes it currently detects. Individual transport failures are
    /// swallowed; the whole refresh is bounded by a fixed deadline and the
    /// caller's cancellation token.
    pub async fn update_detected_nodes(&self, cancel: &CancellationToken) {
        let Some(node) = self.node.upgrade() else {
            return;
        };
        let transports = node.transports_snapshot();
        let refresh = async {
            for transport in transports {
                match transport.get_detected_nodes(cancel).await {
                    Ok(infos) => {
                        for info in infos {
                            self.node_detected(info);
                        }
                    }
                    Err(e) => log::debug!("[DISCOVERY] transport node query failed: {}", e),
                }
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => {}
            result = tokio::time::timeout(DISCOVERY_REFRESH_TIMEOUT, refresh) => {
                if result.is_err() {
                    log::debug!("[DISCOVERY] node refresh timed out");
                }
            }
        }
    }

    /// Canonical short-form URLs of a node record filtered to the requested
    /// schemes, deduplicated.
    fn matching_urls(info: &NodeDiscoveryInfo, schemes: &[&str]) -> Vec<String> {
        let mut urls = Vec::new();
        for record in &info.urls {
            let Ok(parsed) = parse_connection_url(&record.url) else {
                continue;
            };
            if !schemes.iter().any(|s| *s == parsed.scheme) {
                continue;
            }
            let short = parsed.short_form(&info.node_id);
            if !urls.contains(&short) {
                urls.push(short);
            }
        }
        urls
    }

    /// Find services of a fully qualified object type on the network.
    ///
    /// Refreshes the table, then queries the service index of every node
    /// with at least one URL in the requested schemes, all concurrently. A
    /// service matches when its root object type equals `service_type` or
    /// its implements list contains it. Nodes whose index query fails are
    /// evicted from the table. With no candidate node at all the call
    /// returns empty without connecting anywhere.
    pub async fn find_service_by_type(
        &self,
        service_type: &str,
        schemes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<ServiceInfo2>> {
        let Some(node) = self.node.upgrade() else {
            return Ok(Vec::new());
        };
        self.update_detected_nodes(cancel).await;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let candidates: Vec<(NodeID, String, Vec<String>)> = {
            let table = self.detected_nodes.lock();
            table
                .values()
                .filter_map(|info| {
                    let urls = Self::matching_urls(info, schemes);
                    if urls.is_empty() {
                        None
                    } else {
                        Some((info.node_id, info.node_name.clone(), urls))
                    }
                })
                .collect()
        };
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut tasks: Vec<(NodeID, JoinHandle<Result<Vec<ServiceInfo2>>>)> = Vec::new();
        for (node_id, node_name, urls) in candidates {
            let node = node.clone();
            let cancel = cancel.clone();
            let task = tokio::spawn(async move {
                query_node_services(node, node_id, node_name, urls, cancel).await
            });
            tasks.push((node_id, task));
        }

        let mut results = Vec::new();
        for (node_id, task) in tasks {
            match task.await {
                Ok(Ok(services)) => {
                    results.extend(services.into_iter().filter(|s| s.matches_type(service_type)));
                }
                Ok(Err(e)) => {
                    log::debug!("[DISCOVERY] index query for node {} failed: {}", node_id, e);
                    self.evict(&node_id);
                }
                Err(e) => {
                    log::debug!("[DISCOVERY] index task for node {} failed: {}", node_id, e);
                    self.evict(&node_id);
                }
            }
        }
        Ok(results)
    }

    /// Find a discovered node by exact identity, reporting its short-form
    /// URLs in the requested schemes.
    pub async fn find_node_by_id(
        &self,
        node_id: &NodeID,
        schemes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeInfo2>> {
        self.update_detected_nodes(cancel).await;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(self.collect_nodes(schemes, |info| info.node_id == *node_id))
    }

    /// Find discovered nodes by name.
    pub async fn find_node_by_name(
        &self,
        name: &str,
        schemes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeInfo2>> {
        self.update_detected_nodes(cancel).await;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(self.collect_nodes(schemes, |info| info.node_name == name))
    }

    fn collect_nodes(
        &self,
        schemes: &[&str],
        filter: impl Fn(&NodeDiscoveryInfo) -> bool,
    ) -> Vec<NodeInfo2> {
        let table = self.detected_nodes.lock();
        table
            .values()
            .filter(|info| filter(info))
            .filter_map(|info| {
                let urls = Self::matching_urls(info, schemes);
                if urls.is_empty() {
                    None
                } else {
                    Some(NodeInfo2 {
                        node_id: info.node_id,
                        node_name: info.node_name.clone(),
                        connection_url: urls,
                    })
                }
            })
            .collect()
    }
}

/// Query one node's service index over a live connection.
async fn query_node_services(
    node: Arc<RobotRaconteurNode>,
    node_id: NodeID,
    node_name: String,
    urls: Vec<String>,
    cancel: CancellationToken,
) -> Result<Vec<ServiceInfo2>> {
    let index_urls: Vec<String> = urls
        .iter()
        .map(|u| format!("{}&service={}", u, SERVICE_INDEX_NAME))
        .collect();
    let client = node.connect_service(&index_urls, &cancel).await?;

    let mut entry = MessageEntry::new(MessageEntryType::FunctionCallReq, "GetLocalNodeServices");
    entry.service_path = SERVICE_INDEX_NAME.to_string();
    let response = client.request(entry, DEFAULT_REQUEST_TIMEOUT, &cancel).await;
    let _ = client.close(&cancel).await;
    let response = response?;

    parse_service_index_response(&response, &node_id, &node_name, &urls)
}

fn parse_service_index_response(
    response: &MessageEntry,
    node_id: &NodeID,
    node_name: &str,
    urls: &[String],
) -> Result<Vec<ServiceInfo2>> {
    let ret = response.expect_element("return")?;
    let items = ret
        .value
        .as_map()
        .ok_or_else(|| Error::DataType("element 'return' must be a map".to_string()))?;

    let mut services = Vec::new();
    for item in items {
        let fields = item
            .value
            .as_map()
            .ok_or_else(|| Error::DataType("service index entry must be a map".to_string()))?;
        let get_string = |name: &str| -> Result<String> {
            fields
                .iter()
                .find(|e| e.name == name)
                .and_then(|e| e.value.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::DataType(format!("service index entry field '{}' missing", name))
                })
        };
        let name = get_string("Name")?;
        let root_object_type = get_string("RootObjectType")?;
        let root_object_implements = fields
            .iter()
            .find(|e| e.name == "RootObjectImplements")
            .and_then(|e| e.value.as_map())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|e| e.value.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let attributes = fields
            .iter()
            .find(|e| e.name == "Attributes")
            .and_then(|e| e.value.as_map())
            .map(<[MessageElement]>::to_vec)
            .unwrap_or_default();
        let connection_url = urls
            .iter()
            .map(|u| format!("{}&service={}", u, name))
            .collect();
        services.push(ServiceInfo2 {
            name,
            root_object_type,
            root_object_implements,
            connection_url,
            attributes,
            node_id: *node_id,
            node_name: node_name.to_string(),
        });
    }
    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> NodeDiscovery {
        NodeDiscovery::new(Weak::new())
    }

    fn announce(id: &NodeID, url: &str) -> String {
        build_announce_packet(id, "test_node", url)
    }

    #[test]
    fn announce_packet_round_trips() {
        let id = NodeID::new_random();
        let d = registry();
        d.node_announce_packet_received(&announce(&id, "rr+tcp://10.0.0.2:62345/"));
        let nodes = d.detected_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_id, id);
        assert_eq!(nodes[0].node_name, "test_node");
        assert_eq!(nodes[0].urls.len(), 1);
        assert_eq!(nodes[0].urls[0].url, "rr+tcp://10.0.0.2:62345/");
    }

    #[test]
    fn malformed_packets_are_ignored() {
        let d = registry();
        let id = NodeID::new_random();
        d.node_announce_packet_received("");
        d.node_announce_packet_received("Not The Magic\nx,y\nrr+tcp://h/");
        d.node_announce_packet_received(&format!("{}\nmissing-comma\nrr+tcp://h/", NODE_ANNOUNCE_MAGIC));
        d.node_announce_packet_received(&format!("{}\n{},n\nnot a url", NODE_ANNOUNCE_MAGIC, id));
        d.node_announce_packet_received(&format!("{}\n{},n\n", NODE_ANNOUNCE_MAGIC, NodeID::any()));
        d.node_announce_packet_received(&format!(
            "{}\n{},n\nrr+tcp://h/\nrr+tcp://extra/",
            NODE_ANNOUNCE_MAGIC,
            id
        ));
        assert!(d.detected_nodes().is_empty());
    }

    #[test]
    fn second_url_is_appended_and_duplicate_refreshed() {
        let id = NodeID::new_random();
        let d = registry();
        d.node_announce_packet_received(&announce(&id, "rr+tcp://10.0.0.2:62345/"));
        d.node_announce_packet_received(&announce(&id, "rr+ws://10.0.0.2:8080/"));
        d.node_announce_packet_received(&announce(&id, "rr+tcp://10.0.0.2:62345/"));
        let nodes = d.detected_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].urls.len(), 2);
    }

    #[test]
    fn name_updates_on_reannounce() {
        let id = NodeID::new_random();
        let d = registry();
        d.node_announce_packet_received(&build_announce_packet(&id, "first", "rr+tcp://h/"));
        d.node_announce_packet_received(&build_announce_packet(&id, "second", "rr+tcp://h/"));
        assert_eq!(d.detected_nodes()[0].node_name, "second");
    }

    #[test]
    fn sweep_drops_stale_urls_and_empty_nodes() {
        let id = NodeID::new_random();
        let d = registry();
        d.node_announce_packet_received(&announce(&id, "rr+tcp://10.0.0.2:62345/"));
        let now = Instant::now();

        d.sweep(now + Duration::from_secs(59));
        assert_eq!(d.detected_nodes().len(), 1);

        d.sweep(now + Duration::from_secs(61));
        assert!(d.detected_nodes().is_empty());
    }

    #[test]
    fn reannounce_survives_sweep_while_stale_url_is_dropped() {
        let id = NodeID::new_random();
        let d = registry();
        d.node_announce_packet_received(&announce(&id, "rr+tcp://10.0.0.2:62345/"));
        {
            // Age only the first URL, as if the node had stopped announcing
            // it a minute ago.
            let mut table = d.detected_nodes.lock();
            let info = table.get_mut(&id).unwrap();
            info.urls[0].last_announce_time = Instant::now() - Duration::from_secs(120);
        }
        d.node_announce_packet_received(&announce(&id, "rr+ws://10.0.0.2:8080/"));
        d.clean_discovered_nodes();
        let nodes = d.detected_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].urls.len(), 1);
        assert_eq!(nodes[0].urls[0].url, "rr+ws://10.0.0.2:8080/");
    }

    #[test]
    fn node_detected_restamps_urls() {
        let d = registry();
        let id = NodeID::new_random();
        d.node_detected(NodeDiscoveryInfo {
            node_id: id,
            node_name: "n".to_string(),
            urls: vec![NodeDiscoveryInfoUrl {
                url: "rr+tcp://h:1/".to_string(),
                last_announce_time: Instant::now() - Duration::from_secs(3600),
            }],
        });
        d.clean_discovered_nodes();
        assert_eq!(d.detected_nodes().len(), 1);
    }

    #[test]
    fn evict_removes_node() {
        let id = NodeID::new_random();
        let d = registry();
        d.node_announce_packet_received(&announce(&id, "rr+tcp://10.0.0.2:62345/"));
        d.evict(&id);
        assert!(d.detected_nodes().is_empty());
        // A later announcement re-creates the entry from scratch
        d.node_announce_packet_received(&announce(&id, "rr+tcp://10.0.0.2:62345/"));
        assert_eq!(d.detected_nodes().len(), 1);
    }

    #[test]
    fn matching_urls_filters_schemes_and_dedupes() {
        let id = NodeID::new_random();
        let info = NodeDiscoveryInfo {
            node_id: id,
            node_name: "n".to_string(),
            urls: vec![
                NodeDiscoveryInfoUrl {
                    url: "rr+tcp://h:1/?nodename=a".to_string(),
                    last_announce_time: Instant::now(),
                },
                NodeDiscoveryInfoUrl {
                    url: "rr+tcp://h:1/?nodename=b".to_string(),
                    last_announce_time: Instant::now(),
                },
                NodeDiscoveryInfoUrl {
                    url: "rr+ws://h:2/".to_string(),
                    last_announce_time: Instant::now(),
                },
            ],
        };
        let urls = NodeDiscovery::matching_urls(&info, &["rr+tcp"]);
        assert_eq!(
            urls,
            vec![format!("rr+tcp://h:1/?nodeid={}", id.to_plain_string())]
        );
        assert!(NodeDiscovery::matching_urls(&info, &["rr+quic"]).is_empty());
    }
}
