// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Built-in service index.
//!
//! Every node publishes a `RobotRaconteurServiceIndex` service whose
//! `GetLocalNodeServices` function lists the node's published services.
//! Discovery lookups connect to this service on remote nodes to learn what
//! they offer.

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::message::{MessageElement, MessageEntry};
use crate::node::RobotRaconteurNode;
use crate::service::ServiceObject;

/// Instance name and definition name of the built-in index service.
pub const SERVICE_INDEX_NAME: &str = "RobotRaconteurServiceIndex";

/// Definition text of the index service. The legacy version declaration is
/// kept for compatibility with existing implementations of this service.
pub(crate) const SERVICE_INDEX_ROBDEF: &str = "\
#Service to provide an index of local services
service RobotRaconteurServiceIndex

option version 0.5

struct NodeInfo
    field string NodeName
    field uint8[16] NodeID
    field string{int32} ServiceIndexConnectionURL
end struct

struct ServiceInfo
    field string Name
    field string RootObjectType
    field string{int32} RootObjectImplements
    field string{int32} ConnectionURL
    field varvalue{string} Attributes
end struct

object ServiceIndex
    function ServiceInfo{int32} GetLocalNodeServices()
    event LocalNodeServicesChanged()
end object
";

/// Root object of the built-in index service.
pub struct ServiceIndexObject {
    node: Weak<RobotRaconteurNode>,
}

impl ServiceIndexObject {
    pub(crate) fn new(node: Weak<RobotRaconteurNode>) -> Arc<Self> {
        Arc::new(ServiceIndexObject { node })
    }
}

#[async_trait]
impl ServiceObject for ServiceIndexObject {
    fn object_type(&self) -> String {
        "RobotRaconteurServiceIndex.ServiceIndex".to_string()
    }

    async fn call(&self, member_name: &str, _entry: &MessageEntry) -> Result<MessageElement> {
        match member_name {
            "GetLocalNodeServices" => {
                let node = self.node.upgrade().ok_or_else(|| {
                    Error::InvalidOperation("node has been released".to_string())
                })?;
                let mut items = Vec::new();
                for (i, context) in node.service_contexts().into_iter().enumerate() {
                    let implements: Vec<MessageElement> = context
                        .root_object_implements()
                        .iter()
                        .enumerate()
                        .map(|(j, name)| MessageElement::string(&j.to_string(), name))
                        .collect();
                    let fields = vec![
                        MessageElement::string("Name", context.service_name()),
                        MessageElement::string("RootObjectType", &context.root_object_type()),
                        // Int32-keyed maps per the definition: children
                        // named by decimal index.
                        MessageElement::map("RootObjectImplements", implements),
                        // Clients rebuild connection URLs from the
                        // discovery record they reached this node through.
                        MessageElement::map("ConnectionURL", Vec::new()),
                        MessageElement::map("Attributes", context.attributes()),
                    ];
                    items.push(MessageElement::map(&i.to_string(), fields));
                }
                Ok(MessageElement::map("return", items))
            }
            other => Err(Error::MemberNotFound(format!(
                "member '{}' not found",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robdef::ServiceDefinition;

    #[test]
    fn index_definition_parses_and_verifies() {
        let mut warnings = Vec::new();
        let def =
            ServiceDefinition::from_string_with_warnings(SERVICE_INDEX_ROBDEF, &mut warnings)
                .unwrap();
        assert_eq!(def.name, "RobotRaconteurServiceIndex");
        assert_eq!(def.declared_version().unwrap().to_string(), "0.5");
        assert!(warnings.iter().any(|w| w.contains("'option'")));
        assert!(def.find_object("ServiceIndex").is_some());
        let verify_warnings =
            crate::robdef::verify_service_definitions(std::slice::from_ref(&def)).unwrap();
        assert!(verify_warnings.is_empty());
    }
}
