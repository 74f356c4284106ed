// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Node routing integration tests
//!
//! Two in-process nodes joined by a loopback transport exercise the full
//! connect handshake, function call traffic, special requests, and the
//! error-return paths for misaddressed messages.

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use common::{link_nodes, CalcObject, RecordingTransport, TESTSVC_ROBDEF};
use rrmw::{
    EndpointHandler, Error, Message, MessageElement, MessageEntry, MessageEntryType,
    MessageErrorType, NodeID, RobotRaconteurNode, SecurityPolicy, ServerContext,
    TextServiceFactory, DEFAULT_REQUEST_TIMEOUT,
};

async fn publish_calc(node: &Arc<RobotRaconteurNode>, name: &str) -> Arc<ServerContext> {
    node.register_service_type(Arc::new(
        TextServiceFactory::new(TESTSVC_ROBDEF).expect("Failed to parse test definition"),
    ))
    .expect("Failed to register service type");
    node.register_service(name, "experimental.testsvc", CalcObject::new("Calc"), None)
        .await
        .expect("Failed to register service")
}

#[tokio::test]
async fn test_connect_call_disconnect_round_trip() {
    let server = RobotRaconteurNode::new();
    server.set_node_name("server_node").unwrap();
    let client_node = RobotRaconteurNode::new();
    link_nodes(&client_node, "rr+intra://server", &server, "rr+intra://client");
    let context = publish_calc(&server, "calc").await;

    let cancel = CancellationToken::new();
    let client = client_node
        .connect_service(&["rr+intra://server/?service=calc".to_string()], &cancel)
        .await
        .expect("Failed to connect to service");

    // The handshake learned the server's identity and endpoint
    assert_eq!(client.endpoint().remote_node_id(), server.node_id());
    assert_ne!(client.endpoint().remote_endpoint(), 0);
    assert_eq!(context.client_count(), 1);

    let mut entry = MessageEntry::new(MessageEntryType::FunctionCallReq, "add");
    entry.service_path = "calc".to_string();
    entry.add_element(MessageElement::int32("a", 19));
    entry.add_element(MessageElement::int32("b", 23));
    let response = client
        .request(entry, DEFAULT_REQUEST_TIMEOUT, &cancel)
        .await
        .expect("Function call failed");
    assert_eq!(
        response.expect_element("return").unwrap().value.as_i32(),
        Some(42)
    );

    // Unknown members fail without tearing the connection down
    let mut entry = MessageEntry::new(MessageEntryType::FunctionCallReq, "divide");
    entry.service_path = "calc".to_string();
    let err = client
        .request(entry, DEFAULT_REQUEST_TIMEOUT, &cancel)
        .await
        .expect_err("unknown member should fail");
    assert!(matches!(err, Error::MemberNotFound(_)), "got {:?}", err);

    client.close(&cancel).await.unwrap();
    assert_eq!(context.client_count(), 0);

    client_node.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_special_requests_answered_in_place() {
    let server = RobotRaconteurNode::new();
    let client_node = RobotRaconteurNode::new();
    link_nodes(&client_node, "rr+intra://server", &server, "rr+intra://client");
    let context = publish_calc(&server, "calc").await;
    context.set_attributes(vec![MessageElement::string("location", "lab")]);

    let cancel = CancellationToken::new();
    let client = client_node
        .connect_service(&["rr+intra://server/?service=calc".to_string()], &cancel)
        .await
        .unwrap();

    let control = |entry_type, service_path: &str| {
        let mut entry = MessageEntry::new(entry_type, "");
        entry.service_path = service_path.to_string();
        entry
    };

    // Liveness and identity checks are plain acks
    for t in [MessageEntryType::ConnectionTest, MessageEntryType::GetNodeInfo] {
        let response = client
            .request(control(t, ""), DEFAULT_REQUEST_TIMEOUT, &cancel)
            .await
            .expect("control request failed");
        assert_eq!(response.entry_type, t.response());
    }

    // No optional capabilities at this layer
    let response = client
        .request(
            control(MessageEntryType::NodeCheckCapability, ""),
            DEFAULT_REQUEST_TIMEOUT,
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(
        response.expect_element("return").unwrap().value.as_u32(),
        Some(0)
    );

    let response = client
        .request(
            control(MessageEntryType::ObjectTypeName, "calc"),
            DEFAULT_REQUEST_TIMEOUT,
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(
        response.expect_element("objecttype").unwrap().value.as_str(),
        Some("experimental.testsvc.Calc")
    );

    // Definition text of the live service, with its attribute map
    let response = client
        .request(
            control(MessageEntryType::GetServiceDesc, "calc"),
            DEFAULT_REQUEST_TIMEOUT,
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(
        response.expect_element("servicedef").unwrap().value.as_str(),
        Some(TESTSVC_ROBDEF)
    );
    let attrs = response.expect_element("attributes").unwrap();
    assert_eq!(
        attrs.value.map_get("location").and_then(|e| e.value.as_str()),
        Some("lab")
    );

    // Definition text by explicit type name
    let mut entry = control(MessageEntryType::GetServiceDesc, "");
    entry.add_element(MessageElement::string("servicetype", "experimental.testsvc"));
    let response = client
        .request(entry, DEFAULT_REQUEST_TIMEOUT, &cancel)
        .await
        .unwrap();
    assert_eq!(
        response.expect_element("servicedef").unwrap().value.as_str(),
        Some(TESTSVC_ROBDEF)
    );

    let response = client
        .request(
            control(MessageEntryType::GetServiceAttributes, "calc"),
            DEFAULT_REQUEST_TIMEOUT,
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(
        response
            .expect_element("attributes")
            .unwrap()
            .value
            .map_get("location")
            .and_then(|e| e.value.as_str()),
        Some("lab")
    );

    // Unknown paths and unsupported special requests degrade to errors
    let err = client
        .request(
            control(MessageEntryType::ObjectTypeName, "calc.tool"),
            DEFAULT_REQUEST_TIMEOUT,
            &cancel,
        )
        .await
        .expect_err("sub-object path should fail");
    assert!(matches!(err, Error::ObjectNotFound(_)), "got {:?}", err);

    let err = client
        .request(
            control(MessageEntryType::ReconnectClient, "calc"),
            DEFAULT_REQUEST_TIMEOUT,
            &cancel,
        )
        .await
        .expect_err("unsupported special request should fail");
    assert!(matches!(err, Error::Protocol(_)), "got {:?}", err);

    client_node.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_connect_to_missing_service_fails() {
    let server = RobotRaconteurNode::new();
    let client_node = RobotRaconteurNode::new();
    link_nodes(&client_node, "rr+intra://server", &server, "rr+intra://client");

    let cancel = CancellationToken::new();
    let err = client_node
        .connect_service(&["rr+intra://server/?service=missing".to_string()], &cancel)
        .await
        .expect_err("connect should fail");
    assert!(matches!(err, Error::ServiceNotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_authenticated_service_refuses_anonymous_connect() {
    let server = RobotRaconteurNode::new();
    let client_node = RobotRaconteurNode::new();
    link_nodes(&client_node, "rr+intra://server", &server, "rr+intra://client");

    server
        .register_service_type(Arc::new(TextServiceFactory::new(TESTSVC_ROBDEF).unwrap()))
        .unwrap();
    let policies = [("requirevaliduser".to_string(), "true".to_string())];
    server
        .register_service(
            "calc",
            "experimental.testsvc",
            CalcObject::new("Calc"),
            Some(SecurityPolicy::new(policies.into_iter().collect())),
        )
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let err = client_node
        .connect_service(&["rr+intra://server/?service=calc".to_string()], &cancel)
        .await
        .expect_err("anonymous connect should fail");
    assert!(matches!(err, Error::Authentication(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_register_service_replaces_prior_instance() {
    let node = RobotRaconteurNode::new();
    let first = publish_calc(&node, "calc").await;
    assert!(!first.is_closed());

    let second = node
        .register_service("calc", "experimental.testsvc", CalcObject::new("SciCalc"), None)
        .await
        .unwrap();

    assert!(first.is_closed());
    assert!(!second.is_closed());
    let current = node.get_service("calc").unwrap();
    assert!(Arc::ptr_eq(&current, &second));
    assert_eq!(current.root_object_type(), "experimental.testsvc.SciCalc");
}

#[tokio::test]
async fn test_concurrent_registrations_leave_one_live_context() {
    let node = RobotRaconteurNode::new();
    let original = publish_calc(&node, "calc").await;

    let (a, b) = tokio::join!(
        node.register_service("calc", "experimental.testsvc", CalcObject::new("Calc"), None),
        node.register_service("calc", "experimental.testsvc", CalcObject::new("SciCalc"), None),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    // Whichever registration lost the swap must have been closed by the
    // winner; the name must still resolve, and only to the winner.
    assert!(original.is_closed());
    let current = node.get_service("calc").unwrap();
    assert!(Arc::ptr_eq(&current, &a) || Arc::ptr_eq(&current, &b));
    let (winner, loser) = if Arc::ptr_eq(&current, &a) { (a, b) } else { (b, a) };
    assert!(!winner.is_closed());
    assert!(loser.is_closed());
}

#[tokio::test]
async fn test_service_changes_rotate_nonce_and_notify_transports() {
    let server = RobotRaconteurNode::new();
    let client_node = RobotRaconteurNode::new();
    let (_, tb) = link_nodes(&client_node, "rr+intra://server", &server, "rr+intra://client");

    let before = server.service_state_nonce();
    publish_calc(&server, "calc").await;
    let after_register = server.service_state_nonce();
    assert_ne!(before, after_register);
    assert_eq!(tb.services_changed_count(), 1);

    let cancel = CancellationToken::new();
    server.close_service("calc", &cancel).await.unwrap();
    assert_ne!(server.service_state_nonce(), after_register);
    assert_eq!(tb.services_changed_count(), 2);
}

#[tokio::test]
async fn test_foreign_node_message_mirrors_request_entries() {
    let node = RobotRaconteurNode::new();
    let transport = RecordingTransport::new();
    let transport_id = node.register_transport(transport.clone());

    let mut message = Message::new();
    message.header.sender_node_id = NodeID::new_random();
    message.header.receiver_node_id = NodeID::new_random();
    message.header.sender_endpoint = 11;
    message.header.receiver_endpoint = 22;
    let mut e1 = MessageEntry::new(MessageEntryType::FunctionCallReq, "add");
    e1.request_id = 5;
    e1.service_path = "calc".to_string();
    message.entries.push(e1);
    message
        .entries
        .push(MessageEntry::new(MessageEntryType::FunctionCallRes, "add"));
    let mut e3 = MessageEntry::new(MessageEntryType::ConnectClient, "");
    e3.request_id = 6;
    message.entries.push(e3);

    node.message_received(message, transport_id).await;

    let sent = transport.take_sent();
    assert_eq!(sent.len(), 1);
    let ret = &sent[0];
    // Only the two odd-typed request entries are mirrored
    assert_eq!(ret.entries.len(), 2);
    assert_eq!(ret.header.receiver_endpoint, 11);
    assert_eq!(ret.entries[0].entry_type, MessageEntryType::FunctionCallRes);
    assert_eq!(ret.entries[0].request_id, 5);
    assert_eq!(ret.entries[0].error, MessageErrorType::NodeNotFound);
    assert_eq!(ret.entries[1].entry_type, MessageEntryType::ConnectClientRet);
    assert_eq!(ret.entries[1].request_id, 6);
}

#[tokio::test]
async fn test_unregistered_endpoint_yields_invalid_endpoint_return() {
    let node = RobotRaconteurNode::new();
    let transport = RecordingTransport::new();
    let transport_id = node.register_transport(transport.clone());

    let mut message = Message::new();
    message.header.sender_node_id = NodeID::new_random();
    message.header.receiver_node_id = node.node_id();
    message.header.receiver_endpoint = 9999;
    let mut entry = MessageEntry::new(MessageEntryType::FunctionCallReq, "add");
    entry.request_id = 1;
    message.entries.push(entry);

    node.message_received(message, transport_id).await;

    let sent = transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].entries.len(), 1);
    assert_eq!(sent[0].entries[0].error, MessageErrorType::InvalidEndpoint);
}

#[tokio::test]
async fn test_send_message_rejects_foreign_sender() {
    let node = RobotRaconteurNode::new();
    let mut message = Message::new();
    message.header.sender_node_id = NodeID::new_random();
    let cancel = CancellationToken::new();
    let err = node
        .send_message(&message, &cancel)
        .await
        .expect_err("foreign sender should be rejected");
    assert!(matches!(err, Error::Connection(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_shutdown_closes_services_and_endpoints() {
    let server = RobotRaconteurNode::new();
    let client_node = RobotRaconteurNode::new();
    link_nodes(&client_node, "rr+intra://server", &server, "rr+intra://client");
    let context = publish_calc(&server, "calc").await;

    let cancel = CancellationToken::new();
    let client = client_node
        .connect_service(&["rr+intra://server/?service=calc".to_string()], &cancel)
        .await
        .unwrap();
    assert_eq!(context.client_count(), 1);

    server.shutdown().await;
    assert!(context.is_closed());
    assert!(server.get_service("calc").is_none());

    // The torn-down server no longer answers
    let mut entry = MessageEntry::new(MessageEntryType::FunctionCallReq, "add");
    entry.service_path = "calc".to_string();
    entry.add_element(MessageElement::int32("a", 1));
    entry.add_element(MessageElement::int32("b", 2));
    let result = client
        .request(entry, std::time::Duration::from_millis(200), &cancel)
        .await;
    assert!(result.is_err());

    client_node.shutdown().await;
}
