// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

#![no_main]

use libfuzzer_sys::fuzz_target;
use rrmw::RobotRaconteurNode;

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = std::str::from_utf8(data) {
        // Malformed packets must be dropped without panicking
        let node = RobotRaconteurNode::new();
        node.node_announce_packet_received(packet);
    }
});
