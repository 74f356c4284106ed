// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

#![no_main]

use libfuzzer_sys::fuzz_target;
use rrmw::url::parse_connection_url;

fuzz_target!(|data: &[u8]| {
    if let Ok(url) = std::str::from_utf8(data) {
        let _ = parse_connection_url(url);
    }
});
