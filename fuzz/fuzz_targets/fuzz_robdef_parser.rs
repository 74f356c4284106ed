// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

#![no_main]

use libfuzzer_sys::fuzz_target;
use rrmw::robdef::ServiceDefinition;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Fuzz the robdef parser, warnings included
        let mut warnings = Vec::new();
        let _ = ServiceDefinition::from_string_with_warnings(text, &mut warnings);
    }
});
