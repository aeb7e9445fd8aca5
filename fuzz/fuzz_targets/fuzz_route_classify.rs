// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for path normalisation and route classification

#![no_main]

use libfuzzer_sys::fuzz_target;
use pressed_access::{normalize_path, RouteClass, RouteTable};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let routes = RouteTable::default();
        let class = routes.classify(s);

        let normalized = normalize_path(s);
        assert!(normalized.starts_with('/'));
        assert!(normalized == "/" || !normalized.ends_with('/'));
        assert!(!normalized.contains('\\'));
        assert!(!normalized.split('/').any(|seg| seg == "." || seg == ".."));
        assert_eq!(normalize_path(&normalized), normalized);

        // The normalised reading alone is never stricter than the full one.
        assert!(class >= routes.classify(&normalized));
        if s.starts_with("/admin/") || s == "/admin" {
            assert_eq!(class, RouteClass::Admin);
        }
    }
});
