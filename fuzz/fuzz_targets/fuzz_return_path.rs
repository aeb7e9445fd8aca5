// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for login return-path encoding and resume

#![no_main]

use libfuzzer_sys::fuzz_target;
use pressed_access::{login_location, resume_location, RedirectTargets};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Whatever arrives in the redirect parameter, resume stays on-site.
        let resumed = resume_location(Some(s));
        assert!(resumed.starts_with('/'));
        assert!(!resumed.starts_with("//"));
        assert!(!resumed.starts_with("/\\"));

        let location = login_location(&RedirectTargets::default(), s);
        assert!(location.starts_with("/login?redirect="));
    }
});
