// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Route classification.
//!
//! Maps every request path to exactly one [`RouteClass`]. Matching is done on
//! segment boundaries, so `/accounting` is public while `/account`,
//! `/account/` and `/account/orders` are not. When more than one protected
//! root matches, the longest root wins; equal roots resolve to `Admin`.
//!
//! A path is matched twice: once as sent (segments split on `/` only, nothing
//! decoded) and once after [`normalize_path`]. The more restrictive of the two
//! classes is returned, so no encoding trick can make a path less protected
//! than either reading of it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protection class of a path.
/// Variants are ordered from least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteClass {
    Public,
    Account,
    Admin,
}

impl RouteClass {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteClass::Public => "public",
            RouteClass::Account => "account",
            RouteClass::Admin => "admin",
        }
    }

    pub fn is_protected(self) -> bool {
        self != RouteClass::Public
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("invalid route root {root:?}: {reason}")]
    InvalidRoot { root: String, reason: &'static str },
}

/// The protected roots of the storefront's route tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    account_root: String,
    admin_root: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            account_root: "/account".to_string(),
            admin_root: "/admin".to_string(),
        }
    }
}

impl RouteTable {
    pub fn new(account_root: &str, admin_root: &str) -> Result<Self, RouteError> {
        Ok(Self {
            account_root: validate_root(account_root)?,
            admin_root: validate_root(admin_root)?,
        })
    }

    pub fn account_root(&self) -> &str {
        &self.account_root
    }

    pub fn admin_root(&self) -> &str {
        &self.admin_root
    }

    /// Classify a request target. Query strings and fragments are ignored.
    pub fn classify(&self, path: &str) -> RouteClass {
        let as_sent = self.match_roots(&raw_path(path));
        let normalised = self.match_roots(&normalize_path(path));
        as_sent.max(normalised)
    }

    fn match_roots(&self, path: &str) -> RouteClass {
        // Admin first: on equal-length roots it is kept.
        let candidates = [
            (RouteClass::Admin, self.admin_root.as_str()),
            (RouteClass::Account, self.account_root.as_str()),
        ];

        let mut best: Option<(RouteClass, usize)> = None;
        for (class, root) in candidates {
            if is_within(path, root) && best.map_or(true, |(_, len)| root.len() > len) {
                best = Some((class, root.len()));
            }
        }
        best.map_or(RouteClass::Public, |(class, _)| class)
    }
}

fn validate_root(root: &str) -> Result<String, RouteError> {
    if !root.starts_with('/') {
        return Err(RouteError::InvalidRoot {
            root: root.to_string(),
            reason: "must start with '/'",
        });
    }
    if root.contains(['?', '#']) {
        return Err(RouteError::InvalidRoot {
            root: root.to_string(),
            reason: "must not contain a query or fragment",
        });
    }
    Ok(normalize_path(root))
}

fn is_within(path: &str, root: &str) -> bool {
    if root == "/" {
        return true;
    }
    match path.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// The path as sent, without query or fragment, with empty segments dropped.
fn raw_path(raw: &str) -> String {
    let path = strip_query(raw);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn strip_query(raw: &str) -> &str {
    raw.split(['?', '#']).next().unwrap_or_default()
}

/// Canonical form of a request path used for classification.
///
/// Drops query and fragment, then splits on `/` and `\` before decoding, so
/// an encoded separator (`%2f`, `%5c`) never becomes one. Each segment is
/// percent-decoded once (lossily for invalid UTF-8); decoded `.` and `..`
/// segments are collapsed and resolved without climbing above the root.
///
/// Characters that would change the meaning of the result on a second pass
/// (`%`, `/`, `\`, `?`, `#`) are re-escaped inside segments, which makes the
/// function idempotent. The result always starts with `/` and never ends
/// with one, except for the root itself.
pub fn normalize_path(raw: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    for segment in strip_query(raw).split(['/', '\\']) {
        match decode_segment(segment).as_str() {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(escape_segment(other)),
        }
    }
    format!("/{}", segments.join("/"))
}

fn decode_segment(segment: &str) -> String {
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes())).into_owned(),
    }
}

fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            '\\' => escaped.push_str("%5C"),
            '?' => escaped.push_str("%3F"),
            '#' => escaped.push_str("%23"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::default()
    }

    #[test]
    fn test_public_paths() {
        let t = table();
        for path in ["/", "/products", "/products/green-detox", "/cart", "/login", "/unauthorized"] {
            assert_eq!(t.classify(path), RouteClass::Public, "{path}");
        }
    }

    #[test]
    fn test_account_paths() {
        let t = table();
        for path in ["/account", "/account/", "/account/addresses", "/account/orders/42"] {
            assert_eq!(t.classify(path), RouteClass::Account, "{path}");
        }
    }

    #[test]
    fn test_admin_paths() {
        let t = table();
        for path in ["/admin", "/admin/", "/admin/products", "/admin/orders/7/edit"] {
            assert_eq!(t.classify(path), RouteClass::Admin, "{path}");
        }
    }

    #[test]
    fn test_segment_boundary() {
        let t = table();
        assert_eq!(t.classify("/accounting"), RouteClass::Public);
        assert_eq!(t.classify("/administrator"), RouteClass::Public);
        assert_eq!(t.classify("/admins/list"), RouteClass::Public);
    }

    #[test]
    fn test_query_and_fragment_ignored() {
        let t = table();
        assert_eq!(t.classify("/admin?tab=orders"), RouteClass::Admin);
        assert_eq!(t.classify("/products?next=/admin"), RouteClass::Public);
        assert_eq!(t.classify("/account#addresses"), RouteClass::Account);
    }

    #[test]
    fn test_obfuscated_paths_are_normalised() {
        let t = table();
        assert_eq!(t.classify("//admin"), RouteClass::Admin);
        assert_eq!(t.classify("/%61dmin/orders"), RouteClass::Admin);
        assert_eq!(t.classify("/products/../admin"), RouteClass::Admin);
        assert_eq!(t.classify("/./account/./orders"), RouteClass::Account);
        assert_eq!(t.classify("/..\\admin"), RouteClass::Admin);
        assert_eq!(t.classify("/../../account"), RouteClass::Account);
    }

    #[test]
    fn test_longest_root_wins() {
        let t = RouteTable::new("/account", "/account/admin").unwrap();
        assert_eq!(t.classify("/account/admin/users"), RouteClass::Admin);
        assert_eq!(t.classify("/account/orders"), RouteClass::Account);

        let t = RouteTable::new("/portal/admin", "/portal").unwrap();
        assert_eq!(t.classify("/portal/admin/x"), RouteClass::Account);
        assert_eq!(t.classify("/portal/x"), RouteClass::Admin);
    }

    #[test]
    fn test_identical_roots_resolve_to_admin() {
        let t = RouteTable::new("/console", "/console").unwrap();
        assert_eq!(t.classify("/console/x"), RouteClass::Admin);
    }

    #[test]
    fn test_invalid_roots_rejected() {
        assert!(RouteTable::new("account", "/admin").is_err());
        assert!(RouteTable::new("/account", "/admin?x=1").is_err());
    }

    #[test]
    fn test_roots_are_normalised() {
        let t = RouteTable::new("/account/", "//admin").unwrap();
        assert_eq!(t.account_root(), "/account");
        assert_eq!(t.admin_root(), "/admin");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/a//b/"), "/a/b");
        assert_eq!(normalize_path("/a/%2e%2e/b"), "/b");
        assert_eq!(normalize_path("/%FF/admin"), "/\u{FFFD}/admin");
        assert_eq!(normalize_path("/a\\b"), "/a/b");
    }

    #[test]
    fn test_encoded_separators_stay_inside_segment() {
        assert_eq!(
            normalize_path("/admin/products/%2e%2e%2f%2e%2e%2fx"),
            "/admin/products/..%2F..%2Fx"
        );
        assert_eq!(normalize_path("/a%5c..%5cb"), "/a%5C..%5Cb");
        assert_eq!(normalize_path("/a/%2e/b"), "/a/b");
    }

    #[test]
    fn test_normalize_decodes_once() {
        assert_eq!(normalize_path("/%2561dmin"), "/%2561dmin");
        assert_eq!(normalize_path("/%61dmin"), "/admin");
        assert_eq!(normalize_path("/a%3Fb%23c"), "/a%3Fb%23c");
        assert_eq!(normalize_path(&normalize_path("/%2561dmin")), "/%2561dmin");
    }

    #[test]
    fn test_encoded_dot_dot_cannot_escape_protected_root() {
        let t = table();
        assert_eq!(t.classify("/admin/products/%2e%2e%2f%2e%2e%2fx"), RouteClass::Admin);
        assert_eq!(t.classify("/admin/products/..%2f..%2fx"), RouteClass::Admin);
        assert_eq!(t.classify("/account/%2e%2e%5c%2e%2e%5cx"), RouteClass::Account);
        assert_eq!(t.classify("/admin%2f..%2fproducts"), RouteClass::Public);
    }

    #[test]
    fn test_more_restrictive_reading_wins() {
        let t = table();
        // As sent this is under /admin; resolved it is not.
        assert_eq!(t.classify("/admin/../products"), RouteClass::Admin);
        assert_eq!(t.classify("/admin/%2e%2e/products"), RouteClass::Admin);
        // Resolved it is under /admin; as sent it is not.
        assert_eq!(t.classify("/products/%2e%2e/admin"), RouteClass::Admin);
        assert_eq!(t.classify("/account/../admin"), RouteClass::Admin);
    }

    #[test]
    fn test_class_ordering() {
        assert!(RouteClass::Public < RouteClass::Account);
        assert!(RouteClass::Account < RouteClass::Admin);
    }
}
