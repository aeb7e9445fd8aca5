// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Translation of an [`AccessDecision`] into an HTTP-level instruction, and
//! the inverse step the login page performs to resume navigation.

use serde::{Deserialize, Serialize};

use crate::decision::AccessDecision;

/// Fixed redirect destinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectTargets {
    /// Login entry point.
    pub login_path: String,
    /// Fixed access-denied page.
    pub unauthorized_path: String,
    /// Query parameter on the login URL that carries the return path.
    pub return_param: String,
}

impl Default for RedirectTargets {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            unauthorized_path: "/unauthorized".to_string(),
            return_param: "redirect".to_string(),
        }
    }
}

/// What the HTTP layer should do with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseInstruction {
    PassThrough,
    Redirect { location: String },
}

impl ResponseInstruction {
    pub fn location(&self) -> Option<&str> {
        match self {
            ResponseInstruction::Redirect { location } => Some(location),
            ResponseInstruction::PassThrough => None,
        }
    }
}

pub fn build_response(decision: &AccessDecision, targets: &RedirectTargets) -> ResponseInstruction {
    match decision {
        AccessDecision::Allow => ResponseInstruction::PassThrough,
        AccessDecision::DenyUnauthenticated { return_path } => ResponseInstruction::Redirect {
            location: login_location(targets, return_path),
        },
        AccessDecision::DenyUnauthorized => ResponseInstruction::Redirect {
            location: targets.unauthorized_path.clone(),
        },
    }
}

/// Login URL carrying `return_path` in the return parameter.
pub fn login_location(targets: &RedirectTargets, return_path: &str) -> String {
    format!(
        "{}?{}={}",
        targets.login_path,
        targets.return_param,
        encode_return_path(return_path)
    )
}

/// Percent-encode a return path for use as a query value.
///
/// Slashes stay literal so the common case reads naturally
/// (`/login?redirect=/account/addresses`); everything else that is not
/// unreserved is encoded, which keeps `?`, `&`, `=` and `#` of the original
/// target from leaking into the login URL's own query.
pub fn encode_return_path(return_path: &str) -> String {
    return_path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Where to send the user after a successful login.
///
/// `raw_param` is the still-encoded value of the return parameter. Anything
/// that is not a same-origin absolute path falls back to `/`.
pub fn resume_location(raw_param: Option<&str>) -> String {
    raw_param
        .and_then(|raw| urlencoding::decode(raw).ok())
        .map(|decoded| decoded.into_owned())
        .filter(|path| is_local_path(path))
        .unwrap_or_else(|| "/".to_string())
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.starts_with("/\\")
        && !path.chars().any(char::is_control)
}
