// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! The access decision engine.
//!
//! A pure function of the route class and two facts about the request: is
//! there a session, and is its subject an admin. It never sees an error; the
//! session resolver and role lookup have already folded failures into "no
//! session" and [`Role::Customer`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::role::Role;
use crate::route::{RouteClass, RouteTable};
use crate::session::Session;

/// Verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    /// No session. Carries the requested path so login can resume there.
    DenyUnauthenticated { return_path: String },
    /// Session present but the subject is not eligible. Never carries a path.
    DenyUnauthorized,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    /// Stable snake_case label for metrics and audit entries.
    pub fn label(&self) -> &'static str {
        match self {
            AccessDecision::Allow => "allow",
            AccessDecision::DenyUnauthenticated { .. } => "deny_unauthenticated",
            AccessDecision::DenyUnauthorized => "deny_unauthorized",
        }
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify `path` and decide.
///
/// `path` is the request target as received; it becomes the return path of a
/// `DenyUnauthenticated` verdict unchanged, query string included.
pub fn decide(routes: &RouteTable, path: &str, session: Option<&Session>, role: Role) -> AccessDecision {
    decide_for_class(routes.classify(path), path, session.is_some(), role)
}

/// Decide for an already classified path.
pub fn decide_for_class(class: RouteClass, path: &str, has_session: bool, role: Role) -> AccessDecision {
    match class {
        RouteClass::Public => AccessDecision::Allow,
        RouteClass::Account if has_session => AccessDecision::Allow,
        RouteClass::Admin if has_session && role.is_admin() => AccessDecision::Allow,
        RouteClass::Admin if has_session => AccessDecision::DenyUnauthorized,
        RouteClass::Account | RouteClass::Admin => AccessDecision::DenyUnauthenticated {
            return_path: path.to_string(),
        },
    }
}
