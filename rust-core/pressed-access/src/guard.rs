// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! The single enforcement point.
//!
//! [`AccessGuard::evaluate`] runs the whole flow for one request:
//!
//! 1. Classify the path. Public paths are allowed without touching the auth
//!    provider or the role store.
//! 2. Resolve the session.
//! 3. For admin paths with a session, look up the role.
//! 4. Decide, build the response instruction, record the verdict.
//!
//! Every other call site (middleware, page guards) should defer to this.

use serde::Serialize;
use tracing::{debug, info};

use crate::audit::{AuditEntry, AuditLog};
use crate::decision::{decide_for_class, AccessDecision};
use crate::error::AccessError;
use crate::response::{build_response, RedirectTargets, ResponseInstruction};
use crate::role::{Role, RoleLookup};
use crate::route::{normalize_path, RouteClass, RouteTable};
use crate::session::{CredentialKind, CredentialRotation, Credentials, SessionResolver, SubjectId};

/// Everything the HTTP layer needs to act on one request.
#[derive(Debug, Clone)]
pub struct GuardVerdict {
    pub class: RouteClass,
    pub decision: AccessDecision,
    pub instruction: ResponseInstruction,
    /// Rotated credentials the response must persist.
    pub rotation: Option<CredentialRotation>,
    /// The access token was definitively rejected; the response should
    /// clear it.
    pub clear_access_token: bool,
    /// The refresh token was definitively rejected; the response should
    /// clear it. Never set for a rejected access token alone, so a live
    /// refresh token survives to the next request.
    pub clear_refresh_token: bool,
    pub subject: Option<SubjectId>,
    /// Role used for the decision, when one was looked up.
    pub role: Option<Role>,
    /// Failures that were folded into fail-closed defaults.
    pub failures: Vec<AccessError>,
}

impl GuardVerdict {
    fn public() -> Self {
        Self {
            class: RouteClass::Public,
            decision: AccessDecision::Allow,
            instruction: ResponseInstruction::PassThrough,
            rotation: None,
            clear_access_token: false,
            clear_refresh_token: false,
            subject: None,
            role: None,
            failures: Vec::new(),
        }
    }

    pub fn summary(&self) -> VerdictSummary<'_> {
        VerdictSummary {
            class: self.class,
            outcome: self.decision.label(),
            subject: self.subject.as_ref().map(SubjectId::as_str),
            failures: self.failures.iter().map(AccessError::kind).collect(),
        }
    }
}

/// Summary of a verdict safe to expose to operators.
#[derive(Debug, Clone, Serialize)]
pub struct VerdictSummary<'a> {
    pub class: RouteClass,
    pub outcome: &'static str,
    pub subject: Option<&'a str>,
    pub failures: Vec<&'static str>,
}

pub struct AccessGuard {
    routes: RouteTable,
    redirects: RedirectTargets,
    sessions: SessionResolver,
    roles: RoleLookup,
    audit: Option<AuditLog>,
}

impl AccessGuard {
    pub fn new(
        routes: RouteTable,
        redirects: RedirectTargets,
        sessions: SessionResolver,
        roles: RoleLookup,
    ) -> Self {
        Self {
            routes,
            redirects,
            sessions,
            roles,
            audit: None,
        }
    }

    /// Record every protected-path verdict into `log`.
    pub fn with_audit(mut self, log: AuditLog) -> Self {
        self.audit = Some(log);
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn redirects(&self) -> &RedirectTargets {
        &self.redirects
    }

    pub fn roles(&self) -> &RoleLookup {
        &self.roles
    }

    /// Evaluate one request. `target` is the path with its query string.
    pub async fn evaluate(&self, target: &str, credentials: &Credentials) -> GuardVerdict {
        let class = self.routes.classify(target);
        if !class.is_protected() {
            return GuardVerdict::public();
        }

        let outcome = self.sessions.resolve(credentials).await;
        let mut failures: Vec<AccessError> = outcome.failure().cloned().into_iter().collect();
        // A refused refresh token means the access token was dead as well.
        let refused = outcome.refused();
        let clear_access_token = refused.is_some();
        let clear_refresh_token = refused == Some(CredentialKind::Refresh);
        let subject = outcome.session().map(|s| s.subject.clone());

        let role = match (class, &subject) {
            (RouteClass::Admin, Some(subject)) => {
                let looked_up = self.roles.lookup(subject).await;
                failures.extend(looked_up.failure);
                Some(looked_up.role)
            }
            _ => None,
        };

        let decision = decide_for_class(class, target, subject.is_some(), role.unwrap_or_default());
        let instruction = build_response(&decision, &self.redirects);

        let verdict = GuardVerdict {
            class,
            decision,
            instruction,
            rotation: outcome.rotation().cloned(),
            clear_access_token,
            clear_refresh_token,
            subject,
            role,
            failures,
        };
        self.record(target, &verdict);
        verdict
    }

    fn record(&self, target: &str, verdict: &GuardVerdict) {
        let summary = verdict.summary();
        if verdict.decision.is_allowed() {
            debug!(path = %target, class = %verdict.class, subject = ?summary.subject, "access allowed");
        } else {
            info!(
                path = %target,
                class = %verdict.class,
                subject = ?summary.subject,
                outcome = summary.outcome,
                failures = ?summary.failures,
                "access denied"
            );
        }

        if let Some(log) = &self.audit {
            log.record(AuditEntry::now(
                summary.subject.map(str::to_string),
                normalize_path(target),
                verdict.class,
                summary.outcome,
                summary.failures.iter().map(|k| k.to_string()).collect(),
            ));
        }
    }
}
