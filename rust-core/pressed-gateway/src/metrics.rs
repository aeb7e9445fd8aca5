// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Prometheus counters for access decisions.

use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};

use pressed_access::GuardVerdict;

/// Decision and failure counters, registered on a private registry.
#[derive(Clone)]
pub struct GuardMetrics {
    registry: Registry,
    decisions: IntCounterVec,
    failures: IntCounterVec,
}

impl GuardMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new(
                "pressed_access_decisions_total",
                "Access decisions for protected paths, by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(decisions.clone()))?;

        let failures = IntCounterVec::new(
            Opts::new(
                "pressed_access_failures_total",
                "Auth provider and role store failures folded into a decision, by kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(failures.clone()))?;

        Ok(Self {
            registry,
            decisions,
            failures,
        })
    }

    /// Count a verdict. Public paths are not counted.
    pub fn observe(&self, verdict: &GuardVerdict) {
        if !verdict.class.is_protected() {
            return;
        }
        self.decisions
            .with_label_values(&[verdict.decision.label()])
            .inc();
        for failure in &verdict.failures {
            self.failures.with_label_values(&[failure.kind()]).inc();
        }
    }

    pub fn decision_count(&self, outcome: &str) -> u64 {
        self.decisions.with_label_values(&[outcome]).get()
    }

    pub fn failure_count(&self, kind: &str) -> u64 {
        self.failures.with_label_values(&[kind]).get()
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pressed_access::{build_response, AccessDecision, AccessError, RedirectTargets, RouteClass};

    fn verdict(class: RouteClass, decision: AccessDecision, failures: Vec<AccessError>) -> GuardVerdict {
        let instruction = build_response(&decision, &RedirectTargets::default());
        GuardVerdict {
            class,
            decision,
            instruction,
            rotation: None,
            clear_access_token: false,
            clear_refresh_token: false,
            subject: None,
            role: None,
            failures,
        }
    }

    #[test]
    fn test_counts_protected_decisions() {
        let metrics = GuardMetrics::new().unwrap();
        metrics.observe(&verdict(RouteClass::Admin, AccessDecision::Allow, vec![]));
        metrics.observe(&verdict(
            RouteClass::Admin,
            AccessDecision::DenyUnauthorized,
            vec![AccessError::ProviderUnreachable("down".into())],
        ));
        metrics.observe(&verdict(RouteClass::Public, AccessDecision::Allow, vec![]));

        assert_eq!(metrics.decision_count("allow"), 1);
        assert_eq!(metrics.decision_count("deny_unauthorized"), 1);
        assert_eq!(metrics.failure_count("provider_unreachable"), 1);
    }

    #[test]
    fn test_render_exposition() {
        let metrics = GuardMetrics::new().unwrap();
        metrics.observe(&verdict(
            RouteClass::Account,
            AccessDecision::DenyUnauthenticated {
                return_path: "/account".into(),
            },
            vec![],
        ));
        let text = metrics.render().unwrap();
        assert!(text.contains("pressed_access_decisions_total{outcome=\"deny_unauthenticated\"} 1"));
    }
}
