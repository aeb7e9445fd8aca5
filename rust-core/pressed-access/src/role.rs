// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Role lookup against the external role store.
//!
//! The role table is the single source of role truth; claims carried inside
//! the access token are never consulted. Every lookup yields exactly one
//! [`Role`]. A subject without a record is a [`Role::Customer`], and so is a
//! subject whose lookup failed: the failure travels next to the role on the
//! [`RoleOutcome`] instead of replacing it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::RoleCache;
use crate::error::AccessError;
use crate::session::SubjectId;

/// Authorization tier of a subject.
///
/// `Customer` is the default and the least-privileged value. New tiers must be
/// added here and in [`Role::from_str`]; unknown strings never map to `Admin`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        if value.eq_ignore_ascii_case("customer") {
            Ok(Role::Customer)
        } else if value.eq_ignore_ascii_case("admin") {
            Ok(Role::Admin)
        } else {
            Err(AccessError::MalformedRoleRecord(format!(
                "unrecognized role value {value:?}"
            )))
        }
    }
}

/// The external role store: a read-only map from subject to role string.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Fetch the raw role value for `subject`. `Ok(None)` means no record.
    async fn fetch_role(&self, subject: &SubjectId) -> Result<Option<String>, AccessError>;

    /// A human-readable name for this store, used in logging.
    fn name(&self) -> &str;
}

/// Where the role on a [`RoleOutcome`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    /// Read from the store on this request.
    Record,
    /// Served from the role cache.
    Cached,
    /// The store had no record; the default applied.
    NoRecord,
    /// The lookup failed; the least-privileged role applied.
    FailedClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleOutcome {
    pub role: Role,
    pub source: RoleSource,
    /// Set when the lookup failed. The role is then always `Customer`.
    pub failure: Option<AccessError>,
}

impl RoleOutcome {
    fn resolved(role: Role, source: RoleSource) -> Self {
        Self {
            role,
            source,
            failure: None,
        }
    }

    fn failed_closed(err: AccessError) -> Self {
        Self {
            role: Role::Customer,
            source: RoleSource::FailedClosed,
            failure: Some(err),
        }
    }
}

/// Looks up roles through an injected store, optionally fronted by a cache.
#[derive(Clone)]
pub struct RoleLookup {
    store: Arc<dyn RoleStore>,
    cache: Option<RoleCache>,
}

impl RoleLookup {
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self { store, cache: None }
    }

    pub fn with_cache(mut self, cache: RoleCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&RoleCache> {
        self.cache.as_ref()
    }

    /// Resolve the role of an already validated subject.
    pub async fn lookup(&self, subject: &SubjectId) -> RoleOutcome {
        if let Some(cache) = &self.cache {
            if let Some(role) = cache.get(subject).await {
                return RoleOutcome::resolved(role, RoleSource::Cached);
            }
        }
        let epoch = self.cache.as_ref().map(RoleCache::epoch);

        let outcome = match self.store.fetch_role(subject).await {
            Ok(Some(raw)) => match raw.parse::<Role>() {
                Ok(role) => RoleOutcome::resolved(role, RoleSource::Record),
                Err(err) => RoleOutcome::failed_closed(err),
            },
            Ok(None) => {
                debug!(subject = %subject, "no role record, defaulting to customer");
                RoleOutcome::resolved(Role::Customer, RoleSource::NoRecord)
            }
            Err(err) => RoleOutcome::failed_closed(err),
        };

        match (&outcome.failure, &self.cache, epoch) {
            (Some(err), _, _) => {
                warn!(
                    subject = %subject,
                    store = %self.store.name(),
                    failure = err.kind(),
                    error = %err,
                    "role lookup failed closed to customer"
                );
            }
            (None, Some(cache), Some(epoch)) => {
                cache.insert_if_current(subject.clone(), outcome.role, epoch).await;
            }
            _ => {}
        }
        outcome
    }

    /// Forget anything cached for `subject` after its role changed upstream.
    pub async fn revoke(&self, subject: &SubjectId) {
        if let Some(cache) = &self.cache {
            cache.revoke(subject).await;
            debug!(subject = %subject, "role cache entry revoked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_roles() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("customer".parse::<Role>().unwrap(), Role::Customer);
        assert_eq!(" Admin ".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn test_parse_unknown_role_is_malformed() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert!(matches!(err, AccessError::MalformedRoleRecord(_)));
        assert!("".parse::<Role>().is_err());
        assert!("administrator".parse::<Role>().is_err());
    }

    #[test]
    fn test_default_role_is_customer() {
        assert_eq!(Role::default(), Role::Customer);
        assert!(!Role::default().is_admin());
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"customer\"").unwrap();
        assert_eq!(role, Role::Customer);
    }
}
