// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Failure taxonomy for session resolution and role lookup.
//
// None of these errors ever reaches the decision engine. The session resolver
// and the role lookup convert each one into its fail-closed default (no
// session, `customer` role) and hand the error back alongside the result so
// the caller can log and count it.

use thiserror::Error;

/// Errors raised by the external auth provider or role store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    /// The presented credentials do not establish a session.
    #[error("credential invalid: {0}")]
    CredentialInvalid(String),

    /// The auth provider or role store could not be reached, or answered with
    /// something other than a definite yes/no.
    #[error("provider unreachable: {0}")]
    ProviderUnreachable(String),

    /// The role store returned a value that is not a known role.
    #[error("malformed role record: {0}")]
    MalformedRoleRecord(String),
}

impl AccessError {
    /// Stable snake_case label, used for metric labels and audit entries.
    pub fn kind(&self) -> &'static str {
        match self {
            AccessError::CredentialInvalid(_) => "credential_invalid",
            AccessError::ProviderUnreachable(_) => "provider_unreachable",
            AccessError::MalformedRoleRecord(_) => "malformed_role_record",
        }
    }

    /// True for outages, as opposed to a definite answer from the provider.
    pub fn is_outage(&self) -> bool {
        matches!(self, AccessError::ProviderUnreachable(_))
    }
}
