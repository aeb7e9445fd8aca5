// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session resolution against the external auth provider.
//
// The resolver turns the credential bundle carried by a request (access and
// refresh token cookies) into an explicit `SessionOutcome`. Absence of a
// session is a normal value, never an error. Provider failures are folded into
// "no session" but stay visible on the outcome for logging.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AccessError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of an authenticated subject, as issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Credential material extracted from an inbound request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        // Empty cookie values are treated as absent.
        Self {
            access_token: access_token.filter(|t| !t.is_empty()),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
        }
    }

    /// True when the request carried no credential material at all.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

// Tokens must never end up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A verified authentication state for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The subject this session represents.
    pub subject: SubjectId,
    /// Whether the provider vouched for the credentials.
    pub valid: bool,
    /// Expiry of the access token, when the token exposes one.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A session the provider has just vouched for.
    pub fn verified(subject: SubjectId, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            subject,
            valid: true,
            expires_at,
        }
    }

    /// Valid and, if an expiry is known, not yet expired at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.valid && self.expires_at.map_or(true, |exp| exp > now)
    }
}

/// The user record the auth provider returns for a live access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Fresh credentials issued by the provider on a refresh grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthenticatedUser,
}

/// Instruction for the caller to persist rotated credentials.
///
/// The resolver never writes cookies itself; whoever owns the response must
/// apply this or the client keeps presenting the old, spent refresh token.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRotation {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for CredentialRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRotation")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Provider seam
// ---------------------------------------------------------------------------

/// The external auth provider, as seen by the session resolver.
///
/// Implementations report a definite rejection as
/// [`AccessError::CredentialInvalid`] and anything else that went wrong as
/// [`AccessError::ProviderUnreachable`].
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve the user behind a live access token.
    async fn user_for_token(&self, access_token: &str) -> Result<AuthenticatedUser, AccessError>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AccessError>;

    /// A human-readable name for this provider, used in logging.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Access tokens this close to their `exp` are refreshed rather than
/// presented, so provider clock skew and request latency do not turn a
/// refreshable session into a rejection.
pub const EXPIRY_MARGIN_SECS: i64 = 30;

/// Which presented credential a failure concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Access,
    Refresh,
}

/// Result of resolving one request's credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// No credentials were presented.
    Anonymous,
    /// The access token is live.
    Active(Session),
    /// The access token had expired and the provider rotated the pair.
    Refreshed {
        session: Session,
        rotation: CredentialRotation,
    },
    /// Credentials were presented but did not yield a session.
    Failed {
        error: AccessError,
        credential: CredentialKind,
    },
}

impl SessionOutcome {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionOutcome::Active(session) | SessionOutcome::Refreshed { session, .. } => {
                Some(session)
            }
            SessionOutcome::Anonymous | SessionOutcome::Failed { .. } => None,
        }
    }

    pub fn rotation(&self) -> Option<&CredentialRotation> {
        match self {
            SessionOutcome::Refreshed { rotation, .. } => Some(rotation),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&AccessError> {
        match self {
            SessionOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The credential the provider definitively refused, if any. Outages
    /// refuse nothing.
    pub fn refused(&self) -> Option<CredentialKind> {
        match self {
            SessionOutcome::Failed {
                error: AccessError::CredentialInvalid(_),
                credential,
            } => Some(*credential),
            _ => None,
        }
    }
}

/// Resolves request credentials into a session using an injected provider.
#[derive(Clone)]
pub struct SessionResolver {
    provider: Arc<dyn AuthProvider>,
}

impl SessionResolver {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }

    pub async fn resolve(&self, credentials: &Credentials) -> SessionOutcome {
        self.resolve_at(credentials, Utc::now()).await
    }

    /// Resolve with an explicit clock.
    ///
    /// Makes at most one provider call: a refresh grant when a refresh token
    /// is present and the access token is absent or within
    /// [`EXPIRY_MARGIN_SECS`] of expiry, a user lookup otherwise.
    pub async fn resolve_at(&self, credentials: &Credentials, now: DateTime<Utc>) -> SessionOutcome {
        let outcome = match (&credentials.access_token, &credentials.refresh_token) {
            (None, None) => {
                debug!("no credentials presented");
                return SessionOutcome::Anonymous;
            }
            (None, Some(refresh_token)) => self.refresh(refresh_token).await,
            (Some(token), refresh) => {
                let expires_at = token_expiry(token);
                let margin = chrono::Duration::seconds(EXPIRY_MARGIN_SECS);
                match refresh {
                    Some(refresh_token) if expires_at.is_some_and(|exp| exp <= now + margin) => {
                        self.refresh(refresh_token).await
                    }
                    None if expires_at.is_some_and(|exp| exp <= now) => SessionOutcome::Failed {
                        error: AccessError::CredentialInvalid("access token expired".to_string()),
                        credential: CredentialKind::Access,
                    },
                    _ => match self.provider.user_for_token(token).await {
                        Ok(user) => SessionOutcome::Active(Session::verified(
                            SubjectId::new(user.id),
                            expires_at,
                        )),
                        Err(error) => SessionOutcome::Failed {
                            error,
                            credential: CredentialKind::Access,
                        },
                    },
                }
            }
        };

        match &outcome {
            SessionOutcome::Failed { error, credential } if error.is_outage() => {
                warn!(provider = %self.provider.name(), ?credential, failure = error.kind(), error = %error, "session resolution failed closed");
            }
            SessionOutcome::Failed { error, credential } => {
                debug!(provider = %self.provider.name(), ?credential, failure = error.kind(), error = %error, "credentials rejected");
            }
            SessionOutcome::Refreshed { session, .. } => {
                debug!(subject = %session.subject, "session refreshed, rotation pending");
            }
            _ => {}
        }
        outcome
    }

    async fn refresh(&self, refresh_token: &str) -> SessionOutcome {
        match self.provider.refresh(refresh_token).await {
            Ok(grant) => {
                let session = Session::verified(SubjectId::new(grant.user.id), grant.expires_at);
                SessionOutcome::Refreshed {
                    session,
                    rotation: CredentialRotation {
                        access_token: grant.access_token,
                        refresh_token: grant.refresh_token,
                        expires_at: grant.expires_at,
                    },
                }
            }
            Err(error) => SessionOutcome::Failed {
                error,
                credential: CredentialKind::Refresh,
            },
        }
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

/// Read the `exp` claim of a JWT without verifying it.
///
/// Only used to skip a provider round trip for tokens that are already dead;
/// the provider remains the sole judge of validity. Opaque tokens yield `None`.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claim.exp?, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u-1","exp":{exp}}}"#));
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    #[test]
    fn test_token_expiry_reads_exp_claim() {
        let token = jwt_with_exp(1_700_000_000);
        let exp = token_expiry(&token).unwrap();
        assert_eq!(exp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_token_expiry_opaque_token() {
        assert!(token_expiry("opaque-session-token").is_none());
        assert!(token_expiry("a.b").is_none());
        assert!(token_expiry("a.b.c.d").is_none());
    }

    #[test]
    fn test_token_expiry_without_exp() {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"u-1"}"#);
        assert!(token_expiry(&format!("{header}.{payload}.sig")).is_none());
    }

    #[test]
    fn test_credentials_empty_values_are_absent() {
        let creds = Credentials::new(Some(String::new()), None);
        assert!(creds.is_empty());
    }

    #[test]
    fn test_credentials_debug_redacts_tokens() {
        let creds = Credentials::new(Some("secret-access".into()), Some("secret-refresh".into()));
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_session_liveness() {
        let now = Utc::now();
        let live = Session::verified(SubjectId::new("a"), Some(now + chrono::Duration::minutes(5)));
        let dead = Session::verified(SubjectId::new("a"), Some(now - chrono::Duration::minutes(5)));
        let open = Session::verified(SubjectId::new("a"), None);
        assert!(live.is_live_at(now));
        assert!(!dead.is_live_at(now));
        assert!(open.is_live_at(now));
    }

    #[test]
    fn test_outcome_accessors() {
        let session = Session::verified(SubjectId::new("a"), None);
        let outcome = SessionOutcome::Active(session.clone());
        assert_eq!(outcome.session(), Some(&session));
        assert!(outcome.rotation().is_none());
        assert!(outcome.failure().is_none());

        let failed = SessionOutcome::Failed {
            error: AccessError::CredentialInvalid("x".into()),
            credential: CredentialKind::Refresh,
        };
        assert!(failed.session().is_none());
        assert!(failed.failure().is_some());
        assert_eq!(failed.refused(), Some(CredentialKind::Refresh));
        assert!(SessionOutcome::Anonymous.session().is_none());

        let outage = SessionOutcome::Failed {
            error: AccessError::ProviderUnreachable("down".into()),
            credential: CredentialKind::Access,
        };
        assert_eq!(outage.refused(), None);
    }
}
