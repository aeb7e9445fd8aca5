// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory auth provider and role store.
//
// Both keep their data in a tokio `RwLock`ed map, count every call, and can be
// switched into an "unreachable" mode to simulate an outage. Intended for
// tests and local development without the managed backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::AccessError;
use crate::session::{AuthProvider, AuthenticatedUser, SubjectId, TokenGrant};
use crate::role::RoleStore;

/// An auth provider backed by token maps.
///
/// Access tokens map to users; refresh tokens map to the grant they redeem
/// for. A refresh token is single-use, as with the managed provider.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuthProvider {
    users: Arc<RwLock<HashMap<String, AuthenticatedUser>>>,
    grants: Arc<RwLock<HashMap<String, TokenGrant>>>,
    unreachable: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `access_token` as a live token for `user_id`.
    pub async fn issue(&self, access_token: &str, user_id: &str) {
        self.users.write().await.insert(
            access_token.to_string(),
            AuthenticatedUser {
                id: user_id.to_string(),
                email: None,
            },
        );
    }

    /// Make `refresh_token` redeemable for `grant`.
    pub async fn issue_refresh(&self, refresh_token: &str, grant: TokenGrant) {
        self.grants.write().await.insert(refresh_token.to_string(), grant);
    }

    /// Stop accepting `access_token`.
    pub async fn revoke(&self, access_token: &str) {
        self.users.write().await.remove(access_token);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of provider calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), AccessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AccessError::ProviderUnreachable(
                "in-memory provider marked unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn user_for_token(&self, access_token: &str) -> Result<AuthenticatedUser, AccessError> {
        self.enter()?;
        self.users
            .read()
            .await
            .get(access_token)
            .cloned()
            .ok_or_else(|| AccessError::CredentialInvalid("unknown access token".to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AccessError> {
        self.enter()?;
        let grant = self
            .grants
            .write()
            .await
            .remove(refresh_token)
            .ok_or_else(|| AccessError::CredentialInvalid("unknown refresh token".to_string()))?;
        self.users
            .write()
            .await
            .insert(grant.access_token.clone(), grant.user.clone());
        Ok(grant)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

/// A role store backed by a map from subject to raw role string.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoleStore {
    roles: Arc<RwLock<HashMap<SubjectId, String>>>,
    unreachable: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw role value. Any string is accepted, including malformed ones.
    pub async fn set_role(&self, subject: &str, role: &str) {
        self.roles
            .write()
            .await
            .insert(SubjectId::new(subject), role.to_string());
    }

    pub async fn remove_role(&self, subject: &str) {
        self.roles.write().await.remove(&SubjectId::new(subject));
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn fetch_role(&self, subject: &SubjectId) -> Result<Option<String>, AccessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AccessError::ProviderUnreachable(
                "in-memory role store marked unreachable".to_string(),
            ));
        }
        Ok(self.roles.read().await.get(subject).cloned())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_provider_known_and_unknown_tokens() {
        let provider = InMemoryAuthProvider::new();
        provider.issue("tok-1", "user-1").await;

        let user = provider.user_for_token("tok-1").await.unwrap();
        assert_eq!(user.id, "user-1");

        let err = provider.user_for_token("tok-2").await.unwrap_err();
        assert!(matches!(err, AccessError::CredentialInvalid(_)));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_token_is_single_use() {
        let provider = InMemoryAuthProvider::new();
        let grant = TokenGrant {
            access_token: "new-access".to_string(),
            refresh_token: "new-refresh".to_string(),
            expires_at: None,
            user: AuthenticatedUser {
                id: "user-1".to_string(),
                email: None,
            },
        };
        provider.issue_refresh("old-refresh", grant).await;

        assert!(provider.refresh("old-refresh").await.is_ok());
        assert!(provider.refresh("old-refresh").await.is_err());
        assert_eq!(provider.user_for_token("new-access").await.unwrap().id, "user-1");
    }

    #[tokio::test]
    async fn test_provider_outage() {
        let provider = InMemoryAuthProvider::new();
        provider.issue("tok-1", "user-1").await;
        provider.set_unreachable(true);
        let err = provider.user_for_token("tok-1").await.unwrap_err();
        assert!(err.is_outage());
    }

    #[tokio::test]
    async fn test_role_store_lookup() {
        let store = InMemoryRoleStore::new();
        store.set_role("user-1", "admin").await;
        assert_eq!(
            store.fetch_role(&SubjectId::new("user-1")).await.unwrap(),
            Some("admin".to_string())
        );
        assert_eq!(store.fetch_role(&SubjectId::new("user-2")).await.unwrap(), None);

        store.set_unreachable(true);
        assert!(store.fetch_role(&SubjectId::new("user-1")).await.is_err());
        assert_eq!(store.calls(), 3);
    }
}
