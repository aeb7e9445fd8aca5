// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pressed access control
//
// Route-level authorization for the Pressed storefront. A request path is
// classified as public, account or admin; protected paths require a session
// from the external auth provider, and admin paths additionally require the
// `admin` role from the role store. The result is a pass-through or a redirect.
//
// # Modules
//
// - [`route`] -- Path normalisation and classification.
// - [`session`] -- Credentials, sessions and the `AuthProvider` seam.
// - [`role`] -- Roles, the `RoleStore` seam and fail-closed lookup.
// - [`cache`] -- Optional TTL role cache with revocation.
// - [`decision`] -- The pure decision engine.
// - [`response`] -- Redirect construction and login resume.
// - [`guard`] -- `AccessGuard`, which runs the whole flow for one request.
// - [`audit`] -- Ring-buffer log of protected-path verdicts.
// - [`memory`] -- In-memory provider and store for tests and local runs.
//
// # Example
//
// ```rust
// use std::sync::Arc;
// use pressed_access::{
//     AccessGuard, Credentials, InMemoryAuthProvider, InMemoryRoleStore, RedirectTargets,
//     RoleLookup, RouteTable, SessionResolver,
// };
//
// # #[tokio::main(flavor = "current_thread")]
// # async fn main() {
// let provider = InMemoryAuthProvider::new();
// provider.issue("token-1", "user-1").await;
// let store = InMemoryRoleStore::new();
// store.set_role("user-1", "admin").await;
//
// let guard = AccessGuard::new(
//     RouteTable::default(),
//     RedirectTargets::default(),
//     SessionResolver::new(Arc::new(provider)),
//     RoleLookup::new(Arc::new(store)),
// );
//
// let creds = Credentials::new(Some("token-1".to_string()), None);
// let verdict = guard.evaluate("/admin/products", &creds).await;
// assert!(verdict.decision.is_allowed());
// # }
// ```

pub mod audit;
pub mod cache;
pub mod decision;
pub mod error;
pub mod guard;
pub mod memory;
pub mod response;
pub mod role;
pub mod route;
pub mod session;

pub use audit::{AuditEntry, AuditLog};
pub use cache::RoleCache;
pub use decision::{decide, decide_for_class, AccessDecision};
pub use error::AccessError;
pub use guard::{AccessGuard, GuardVerdict, VerdictSummary};
pub use memory::{InMemoryAuthProvider, InMemoryRoleStore};
pub use response::{
    build_response, encode_return_path, login_location, resume_location, RedirectTargets,
    ResponseInstruction,
};
pub use role::{Role, RoleLookup, RoleOutcome, RoleSource, RoleStore};
pub use route::{normalize_path, RouteClass, RouteError, RouteTable};
pub use session::{
    token_expiry, AuthProvider, AuthenticatedUser, CredentialKind, CredentialRotation,
    Credentials, Session, SessionOutcome, SessionResolver, SubjectId, TokenGrant,
    EXPIRY_MARGIN_SECS,
};
