// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Optional per-subject role cache.
//
// Entries live for a bounded time-to-live and the cache holds a bounded number
// of subjects. A revocation evicts the subject immediately and bumps an epoch;
// a lookup that started before the revocation is not allowed to write its
// (possibly stale) result back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::role::Role;
use crate::session::SubjectId;

#[derive(Clone)]
pub struct RoleCache {
    entries: Cache<SubjectId, Role>,
    epoch: Arc<AtomicU64>,
    ttl: Duration,
}

impl RoleCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            epoch: Arc::new(AtomicU64::new(0)),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, subject: &SubjectId) -> Option<Role> {
        self.entries.get(subject).await
    }

    /// Current revocation epoch. Read before fetching from the store.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Store `role` unless a revocation happened since `epoch` was read.
    pub async fn insert_if_current(&self, subject: SubjectId, role: Role, epoch: u64) -> bool {
        if self.epoch() != epoch {
            return false;
        }
        self.entries.insert(subject.clone(), role).await;
        // A revocation may have landed between the check and the insert.
        if self.epoch() != epoch {
            self.entries.invalidate(&subject).await;
            return false;
        }
        true
    }

    pub async fn revoke(&self, subject: &SubjectId) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.invalidate(subject).await;
    }
}

impl std::fmt::Debug for RoleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleCache")
            .field("ttl", &self.ttl)
            .field("epoch", &self.epoch())
            .finish()
    }
}
