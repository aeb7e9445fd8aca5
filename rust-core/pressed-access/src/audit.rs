// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Bounded in-memory log of access verdicts for protected paths.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::route::RouteClass;

/// A single entry in the access audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Timestamp of the decision (seconds since UNIX epoch).
    pub timestamp: i64,
    /// Subject of the resolved session, if any.
    pub subject: Option<String>,
    /// Requested path, as classified (query string stripped).
    pub path: String,
    pub class: RouteClass,
    /// Decision label (`allow`, `deny_unauthenticated`, `deny_unauthorized`).
    pub outcome: String,
    /// Failure kinds folded into the decision, if any.
    pub failures: Vec<String>,
}

impl AuditEntry {
    pub fn now(
        subject: Option<String>,
        path: String,
        class: RouteClass,
        outcome: &str,
        failures: Vec<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now().timestamp(),
            subject,
            path,
            class,
            outcome: outcome.to_string(),
            failures,
        }
    }
}

/// Thread-safe ring buffer of [`AuditEntry`] values.
#[derive(Debug, Clone)]
pub struct AuditLog {
    entries: Arc<Mutex<VecDeque<AuditEntry>>>,
    /// Maximum number of entries retained; the oldest is dropped first.
    max_entries: usize,
}

impl AuditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(max_entries.min(4096)))),
            max_entries,
        }
    }

    // Entries are plain data; a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, entry: AuditEntry) {
        if self.max_entries == 0 {
            return;
        }
        let mut entries = self.lock();
        while entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Snapshot of all retained entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().iter().cloned().collect()
    }

    /// The `limit` most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}
