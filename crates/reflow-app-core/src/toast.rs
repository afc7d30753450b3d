// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Simple toast queue with per-entry TTL for Reflow surfaces.
//!
//! The queue is clock-agnostic: callers pass `now` in, so it can be driven
//! from a timer task or swept lazily on read.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// An action went through.
    Success,
    /// Something failed and the user should know.
    Error,
    /// Informational note.
    Info,
    /// Warning that may need attention.
    Warning,
}

/// Identifier for a toast entry.
pub type ToastId = u64;

/// Toast data stored in the queue.
#[derive(Debug, Clone)]
pub struct Toast {
    /// Stable identifier.
    pub id: ToastId,
    /// Severity.
    pub severity: Severity,
    /// User-facing message.
    pub message: String,
    /// Time-to-live duration.
    pub ttl: Duration,
    /// Creation time.
    pub created: Instant,
}

/// In-memory toast queue kept in insertion order.
pub struct ToastQueue {
    queue: VecDeque<Toast>,
    next_id: ToastId,
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastQueue {
    /// Create an empty queue. Ids start at 1.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Push a toast and return its freshly assigned id.
    pub fn push<M>(
        &mut self,
        severity: Severity,
        message: M,
        ttl: Duration,
        now: Instant,
    ) -> ToastId
    where
        M: Into<String>,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push_back(Toast {
            id,
            severity,
            message: message.into(),
            ttl,
            created: now,
        });
        id
    }

    /// Remove a toast by id, returning it if it was still queued.
    pub fn remove(&mut self, id: ToastId) -> Option<Toast> {
        let idx = self.queue.iter().position(|t| t.id == id)?;
        self.queue.remove(idx)
    }

    /// Drop expired toasts and return the ids that were dropped.
    pub fn retain_visible(&mut self, now: Instant) -> Vec<ToastId> {
        let mut expired = Vec::new();
        self.queue.retain(|t| {
            let keep = now.duration_since(t.created) < t.ttl;
            if !keep {
                expired.push(t.id);
            }
            keep
        });
        expired
    }

    /// Iterate over queued toasts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.queue.iter()
    }

    /// Number of queued toasts.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every toast. Ids keep counting from where they were.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
