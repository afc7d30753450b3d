// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fire-and-forget notifications that expire on their own.
//!
//! Wraps a [`ToastQueue`] with one Tokio timer per entry. Nothing here is
//! persisted.

use reflow_app_core::toast::{ToastId, ToastQueue};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use reflow_app_core::toast::Severity;

/// Identifier of a posted notification.
pub type NotificationId = ToastId;

const EVENT_CAPACITY: usize = 256;

/// A live notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Fresh id assigned by `post`.
    pub id: NotificationId,
    /// User-facing text.
    pub message: String,
    /// Severity.
    pub severity: Severity,
}

/// Lifecycle events for subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A notification became active.
    Posted(Notification),
    /// A notification reached its TTL.
    Expired(NotificationId),
    /// A notification was dismissed before its TTL.
    Dismissed(NotificationId),
}

/// Shared handle to the active notification set.
#[derive(Clone)]
pub struct NotificationChannel {
    shared: Arc<ChannelShared>,
}

struct ChannelShared {
    state: Mutex<ChannelState>,
    events: broadcast::Sender<NotificationEvent>,
    ttl: Duration,
}

#[derive(Default)]
struct ChannelState {
    queue: ToastQueue,
    timers: HashMap<NotificationId, JoinHandle<()>>,
}

impl ChannelState {
    fn abort_timers(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }
}

impl Drop for ChannelShared {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .abort_timers();
    }
}

impl ChannelShared {
    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Drop everything past its TTL, as of the runtime clock.
    fn sweep(&self, state: &mut ChannelState) {
        let now = tokio::time::Instant::now().into_std();
        for id in state.queue.retain_visible(now) {
            if let Some(timer) = state.timers.remove(&id) {
                timer.abort();
            }
            debug!(notification_id = id, "notification expired");
            let _ = self.events.send(NotificationEvent::Expired(id));
        }
    }

    fn expire(&self, id: NotificationId) {
        let mut state = self.lock();
        if state.queue.remove(id).is_some() {
            state.timers.remove(&id);
            debug!(notification_id = id, "notification expired");
            let _ = self.events.send(NotificationEvent::Expired(id));
        }
    }
}

impl NotificationChannel {
    /// Create a channel whose notifications live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(ChannelShared {
                state: Mutex::new(ChannelState::default()),
                events,
                ttl,
            }),
        }
    }

    /// How long a notification stays active.
    pub fn ttl(&self) -> Duration {
        self.shared.ttl
    }

    /// Subscribe to posted/expired/dismissed events.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.shared.events.subscribe()
    }

    /// Post a message and schedule its removal after the TTL.
    ///
    /// Outside a Tokio runtime no timer is armed; the notification is then
    /// dropped by the first [`active`](Self::active) call after its TTL.
    pub fn post(&self, message: impl Into<String>, severity: Severity) -> NotificationId {
        let message = message.into();
        let mut state = self.shared.lock();
        let id = state.queue.push(
            severity,
            message.clone(),
            self.shared.ttl,
            tokio::time::Instant::now().into_std(),
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let weak: Weak<ChannelShared> = Arc::downgrade(&self.shared);
                let ttl = self.shared.ttl;
                let timer = handle.spawn(async move {
                    tokio::time::sleep(ttl).await;
                    if let Some(shared) = weak.upgrade() {
                        shared.expire(id);
                    }
                });
                state.timers.insert(id, timer);
            }
            Err(_) => warn!(notification_id = id, "no runtime; expiry deferred to next read"),
        }

        debug!(notification_id = id, ?severity, %message, "notification posted");
        let _ = self.shared.events.send(NotificationEvent::Posted(Notification {
            id,
            message,
            severity,
        }));
        id
    }

    /// Remove a notification now. Returns `false` if it was already gone.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        let mut state = self.shared.lock();
        self.shared.sweep(&mut state);
        if state.queue.remove(id).is_none() {
            return false;
        }
        if let Some(timer) = state.timers.remove(&id) {
            timer.abort();
        }
        let _ = self.shared.events.send(NotificationEvent::Dismissed(id));
        true
    }

    /// Active notifications in insertion order.
    pub fn active(&self) -> Vec<Notification> {
        let mut state = self.shared.lock();
        self.shared.sweep(&mut state);
        state
            .queue
            .iter()
            .map(|t| Notification {
                id: t.id,
                message: t.message.clone(),
                severity: t.severity,
            })
            .collect()
    }

    /// Cancel every pending expiry timer and drop all active notifications.
    pub fn shutdown(&self) {
        let mut state = self.shared.lock();
        state.abort_timers();
        state.queue.clear();
    }
}
