//! Subscription bus
//!
//! Per-topic sets of zero-argument callbacks. A notification says only
//! "something changed"; subscribers re-read the value themselves, so one
//! that re-reads after being notified always sees a value at least as new
//! as the one that triggered it.
//!
//! [`SubscriptionBus::subscribe`] hands back a [`Subscription`] guard.
//! Dropping the guard (or calling [`Subscription::unsubscribe`]) removes
//! exactly that callback; doing so twice is a no-op.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::trace;

use crate::registry::LogicalKey;

/// Callback invoked on change
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Which batch a hydration broadcast belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HydrationScope {
    Shared,
    User,
}

/// What a callback is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Changes to one resource category
    Resource(LogicalKey),
    /// Completion of a hydration batch
    Hydrated(HydrationScope),
}

/// One registered callback
///
/// `alive` is shared with the [`Subscription`] and cleared on unsubscribe,
/// so a notification already in flight skips it.
struct Entry {
    id: u64,
    alive: Arc<AtomicBool>,
    callback: Callback,
}

type Registry = HashMap<Topic, Vec<Entry>>;

/// Registry of change callbacks
#[derive(Default)]
pub struct SubscriptionBus {
    registry: Arc<Mutex<Registry>>,
    next_id: AtomicU64,
}

impl SubscriptionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for changes to `key`
    pub fn subscribe(&self, key: LogicalKey, callback: Callback) -> Subscription {
        self.subscribe_topic(Topic::Resource(key), callback)
    }

    /// Register `callback` for a topic
    pub fn subscribe_topic(&self, topic: Topic, callback: Callback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let alive = Arc::new(AtomicBool::new(true));
        lock(&self.registry).entry(topic).or_default().push(Entry {
            id,
            alive: alive.clone(),
            callback,
        });
        trace!(?topic, id = id, "Subscribed");

        Subscription {
            registry: Arc::downgrade(&self.registry),
            topic,
            id,
            alive,
        }
    }

    /// Invoke every callback registered for `key`
    pub fn notify(&self, key: LogicalKey) {
        self.notify_topic(Topic::Resource(key));
    }

    /// Invoke every callback registered for a topic
    ///
    /// Callbacks run after the registry lock is released, so they may
    /// subscribe, unsubscribe or read freely. A callback unsubscribed by an
    /// earlier one in the same round is skipped; one subscribed during the
    /// round waits for the next.
    pub fn notify_topic(&self, topic: Topic) {
        let callbacks: Vec<(Arc<AtomicBool>, Callback)> = lock(&self.registry)
            .get(&topic)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| (entry.alive.clone(), entry.callback.clone()))
                    .collect()
            })
            .unwrap_or_default();

        trace!(?topic, count = callbacks.len(), "Notifying");
        for (alive, callback) in callbacks {
            if alive.load(Ordering::Acquire) {
                callback();
            }
        }
    }

    /// Number of live callbacks for `key`
    pub fn subscriber_count(&self, key: LogicalKey) -> usize {
        lock(&self.registry)
            .get(&Topic::Resource(key))
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for SubscriptionBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = lock(&self.registry);
        f.debug_struct("SubscriptionBus")
            .field("topics", &registry.len())
            .finish()
    }
}

/// Guard for one registered callback
///
/// Removes the callback when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    topic: Topic,
    id: u64,
    alive: Arc<AtomicBool>,
}

impl Subscription {
    /// Remove the callback; later calls do nothing
    pub fn unsubscribe(&mut self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }

        // Bus already gone: nothing left to remove from
        let Some(registry) = self.registry.upgrade() else {
            return;
        };

        let mut registry = lock(&registry);
        if let Some(entries) = registry.get_mut(&self.topic) {
            entries.retain(|entry| entry.id != self.id);
            if entries.is_empty() {
                registry.remove(&self.topic);
            }
        }
        trace!(topic = ?self.topic, id = self.id, "Unsubscribed");
    }

    pub fn is_active(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

fn lock(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}
