use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;

struct Slots<T: ?Sized> {
    next_id: u64,
    entries: BTreeMap<u64, Arc<T>>,
}

/// Insertion-ordered set of callbacks.
///
/// Cloning yields another handle to the same set. Callbacks are handed out via
/// [`SubscriberSet::snapshot`] so they always run without the lock held.
pub struct SubscriberSet<T: ?Sized> {
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T: ?Sized> Clone for SubscriberSet<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T: ?Sized> Default for SubscriberSet<T> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                entries: BTreeMap::new(),
            })),
        }
    }
}

impl<T: ?Sized> fmt::Debug for SubscriberSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("len", &self.slots.lock().entries.len())
            .finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> SubscriberSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; the returned handle removes it again.
    pub fn insert(&self, callback: Arc<T>) -> Subscription {
        let id = {
            let mut slots = self.slots.lock();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.entries.insert(id, callback);
            id
        };

        let slots: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = slots.upgrade() {
                slots.lock().entries.remove(&id);
            }
        })
    }

    /// Callbacks in registration order.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.slots.lock().entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by every `subscribe`/`on_change` call.
///
/// Dropping the handle keeps the subscription alive; only
/// [`Subscription::unsubscribe`] removes it, and calling it twice is a no-op.
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    pub fn unsubscribe(&self) {
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.lock().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
