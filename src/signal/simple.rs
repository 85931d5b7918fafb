//! Plain Notification Bus
//!
//! Thread-safe fan-out of a single argument value to every connected
//! callback. All operations serialise on one reentrant lock, so callbacks
//! may connect, disconnect or emit on the same bus from inside an emission.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::ReentrantMutex;

use crate::signal::registry::{Registry, SlotId};
use crate::signal::stats::DeliveryStats;

/// Callback stored by a [`Signal`]
pub type Slot<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Notification bus delivering `&A` to all connected callbacks.
///
/// Several arguments are passed as a tuple. Emission order is connection
/// order. An emission works from the subscriber list as it was when `emit`
/// was called; callbacks disconnected during that emission are not invoked
/// and callbacks connected during it wait for the next one.
///
/// Cloning produces an empty bus: subscriptions belong to the instance they
/// were made on and are never duplicated. `clone_from` empties the target.
pub struct Signal<A> {
    inner: ReentrantMutex<RefCell<Registry<Slot<A>>>>,
}

impl<A> Signal<A> {
    pub fn new() -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(Registry::new())),
        }
    }

    /// Register a callback and return its id
    pub fn connect<F>(&self, callback: F) -> SlotId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let guard = self.inner.lock();
        let id = guard.borrow_mut().insert(Arc::new(callback));
        debug!("Connected slot {}", id);
        id
    }

    /// Remove a callback; unknown ids are ignored and report `false`
    pub fn disconnect(&self, id: SlotId) -> bool {
        let guard = self.inner.lock();
        let removed = guard.borrow_mut().remove(id).is_some();
        if removed {
            debug!("Disconnected slot {}", id);
        }
        removed
    }

    pub fn disconnect_all(&self) {
        let guard = self.inner.lock();
        let removed = guard.borrow_mut().clear();
        debug!("Disconnected all slots ({} removed)", removed);
    }

    /// Invoke every connected callback with `args`, in connection order.
    ///
    /// A panicking callback is not caught: the panic reaches the caller and
    /// the remaining callbacks are not invoked for this emission. The bus
    /// itself stays usable.
    pub fn emit(&self, args: &A) {
        let guard = self.inner.lock();
        let snapshot = {
            let mut registry = guard.borrow_mut();
            registry.stats.emissions += 1;
            registry.snapshot()
        };

        for (id, slot) in snapshot {
            let live = guard.borrow().contains(id);
            if !live {
                trace!("Slot {} disconnected during emission, skipping", id);
                continue;
            }
            trace!("Delivering to slot {}", id);
            slot(args);
            guard.borrow_mut().stats.delivered += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_connected(&self, id: SlotId) -> bool {
        self.inner.lock().borrow().contains(id)
    }

    pub fn stats(&self) -> DeliveryStats {
        self.inner.lock().borrow().stats
    }
}

impl<A> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self::new()
    }

    fn clone_from(&mut self, _source: &Self) {
        self.disconnect_all();
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
