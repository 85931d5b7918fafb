//! Session-Aware Notification Bus
//!
//! Every subscription belongs to a host session. A callback may only run
//! while its session's exclusive lock is held, so emission asks the host to
//! lock each subscriber's session before calling it and skips subscribers
//! whose session cannot be entered right now.
//!
//! A thread already running inside a session announces that with
//! [`SessionSignal::lock_from_session`]. Subscribers of that session are then
//! called directly, since taking the session lock again from inside the
//! session would deadlock.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::ReentrantMutex;

use crate::signal::lock::{SessionId, SessionLock};
use crate::signal::registry::{Registry, SlotId};
use crate::signal::simple::Slot;
use crate::signal::stats::DeliveryStats;

/// Which session, if any, is currently driving emission from its own thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActiveSession {
    #[default]
    Idle,
    Locked(SessionId),
}

impl ActiveSession {
    pub fn is(&self, session_id: &str) -> bool {
        matches!(self, ActiveSession::Locked(active) if active.as_str() == session_id)
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            ActiveSession::Idle => None,
            ActiveSession::Locked(id) => Some(id),
        }
    }
}

struct SessionSlot<A, S: ?Sized> {
    session: Arc<S>,
    session_id: SessionId,
    callback: Slot<A>,
}

impl<A, S: ?Sized> Clone for SessionSlot<A, S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            session_id: self.session_id.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

struct SessionState<A, S: ?Sized> {
    registry: Registry<SessionSlot<A, S>>,
    active: ActiveSession,
}

/// Notification bus whose subscribers live inside host sessions.
///
/// `S` is the host's session handle type; it defaults to a trait object so
/// sessions from different host implementations can share one bus.
/// Emission order, the mid-emission snapshot rule and the empty-clone
/// behaviour are the same as for [`Signal`](crate::signal::Signal).
pub struct SessionSignal<A, S: SessionLock + ?Sized = dyn SessionLock> {
    inner: ReentrantMutex<RefCell<SessionState<A, S>>>,
}

impl<A, S: SessionLock + ?Sized> SessionSignal<A, S> {
    pub fn new() -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(SessionState {
                registry: Registry::new(),
                active: ActiveSession::Idle,
            })),
        }
    }

    /// Register a callback owned by `session`, identified as `session_id`
    pub fn connect<I, F>(&self, session: Arc<S>, session_id: I, callback: F) -> SlotId
    where
        I: Into<SessionId>,
        F: Fn(&A) + Send + Sync + 'static,
    {
        let session_id = session_id.into();
        let guard = self.inner.lock();
        let id = guard.borrow_mut().registry.insert(SessionSlot {
            session,
            session_id: session_id.clone(),
            callback: Arc::new(callback),
        });
        debug!("Connected slot {} for session '{}'", id, session_id);
        id
    }

    /// Register a callback owned by `session`, using the session's own id
    pub fn connect_session<F>(&self, session: Arc<S>, callback: F) -> SlotId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let session_id = session.session_id();
        self.connect(session, session_id, callback)
    }

    /// Remove a subscription, clearing the active-session marker first when
    /// it belongs to the subscription's session. Unknown ids report `false`.
    pub fn disconnect(&self, id: SlotId) -> bool {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();

        let owner_active = match state.registry.entries.get(&id) {
            Some(slot) => state.active.is(slot.session_id.as_str()),
            None => return false,
        };
        if owner_active {
            debug!("Slot {} belonged to the active session, clearing marker", id);
            state.active = ActiveSession::Idle;
        }
        state.registry.remove(id);
        debug!("Disconnected slot {}", id);
        true
    }

    /// Remove every subscription of one session and return how many went
    pub fn disconnect_session(&self, session_id: impl AsRef<str>) -> usize {
        let session_id = session_id.as_ref();
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();

        if state.active.is(session_id) {
            state.active = ActiveSession::Idle;
        }
        let before = state.registry.len();
        state
            .registry
            .entries
            .retain(|_, slot| slot.session_id.as_str() != session_id);
        let removed = before - state.registry.len();
        debug!("Disconnected {} slot(s) of session '{}'", removed, session_id);
        removed
    }

    /// Remove every subscription and clear the active-session marker
    pub fn disconnect_all(&self) {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        let removed = state.registry.clear();
        state.active = ActiveSession::Idle;
        debug!("Disconnected all slots ({} removed)", removed);
    }

    /// Mark `session_id` as the session driving emission from its own
    /// thread. Replaces any previous marker.
    pub fn lock_from_session(&self, session_id: impl Into<SessionId>) {
        let session_id = session_id.into();
        let guard = self.inner.lock();
        debug!("Session '{}' is now the active session", session_id);
        guard.borrow_mut().active = ActiveSession::Locked(session_id);
    }

    /// Clear the marker if it names `session_id`; `false` leaves it untouched
    pub fn unlock_from_session(&self, session_id: impl AsRef<str>) -> bool {
        let session_id = session_id.as_ref();
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        if state.active.is(session_id) {
            state.active = ActiveSession::Idle;
            debug!("Session '{}' released the active marker", session_id);
            true
        } else {
            debug!(
                "Ignoring unlock from session '{}' (active: {:?})",
                session_id,
                state.active.session_id()
            );
            false
        }
    }

    /// Mark `session_id` active until the returned scope is dropped
    pub fn activate(&self, session_id: impl Into<SessionId>) -> ActiveSessionScope<'_, A, S> {
        let session_id = session_id.into();
        self.lock_from_session(session_id.clone());
        ActiveSessionScope {
            signal: self,
            session_id,
        }
    }

    /// Emit from inside `session_id`'s own context.
    ///
    /// The session is marked active for this one emission only, while the
    /// bus lock is held throughout, so emitters on other threads never see
    /// the marker. The previous marker is restored afterwards unless the
    /// emission itself changed it.
    pub fn emit_from_session(&self, session_id: impl Into<SessionId>, args: &A) {
        let session_id = session_id.into();
        let guard = self.inner.lock();
        let previous = std::mem::replace(
            &mut guard.borrow_mut().active,
            ActiveSession::Locked(session_id.clone()),
        );
        let _restore = MarkerRestore {
            state: &guard,
            session_id,
            previous: Some(previous),
        };
        self.emit(args);
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.inner.lock().borrow().active.session_id().cloned()
    }

    /// Deliver `args` to every subscriber, in connection order.
    ///
    /// Subscribers of the active session are called directly. Everyone else
    /// is called only while their session lock is held; a session that
    /// cannot be locked is skipped for this emission without error. Panics
    /// from callbacks propagate to the caller after the session guard has
    /// been released.
    pub fn emit(&self, args: &A) {
        let guard = self.inner.lock();
        let snapshot = {
            let mut state = guard.borrow_mut();
            state.registry.stats.emissions += 1;
            state.registry.snapshot()
        };

        for (id, slot) in snapshot {
            let bypass = {
                let state = guard.borrow();
                if !state.registry.contains(id) {
                    trace!("Slot {} disconnected during emission, skipping", id);
                    continue;
                }
                state.active.is(slot.session_id.as_str())
            };

            if bypass {
                trace!("Delivering to slot {} directly (session '{}' active)", id, slot.session_id);
                (slot.callback)(args);
                Self::record(&guard, |stats| {
                    stats.delivered += 1;
                    stats.bypassed += 1;
                });
                continue;
            }

            match slot.session.try_lock() {
                Some(_session_guard) => {
                    trace!("Delivering to slot {} under session '{}' lock", id, slot.session_id);
                    (slot.callback)(args);
                    Self::record(&guard, |stats| stats.delivered += 1);
                }
                None => {
                    Self::record(&guard, |stats| stats.skipped += 1);
                    debug!(
                        "Session '{}' unavailable, skipping slot {}",
                        slot.session_id, id
                    );
                }
            }
        }
    }

    fn record(state: &RefCell<SessionState<A, S>>, update: impl FnOnce(&mut DeliveryStats)) {
        update(&mut state.borrow_mut().registry.stats);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().borrow().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_connected(&self, id: SlotId) -> bool {
        self.inner.lock().borrow().registry.contains(id)
    }

    pub fn stats(&self) -> DeliveryStats {
        self.inner.lock().borrow().registry.stats
    }
}

struct MarkerRestore<'a, A, S: ?Sized> {
    state: &'a RefCell<SessionState<A, S>>,
    session_id: SessionId,
    previous: Option<ActiveSession>,
}

impl<A, S: ?Sized> Drop for MarkerRestore<'_, A, S> {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.active.is(self.session_id.as_str()) {
            if let Some(previous) = self.previous.take() {
                state.active = previous;
            }
        }
    }
}

/// Keeps a session marked active on a [`SessionSignal`] while alive
#[must_use = "the session stops being active as soon as the scope is dropped"]
pub struct ActiveSessionScope<'a, A, S: SessionLock + ?Sized = dyn SessionLock> {
    signal: &'a SessionSignal<A, S>,
    session_id: SessionId,
}

impl<A, S: SessionLock + ?Sized> ActiveSessionScope<'_, A, S> {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

impl<A, S: SessionLock + ?Sized> Drop for ActiveSessionScope<'_, A, S> {
    fn drop(&mut self) {
        // Another session may have taken over meanwhile; leave it alone.
        self.signal.unlock_from_session(&self.session_id);
    }
}

impl<A, S: SessionLock + ?Sized> Default for SessionSignal<A, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, S: SessionLock + ?Sized> Clone for SessionSignal<A, S> {
    fn clone(&self) -> Self {
        Self::new()
    }

    fn clone_from(&mut self, _source: &Self) {
        self.disconnect_all();
    }
}

impl<A, S: SessionLock + ?Sized> fmt::Debug for SessionSignal<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSignal")
            .field("slots", &self.len())
            .field("active", &self.active_session())
            .field("stats", &self.stats())
            .finish()
    }
}
