//! Reference host session.
//!
//! A minimal in-process session: an id plus an exclusive lock that the
//! session's own thread holds while it works, and that foreign emitters try
//! to take before running a callback inside the session.

use std::fmt;
use std::time::Duration;

use log::trace;
use parking_lot::{Mutex, MutexGuard};

use crate::signal::lock::{SessionGuard, SessionId, SessionLock};

pub struct LocalSession {
    id: SessionId,
    lock: Mutex<()>,
    lock_timeout: Duration,
}

impl LocalSession {
    /// Session whose lock is tried without waiting
    pub fn new(id: impl Into<SessionId>) -> Self {
        Self::with_timeout(id, Duration::ZERO)
    }

    /// Session whose lock waits up to `lock_timeout` for a foreign emitter
    pub fn with_timeout(id: impl Into<SessionId>, lock_timeout: Duration) -> Self {
        Self {
            id: id.into(),
            lock: Mutex::new(()),
            lock_timeout,
        }
    }

    /// Enter the session from its own thread, blocking until available
    pub fn enter(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }

    pub fn is_busy(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }
}

impl SessionLock for LocalSession {
    fn session_id(&self) -> SessionId {
        self.id.clone()
    }

    fn try_lock(&self) -> Option<SessionGuard<'_>> {
        let guard = if self.lock_timeout.is_zero() {
            self.lock.try_lock()
        } else {
            self.lock.try_lock_for(self.lock_timeout)
        };
        if guard.is_none() {
            trace!("Session '{}' lock not acquired", self.id);
        }
        guard.map(SessionGuard::new)
    }
}

impl fmt::Debug for LocalSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSession")
            .field("id", &self.id)
            .field("busy", &self.is_busy())
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}
