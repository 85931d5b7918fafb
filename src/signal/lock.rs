//! Host Session Capabilities
//!
//! The session-aware bus never owns sessions. It only needs a stable
//! identifier for each session and a way to try to enter that session
//! exclusively from a foreign thread. Host frameworks provide both through
//! the [`SessionLock`] trait.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Stable, cheaply cloneable identifier of a host session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Arc<str>);

impl SessionId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<&SessionId> for SessionId {
    fn from(id: &SessionId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SessionId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for SessionId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

// Any guard type qualifies; releasing happens in its own Drop.
trait Held {}
impl<T> Held for T {}

/// Scoped proof that a session's exclusive lock is held.
///
/// Wraps whatever guard the host lock primitive hands out. Dropping the
/// `SessionGuard` drops the wrapped guard and so releases the session.
pub struct SessionGuard<'a> {
    _held: Box<dyn Held + 'a>,
}

impl<'a> SessionGuard<'a> {
    pub fn new<G: 'a>(guard: G) -> Self {
        Self {
            _held: Box::new(guard),
        }
    }
}

impl fmt::Debug for SessionGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard").finish_non_exhaustive()
    }
}

/// Capability a host session exposes to the session-aware bus
pub trait SessionLock: Send + Sync {
    /// Stable identifier of this session
    fn session_id(&self) -> SessionId;

    /// Try to enter the session exclusively.
    ///
    /// Must not block indefinitely; a bounded wait is acceptable. `None`
    /// means the session could not be entered right now and the caller
    /// will skip its delivery.
    fn try_lock(&self) -> Option<SessionGuard<'_>>;
}

impl<T: SessionLock + ?Sized> SessionLock for Arc<T> {
    fn session_id(&self) -> SessionId {
        (**self).session_id()
    }

    fn try_lock(&self) -> Option<SessionGuard<'_>> {
        (**self).try_lock()
    }
}
