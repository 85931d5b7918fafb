//! Signal/Slot Notification Buses
//!
//! In-process fan-out of notifications to registered callbacks.
//!
//! # Architecture
//!
//! - **[`Signal`]**: plain bus, every connected callback is invoked on `emit`
//! - **[`SessionSignal`]**: callbacks belong to host sessions and are only
//!   invoked while their session's exclusive lock is held, with a bypass for
//!   the session currently driving emission
//! - **[`SessionLock`]**: what a host session must provide (id + try-lock)
//!
//! Both buses guard their state with one reentrant lock per instance.
//! Callbacks run synchronously on the emitting thread.
//!
//! # Example Usage
//!
//! ```
//! use slotbus::signal::Signal;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let signal = Signal::<(String, u32)>::new();
//! let total = Arc::new(AtomicUsize::new(0));
//!
//! let seen = Arc::clone(&total);
//! let id = signal.connect(move |(_, n)| {
//!     seen.fetch_add(*n as usize, Ordering::SeqCst);
//! });
//!
//! signal.emit(&("progress".to_string(), 5));
//! signal.disconnect(id);
//! signal.emit(&("progress".to_string(), 5));
//! assert_eq!(total.load(Ordering::SeqCst), 5);
//! ```

pub mod lock;
pub mod registry;
pub mod session;
pub mod simple;
pub mod stats;

#[cfg(test)]
mod tests;

pub use lock::{SessionGuard, SessionId, SessionLock};
pub use registry::SlotId;
pub use session::{ActiveSession, ActiveSessionScope, SessionSignal};
pub use simple::{Signal, Slot};
pub use stats::DeliveryStats;
