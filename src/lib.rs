//! Thread-safe signal/slot notification buses.
//!
//! [`signal::Signal`] fans a value out to every connected callback.
//! [`signal::SessionSignal`] does the same for callbacks that live inside
//! host sessions, entering each session through the host's exclusive lock
//! before calling into it.

pub mod app;
pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod host;
pub mod logging;
pub mod signal;

pub use host::LocalSession;
pub use signal::{SessionId, SessionLock, SessionSignal, Signal, SlotId};
