//! Tests for the Signal/Slot Notification Buses

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;

use crate::signal::{
    ActiveSession, SessionGuard, SessionId, SessionLock, SessionSignal, Signal, SlotId,
};

type Calls = Arc<Mutex<Vec<String>>>;

fn recorder(calls: &Calls, name: &'static str) -> impl Fn(&i32) + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move |value: &i32| calls.lock().push(format!("{}({})", name, value))
}

/// Releases the mock session when dropped
struct MockHold<'a>(&'a MockSession);

impl Drop for MockHold<'_> {
    fn drop(&mut self) {
        self.0.held.store(false, Ordering::SeqCst);
        self.0.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mock host session with a switchable lock
struct MockSession {
    id: SessionId,
    available: AtomicBool,
    held: AtomicBool,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl MockSession {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::from(id),
            available: AtomicBool::new(true),
            held: AtomicBool::new(false),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        })
    }

    fn refusing(id: &str) -> Arc<Self> {
        let session = Self::new(id);
        session.set_available(false);
        session
    }

    fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl SessionLock for MockSession {
    fn session_id(&self) -> SessionId {
        self.id.clone()
    }

    fn try_lock(&self) -> Option<SessionGuard<'_>> {
        if !self.available.load(Ordering::SeqCst) || self.held.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Some(SessionGuard::new(MockHold(self)))
    }
}

// ---------------------------------------------------------------------------
// Plain bus
// ---------------------------------------------------------------------------

#[test]
fn test_signal_creation() {
    let signal = Signal::<i32>::new();
    assert!(signal.is_empty());
    assert_eq!(signal.stats().emissions, 0);
}

#[test]
fn test_emit_calls_in_connection_order() {
    let signal = Signal::<i32>::new();
    let calls: Calls = Arc::default();

    let first = signal.connect(recorder(&calls, "cb1"));
    let second = signal.connect(recorder(&calls, "cb2"));
    assert_eq!(first.get(), 1);
    assert_eq!(second.get(), 2);

    signal.emit(&5);
    assert_eq!(*calls.lock(), vec!["cb1(5)", "cb2(5)"]);
}

#[test]
fn test_disconnect_stops_delivery() {
    let signal = Signal::<i32>::new();
    let calls: Calls = Arc::default();

    let first = signal.connect(recorder(&calls, "cb1"));
    signal.connect(recorder(&calls, "cb2"));

    assert!(signal.disconnect(first));
    assert!(!signal.is_connected(first));
    signal.emit(&5);
    assert_eq!(*calls.lock(), vec!["cb2(5)"]);
}

#[test]
fn test_disconnect_unknown_id_is_noop() {
    let signal = Signal::<i32>::new();
    let calls: Calls = Arc::default();
    let id = signal.connect(recorder(&calls, "cb"));

    assert!(signal.disconnect(id));
    assert!(!signal.disconnect(id));
    assert!(signal.is_empty());
}

#[test]
fn test_ids_not_reused_after_disconnect() {
    let signal = Signal::<i32>::new();
    let a = signal.connect(|_| {});
    let b = signal.connect(|_| {});
    signal.disconnect(b);
    signal.disconnect_all();
    let c = signal.connect(|_| {});
    assert!(a < b && b < c);
    assert_eq!(c.get(), 3);
}

#[test]
fn test_disconnect_all_silences_bus() {
    let signal = Signal::<i32>::new();
    let calls: Calls = Arc::default();
    signal.connect(recorder(&calls, "cb1"));
    signal.connect(recorder(&calls, "cb2"));

    signal.disconnect_all();
    signal.emit(&1);
    assert!(calls.lock().is_empty());
    assert_eq!(signal.len(), 0);
}

#[test]
fn test_clone_is_empty() {
    let signal = Signal::<i32>::new();
    let calls: Calls = Arc::default();
    signal.connect(recorder(&calls, "cb1"));
    signal.connect(recorder(&calls, "cb2"));

    let copy = signal.clone();
    assert!(copy.is_empty());
    assert_eq!(signal.len(), 2);

    copy.emit(&9);
    assert!(calls.lock().is_empty());
    assert_eq!(copy.connect(|_| {}).get(), 1);
}

#[test]
fn test_clone_from_empties_target() {
    let source = Signal::<i32>::new();
    source.connect(|_| {});

    let mut target = Signal::<i32>::new();
    target.connect(|_| {});
    target.connect(|_| {});

    target.clone_from(&source);
    assert!(target.is_empty());
    assert_eq!(source.len(), 1);
    // Ids keep counting on the assigned instance
    assert_eq!(target.connect(|_| {}).get(), 3);
}

#[test]
fn test_tuple_arguments_reach_every_slot_unchanged() {
    let signal = Signal::<(String, u32)>::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for _ in 0..3 {
        let seen = Arc::clone(&seen);
        signal.connect(move |(name, count)| seen.lock().push((name.clone(), *count)));
    }

    signal.emit(&("files".to_string(), 7));
    assert_eq!(*seen.lock(), vec![("files".to_string(), 7); 3]);
}

#[test]
fn test_callback_can_disconnect_itself() {
    let signal = Arc::new(Signal::<i32>::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let own_id: Arc<Mutex<Option<SlotId>>> = Arc::default();

    let id = {
        let bus = Arc::clone(&signal);
        let calls = Arc::clone(&calls);
        let own_id = Arc::clone(&own_id);
        signal.connect(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *own_id.lock() {
                bus.disconnect(id);
            }
        })
    };
    *own_id.lock() = Some(id);

    signal.emit(&1);
    signal.emit(&2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(signal.is_empty());
}

#[test]
fn test_slot_disconnected_mid_emission_is_not_called() {
    let signal = Arc::new(Signal::<i32>::new());
    let calls: Calls = Arc::default();
    let victim: Arc<Mutex<Option<SlotId>>> = Arc::default();

    {
        let bus = Arc::clone(&signal);
        let victim = Arc::clone(&victim);
        signal.connect(move |_| {
            if let Some(id) = victim.lock().take() {
                bus.disconnect(id);
            }
        });
    }
    let doomed = signal.connect(recorder(&calls, "doomed"));
    *victim.lock() = Some(doomed);

    signal.emit(&3);
    assert!(calls.lock().is_empty());
    assert_eq!(signal.len(), 1);
}

#[test]
fn test_slot_connected_mid_emission_waits_for_next_emit() {
    let signal = Arc::new(Signal::<i32>::new());
    let calls: Calls = Arc::default();
    let added = Arc::new(AtomicBool::new(false));

    {
        let bus = Arc::clone(&signal);
        let calls = Arc::clone(&calls);
        let added = Arc::clone(&added);
        signal.connect(move |_| {
            if !added.swap(true, Ordering::SeqCst) {
                bus.connect(recorder(&calls, "late"));
            }
        });
    }

    signal.emit(&1);
    assert!(calls.lock().is_empty());
    signal.emit(&2);
    assert_eq!(*calls.lock(), vec!["late(2)"]);
}

#[test]
fn test_reentrant_emit_does_not_deadlock() {
    let signal = Arc::new(Signal::<i32>::new());
    let calls: Calls = Arc::default();

    {
        let bus = Arc::clone(&signal);
        let calls = Arc::clone(&calls);
        signal.connect(move |depth| {
            calls.lock().push(format!("depth({})", depth));
            if *depth < 2 {
                bus.emit(&(depth + 1));
            }
        });
    }

    signal.emit(&0);
    assert_eq!(*calls.lock(), vec!["depth(0)", "depth(1)", "depth(2)"]);
    assert_eq!(signal.stats().emissions, 3);
}

#[test]
fn test_panicking_callback_propagates_and_bus_survives() {
    let signal = Signal::<i32>::new();
    let calls: Calls = Arc::default();

    signal.connect(recorder(&calls, "before"));
    let bad = signal.connect(|_| panic!("slot failure"));
    signal.connect(recorder(&calls, "after"));

    let result = panic::catch_unwind(AssertUnwindSafe(|| signal.emit(&1)));
    assert!(result.is_err());
    assert_eq!(*calls.lock(), vec!["before(1)"]);

    signal.disconnect(bad);
    signal.emit(&2);
    assert_eq!(*calls.lock(), vec!["before(1)", "before(2)", "after(2)"]);
}

#[test]
fn test_panicking_callback_is_not_counted_as_delivered() {
    let signal = Signal::<i32>::new();
    signal.connect(|_| {});
    signal.connect(|_| panic!("slot failure"));

    let result = panic::catch_unwind(AssertUnwindSafe(|| signal.emit(&1)));
    assert!(result.is_err());
    let stats = signal.stats();
    assert_eq!(stats.emissions, 1);
    assert_eq!(stats.delivered, 1);
}

#[test]
fn test_signal_stats_count_deliveries() {
    let signal = Signal::<i32>::new();
    signal.connect(|_| {});
    signal.connect(|_| {});
    signal.emit(&0);
    signal.emit(&0);

    let stats = signal.stats();
    assert_eq!(stats.emissions, 2);
    assert_eq!(stats.delivered, 4);
    assert_eq!(stats.skipped, 0);
}

proptest! {
    #[test]
    fn prop_ids_strictly_increase(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
        let signal = Signal::<i32>::new();
        let mut live: Vec<SlotId> = Vec::new();
        let mut last: Option<SlotId> = None;

        for connect in ops {
            if connect || live.is_empty() {
                let id = signal.connect(|_| {});
                if let Some(previous) = last {
                    prop_assert!(id > previous);
                }
                last = Some(id);
                live.push(id);
            } else {
                let id = live.remove(0);
                prop_assert!(signal.disconnect(id));
            }
        }
        prop_assert_eq!(signal.len(), live.len());
    }
}

// ---------------------------------------------------------------------------
// Session-aware bus
// ---------------------------------------------------------------------------

#[test]
fn test_session_signal_creation() {
    let signal = SessionSignal::<i32>::new();
    assert!(signal.is_empty());
    assert_eq!(signal.active_session(), None);
}

#[test]
fn test_unlock_with_other_session_is_rejected() {
    let signal = SessionSignal::<i32>::new();
    signal.lock_from_session("A");
    assert!(!signal.unlock_from_session("B"));
    assert_eq!(signal.active_session(), Some(SessionId::from("A")));
}

#[test]
fn test_unlock_with_same_session_clears_marker() {
    let signal = SessionSignal::<i32>::new();
    signal.lock_from_session("A");
    assert!(signal.unlock_from_session("A"));
    assert_eq!(signal.active_session(), None);
    assert!(!signal.unlock_from_session("A"));
}

#[test]
fn test_lock_from_session_replaces_marker() {
    let signal = SessionSignal::<i32>::new();
    signal.lock_from_session("A");
    signal.lock_from_session("B");
    assert_eq!(signal.active_session(), Some(SessionId::from("B")));
    assert!(!signal.unlock_from_session("A"));
}

#[test]
fn test_active_session_bypasses_lock() {
    let signal = SessionSignal::<i32, MockSession>::new();
    let session = MockSession::refusing("A");
    let calls: Calls = Arc::default();

    signal.lock_from_session("A");
    signal.connect(Arc::clone(&session), "A", recorder(&calls, "cb"));

    signal.emit(&4);
    assert_eq!(*calls.lock(), vec!["cb(4)"]);
    assert_eq!(session.acquired(), 0);
    assert_eq!(signal.stats().bypassed, 1);
}

#[test]
fn test_unavailable_session_is_skipped_silently() {
    let signal = SessionSignal::<i32, MockSession>::new();
    let busy = MockSession::refusing("A");
    let free = MockSession::new("B");
    let calls: Calls = Arc::default();

    signal.connect(Arc::clone(&busy), "A", recorder(&calls, "a"));
    signal.connect(Arc::clone(&free), "B", recorder(&calls, "b"));

    signal.emit(&1);
    assert_eq!(*calls.lock(), vec!["b(1)"]);

    let stats = signal.stats();
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.skipped, 1);
}

#[test]
fn test_other_active_session_does_not_bypass() {
    let signal = SessionSignal::<i32, MockSession>::new();
    let busy = MockSession::refusing("A");
    let calls: Calls = Arc::default();

    signal.lock_from_session("B");
    signal.connect(busy, "A", recorder(&calls, "a"));
    signal.emit(&1);
    assert!(calls.lock().is_empty());
}

#[test]
fn test_callback_runs_while_session_lock_held() {
    let signal = SessionSignal::<i32, MockSession>::new();
    let session = MockSession::new("A");
    let held_during_call = Arc::new(AtomicBool::new(false));

    {
        let session = Arc::clone(&session);
        let held_during_call = Arc::clone(&held_during_call);
        signal.connect_session(Arc::clone(&session), move |_| {
            held_during_call.store(session.is_held(), Ordering::SeqCst);
        });
    }

    signal.emit(&0);
    assert!(held_during_call.load(Ordering::SeqCst));
    assert!(!session.is_held());
    assert_eq!(session.acquired(), 1);
    assert_eq!(session.released(), 1);
}

#[test]
fn test_session_scenario_bypass_then_locked_delivery() {
    let signal = SessionSignal::<i32, MockSession>::new();
    let handle = MockSession::new("A");
    let calls: Calls = Arc::default();

    signal.lock_from_session("A");
    let id = signal.connect(Arc::clone(&handle), "A", recorder(&calls, "cb"));
    assert_eq!(id.get(), 1);

    signal.emit(&10);
    assert_eq!(handle.acquired(), 0);

    assert!(signal.unlock_from_session("A"));
    signal.emit(&11);
    assert_eq!(handle.acquired(), 1);
    assert_eq!(*calls.lock(), vec!["cb(10)", "cb(11)"]);
}

#[test]
fn test_disconnect_active_session_clears_marker() {
    let signal = SessionSignal::<i32, MockSession>::new();
    let a = signal.connect(MockSession::new("A"), "A", |_| {});
    signal.connect(MockSession::new("B"), "B", |_| {});

    signal.lock_from_session("A");
    assert!(signal.disconnect(a));
    assert_eq!(signal.active_session(), None);
}

#[test]
fn test_disconnect_other_session_keeps_marker() {
    let signal = SessionSignal::<i32, MockSession>::new();
    signal.connect(MockSession::new("A"), "A", |_| {});
    let b = signal.connect(MockSession::new("B"), "B", |_| {});

    signal.lock_from_session("A");
    assert!(signal.disconnect(b));
    assert_eq!(signal.active_session(), Some(SessionId::from("A")));
    assert!(!signal.disconnect(b));
}

#[test]
fn test_stale_marker_not_applied_to_new_subscription() {
    let signal = SessionSignal::<i32, MockSession>::new();
    let calls: Calls = Arc::default();

    let first = signal.connect(MockSession::refusing("A"), "A", |_| {});
    signal.lock_from_session("A");
    signal.disconnect(first);

    // A later subscription reusing the id must go through its lock again
    let again = MockSession::refusing("A");
    signal.connect(Arc::clone(&again), "A", recorder(&calls, "again"));
    signal.emit(&1);
    assert!(calls.lock().is_empty());
    assert_eq!(signal.stats().skipped, 1);
}

#[test]
fn test_session_disconnect_all_clears_everything() {
    let signal = SessionSignal::<i32, MockSession>::new();
    let calls: Calls = Arc::default();
    signal.connect(MockSession::new("A"), "A", recorder(&calls, "a"));
    signal.connect(MockSession::new("B"), "B", recorder(&calls, "b"));
    signal.lock_from_session("A");

    signal.disconnect_all();
    signal.emit(&1);
    assert!(calls.lock().is_empty());
    assert!(signal.is_empty());
    assert_eq!(signal.active_session(), None);
}

#[test]
fn test_disconnect_session_removes_only_its_slots() {
    let signal = SessionSignal::<i32, MockSession>::new();
    let a = MockSession::new("A");
    signal.connect(Arc::clone(&a), "A", |_| {});
    signal.connect(Arc::clone(&a), "A", |_| {});
    let b = signal.connect(MockSession::new("B"), "B", |_| {});
    signal.lock_from_session("A");

    assert_eq!(signal.disconnect_session("A"), 2);
    assert_eq!(signal.len(), 1);
    assert!(signal.is_connected(b));
    assert_eq!(signal.active_session(), None);
}

#[test]
fn test_session_clone_is_empty() {
    let signal = SessionSignal::<i32, MockSession>::new();
    signal.connect(MockSession::new("A"), "A", |_| {});
    signal.lock_from_session("A");

    let copy = signal.clone();
    assert!(copy.is_empty());
    assert_eq!(copy.active_session(), None);

    let mut assigned = SessionSignal::<i32, MockSession>::new();
    assigned.connect(MockSession::new("B"), "B", |_| {});
    assigned.lock_from_session("B");
    assigned.clone_from(&signal);
    assert!(assigned.is_empty());
    assert_eq!(assigned.active_session(), None);
}

#[test]
fn test_activate_scope_unlocks_on_drop() {
    let signal = SessionSignal::<i32>::new();
    {
        let scope = signal.activate("A");
        assert_eq!(scope.session_id(), "A");
        assert_eq!(signal.active_session(), Some(SessionId::from("A")));
    }
    assert_eq!(signal.active_session(), None);
}

#[test]
fn test_activate_scope_leaves_newer_marker() {
    let signal = SessionSignal::<i32>::new();
    {
        let _scope = signal.activate("A");
        signal.lock_from_session("B");
    }
    assert_eq!(signal.active_session(), Some(SessionId::from("B")));
}

#[test]
fn test_session_guard_released_when_callback_panics() {
    let signal = SessionSignal::<i32, MockSession>::new();
    let session = MockSession::new("A");
    signal.connect(Arc::clone(&session), "A", |_| panic!("slot failure"));

    let result = panic::catch_unwind(AssertUnwindSafe(|| signal.emit(&1)));
    assert!(result.is_err());
    assert!(!session.is_held());
    assert_eq!(session.released(), 1);

    // Bus and session remain usable
    session.set_available(true);
    signal.disconnect_all();
    signal.connect(Arc::clone(&session), "A", |_| {});
    signal.emit(&2);
    assert_eq!(session.acquired(), 2);
}

#[test]
fn test_session_panic_is_not_counted_as_delivered() {
    let signal = SessionSignal::<i32, MockSession>::new();
    signal.connect(MockSession::new("A"), "A", |_| {});
    signal.connect(MockSession::new("B"), "B", |_| panic!("slot failure"));

    let result = panic::catch_unwind(AssertUnwindSafe(|| signal.emit(&1)));
    assert!(result.is_err());
    assert_eq!(signal.stats().delivered, 1);

    signal.lock_from_session("B");
    let result = panic::catch_unwind(AssertUnwindSafe(|| signal.emit(&2)));
    assert!(result.is_err());
    let stats = signal.stats();
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.bypassed, 0);
}

#[test]
fn test_session_slot_disconnected_mid_emission_is_not_called() {
    let signal = Arc::new(SessionSignal::<i32, MockSession>::new());
    let calls: Calls = Arc::default();
    let victim: Arc<Mutex<Option<SlotId>>> = Arc::default();
    let late_session = MockSession::new("C");

    {
        let bus = Arc::clone(&signal);
        let victim = Arc::clone(&victim);
        let calls = Arc::clone(&calls);
        let late_session = Arc::clone(&late_session);
        signal.connect(MockSession::new("A"), "A", move |_| {
            if let Some(id) = victim.lock().take() {
                bus.disconnect(id);
                bus.connect(Arc::clone(&late_session), "C", recorder(&calls, "late"));
            }
        });
    }
    let doomed_session = MockSession::new("B");
    let doomed = signal.connect(Arc::clone(&doomed_session), "B", recorder(&calls, "doomed"));
    *victim.lock() = Some(doomed);

    signal.emit(&1);
    assert!(calls.lock().is_empty());
    assert_eq!(doomed_session.acquired(), 0);
    assert_eq!(late_session.acquired(), 0);
    assert_eq!(signal.len(), 2);

    signal.emit(&2);
    assert_eq!(*calls.lock(), vec!["late(2)"]);
    assert_eq!(late_session.acquired(), 1);
}

#[test]
fn test_dyn_bus_mixes_session_types() {
    let signal = SessionSignal::<i32>::new();
    let calls: Calls = Arc::default();
    let mock = MockSession::new("mock");
    let local = Arc::new(crate::host::LocalSession::new("local"));

    signal.connect_session(mock, recorder(&calls, "mock"));
    signal.connect_session(local, recorder(&calls, "local"));
    signal.emit(&3);
    assert_eq!(*calls.lock(), vec!["mock(3)", "local(3)"]);
}

#[test]
fn test_callback_can_lock_from_its_own_session() {
    let signal = Arc::new(SessionSignal::<i32, MockSession>::new());
    let calls: Calls = Arc::default();
    let b_session = MockSession::refusing("B");

    {
        let bus = Arc::clone(&signal);
        signal.connect(MockSession::new("A"), "A", move |_| bus.lock_from_session("B"));
    }
    signal.connect(b_session, "B", recorder(&calls, "b"));

    // Marker is read at each subscriber's turn, so B is bypassed
    signal.emit(&1);
    assert_eq!(*calls.lock(), vec!["b(1)"]);
    assert_eq!(signal.active_session(), Some(SessionId::from("B")));
}

#[test]
fn test_active_session_helpers() {
    let idle = ActiveSession::Idle;
    assert!(!idle.is("A"));
    assert_eq!(idle.session_id(), None);

    let locked = ActiveSession::Locked(SessionId::from("A"));
    assert!(locked.is("A"));
    assert!(!locked.is("B"));
    assert_eq!(ActiveSession::default(), ActiveSession::Idle);
}

#[test]
fn test_emit_from_session_bypasses_only_during_emission() {
    let signal = SessionSignal::<i32, MockSession>::new();
    let calls: Calls = Arc::default();
    let own = MockSession::refusing("A");

    signal.connect(Arc::clone(&own), "A", recorder(&calls, "a"));
    signal.lock_from_session("B");

    signal.emit_from_session("A", &1);
    assert_eq!(*calls.lock(), vec!["a(1)"]);
    assert_eq!(own.acquired(), 0);
    assert_eq!(signal.active_session(), Some(SessionId::from("B")));

    signal.emit(&2);
    assert_eq!(*calls.lock(), vec!["a(1)"]);
}

#[test]
fn test_emit_from_session_restores_after_panic() {
    let signal = SessionSignal::<i32, MockSession>::new();
    signal.connect(MockSession::new("A"), "A", |_| panic!("slot failure"));

    let result = panic::catch_unwind(AssertUnwindSafe(|| signal.emit_from_session("A", &1)));
    assert!(result.is_err());
    assert_eq!(signal.active_session(), None);
}
