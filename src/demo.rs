//! Session simulation driven by the `slotbus` binary.
//!
//! Each simulated session runs on its own thread. Per turn it enters its
//! own session, broadcasts a heartbeat from inside it and stays busy for a
//! while. A producer thread meanwhile emits ticks from outside every
//! session. Subscribers whose session is busy when a tick arrives are
//! skipped, which is what the report counts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, RecvTimeoutError};
use log::{debug, info};
use serde::Serialize;

use crate::config::DemoConfig;
use crate::host::LocalSession;
use crate::signal::{DeliveryStats, SessionId, SessionLock, SessionSignal};

/// Notification carried by the demo bus
#[derive(Debug, Clone)]
pub enum Notice {
    Tick(usize),
    Heartbeat(SessionId),
}

/// Per-session delivery counts
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session: String,
    pub ticks: usize,
    pub heartbeats: usize,
}

/// Outcome of a demo run
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub stats: DeliveryStats,
    pub sessions: Vec<SessionReport>,
    pub elapsed_ms: u128,
}

impl DemoReport {
    pub fn total_ticks(&self) -> usize {
        self.sessions.iter().map(|s| s.ticks).sum()
    }
}

struct Counters {
    ticks: AtomicUsize,
    heartbeats: AtomicUsize,
}

pub fn run_demo(config: &DemoConfig) -> Result<DemoReport> {
    config.validate()?;
    info!(
        "Simulating {} sessions, {} emissions, lock timeout {:?}",
        config.sessions, config.emissions, config.lock_timeout
    );

    let bus: Arc<SessionSignal<Notice, LocalSession>> = Arc::new(SessionSignal::new());
    let mut sessions = Vec::with_capacity(config.sessions);
    let mut counters = Vec::with_capacity(config.sessions);

    for index in 0..config.sessions {
        let session = Arc::new(LocalSession::with_timeout(
            format!("session-{}", index + 1),
            config.lock_timeout,
        ));
        let counter = Arc::new(Counters {
            ticks: AtomicUsize::new(0),
            heartbeats: AtomicUsize::new(0),
        });

        debug!(
            "Registering {} (lock timeout {:?})",
            session.session_id(),
            session.lock_timeout()
        );
        let seen = Arc::clone(&counter);
        bus.connect_session(Arc::clone(&session), move |notice| match notice {
            Notice::Tick(_) => {
                seen.ticks.fetch_add(1, Ordering::Relaxed);
            }
            Notice::Heartbeat(_) => {
                seen.heartbeats.fetch_add(1, Ordering::Relaxed);
            }
        });

        sessions.push(session);
        counters.push(counter);
    }

    // Dropping the sender tells the session threads to stop
    let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
    let started = Instant::now();

    let workers: Vec<_> = sessions
        .iter()
        .map(|session| {
            let bus = Arc::clone(&bus);
            let session = Arc::clone(session);
            let shutdown = shutdown_rx.clone();
            let busy_time = config.busy_time;
            thread::Builder::new()
                .name(session.session_id().to_string())
                .spawn(move || loop {
                    {
                        let _inside = session.enter();
                        let id = session.session_id();
                        bus.emit_from_session(id.clone(), &Notice::Heartbeat(id));
                        thread::sleep(busy_time);
                    }
                    match shutdown.recv_timeout(busy_time) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                })
                .context("Failed to spawn session thread")
        })
        .collect::<Result<_>>()?;

    let producer = {
        let bus = Arc::clone(&bus);
        let emissions = config.emissions;
        thread::Builder::new()
            .name("producer".to_string())
            .spawn(move || {
                for tick in 0..emissions {
                    bus.emit(&Notice::Tick(tick));
                    thread::sleep(Duration::from_micros(200));
                }
            })
            .context("Failed to spawn producer thread")?
    };

    producer
        .join()
        .map_err(|_| anyhow!("Producer thread panicked"))?;
    drop(shutdown_tx);
    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow!("Session thread panicked"))?;
    }

    let report = DemoReport {
        stats: bus.stats(),
        sessions: sessions
            .iter()
            .zip(&counters)
            .map(|(session, counter)| SessionReport {
                session: session.session_id().to_string(),
                ticks: counter.ticks.load(Ordering::Relaxed),
                heartbeats: counter.heartbeats.load(Ordering::Relaxed),
            })
            .collect(),
        elapsed_ms: started.elapsed().as_millis(),
    };
    debug!("Demo finished: {:?}", report.stats);
    Ok(report)
}
