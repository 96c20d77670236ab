use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use sweep_core::{message::SweepMessage, pose::Pose};

use crate::{
    odometry::{Odometry, SweepOutcome},
    slot::{OfferResult, SweepSlot},
};

/// How long the worker sleeps when no sweep is pending, unless it is woken up earlier
const IDLE_TIMEOUT: Duration = Duration::from_millis(20);

/// The state of an [OdometryWorker] after its latest sweep
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OdometrySnapshot {
    /// Timestamp of the latest sweep that was not skipped
    pub timestamp: Option<f64>,
    pub pose: Pose,
    pub last_outcome: Option<SweepOutcome>,
    pub sweeps_processed: usize,
    /// Sweeps that never reached the pipeline because the slot was full
    pub sweeps_dropped: usize,
}

struct Shared {
    slot: SweepSlot<SweepMessage>,
    snapshot: RwLock<OdometrySnapshot>,
    running: AtomicBool,
}

/// Runs an [Odometry] pipeline on a dedicated thread. Sweeps are handed over through a capacity-1
/// [SweepSlot], so a slow pipeline never blocks the producer and never builds up a backlog.
pub struct OdometryWorker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<Odometry>>,
}

impl OdometryWorker {
    /// Moves `odometry` onto a new thread. The overflow policy of the slot is taken from the pipeline
    /// configuration.
    ///
    /// # Errors
    ///
    /// If the thread can't be spawned
    pub fn spawn(odometry: Odometry) -> Result<Self> {
        let shared = Arc::new(Shared {
            slot: SweepSlot::new(odometry.config().pipeline.overflow_policy),
            snapshot: RwLock::new(OdometrySnapshot::default()),
            running: AtomicBool::new(true),
        });
        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("sweep-odometry".into())
            .spawn(move || run(odometry, thread_shared))
            .context("Could not spawn odometry thread")?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Hands `sweep` to the worker. Never blocks
    pub fn offer(&self, sweep: SweepMessage) -> OfferResult {
        let result = self.shared.slot.offer(sweep);
        if let Some(handle) = self.handle.as_ref() {
            handle.thread().unpark();
        }
        result
    }

    /// The state after the latest processed sweep
    pub fn snapshot(&self) -> OdometrySnapshot {
        let mut snapshot = match self.shared.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        snapshot.sweeps_dropped = self.shared.slot.dropped_count();
        snapshot
    }

    /// Stops the worker after it has processed the pending sweep, if any, and returns the pipeline
    ///
    /// # Errors
    ///
    /// If the worker thread panicked
    pub fn shutdown(mut self) -> Result<Odometry> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("Odometry worker was already shut down"))?;
        self.shared.running.store(false, Ordering::SeqCst);
        handle.thread().unpark();
        handle
            .join()
            .map_err(|_| anyhow!("Odometry thread panicked"))
    }
}

impl Drop for OdometryWorker {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.as_ref() {
            handle.thread().unpark();
        }
    }
}

fn run(mut odometry: Odometry, shared: Arc<Shared>) -> Odometry {
    info!("Odometry worker started");
    while shared.running.load(Ordering::SeqCst) {
        match shared.slot.take() {
            Some(sweep) => process(&mut odometry, &shared, sweep),
            None => thread::park_timeout(IDLE_TIMEOUT),
        }
    }
    if let Some(sweep) = shared.slot.take() {
        process(&mut odometry, &shared, sweep);
    }
    info!(
        "Odometry worker stopped after {} sweeps",
        odometry.sweeps_processed()
    );
    odometry
}

fn process(odometry: &mut Odometry, shared: &Shared, sweep: SweepMessage) {
    let outcome = odometry.process(sweep);
    debug!("Worker processed sweep: {:?}", outcome);
    let snapshot = OdometrySnapshot {
        timestamp: odometry.trajectory().last().map(|p| p.timestamp),
        pose: odometry.pose(),
        last_outcome: Some(outcome),
        sweeps_processed: odometry.sweeps_processed(),
        sweeps_dropped: shared.slot.dropped_count(),
    };
    match shared.snapshot.write() {
        Ok(mut guard) => *guard = snapshot,
        Err(poisoned) => *poisoned.into_inner() = snapshot,
    }
}
