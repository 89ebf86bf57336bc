//! Background dispatch worker.
//!
//! One worker per engine drains the queue strictly one unit at a time. It is
//! spawned lazily on enqueue and exits after a full poll interval with
//! nothing to do; the next enqueue spawns a fresh one.

use crate::engine::speech_engine::{NextUnit, Shared};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Messages from the engine to its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerSignal {
    /// New work was queued.
    Wake,
    /// Exit after the current unit.
    Shutdown,
}

/// The engine's view of a running worker.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    pub(crate) id: u64,
    pub(crate) signal: Sender<WorkerSignal>,
    pub(crate) thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Spawns a worker thread draining `shared`'s queue.
    pub(crate) fn spawn(shared: Arc<Shared>, id: u64) -> std::io::Result<Self> {
        let (signal, rx) = crossbeam_channel::unbounded();
        let thread = std::thread::Builder::new()
            .name(format!("ldsvoice-dispatch-{id}"))
            .spawn(move || run(&shared, id, &rx))?;
        Ok(Self { id, signal, thread })
    }
}

fn run(shared: &Shared, id: u64, rx: &Receiver<WorkerSignal>) {
    tracing::debug!(worker = id, "dispatch worker started");

    loop {
        match shared.next_unit(id) {
            NextUnit::Unit(unit, generation) => {
                shared.render_queued(&unit, generation);
                continue;
            }
            NextUnit::Retired => break,
            NextUnit::Empty => {}
        }

        match rx.recv_timeout(shared.poll_interval()) {
            Ok(WorkerSignal::Wake) => {}
            Ok(WorkerSignal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if shared.retire_if_idle(id) {
                    break;
                }
            }
        }
    }

    tracing::debug!(worker = id, "dispatch worker exited");
}
