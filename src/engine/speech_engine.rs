//! The speech engine: one sink, one queue, one worker, one state.
//!
//! `SpeechEngine` is a cheap, cloneable handle. Independent engines share
//! nothing, so several pipelines can run side by side in one process.

use crate::config::Config;
use crate::defaults;
use crate::engine::error::{DispatchError, DispatchStep, ErrorReporter, LogReporter, panic_message};
use crate::engine::queue::DispatchQueue;
use crate::engine::state::{EngineState, StateMachine};
use crate::engine::worker::{WorkerHandle, WorkerSignal};
use crate::engine::{DispatchMode, lock};
use crate::sink::{ConsoleSink, OutputSink, SinkCanceller, build_sink};
use crate::speech::{SpeechUnit, Voice, assemble, assemble_stream};
use futures_util::{Stream, StreamExt};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Observer invoked around each rendered unit.
pub type UnitCallback = Arc<dyn Fn(&SpeechUnit) + Send + Sync>;

pub(crate) enum NextUnit {
    /// A unit to render, with the generation it was dequeued under.
    Unit(SpeechUnit, u64),
    Empty,
    /// This worker has been replaced or stopped.
    Retired,
}

pub(crate) struct Shared {
    queue: DispatchQueue,
    sink: Mutex<Box<dyn OutputSink>>,
    sink_name: &'static str,
    canceller: Option<SinkCanceller>,
    state: Mutex<StateMachine>,
    /// Units accepted but not yet finished (queued, or rendering).
    outstanding: Mutex<usize>,
    idle: Condvar,
    worker: Mutex<Option<WorkerHandle>>,
    next_worker_id: AtomicU64,
    on_speak: Mutex<Option<UnitCallback>>,
    on_done: Mutex<Option<UnitCallback>>,
    reporter: Mutex<Arc<dyn ErrorReporter>>,
    default_voice: Voice,
    poll_interval: Duration,
}

impl Shared {
    pub(crate) fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Pops the next unit if `worker` is still the engine's worker.
    pub(crate) fn next_unit(&self, worker: u64) -> NextUnit {
        let slot = lock(&self.worker);
        if slot.as_ref().map(|w| w.id) != Some(worker) {
            return NextUnit::Retired;
        }
        match self.queue.pop() {
            Some(unit) => NextUnit::Unit(unit, lock(&self.state).generation()),
            None => NextUnit::Empty,
        }
    }

    /// Gives up the worker slot unless work arrived meanwhile. Checked under
    /// the slot lock, so an enqueue either sees this worker gone and spawns a
    /// new one, or is seen here.
    pub(crate) fn retire_if_idle(&self, worker: u64) -> bool {
        let mut slot = lock(&self.worker);
        if !self.queue.is_empty() {
            return false;
        }
        if slot.as_ref().map(|w| w.id) == Some(worker) {
            *slot = None;
        }
        true
    }

    pub(crate) fn render_queued(&self, unit: &SpeechUnit, generation: u64) {
        self.render(unit, generation);
        self.finish_work(1);
    }

    /// Renders one unit under the sink lock. Skipped if a stop happened
    /// since `generation` was read. Never panics, never propagates errors.
    fn render(&self, unit: &SpeechUnit, generation: u64) -> bool {
        let mut sink = lock(&self.sink);
        let token = {
            let mut state = lock(&self.state);
            if state.generation() != generation {
                tracing::debug!(source_id = unit.source_id(), "unit dropped after stop");
                return false;
            }
            state.begin_render()
        };

        tracing::debug!(
            sink = self.sink_name,
            source_id = unit.source_id(),
            priority = unit.priority(),
            "rendering unit"
        );
        self.fire(&self.on_speak, unit, DispatchStep::OnSpeak);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            sink.render(unit.text(), unit.voice())
        }));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(DispatchError::Render {
                sink: self.sink_name,
                source_id: unit.source_id().to_string(),
                message: e.to_string(),
            }),
            Err(payload) => Some(DispatchError::RenderPanic {
                sink: self.sink_name,
                source_id: unit.source_id().to_string(),
                message: panic_message(payload.as_ref()).to_string(),
            }),
        };

        if let Some(error) = failure {
            self.report(&error);
            if self.sink_name != "console"
                && let Err(e) = ConsoleSink.render(unit.text(), unit.voice())
            {
                self.report(&DispatchError::Fallback {
                    source_id: unit.source_id().to_string(),
                    message: e.to_string(),
                });
            }
        }

        lock(&self.state).end_render(token);
        drop(sink);

        self.fire(&self.on_done, unit, DispatchStep::OnDone);
        true
    }

    fn fire(&self, slot: &Mutex<Option<UnitCallback>>, unit: &SpeechUnit, hook: DispatchStep) {
        let Some(callback) = lock(slot).clone() else {
            return;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(unit))) {
            self.report(&DispatchError::Callback {
                hook,
                source_id: unit.source_id().to_string(),
                message: panic_message(payload.as_ref()).to_string(),
            });
        }
    }

    fn report(&self, error: &DispatchError) {
        let reporter = Arc::clone(&lock(&self.reporter));
        reporter.report(error);
    }

    fn begin_work(&self, units: usize) {
        *lock(&self.outstanding) += units;
    }

    fn finish_work(&self, units: usize) {
        let mut outstanding = lock(&self.outstanding);
        *outstanding = outstanding.saturating_sub(units);
        if *outstanding == 0 {
            self.idle.notify_all();
        }
    }

    fn current_generation(&self) -> u64 {
        lock(&self.state).generation()
    }

    /// Wakes the running worker or spawns a new one.
    fn ensure_worker(self: &Arc<Self>) {
        let mut slot = lock(&self.worker);
        if let Some(worker) = slot.as_ref()
            && worker.signal.send(WorkerSignal::Wake).is_ok()
        {
            return;
        }

        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed) + 1;
        match WorkerHandle::spawn(Arc::clone(self), id) {
            Ok(worker) => *slot = Some(worker),
            Err(e) => self.abandon_queue(slot, e.to_string()),
        }
    }

    /// Drops queued units that no worker will pick up, so `wait_idle` does
    /// not wait on them forever. Takes the slot guard to keep the
    /// worker-then-queue lock order.
    fn abandon_queue(&self, mut slot: MutexGuard<'_, Option<WorkerHandle>>, message: String) {
        *slot = None;
        let dropped = self.queue.clear();
        drop(slot);
        self.finish_work(dropped);
        self.report(&DispatchError::WorkerSpawn { dropped, message });
    }

    /// Clears pending work, retires the worker and resets state.
    fn halt(&self) -> Option<WorkerHandle> {
        let worker = lock(&self.worker).take();
        let dropped = self.queue.clear();
        self.finish_work(dropped);

        if let Some(ref worker) = worker
            && worker.signal.send(WorkerSignal::Shutdown).is_err()
        {
            tracing::debug!(worker = worker.id, "worker already exited");
        }
        if let Some(ref cancel) = self.canceller {
            cancel();
        }
        lock(&self.state).reset();

        tracing::info!(dropped, "speech stopped");
        worker
    }
}

/// Marks the engine as Streaming for its lifetime.
struct StreamSession<'a> {
    shared: &'a Shared,
    generation: u64,
}

impl<'a> StreamSession<'a> {
    fn begin(shared: &'a Shared) -> Self {
        let generation = lock(&shared.state).begin_stream();
        tracing::debug!("stream session started");
        Self { shared, generation }
    }

    /// False once the engine has been stopped.
    fn is_current(&self) -> bool {
        self.shared.current_generation() == self.generation
    }
}

impl Drop for StreamSession<'_> {
    fn drop(&mut self) {
        lock(&self.shared.state).end_stream(self.generation);
        tracing::debug!("stream session ended");
    }
}

/// Handle to a speech engine.
#[derive(Clone)]
pub struct SpeechEngine {
    shared: Arc<Shared>,
}

impl SpeechEngine {
    /// Creates an engine rendering into `sink`, with voice defaults and poll
    /// interval from `config`.
    pub fn new(config: &Config, sink: Box<dyn OutputSink>) -> Self {
        let sink_name = sink.name();
        let canceller = sink.canceller();
        Self {
            shared: Arc::new(Shared {
                queue: DispatchQueue::new(),
                sink: Mutex::new(sink),
                sink_name,
                canceller,
                state: Mutex::new(StateMachine::default()),
                outstanding: Mutex::new(0),
                idle: Condvar::new(),
                worker: Mutex::new(None),
                next_worker_id: AtomicU64::new(0),
                on_speak: Mutex::new(None),
                on_done: Mutex::new(None),
                reporter: Mutex::new(Arc::new(LogReporter)),
                default_voice: config.voice.clone(),
                poll_interval: config.engine.poll_interval(),
            }),
        }
    }

    /// Creates an engine with the sink selected by `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, build_sink(config))
    }

    /// Sets a custom error reporter.
    pub fn with_reporter(self, reporter: Arc<dyn ErrorReporter>) -> Self {
        *lock(&self.shared.reporter) = reporter;
        self
    }

    pub fn default_voice(&self) -> &Voice {
        &self.shared.default_voice
    }

    pub fn sink_name(&self) -> &'static str {
        self.shared.sink_name
    }

    /// Renders `unit` now, on this thread. Waits for any unit already in
    /// render to finish first.
    pub fn speak(&self, unit: SpeechUnit) {
        let generation = self.shared.current_generation();
        self.shared.begin_work(1);
        self.shared.render(&unit, generation);
        self.shared.finish_work(1);
    }

    /// Speaks literal text with the engine's default voice.
    pub fn speak_text(&self, text: &str, mode: DispatchMode) {
        let unit = SpeechUnit::new(
            text,
            self.shared.default_voice.clone(),
            defaults::UNKNOWN_SOURCE,
        );
        self.dispatch(unit, mode);
    }

    /// Queues `unit` for the background worker and returns immediately.
    pub fn enqueue(&self, unit: SpeechUnit) {
        self.shared.begin_work(1);
        self.shared.queue.push(unit);
        tracing::debug!(pending = self.shared.queue.len(), "unit queued");
        self.shared.ensure_worker();
    }

    /// Queues a batch atomically. Returns the number of units queued.
    pub fn enqueue_all<I>(&self, units: I) -> usize
    where
        I: IntoIterator<Item = SpeechUnit>,
    {
        let units: Vec<SpeechUnit> = units.into_iter().collect();
        if units.is_empty() {
            return 0;
        }
        self.shared.begin_work(units.len());
        let queued = self.shared.queue.push_all(units);
        tracing::debug!(queued, pending = self.shared.queue.len(), "units queued");
        self.shared.ensure_worker();
        queued
    }

    pub fn dispatch(&self, unit: SpeechUnit, mode: DispatchMode) {
        match mode {
            DispatchMode::Blocking => self.speak(unit),
            DispatchMode::Queued => self.enqueue(unit),
        }
    }

    /// Speaks each sentence as soon as the fragments complete it.
    ///
    /// Holds the engine in Streaming until the fragments end or the engine is
    /// stopped. Returns the number of sentences rendered.
    pub fn stream_speak<I>(&self, fragments: I, voice: Voice) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let session = StreamSession::begin(&self.shared);
        let mut spoken = 0;
        for unit in assemble(fragments, voice) {
            if !session.is_current() {
                break;
            }
            self.shared.begin_work(1);
            if self.shared.render(&unit, session.generation) {
                spoken += 1;
            }
            self.shared.finish_work(1);
        }
        spoken
    }

    /// Async counterpart of [`stream_speak`](Self::stream_speak). Each render
    /// runs on the blocking pool so the runtime keeps receiving fragments.
    pub async fn stream_speak_async<S>(&self, fragments: S, voice: Voice) -> usize
    where
        S: Stream,
        S::Item: AsRef<str>,
    {
        let session = StreamSession::begin(&self.shared);
        let mut units = std::pin::pin!(assemble_stream(fragments, voice));
        let mut spoken = 0;

        while let Some(unit) = units.next().await {
            if !session.is_current() {
                break;
            }
            let shared = Arc::clone(&self.shared);
            let generation = session.generation;
            let source_id = unit.source_id().to_string();
            shared.begin_work(1);
            let rendered = tokio::task::spawn_blocking(move || {
                let rendered = shared.render(&unit, generation);
                shared.finish_work(1);
                rendered
            })
            .await;

            match rendered {
                Ok(true) => spoken += 1,
                Ok(false) => {}
                Err(e) => {
                    self.shared.finish_work(1);
                    self.shared.report(&DispatchError::RenderTask {
                        source_id,
                        message: e.to_string(),
                    });
                }
            }
        }
        spoken
    }

    /// Empties the queue and returns to Silent. A unit already in render is
    /// cut short only if the sink supports it.
    pub fn stop(&self) {
        drop(self.shared.halt());
    }

    /// Stops, then waits for the worker thread to exit.
    pub fn shutdown(&self) {
        let Some(worker) = self.shared.halt() else {
            return;
        };
        if worker.thread.thread().id() == std::thread::current().id() {
            return;
        }
        if worker.thread.join().is_err() {
            self.shared.report(&DispatchError::WorkerPanic);
        }
    }

    pub fn state(&self) -> EngineState {
        lock(&self.shared.state).state()
    }

    /// Units waiting in the queue (not counting one in render).
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Blocks until every accepted unit has finished, or `timeout` elapses.
    /// Returns true if the engine went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let outstanding = lock(&self.shared.outstanding);
        let (outstanding, _) = self
            .shared
            .idle
            .wait_timeout_while(outstanding, timeout, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *outstanding == 0
    }

    /// Called before each unit renders.
    pub fn on_speak(&self, callback: impl Fn(&SpeechUnit) + Send + Sync + 'static) {
        *lock(&self.shared.on_speak) = Some(Arc::new(callback));
    }

    /// Called after each unit renders, successfully or not.
    pub fn on_done(&self, callback: impl Fn(&SpeechUnit) + Send + Sync + 'static) {
        *lock(&self.shared.on_done) = Some(Arc::new(callback));
    }
}

impl std::fmt::Debug for SpeechEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechEngine")
            .field("sink", &self.shared.sink_name)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}
