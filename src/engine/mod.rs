//! Dispatch: priority queue, background worker and engine state.

pub mod error;
pub mod queue;
pub mod speech_engine;
pub mod state;
mod worker;

pub use error::{DispatchError, DispatchStep, ErrorReporter, LogReporter};
pub use queue::DispatchQueue;
pub use speech_engine::{SpeechEngine, UnitCallback};
pub use state::{EngineState, StateMachine};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// How a unit is handed to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Render on the caller's thread and return when done.
    Blocking,
    /// Enqueue for the background worker and return immediately.
    #[default]
    Queued,
}

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
