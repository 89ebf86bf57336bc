//! Failures inside dispatch. None of them stop the engine; they are handed
//! to an [`ErrorReporter`] and the next unit proceeds.

use std::fmt;
use thiserror::Error;

/// The point in a unit's dispatch where something went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStep {
    /// The configured sink's `render`.
    Render,
    /// The console echo after a failed render.
    Fallback,
    OnSpeak,
    OnDone,
    /// The background worker itself.
    Worker,
}

impl fmt::Display for DispatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchStep::Render => "render",
            DispatchStep::Fallback => "fallback",
            DispatchStep::OnSpeak => "on_speak",
            DispatchStep::OnDone => "on_done",
            DispatchStep::Worker => "worker",
        };
        f.write_str(name)
    }
}

/// A failure while dispatching, tagged with the unit it hit when there is one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("sink '{sink}' failed on unit from {source_id}: {message}")]
    Render {
        sink: &'static str,
        source_id: String,
        message: String,
    },

    #[error("sink '{sink}' panicked on unit from {source_id}: {message}")]
    RenderPanic {
        sink: &'static str,
        source_id: String,
        message: String,
    },

    #[error("console fallback failed on unit from {source_id}: {message}")]
    Fallback { source_id: String, message: String },

    #[error("{hook} callback panicked on unit from {source_id}: {message}")]
    Callback {
        hook: DispatchStep,
        source_id: String,
        message: String,
    },

    #[error("render task for unit from {source_id} did not complete: {message}")]
    RenderTask { source_id: String, message: String },

    #[error("could not start dispatch worker, dropped {dropped} queued unit(s): {message}")]
    WorkerSpawn { dropped: usize, message: String },

    #[error("dispatch worker panicked")]
    WorkerPanic,
}

impl DispatchError {
    pub fn step(&self) -> DispatchStep {
        match self {
            DispatchError::Render { .. }
            | DispatchError::RenderPanic { .. }
            | DispatchError::RenderTask { .. } => DispatchStep::Render,
            DispatchError::Fallback { .. } => DispatchStep::Fallback,
            DispatchError::Callback { hook, .. } => *hook,
            DispatchError::WorkerSpawn { .. } | DispatchError::WorkerPanic => DispatchStep::Worker,
        }
    }

    /// Source id of the affected unit, if the failure concerns a single unit.
    pub fn source_id(&self) -> Option<&str> {
        match self {
            DispatchError::Render { source_id, .. }
            | DispatchError::RenderPanic { source_id, .. }
            | DispatchError::Fallback { source_id, .. }
            | DispatchError::Callback { source_id, .. }
            | DispatchError::RenderTask { source_id, .. } => Some(source_id),
            DispatchError::WorkerSpawn { .. } | DispatchError::WorkerPanic => None,
        }
    }

    /// True when the failure affects more than the current unit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DispatchError::WorkerSpawn { .. } | DispatchError::WorkerPanic
        )
    }
}

/// Receives dispatch failures.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &DispatchError);
}

/// Reporter that forwards to `tracing`: unit failures as warnings, worker
/// failures as errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &DispatchError) {
        let step = error.step();
        let source_id = error.source_id().unwrap_or("-");
        if error.is_fatal() {
            tracing::error!(%step, source_id, "{error}");
        } else {
            tracing::warn!(%step, source_id, "{error}");
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}
