//! Child process handling shared by the CLI-backed sinks.

use crate::error::{Result, SpeechError};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// How often a running child is polled for exit.
const WAIT_POLL: Duration = Duration::from_millis(10);

/// Holds the currently running child so another thread can kill it.
#[derive(Debug, Clone, Default)]
pub(crate) struct ChildSlot {
    child: Arc<Mutex<Option<Child>>>,
}

impl ChildSlot {
    /// Spawns `command` and waits for it to exit.
    ///
    /// A child killed through [`ChildSlot::kill`] counts as success.
    pub(crate) fn run(&self, mut command: Command, sink: &str) -> Result<()> {
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SpeechError::sink_failed(sink, format!("failed to spawn: {e}")))?;

        *self.lock() = Some(child);

        loop {
            {
                let mut slot = self.lock();
                let Some(child) = slot.as_mut() else {
                    return Ok(());
                };
                match child.try_wait() {
                    Ok(Some(status)) if status.success() => {
                        slot.take();
                        return Ok(());
                    }
                    Ok(Some(status)) => {
                        let stderr = slot.take().and_then(read_stderr).unwrap_or_default();
                        return Err(SpeechError::sink_failed(
                            sink,
                            format!("exited with {status}: {}", stderr.trim()),
                        ));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        slot.take();
                        return Err(SpeechError::sink_failed(sink, e.to_string()));
                    }
                }
            }
            std::thread::sleep(WAIT_POLL);
        }
    }

    /// Kills the running child, if any. Best effort.
    pub(crate) fn kill(&self) {
        if let Some(mut child) = self.lock().take() {
            if let Err(e) = child.kill() {
                tracing::debug!(error = %e, "child already exited");
            }
            // Reap so the process does not linger as a zombie.
            if let Err(e) = child.wait() {
                tracing::debug!(error = %e, "failed to reap killed child");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_stderr(mut child: Child) -> Option<String> {
    let mut stderr = child.stderr.take()?;
    let mut buf = String::new();
    stderr.read_to_string(&mut buf).ok()?;
    Some(buf)
}

/// Resolves a program name against PATH. Path-like names are checked as given.
pub(crate) fn find_program(program: &str) -> Option<PathBuf> {
    if program.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(program);
        return path.is_file().then_some(path);
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Base file name of a program path, for matching known tools.
#[cfg_attr(not(feature = "cloud"), allow(dead_code))]
pub(crate) fn program_name(program: &Path) -> &str {
    program
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
}
