//! Engine state machine.
//!
//! The reported state is derived from what is actually happening, never set
//! directly: Streaming while any stream session is open, else Speaking while
//! a unit is in render, else Silent.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Silent,
    Speaking,
    Streaming,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Silent => "silent",
            EngineState::Speaking => "speaking",
            EngineState::Streaming => "streaming",
        };
        f.write_str(name)
    }
}

/// Activity tracker behind [`EngineState`].
///
/// Every `begin_*` returns the current generation; the matching `end_*` is
/// ignored if a [`reset`](StateMachine::reset) happened in between, so work
/// finishing after a stop cannot disturb state owned by newer work.
#[derive(Debug, Default)]
pub struct StateMachine {
    generation: u64,
    rendering: bool,
    streams: usize,
}

impl StateMachine {
    pub fn state(&self) -> EngineState {
        if self.streams > 0 {
            EngineState::Streaming
        } else if self.rendering {
            EngineState::Speaking
        } else {
            EngineState::Silent
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn begin_render(&mut self) -> u64 {
        self.rendering = true;
        self.generation
    }

    pub fn end_render(&mut self, generation: u64) {
        if generation == self.generation {
            self.rendering = false;
        }
    }

    pub fn begin_stream(&mut self) -> u64 {
        self.streams += 1;
        self.generation
    }

    pub fn end_stream(&mut self, generation: u64) {
        if generation == self.generation {
            self.streams = self.streams.saturating_sub(1);
        }
    }

    /// Back to Silent; outstanding `end_*` calls become no-ops.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.rendering = false;
        self.streams = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_silent() {
        assert_eq!(StateMachine::default().state(), EngineState::Silent);
    }

    #[test]
    fn render_cycle() {
        let mut sm = StateMachine::default();
        let token = sm.begin_render();
        assert_eq!(sm.state(), EngineState::Speaking);
        sm.end_render(token);
        assert_eq!(sm.state(), EngineState::Silent);
    }

    #[test]
    fn streaming_masks_nested_renders() {
        let mut sm = StateMachine::default();
        let stream = sm.begin_stream();
        let render = sm.begin_render();
        assert_eq!(sm.state(), EngineState::Streaming);
        sm.end_render(render);
        assert_eq!(sm.state(), EngineState::Streaming);
        sm.end_stream(stream);
        assert_eq!(sm.state(), EngineState::Silent);
    }

    #[test]
    fn overlapping_streams_count() {
        let mut sm = StateMachine::default();
        let a = sm.begin_stream();
        let b = sm.begin_stream();
        sm.end_stream(a);
        assert_eq!(sm.state(), EngineState::Streaming);
        sm.end_stream(b);
        assert_eq!(sm.state(), EngineState::Silent);
    }

    #[test]
    fn reset_from_any_state_is_silent() {
        let mut sm = StateMachine::default();
        sm.begin_render();
        sm.reset();
        assert_eq!(sm.state(), EngineState::Silent);

        sm.begin_stream();
        sm.begin_render();
        sm.reset();
        assert_eq!(sm.state(), EngineState::Silent);
    }

    #[test]
    fn stale_end_after_reset_is_ignored() {
        let mut sm = StateMachine::default();
        let old_stream = sm.begin_stream();
        let old_render = sm.begin_render();
        sm.reset();

        let new_stream = sm.begin_stream();
        sm.end_render(old_render);
        sm.end_stream(old_stream);
        assert_eq!(sm.state(), EngineState::Streaming);

        sm.end_stream(new_stream);
        assert_eq!(sm.state(), EngineState::Silent);
    }

    #[test]
    fn display_names() {
        assert_eq!(EngineState::Silent.to_string(), "silent");
        assert_eq!(EngineState::Speaking.to_string(), "speaking");
        assert_eq!(EngineState::Streaming.to_string(), "streaming");
    }
}
