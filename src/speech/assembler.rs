//! Zero-latency sentence assembly from incremental text fragments.
//!
//! Fragments are appended to a buffer; after every append the buffer is
//! scanned for the earliest delimiter among `". "`, `"! "`, `"? "` and
//! `"\n"`. Everything up to and including that delimiter is emitted as a
//! unit immediately, and the scan repeats on the remainder. Whatever is left
//! when the source ends is flushed as a final unit.
//!
//! The earliest *position* wins, whichever delimiter matched. Because a
//! delimiter always completes no later than any delimiter starting after
//! it, the emitted sentences depend only on the concatenated text, not on
//! how it was split into fragments.
//!
//! There is no backpressure: a producer that never sends a delimiter grows
//! the buffer without bound until the stream ends.

use crate::speech::unit::{SpeechUnit, Voice};
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;

/// Sentence delimiters, matched by earliest position in the buffer.
pub const DELIMITERS: [&str; 4] = [". ", "! ", "? ", "\n"];

/// Source id stamped on units assembled from a live stream.
pub const STREAM_SOURCE: &str = "stream";

/// Incremental sentence assembler.
#[derive(Debug, Clone)]
pub struct StreamAssembler {
    buffer: String,
    template: SpeechUnit,
}

impl StreamAssembler {
    pub fn new(voice: Voice) -> Self {
        Self::with_template(SpeechUnit::new("", voice, STREAM_SOURCE))
    }

    /// Emitted units copy voice, priority and source from `template`.
    pub fn with_template(template: SpeechUnit) -> Self {
        Self {
            buffer: String::new(),
            template,
        }
    }

    /// Appends a fragment and returns every sentence it completed, in order.
    pub fn push(&mut self, fragment: &str) -> Vec<SpeechUnit> {
        self.buffer.push_str(fragment);

        let mut completed = Vec::new();
        while let Some(end) = first_delimiter_end(&self.buffer) {
            let rest = self.buffer.split_off(end);
            let sentence = std::mem::replace(&mut self.buffer, rest);
            if let Some(unit) = self.unit(&sentence) {
                completed.push(unit);
            }
        }
        completed
    }

    /// Flushes the remaining buffer as a final unit, if it holds any text.
    pub fn finish(&mut self) -> Option<SpeechUnit> {
        let rest = std::mem::take(&mut self.buffer);
        self.unit(&rest)
    }

    /// Text received but not yet emitted.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    fn unit(&self, sentence: &str) -> Option<SpeechUnit> {
        let text = sentence.trim();
        if text.is_empty() {
            None
        } else {
            Some(self.template.derive(text))
        }
    }
}

/// Byte offset just past the earliest delimiter in `buffer`.
fn first_delimiter_end(buffer: &str) -> Option<usize> {
    DELIMITERS
        .iter()
        .filter_map(|delim| buffer.find(delim).map(|idx| (idx, idx + delim.len())))
        .min_by_key(|(idx, _)| *idx)
        .map(|(_, end)| end)
}

/// Lazily assembles sentences from a synchronous fragment source.
///
/// A fragment is pulled only once every sentence completed by the previous
/// fragments has been handed out.
pub fn assemble<I>(fragments: I, voice: Voice) -> Assembled<I::IntoIter>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    Assembled {
        fragments: fragments.into_iter(),
        assembler: StreamAssembler::new(voice),
        ready: VecDeque::new(),
        finished: false,
    }
}

/// Iterator returned by [`assemble`].
pub struct Assembled<I> {
    fragments: I,
    assembler: StreamAssembler,
    ready: VecDeque<SpeechUnit>,
    finished: bool,
}

impl<I> Iterator for Assembled<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = SpeechUnit;

    fn next(&mut self) -> Option<SpeechUnit> {
        loop {
            if let Some(unit) = self.ready.pop_front() {
                return Some(unit);
            }
            if self.finished {
                return None;
            }
            match self.fragments.next() {
                Some(fragment) => self.ready.extend(self.assembler.push(fragment.as_ref())),
                None => {
                    self.finished = true;
                    self.ready.extend(self.assembler.finish());
                }
            }
        }
    }
}

/// Lazily assembles sentences from an asynchronous fragment source.
pub fn assemble_stream<S>(fragments: S, voice: Voice) -> impl Stream<Item = SpeechUnit>
where
    S: Stream,
    S::Item: AsRef<str>,
{
    async_stream::stream! {
        let mut assembler = StreamAssembler::new(voice);
        let mut fragments = std::pin::pin!(fragments);
        while let Some(fragment) = fragments.next().await {
            for unit in assembler.push(fragment.as_ref()) {
                yield unit;
            }
        }
        if let Some(unit) = assembler.finish() {
            yield unit;
        }
    }
}
