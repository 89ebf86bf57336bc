//! Live fragment sources.
//!
//! A fragment source produces raw text or JSON fragments on demand and
//! signals the end of the sequence with `None`.

use async_trait::async_trait;
use futures_util::Stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::warn;

/// Pull-based producer of raw fragments.
#[async_trait]
pub trait FragmentSource: Send {
    /// Waits for the next fragment. `None` ends the sequence.
    async fn next_fragment(&mut self) -> Option<String>;
}

#[async_trait]
impl FragmentSource for mpsc::Receiver<String> {
    async fn next_fragment(&mut self) -> Option<String> {
        self.recv().await
    }
}

#[async_trait]
impl FragmentSource for mpsc::UnboundedReceiver<String> {
    async fn next_fragment(&mut self) -> Option<String> {
        self.recv().await
    }
}

/// One fragment per line of an async reader.
///
/// The trailing newline is kept so a sentence assembler sees the line break
/// as a boundary.
pub struct LineFragments<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin + Send> LineFragments<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }
}

impl LineFragments<tokio::io::Stdin> {
    /// Reads fragments from standard input.
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FragmentSource for LineFragments<R> {
    async fn next_fragment(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(Some(mut line)) => {
                line.push('\n');
                Some(line)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "fragment reader failed, ending stream");
                None
            }
        }
    }
}

/// Adapts any fragment source into a `Stream`.
pub fn fragment_stream<F>(source: F) -> impl Stream<Item = String> + Send
where
    F: FragmentSource + 'static,
{
    futures_util::stream::unfold(source, |mut source| async move {
        source
            .next_fragment()
            .await
            .map(|fragment| (fragment, source))
    })
}
