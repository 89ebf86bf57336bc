//! Entity pipeline: Entity Source → Extractor → Chunker → engine dispatch.

use crate::config::Config;
use crate::engine::{DispatchMode, SpeechEngine};
use crate::entity::{Entity, EntitySource};
use crate::error::Result;
use crate::speech::{Chunker, ContentExtractor, SpeechUnit};
use futures_util::{Stream, StreamExt};
use std::path::Path;
use tracing::{debug, warn};

/// Configuration for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Texts longer than this many characters are split into sentences
    pub chunk_threshold: usize,
    /// Blocking renders each unit before returning; Queued hands it to the worker
    pub mode: DispatchMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_threshold: crate::defaults::CHUNK_THRESHOLD,
            mode: DispatchMode::Queued,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config, mode: DispatchMode) -> Self {
        Self {
            chunk_threshold: config.engine.chunk_threshold,
            mode,
        }
    }
}

/// Turns entities into dispatched speech.
#[derive(Debug, Clone)]
pub struct Pipeline {
    engine: SpeechEngine,
    extractor: ContentExtractor,
    chunker: Chunker,
    mode: DispatchMode,
}

impl Pipeline {
    /// Creates a pipeline whose units start from the engine's default voice.
    pub fn new(engine: SpeechEngine, config: PipelineConfig) -> Self {
        let extractor = ContentExtractor::new(engine.default_voice().clone());
        Self {
            engine,
            extractor,
            chunker: Chunker::new(config.chunk_threshold),
            mode: config.mode,
        }
    }

    pub fn engine(&self) -> &SpeechEngine {
        &self.engine
    }

    /// The units an entity would be spoken as, in order.
    pub fn units(&self, entity: &Entity) -> Vec<SpeechUnit> {
        self.chunker.chunk(self.extractor.extract(entity))
    }

    /// Speaks one entity. Returns the number of units dispatched.
    pub fn speak_entity(&self, entity: &Entity) -> usize {
        let units = self.units(entity);
        debug!(
            source_id = entity.id().unwrap_or(crate::defaults::UNKNOWN_SOURCE),
            units = units.len(),
            "entity extracted"
        );
        dispatch(&self.engine, units, self.mode)
    }

    /// Speaks one file. A missing or malformed file is an error for this call.
    pub fn speak_file(&self, path: &Path) -> Result<usize> {
        let entity = EntitySource::from_file(path)?;
        Ok(self.speak_entity(&entity))
    }

    /// Speaks every entity file matching `pattern`, in path order. A file
    /// that fails to load is logged and skipped.
    pub fn speak_files(&self, pattern: &str) -> Result<usize> {
        let mut dispatched = 0;
        for entity in EntitySource::from_pattern(pattern)? {
            match entity {
                Ok(entity) => dispatched += self.speak_entity(&entity),
                Err(e) => warn!(error = %e, "skipping entity file"),
            }
        }
        Ok(dispatched)
    }

    /// Speaks a sequence of raw fragments, one entity per fragment.
    pub fn speak_fragments<I>(&self, fragments: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        EntitySource::from_fragment_iter(fragments)
            .map(|entity| self.speak_entity(&entity))
            .sum()
    }

    /// Async counterpart of [`speak_fragments`](Self::speak_fragments).
    /// Blocking renders run on the blocking pool.
    pub async fn speak_stream<S>(&self, fragments: S) -> usize
    where
        S: Stream<Item = String>,
    {
        let mut entities = std::pin::pin!(EntitySource::from_fragments(fragments));
        let mut dispatched = 0;

        while let Some(entity) = entities.next().await {
            let units = self.units(&entity);
            dispatched += match self.mode {
                DispatchMode::Queued => self.engine.enqueue_all(units),
                DispatchMode::Blocking => {
                    let engine = self.engine.clone();
                    let count = units.len();
                    match tokio::task::spawn_blocking(move || {
                        dispatch(&engine, units, DispatchMode::Blocking)
                    })
                    .await
                    {
                        Ok(spoken) => spoken,
                        Err(e) => {
                            warn!(error = %e, units = count, "render task failed");
                            0
                        }
                    }
                }
            };
        }
        dispatched
    }
}

fn dispatch(engine: &SpeechEngine, units: Vec<SpeechUnit>, mode: DispatchMode) -> usize {
    match mode {
        DispatchMode::Queued => engine.enqueue_all(units),
        DispatchMode::Blocking => {
            let count = units.len();
            for unit in units {
                engine.speak(unit);
            }
            count
        }
    }
}
