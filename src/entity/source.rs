//! Entity sources: a single file, a filename-pattern scan, or a live stream
//! of raw fragments.

use crate::entity::model::Entity;
use crate::error::{Result, SpeechError};
use futures_util::{Stream, StreamExt, future};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Marker an entity file name must contain to be picked up by a pattern scan.
pub const ENTITY_MARKER: &str = ".lds";

/// Extension of structured entity files.
pub const ENTITY_EXTENSION: &str = "json";

/// Produces entities from files or fragment streams.
pub struct EntitySource;

impl EntitySource {
    /// Reads one entity file.
    ///
    /// `.json` files are parsed as entities; any other file is spoken as
    /// plain text. Missing files fail with [`SpeechError::EntityNotFound`].
    pub fn from_file(path: &Path) -> Result<Entity> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SpeechError::EntityNotFound {
                    path: path.display().to_string(),
                }
            } else {
                SpeechError::Io(e)
            }
        })?;

        if has_json_extension(path) {
            let value = serde_json::from_str(&contents).map_err(|e| SpeechError::EntityParse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            Ok(Entity::from_value(value))
        } else {
            Ok(Entity::plain_text(contents.trim()))
        }
    }

    /// Scans a glob pattern for entity files.
    ///
    /// Only `*.json` files whose name contains `.lds` are kept; everything
    /// else is skipped silently. Matches are sorted by path, and each file is
    /// read only when the iterator reaches it.
    pub fn from_pattern(pattern: &str) -> Result<PatternEntities> {
        let matches = glob::glob(pattern).map_err(|e| SpeechError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        let mut paths: Vec<PathBuf> = matches
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!(error = %e, "skipping unreadable pattern match");
                    None
                }
            })
            .filter(|path| path.is_file() && is_entity_file(path))
            .collect();
        paths.sort();

        debug!(pattern, files = paths.len(), "entity pattern scanned");
        Ok(PatternEntities {
            paths: paths.into_iter(),
        })
    }

    /// Turns a live stream of raw fragments into entities.
    ///
    /// Fragments that fail to parse are recovered as plain-text entities;
    /// whitespace-only fragments are dropped. A bad fragment never ends the
    /// stream.
    pub fn from_fragments<S>(fragments: S) -> impl Stream<Item = Entity>
    where
        S: Stream<Item = String>,
    {
        fragments.filter_map(|fragment| future::ready(parse_fragment(&fragment)))
    }

    /// Synchronous counterpart of [`EntitySource::from_fragments`].
    pub fn from_fragment_iter<I>(fragments: I) -> impl Iterator<Item = Entity>
    where
        I: IntoIterator<Item = String>,
    {
        fragments
            .into_iter()
            .filter_map(|fragment| parse_fragment(&fragment))
    }
}

fn parse_fragment(fragment: &str) -> Option<Entity> {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        None
    } else {
        Some(Entity::from_fragment(fragment))
    }
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ENTITY_EXTENSION))
}

/// Returns true for `*.json` files whose name contains `.lds`.
pub fn is_entity_file(path: &Path) -> bool {
    has_json_extension(path)
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.contains(ENTITY_MARKER))
}

/// Lazily reads the files matched by [`EntitySource::from_pattern`].
#[derive(Debug)]
pub struct PatternEntities {
    paths: std::vec::IntoIter<PathBuf>,
}

impl PatternEntities {
    /// Paths that have not been read yet.
    pub fn remaining(&self) -> &[PathBuf] {
        self.paths.as_slice()
    }
}

impl Iterator for PatternEntities {
    type Item = Result<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        self.paths.next().map(|path| EntitySource::from_file(&path))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.paths.size_hint()
    }
}
