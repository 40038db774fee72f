//! Conflict-resolving entry queue.
//!
//! Entries keep insertion order, which is also their order on disk. Each
//! entry is keyed by its normalized archive path (lower-cased unless
//! conflicts are case sensitive) and no two live entries share a key.

use crate::path::{dedup_key, rename_candidate};
use crate::source::FileSource;
use derive_more::Display;
use std::collections::HashMap;
use zipstream_config::ConflictStrategy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueOptions {
    pub strategy: ConflictStrategy,
    pub case_insensitive: bool,
    pub ascii: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            strategy: ConflictStrategy::Skip,
            case_insensitive: true,
            ascii: true,
        }
    }
}

/// What [`ArchiveQueue::add`] did with a source.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum Insertion {
    #[display("inserted {_0}")]
    Inserted(String),
    #[display("replaced {_0}")]
    Replaced(String),
    #[display("renamed {from} to {to}")]
    Renamed { from: String, to: String },
    #[display("skipped {_0}")]
    Skipped(String),
}

impl Insertion {
    /// Final in-archive path, if the source made it into the queue.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Inserted(path) | Self::Replaced(path) => Some(path),
            Self::Renamed { to, .. } => Some(to),
            Self::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ArchiveQueue {
    options: QueueOptions,
    entries: Vec<FileSource>,
    index: HashMap<String, usize>,
}

impl ArchiveQueue {
    pub fn new(options: QueueOptions) -> Self {
        Self {
            options,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn options(&self) -> QueueOptions {
        self.options
    }

    fn key(&self, path: &str) -> String {
        dedup_key(path, self.options.case_insensitive)
    }

    pub fn add(&mut self, mut source: FileSource) -> Insertion {
        let path = source.archive_path(self.options.ascii);
        let key = self.key(&path);
        let insertion = match (self.index.get(&key).copied(), self.options.strategy) {
            (None, _) => {
                self.push(key, source);
                Insertion::Inserted(path)
            },
            (Some(existing), ConflictStrategy::Replace) => {
                self.entries[existing] = source;
                Insertion::Replaced(path)
            },
            (Some(_), ConflictStrategy::Skip) => Insertion::Skipped(path),
            (Some(_), ConflictStrategy::Rename) => {
                let (candidate, candidate_key) = (1..)
                    .map(|n| rename_candidate(&path, n))
                    .map(|candidate| {
                        let key = self.key(&candidate);
                        (candidate, key)
                    })
                    .find(|(_, key)| !self.index.contains_key(key))
                    // The iterator is unbounded and the index finite.
                    .unwrap_or_default();
                source.set_archive_path(candidate.clone());
                self.push(candidate_key, source);
                Insertion::Renamed { from: path, to: candidate }
            },
        };
        tracing::debug!(%insertion, strategy = %self.options.strategy, "queued entry");
        insertion
    }

    fn push(&mut self, key: String, source: FileSource) {
        self.index.insert(key, self.entries.len());
        self.entries.push(source);
    }

    pub fn contains(&self, path: &str) -> bool {
        let path = crate::path::normalize(path, self.options.ascii);
        self.index.contains_key(&self.key(&path))
    }

    pub fn remove(&mut self, path: &str) -> Option<FileSource> {
        let path = crate::path::normalize(path, self.options.ascii);
        let position = self.index.remove(&self.key(&path))?;
        let removed = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Change the path policy and re-key every entry in order, resolving any
    /// conflicts the new policy introduces.
    pub fn set_options(&mut self, options: QueueOptions) {
        if options == self.options {
            return;
        }
        self.options = options;
        self.index.clear();
        for source in std::mem::take(&mut self.entries) {
            self.add(source);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileSource> {
        self.entries.iter()
    }

    pub(crate) fn as_slice(&self) -> &[FileSource] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a ArchiveQueue {
    type Item = &'a FileSource;
    type IntoIter = std::slice::Iter<'a, FileSource>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
