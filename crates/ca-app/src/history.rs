//! Previously viewed substances, per session.
//!
//! Each session keeps a bounded, de-duplicated log in insertion order.
//! Recording a substance that is already present leaves the log as it
//! is; recording into a full log evicts the oldest entry.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult};

pub const DEFAULT_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLog {
    capacity: usize,
    entries: VecDeque<String>,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HistoryLog {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shrinking drops the oldest entries.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, substance: &str) -> bool {
        self.entries.iter().any(|e| e == substance.trim())
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Returns whether the substance was added.
    pub fn record(&mut self, substance: &str) -> bool {
        let substance = substance.trim();
        if substance.is_empty() || self.contains(substance) {
            return false;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(substance.to_string());
        true
    }

    /// Returns how many were added.
    pub fn record_all<I, S>(&mut self, substances: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        substances
            .into_iter()
            .filter(|s| self.record(s.as_ref()))
            .count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// History logs keyed by session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStore {
    capacity: usize,
    sessions: BTreeMap<String, HistoryLog>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HistoryStore {
    /// `capacity` applies to every session log.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sessions: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn session(&self, session: &str) -> Option<&HistoryLog> {
        self.sessions.get(session)
    }

    pub fn session_mut(&mut self, session: &str) -> &mut HistoryLog {
        let capacity = self.capacity;
        self.sessions
            .entry(session.to_string())
            .or_insert_with(|| HistoryLog::new(capacity))
    }

    pub fn sessions(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub fn record<I, S>(&mut self, session: &str, substances: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let added = self.session_mut(session).record_all(substances);
        debug!(session, added, "recorded substances");
        added
    }

    /// Entries for `session`, oldest first; empty for unknown sessions.
    pub fn entries(&self, session: &str) -> Vec<String> {
        self.session(session)
            .map(|log| log.iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Returns whether the session existed.
    pub fn clear_session(&mut self, session: &str) -> bool {
        self.sessions.remove(session).is_some()
    }

    /// Load from a JSON file; a missing file gives an empty store.
    ///
    /// Logs are re-bounded to `capacity`, so lowering the configured
    /// capacity trims stored sessions.
    pub fn load(path: &Path, capacity: usize) -> AppResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no history file, starting empty");
            return Ok(Self::new(capacity));
        }

        let content = fs::read_to_string(path).map_err(|e| AppError::HistoryFileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut store: HistoryStore = serde_json::from_str(&content)?;

        store.capacity = capacity.max(1);
        for log in store.sessions.values_mut() {
            log.set_capacity(store.capacity);
        }
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        let write_err = |e| AppError::HistoryFileWrite {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(write_err)?;
        Ok(())
    }
}
