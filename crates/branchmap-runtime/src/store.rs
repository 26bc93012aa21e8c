#![forbid(unsafe_code)]

//! Per-conversation persistence.
//!
//! [`KeyValueStore`] is the string-to-string backend: [`MemoryStore`] for
//! tests and the web runner, [`JsonFileStore`] for native use. [`TreeStore`]
//! layers typed access on top of it, keyed by conversation id:
//!
//! | key | value |
//! |---|---|
//! | `tree:{id}` | versioned [`ConversationTree`] document |
//! | `geometry:{id}` | [`OverlayGeometry`] |
//! | `visible:{id}` | overlay visibility flag |
//!
//! Persistence is best effort. Loads treat missing, corrupt, or
//! version-mismatched values as a cold start; saves log failures and carry on.
//!
//! # File format
//!
//! [`JsonFileStore`] keeps every key in one JSON object. Writes go to a
//! `.json.tmp` sibling that is then renamed over the real file.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use branchmap_core::ConversationTree;
use branchmap_tree::check_invariants;
use serde::{Deserialize, Serialize};

use crate::overlay::OverlayGeometry;

/// Current tree document version.
pub const TREE_FORMAT_VERSION: u64 = 1;

/// Errors from a [`KeyValueStore`] backend.
#[derive(Debug)]
pub enum StoreError {
    /// I/O error reading or writing the backing file.
    Io(io::Error),
    /// The backing file is not a JSON object of strings.
    Json(serde_json::Error),
    /// The backend refused the write (quota, private mode, ...).
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Unavailable(_) => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// A string key-value backend.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;

    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-memory backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over stored keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over stored entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl FromIterator<(String, String)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Backend persisting all keys to one JSON file.
///
/// The file is read once on [`JsonFileStore::open`] and rewritten on every
/// change.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, json)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_owned(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[must_use]
pub fn tree_key(conversation_id: &str) -> String {
    format!("tree:{conversation_id}")
}

#[must_use]
pub fn geometry_key(conversation_id: &str) -> String {
    format!("geometry:{conversation_id}")
}

#[must_use]
pub fn visible_key(conversation_id: &str) -> String {
    format!("visible:{conversation_id}")
}

#[derive(Serialize)]
struct TreeDocumentRef<'a> {
    version: u64,
    tree: &'a ConversationTree,
}

#[derive(Deserialize)]
struct TreeDocument {
    version: u64,
    tree: ConversationTree,
}

/// Typed, failure-tolerant access to a [`KeyValueStore`].
#[derive(Debug, Clone, Default)]
pub struct TreeStore<S> {
    backend: S,
}

impl<S: KeyValueStore> TreeStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(target: "branchmap.store", key, error = %err, "store read failed");
                None
            }
        }
    }

    fn write(&mut self, key: &str, value: Result<String, serde_json::Error>) {
        let result = value
            .map_err(StoreError::from)
            .and_then(|json| self.backend.set(key, json));
        if let Err(err) = result {
            tracing::warn!(target: "branchmap.store", key, error = %err, "store write failed");
        }
    }

    /// Saved tree for a conversation.
    ///
    /// Returns `None` (a cold start) when nothing is saved, the document
    /// does not parse, its version differs, it belongs to another
    /// conversation, or it breaks a structural invariant.
    #[must_use]
    pub fn load_tree(&self, conversation_id: &str) -> Option<ConversationTree> {
        let key = tree_key(conversation_id);
        let raw = self.read(&key)?;
        let doc: TreeDocument = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::debug!(target: "branchmap.store", key = %key, error = %err, "discarding unreadable tree");
                return None;
            }
        };
        if doc.version != TREE_FORMAT_VERSION {
            tracing::debug!(
                target: "branchmap.store",
                key = %key,
                version = doc.version,
                expected = TREE_FORMAT_VERSION,
                "discarding tree with unsupported version"
            );
            return None;
        }
        if doc.tree.conversation_id != conversation_id {
            tracing::debug!(target: "branchmap.store", key = %key, "discarding tree of another conversation");
            return None;
        }
        let violations = check_invariants(&doc.tree);
        if let Some(first) = violations.first() {
            tracing::debug!(
                target: "branchmap.store",
                key = %key,
                violations = violations.len(),
                first = %first,
                "discarding inconsistent tree"
            );
            return None;
        }
        Some(doc.tree)
    }

    /// Persist a tree under its own conversation id.
    pub fn save_tree(&mut self, tree: &ConversationTree) {
        let doc = TreeDocumentRef {
            version: TREE_FORMAT_VERSION,
            tree,
        };
        self.write(&tree_key(&tree.conversation_id), serde_json::to_string(&doc));
    }

    #[must_use]
    pub fn load_geometry(&self, conversation_id: &str) -> Option<OverlayGeometry> {
        let raw = self.read(&geometry_key(conversation_id))?;
        serde_json::from_str(&raw)
            .inspect_err(|err| {
                tracing::debug!(target: "branchmap.store", error = %err, "discarding unreadable geometry");
            })
            .ok()
    }

    pub fn save_geometry(&mut self, conversation_id: &str, geometry: &OverlayGeometry) {
        self.write(&geometry_key(conversation_id), serde_json::to_string(geometry));
    }

    #[must_use]
    pub fn load_visible(&self, conversation_id: &str) -> Option<bool> {
        let raw = self.read(&visible_key(conversation_id))?;
        serde_json::from_str(&raw).ok()
    }

    pub fn save_visible(&mut self, conversation_id: &str, visible: bool) {
        self.write(&visible_key(conversation_id), serde_json::to_string(&visible));
    }

    /// Drop everything saved for a conversation.
    pub fn forget(&mut self, conversation_id: &str) {
        for key in [
            tree_key(conversation_id),
            geometry_key(conversation_id),
            visible_key(conversation_id),
        ] {
            if let Err(err) = self.backend.remove(&key) {
                tracing::warn!(target: "branchmap.store", key = %key, error = %err, "store remove failed");
            }
        }
    }
}
