#![forbid(unsafe_code)]

//! branchmap public facade crate.
//!
//! branchmap watches a chat page, reconstructs the tree of edited and
//! regenerated user turns, draws it as a small overlay, and switches the page
//! to any branch the user clicks.
//!
//! This crate re-exports the common types from the internal crates and offers
//! a prelude plus a couple of helpers for the usual file-backed setup.

use std::fmt;
use std::path::Path;

// --- Core re-exports -------------------------------------------------------

pub use branchmap_core::{
    BranchSignal, Confidence, ConversationTree, HostPage, MutationHint, NavControl, Point, Size,
    TrackerConfig, TreeNode, TreeSource, TurnKey, TurnView,
};

// --- Tree / layout / render re-exports ------------------------------------

pub use branchmap_layout::{TreeLayout, layout};
pub use branchmap_render::{NodeAction, Scene, SceneItem, render, to_svg};
pub use branchmap_tree::{FeedEvent, MessageGraph, decode_payload, extract};

// --- Runtime re-exports ----------------------------------------------------

pub use branchmap_runtime::{
    JsonFileStore, KeyValueStore, MemoryStore, NavOutcome, OverlayGeometry, PassOutcome,
    ResizeEdges, Session, TickReport,
};

#[cfg(feature = "web")]
pub use branchmap_web::{HostCommand, OverlayRunner, PageSnapshot};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for branchmap setup.
#[derive(Debug)]
pub enum Error {
    /// Configuration failed to load or validate.
    Config(branchmap_core::ConfigError),
    /// The persistent store could not be opened.
    Store(branchmap_runtime::StoreError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<branchmap_core::ConfigError> for Error {
    fn from(err: branchmap_core::ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<branchmap_runtime::StoreError> for Error {
    fn from(err: branchmap_runtime::StoreError) -> Self {
        Self::Store(err)
    }
}

/// Standard result type for branchmap APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Load and validate a tracker configuration file.
///
/// `.json` files are read as JSON, anything else as TOML.
pub fn load_config(path: impl AsRef<Path>) -> Result<TrackerConfig> {
    let path = path.as_ref();
    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => TrackerConfig::from_json_file(path)?,
        _ => TrackerConfig::from_toml_file(path)?,
    };
    Ok(config.validated()?)
}

/// Open a session that persists to a JSON file at `store_path`.
pub fn file_session<H: HostPage>(
    host: H,
    store_path: impl AsRef<Path>,
    config: TrackerConfig,
    viewport: Size,
) -> Result<Session<H, JsonFileStore>> {
    let store = JsonFileStore::open(store_path.as_ref())?;
    tracing::debug!(
        target: "branchmap.session",
        path = %store_path.as_ref().display(),
        "opened file store"
    );
    Ok(Session::new(host, store, config, viewport))
}

pub mod prelude {
    pub use crate::{
        ConversationTree, Error, HostPage, MutationHint, NodeAction, PassOutcome, Point, Result,
        Session, Size, TrackerConfig, TreeNode, TurnKey, TurnView,
    };

    pub use crate::{core, layout_engine, render_surface, runtime, tree};
}

pub use branchmap_core as core;
pub use branchmap_layout as layout_engine;
pub use branchmap_render as render_surface;
pub use branchmap_runtime as runtime;
pub use branchmap_tree as tree;
