#![forbid(unsafe_code)]

//! Core types for branchmap.
//!
//! This crate owns the vocabulary every other branchmap crate speaks:
//!
//! - [`model`]: turn observations, branch signals, tree nodes and the
//!   [`ConversationTree`] snapshot that is persisted and rendered.
//! - [`host`]: the [`HostPage`] contract a chat page must satisfy so the
//!   tracker can read user turns and drive branch navigation.
//! - [`geometry`]: floating point canvas primitives shared by layout and render.
//! - [`config`]: [`TrackerConfig`], the tunables of the whole stack, loadable
//!   from TOML or JSON.
//!
//! # Role in branchmap
//! `branchmap-core` has no behavior of its own beyond validation helpers.
//! Extraction and tree building live in `branchmap-tree`, positioning in
//! `branchmap-layout`, and the event loop in `branchmap-runtime`.

pub mod config;
pub mod geometry;
pub mod host;
pub mod model;

pub use config::{
    ConfigError, LayoutConfig, NavigatorConfig, OverlayConfig, ScheduleConfig, TrackerConfig,
};
pub use geometry::{Point, Size};
pub use host::{
    ControlState, HostPage, MutationHint, NavControl, TurnKey, TurnView,
    conversation_id_from_path,
};
pub use model::{
    BranchSignal, CONTENT_PREVIEW_CHARS, Confidence, ConversationTree, NodeContent, TreeNode,
    TreeSource, TurnObservation, content_preview,
};
