#![forbid(unsafe_code)]

//! Session runtime for branchmap.
//!
//! # Role in branchmap
//! `branchmap-runtime` wires the pure pieces together around a live host
//! page. [`Session`] is the composition root; one exists per tracked page.
//!
//! - [`schedule`]: [`ChangeSource`] notifications, the [`Debouncer`] that
//!   turns them into extraction passes, and the session [`Timers`].
//! - [`navigator`]: the poll-and-click [`Navigator`] that moves the host to
//!   another branch.
//! - [`overlay`]: overlay window geometry with drag and resize clamping.
//! - [`store`]: per-conversation persistence over a [`KeyValueStore`].
//!
//! Time is passed in explicitly as offsets from an arbitrary origin, so a
//! session can be driven step by step in tests.

pub mod navigator;
pub mod overlay;
pub mod schedule;
pub mod session;
pub mod store;

pub use navigator::{NavOutcome, NavState, NavigationRequest, Navigator};
pub use overlay::{OverlayGeometry, ResizeEdges};
pub use schedule::{ChangeSource, Deadline, Debouncer, Interval, Timers};
pub use session::{PassOutcome, Session, SessionStats, TickReport};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError, TreeStore};
