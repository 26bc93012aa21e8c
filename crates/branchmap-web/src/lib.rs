#![forbid(unsafe_code)]

//! `branchmap-web` drives a branchmap [`Session`](branchmap_runtime::Session)
//! from an embedding environment that owns the real document.
//!
//! Design goals:
//! - **Host-driven I/O**: the embedder pushes page snapshots, mutation hints,
//!   network responses, and pointer input.
//! - **Deterministic time**: the embedder advances a monotonic clock explicitly.
//! - **No blocking / no threads**: suitable for `wasm32-unknown-unknown`.
//!
//! Interactions the tracker wants performed on the page (activating a branch
//! control, scrolling a turn into view, remounting the overlay) are queued as
//! [`HostCommand`]s for the embedder to drain and carry out.
//!
//! This crate does not bind to `wasm-bindgen`; `branchmap-wasm` wraps
//! [`OverlayRunner`] with a JS API.

pub mod clock;
pub mod runner;
pub mod snapshot;

pub use clock::DeterministicClock;
pub use runner::{OverlayRunner, RunnerError, StepReport};
pub use snapshot::{HostCommand, PageSnapshot, SnapshotHost};
