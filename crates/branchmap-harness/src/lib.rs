#![forbid(unsafe_code)]

//! Test harness for branchmap.
//!
//! - [`fake_page`]: an in-memory [`HostPage`](branchmap_core::HostPage) with
//!   scriptable branches, click latency, and an activation log.
//! - [`fixtures`]: JSON payload builders for graphs, messages, and event
//!   streams.
//! - [`fingerprint`]: blake3 fingerprints for idempotence checks.

pub mod fake_page;
pub mod fingerprint;
pub mod fixtures;

pub use fake_page::{Activation, FakePage, FakeTurn};
pub use fingerprint::{shape_fingerprint, tree_fingerprint};
pub use fixtures::{GraphFixture, edited_graph, linear_graph, message_body, sse_body, user_only_chain};
