#![forbid(unsafe_code)]

//! Conversation tree inference for branchmap.
//!
//! # Pipeline
//!
//! ```text
//! feed payload ──decode──▶ MessageGraph ─┐
//!                                        ├─ extract ─▶ Extraction ─ build ─▶ ConversationTree
//! HostPage::user_turns ──────────────────┘
//! ```
//!
//! - [`feed`] turns raw API responses (JSON or server-sent events) into
//!   [`FeedEvent`]s.
//! - [`graph`] observes user turns in a message-mapping graph.
//! - [`dom`] observes rendered user turns, using [`branch`] to read each
//!   turn's branch indicator or controls.
//! - [`extract`] picks the mode for one pass.
//! - [`builder`] produces the tree, falling back to a linear chain on
//!   inconsistent input.
//! - [`validate`] checks the structural invariants of a built tree.

pub mod branch;
pub mod builder;
pub mod dom;
pub mod extract;
pub mod feed;
pub mod graph;
pub mod validate;

pub use branch::{BranchSlot, MAX_BRANCHES, detect, parse_indicator, slots};
pub use builder::{
    append_incremental, build, build_from_graph, build_from_observations, build_linear,
    dom_node_id,
};
pub use dom::observe_dom;
pub use extract::{Extraction, extract};
pub use feed::{FeedEvent, PayloadError, decode_payload, is_conversation_url};
pub use graph::{GraphMessage, GraphObservation, MessageGraph, observe_graph};
pub use validate::{InvariantViolation, check_invariants};
