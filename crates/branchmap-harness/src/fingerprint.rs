#![forbid(unsafe_code)]

//! Stable structural fingerprints of conversation trees.
//!
//! Two trees with the same `(depth, branch_index, parent_id,
//! is_current_branch)` tuples in the same order share a fingerprint, whatever
//! their content text. Used to assert idempotence across extraction passes.

use branchmap_core::ConversationTree;

const FINGERPRINT_PREFIX: &str = "blake3:";

/// Fingerprint the structure of a tree.
#[must_use]
pub fn shape_fingerprint(tree: &ConversationTree) -> String {
    let mut hasher = blake3::Hasher::new();
    for (depth, branch_index, parent_id, current) in tree.shape() {
        hasher.update(&(depth as u64).to_le_bytes());
        hasher.update(&(branch_index as u64).to_le_bytes());
        match parent_id {
            Some(parent) => {
                hasher.update(&[1]);
                hasher.update(&(parent.len() as u64).to_le_bytes());
                hasher.update(parent.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        hasher.update(&[u8::from(current)]);
    }
    format!("{FINGERPRINT_PREFIX}{}", hasher.finalize().to_hex())
}

/// Fingerprint the full serialized tree, content and ids included.
#[must_use]
pub fn tree_fingerprint(tree: &ConversationTree) -> String {
    let bytes = serde_json::to_vec(tree).unwrap_or_default();
    format!("{FINGERPRINT_PREFIX}{}", blake3::hash(&bytes).to_hex())
}
