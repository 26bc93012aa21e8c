#![forbid(unsafe_code)]

//! A [`HostPage`] fed by snapshots the embedder pushes.
//!
//! The embedder serializes the user turns it can see into a [`PageSnapshot`]
//! whenever the document changes. Interactions are not performed here; they
//! are queued as [`HostCommand`]s and their effect shows up in a later
//! snapshot, the same way a real page answers a click some time after it.

use branchmap_core::{HostPage, NavControl, TurnKey, TurnView};
use serde::{Deserialize, Serialize};

/// Everything the tracker reads from the page at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSnapshot {
    pub turns: Vec<TurnView>,
    pub streaming: bool,
    pub path: String,
    pub chrome_mounted: bool,
}

impl Default for PageSnapshot {
    fn default() -> Self {
        Self {
            turns: Vec::new(),
            streaming: false,
            path: "/".to_owned(),
            chrome_mounted: true,
        }
    }
}

impl PageSnapshot {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// An interaction the embedder should perform on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostCommand {
    /// Click the previous/next control of a turn.
    Activate { turn: TurnKey, control: NavControl },
    /// Scroll the user turn at `depth` into view.
    ScrollTo { depth: usize },
    /// Attach the overlay and its toggle to the document again.
    MountChrome,
}

/// [`HostPage`] backed by the latest pushed [`PageSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotHost {
    snapshot: PageSnapshot,
    outbox: Vec<HostCommand>,
}

impl SnapshotHost {
    #[must_use]
    pub fn new(snapshot: PageSnapshot) -> Self {
        Self {
            snapshot,
            outbox: Vec::new(),
        }
    }

    /// Replace the page state with a fresh snapshot.
    pub fn push(&mut self, snapshot: PageSnapshot) {
        self.snapshot = snapshot;
    }

    #[must_use]
    pub fn snapshot(&self) -> &PageSnapshot {
        &self.snapshot
    }

    /// Commands queued since the last drain, oldest first.
    #[must_use]
    pub fn pending(&self) -> &[HostCommand] {
        &self.outbox
    }

    /// Take all queued commands.
    pub fn drain(&mut self) -> Vec<HostCommand> {
        std::mem::take(&mut self.outbox)
    }

    fn turn(&self, key: &TurnKey) -> Option<&TurnView> {
        self.snapshot
            .turns
            .iter()
            .find(|turn| turn.turn_key.as_ref() == Some(key))
    }
}

impl HostPage for SnapshotHost {
    fn user_turns(&self) -> Vec<TurnView> {
        self.snapshot.turns.clone()
    }

    fn is_streaming(&self) -> bool {
        self.snapshot.streaming
    }

    fn activate(&mut self, turn: &TurnKey, control: NavControl) -> bool {
        let available = self
            .turn(turn)
            .and_then(|view| view.control(control))
            .is_some_and(|state| state.enabled);
        if !available {
            tracing::debug!(
                target: "branchmap.web",
                turn = %turn,
                %control,
                "control not available in snapshot"
            );
            return false;
        }
        self.outbox.push(HostCommand::Activate {
            turn: turn.clone(),
            control,
        });
        true
    }

    fn scroll_into_view(&mut self, depth: usize) -> bool {
        if depth >= self.snapshot.turns.len() {
            return false;
        }
        self.outbox.push(HostCommand::ScrollTo { depth });
        true
    }

    fn location_path(&self) -> String {
        self.snapshot.path.clone()
    }

    fn user_turn_count(&self) -> usize {
        self.snapshot.turns.len()
    }

    fn chrome_mounted(&self) -> bool {
        self.snapshot.chrome_mounted
    }

    fn mount_chrome(&mut self) {
        // Optimistic until the next snapshot says otherwise.
        self.snapshot.chrome_mounted = true;
        self.outbox.push(HostCommand::MountChrome);
    }
}
