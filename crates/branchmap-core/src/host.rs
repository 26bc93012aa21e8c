#![forbid(unsafe_code)]

//! The host page contract.
//!
//! branchmap never touches a document directly. A chat page is reached through
//! [`HostPage`], which hands out plain [`TurnView`] snapshots and accepts
//! fire-and-forget interactions. The page is treated as an untrusted,
//! eventually-consistent source: a click is issued now and its effect is
//! observed on a later read.
//!
//! Because views are snapshots there are no element references to go stale.
//! Re-resolving a turn after the host re-renders is just another call to
//! [`HostPage::user_turns`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable host identifier of a turn container (e.g. `conversation-turn-3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnKey(String);

impl TurnKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TurnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TurnKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Enabled/disabled state of a branch navigation control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub enabled: bool,
}

impl ControlState {
    #[must_use]
    pub const fn enabled() -> Self {
        Self { enabled: true }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self { enabled: false }
    }
}

/// The two branch navigation controls of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavControl {
    Previous,
    Next,
}

impl NavControl {
    /// Control that moves from `current` towards `target`.
    #[must_use]
    pub const fn toward(current: usize, target: usize) -> Self {
        if target > current {
            Self::Next
        } else {
            Self::Previous
        }
    }
}

impl fmt::Display for NavControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Previous => f.write_str("previous"),
            Self::Next => f.write_str("next"),
        }
    }
}

/// Snapshot of one user turn as rendered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnView {
    #[serde(default)]
    pub turn_key: Option<TurnKey>,
    #[serde(default)]
    pub text: String,
    /// Raw text of the branch indicator element, e.g. `"2/3"`.
    #[serde(default)]
    pub indicator_text: Option<String>,
    #[serde(default)]
    pub previous: Option<ControlState>,
    #[serde(default)]
    pub next: Option<ControlState>,
}

impl TurnView {
    /// A turn with text and no branch chrome.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<TurnKey>) -> Self {
        self.turn_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_indicator(mut self, indicator: impl Into<String>) -> Self {
        self.indicator_text = Some(indicator.into());
        self
    }

    #[must_use]
    pub fn with_controls(
        mut self,
        previous: Option<ControlState>,
        next: Option<ControlState>,
    ) -> Self {
        self.previous = previous;
        self.next = next;
        self
    }

    /// State of one navigation control, if the host renders it.
    #[must_use]
    pub const fn control(&self, control: NavControl) -> Option<ControlState> {
        match control {
            NavControl::Previous => self.previous,
            NavControl::Next => self.next,
        }
    }

    /// True when at least one navigation control is present.
    #[must_use]
    pub const fn has_controls(&self) -> bool {
        self.previous.is_some() || self.next.is_some()
    }
}

/// Coarse classification of a host document mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationHint {
    /// A subtree containing a user turn was inserted.
    UserTurnAdded,
    /// A subtree containing a branch indicator was inserted.
    IndicatorAdded,
    /// A previous/next control changed its disabled state.
    NavControlToggled,
    /// Anything else.
    Other,
}

impl MutationHint {
    /// Whether this mutation can change the conversation tree.
    #[must_use]
    pub const fn is_relevant(self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// A chat page the tracker can observe and drive.
pub trait HostPage {
    /// All user turns in document order.
    fn user_turns(&self) -> Vec<TurnView>;

    /// True while the host is streaming a response.
    fn is_streaming(&self) -> bool;

    /// Activate the previous/next control of a turn.
    ///
    /// Returns `false` when the turn or control could not be found. A `true`
    /// return only means the interaction was issued.
    fn activate(&mut self, turn: &TurnKey, control: NavControl) -> bool;

    /// Scroll the user turn at `depth` into view.
    fn scroll_into_view(&mut self, depth: usize) -> bool;

    /// Path component of the current page location.
    fn location_path(&self) -> String;

    /// Number of user turns currently rendered.
    fn user_turn_count(&self) -> usize {
        self.user_turns().len()
    }

    /// True while the overlay and its toggle are still mounted in the document.
    fn chrome_mounted(&self) -> bool {
        true
    }

    /// Mount the overlay and toggle again after the host removed them.
    fn mount_chrome(&mut self) {}
}

/// Conversation identifier from a location path: its last non-empty segment,
/// or `"default"`.
#[must_use]
pub fn conversation_id_from_path(path: &str) -> String {
    path.split('/')
        .rev()
        .find(|segment| !segment.is_empty())
        .unwrap_or("default")
        .to_owned()
}
