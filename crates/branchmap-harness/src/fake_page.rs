#![forbid(unsafe_code)]

//! A scriptable in-memory chat page.
//!
//! [`FakePage`] implements [`HostPage`] over a list of [`FakeTurn`]s. Each
//! turn owns the text of all its branch variants and renders the current one,
//! with an optional `k/n` indicator and previous/next controls.
//!
//! Clicks can be delayed: with a latency of `n`, an activation takes effect
//! on the `n`th call to [`FakePage::advance`], which models the host's own
//! asynchronous re-render.

use branchmap_core::{ControlState, HostPage, NavControl, TurnKey, TurnView};

/// One user turn of the fake page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeTurn {
    pub key: Option<TurnKey>,
    /// Text of every branch variant.
    pub branches: Vec<String>,
    pub current: usize,
    pub show_indicator: bool,
    pub show_controls: bool,
}

impl FakeTurn {
    /// A single-branch turn.
    #[must_use]
    pub fn single(text: &str) -> Self {
        Self {
            key: None,
            branches: vec![text.to_owned()],
            current: 0,
            show_indicator: false,
            show_controls: false,
        }
    }

    /// A branched turn showing `current`, with indicator and controls.
    #[must_use]
    pub fn branched(texts: &[&str], current: usize) -> Self {
        Self {
            key: None,
            branches: texts.iter().map(|t| (*t).to_owned()).collect(),
            current: current.min(texts.len().saturating_sub(1)),
            show_indicator: true,
            show_controls: true,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(TurnKey::new(key));
        self
    }

    /// Hide the `k/n` indicator so only control state is visible.
    #[must_use]
    pub fn without_indicator(mut self) -> Self {
        self.show_indicator = false;
        self
    }

    fn view(&self) -> TurnView {
        let total = self.branches.len();
        let mut view = TurnView::new(self.branches.get(self.current).cloned().unwrap_or_default());
        view.turn_key = self.key.clone();
        if total > 1 && self.show_indicator {
            view.indicator_text = Some(format!("{}/{}", self.current + 1, total));
        }
        if total > 1 && self.show_controls {
            view.previous = Some(ControlState {
                enabled: self.current > 0,
            });
            view.next = Some(ControlState {
                enabled: self.current + 1 < total,
            });
        }
        view
    }

    fn step(&mut self, control: NavControl) {
        match control {
            NavControl::Previous => self.current = self.current.saturating_sub(1),
            NavControl::Next => {
                if self.current + 1 < self.branches.len() {
                    self.current += 1;
                }
            }
        }
    }
}

/// A recorded activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub turn: TurnKey,
    pub control: NavControl,
    /// Value of [`FakePage::advances`] when the click was issued.
    pub at_advance: u64,
}

#[derive(Debug, Clone)]
struct PendingClick {
    turn_index: usize,
    control: NavControl,
    remaining: u32,
}

/// In-memory [`HostPage`].
#[derive(Debug, Clone)]
pub struct FakePage {
    pub turns: Vec<FakeTurn>,
    pub streaming: bool,
    pub path: String,
    pub chrome_mounted: bool,
    latency: u32,
    pending: Vec<PendingClick>,
    activations: Vec<Activation>,
    scrolls: Vec<usize>,
    mounts: usize,
    advances: u64,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FakePage {
    #[must_use]
    pub fn new(turns: Vec<FakeTurn>) -> Self {
        Self {
            turns,
            streaming: false,
            path: "/c/fake-conversation".to_owned(),
            chrome_mounted: true,
            latency: 0,
            pending: Vec::new(),
            activations: Vec::new(),
            scrolls: Vec::new(),
            mounts: 0,
            advances: 0,
        }
    }

    /// Delay click effects by `advances` calls to [`FakePage::advance`].
    #[must_use]
    pub fn with_latency(mut self, advances: u32) -> Self {
        self.latency = advances;
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_owned();
        self
    }

    /// Let host time pass: apply clicks whose latency has elapsed.
    pub fn advance(&mut self) {
        self.advances += 1;
        let mut due = Vec::new();
        self.pending.retain_mut(|click| {
            click.remaining = click.remaining.saturating_sub(1);
            if click.remaining == 0 {
                due.push((click.turn_index, click.control));
                false
            } else {
                true
            }
        });
        for (index, control) in due {
            if let Some(turn) = self.turns.get_mut(index) {
                turn.step(control);
            }
        }
    }

    /// Number of [`FakePage::advance`] calls so far.
    #[must_use]
    pub const fn advances(&self) -> u64 {
        self.advances
    }

    #[must_use]
    pub fn activations(&self) -> &[Activation] {
        &self.activations
    }

    #[must_use]
    pub fn scrolls(&self) -> &[usize] {
        &self.scrolls
    }

    /// Times the overlay chrome was mounted again.
    #[must_use]
    pub const fn mounts(&self) -> usize {
        self.mounts
    }

    /// Drop every turn key, as when the host re-renders with fresh elements.
    pub fn forget_keys(&mut self) {
        for turn in &mut self.turns {
            turn.key = None;
        }
    }

    /// Append a single-branch user turn.
    pub fn push_turn(&mut self, turn: FakeTurn) {
        self.turns.push(turn);
    }

    fn find(&self, key: &TurnKey) -> Option<usize> {
        self.turns.iter().position(|t| t.key.as_ref() == Some(key))
    }
}

impl HostPage for FakePage {
    fn user_turns(&self) -> Vec<TurnView> {
        self.turns.iter().map(FakeTurn::view).collect()
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn activate(&mut self, turn: &TurnKey, control: NavControl) -> bool {
        let Some(index) = self.find(turn) else {
            return false;
        };
        let enabled = self.turns[index]
            .view()
            .control(control)
            .is_some_and(|c| c.enabled);
        if !enabled {
            return false;
        }
        self.activations.push(Activation {
            turn: turn.clone(),
            control,
            at_advance: self.advances,
        });
        if self.latency == 0 {
            self.turns[index].step(control);
        } else {
            self.pending.push(PendingClick {
                turn_index: index,
                control,
                remaining: self.latency,
            });
        }
        tracing::trace!(target: "branchmap.harness", turn = %turn, %control, "fake activation");
        true
    }

    fn scroll_into_view(&mut self, depth: usize) -> bool {
        if self.turns.is_empty() {
            return false;
        }
        self.scrolls.push(depth.min(self.turns.len() - 1));
        true
    }

    fn location_path(&self) -> String {
        self.path.clone()
    }

    fn chrome_mounted(&self) -> bool {
        self.chrome_mounted
    }

    fn mount_chrome(&mut self) {
        self.chrome_mounted = true;
        self.mounts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn branched_turn_renders_indicator_and_controls() {
        let page = FakePage::new(vec![FakeTurn::branched(&["a", "b", "c"], 1).with_key("t1")]);
        let view = &page.user_turns()[0];
        assert_eq!(view.text, "b");
        assert_eq!(view.indicator_text.as_deref(), Some("2/3"));
        assert_eq!(view.previous, Some(ControlState::enabled()));
        assert_eq!(view.next, Some(ControlState::enabled()));
    }

    #[test]
    fn latency_delays_click_effect() {
        let mut page =
            FakePage::new(vec![FakeTurn::branched(&["a", "b"], 0).with_key("t1")]).with_latency(2);
        assert!(page.activate(&TurnKey::new("t1"), NavControl::Next));
        page.advance();
        assert_eq!(page.turns[0].current, 0);
        page.advance();
        assert_eq!(page.turns[0].current, 1);
        assert_eq!(page.activations().len(), 1);
    }

    #[test]
    fn disabled_or_unknown_controls_are_not_clicked() {
        let mut page = FakePage::new(vec![FakeTurn::branched(&["a", "b"], 0).with_key("t1")]);
        assert!(!page.activate(&TurnKey::new("t1"), NavControl::Previous));
        assert!(!page.activate(&TurnKey::new("missing"), NavControl::Next));
        assert!(page.activations().is_empty());
    }

    #[test]
    fn scroll_clamps_to_last_turn() {
        let mut page = FakePage::new(vec![FakeTurn::single("a"), FakeTurn::single("b")]);
        assert!(page.scroll_into_view(7));
        assert_eq!(page.scrolls(), &[1]);
        assert!(!FakePage::default().scroll_into_view(0));
    }
}
