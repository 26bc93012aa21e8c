#![forbid(unsafe_code)]

//! Branch navigation by polling and clicking.
//!
//! The host only offers previous/next controls that move one branch per
//! click, and re-renders asynchronously. [`Navigator`] drives it towards a
//! target branch with a fixed-interval poll loop:
//!
//! ```text
//! Idle ──request──▶ Polling ──indicator == target──▶ Reached
//!                      │
//!                      └──tick budget spent──▶ Aborted
//! ```
//!
//! Each tick re-resolves the turn from a fresh host read (by turn key, then
//! by depth), reads its `k/n` indicator, and clicks at most once. After a
//! click the navigator waits until the indicator moves (or a few ticks pass)
//! before clicking again, so host latency cannot cause overshoot.
//!
//! Turns with controls but no indicator are stepped by counting clicks. The
//! navigator only ever clicks towards the target and reports it reached once
//! the count gets there and the last click has had time to settle.
//!
//! The navigator is single-slot: a new request supersedes the one in flight.

use std::time::Duration;

use branchmap_core::{HostPage, NavControl, NavigatorConfig, TurnKey, TurnView};
use branchmap_render::NodeAction;
use branchmap_tree::parse_indicator;

/// Ticks to wait for a click to show up in the indicator before clicking
/// again.
pub const CLICK_SETTLE_TICKS: u32 = 3;

/// A request to show `target_branch` at one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub turn_key: TurnKey,
    /// User-turn depth, used when the key no longer resolves.
    pub depth: usize,
    pub target_branch: usize,
    /// Branch the tree believed current when the request was made.
    pub known_current: usize,
}

impl NavigationRequest {
    /// The request behind a [`NodeAction::Navigate`].
    #[must_use]
    pub fn from_action(action: &NodeAction) -> Option<Self> {
        match action {
            NodeAction::Navigate {
                turn_key,
                depth,
                target_branch,
                known_current,
            } => Some(Self {
                turn_key: turn_key.clone(),
                depth: *depth,
                target_branch: *target_branch,
                known_current: *known_current,
            }),
            NodeAction::ScrollTo { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AwaitingClick {
    /// Indicator value when the click was issued.
    observed: Option<usize>,
    waited: u32,
}

/// An in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flight {
    pub request: NavigationRequest,
    pub ticks: u32,
    pub clicks: u32,
    /// Last branch seen (or assumed after a click when no indicator exists).
    last_known: usize,
    awaiting: Option<AwaitingClick>,
}

/// Navigator state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NavState {
    #[default]
    Idle,
    Polling(Flight),
    Reached {
        request: NavigationRequest,
        ticks: u32,
        clicks: u32,
    },
    Aborted {
        request: NavigationRequest,
        ticks: u32,
        clicks: u32,
    },
}

/// Result of one [`Navigator::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// No request in flight.
    Idle,
    /// Still polling.
    Pending,
    /// The host shows the target branch.
    Reached {
        request: NavigationRequest,
        ticks: u32,
        clicks: u32,
    },
    /// The tick budget ran out.
    Aborted {
        request: NavigationRequest,
        ticks: u32,
        clicks: u32,
    },
    /// A newer request replaced this one.
    Superseded(NavigationRequest),
}

/// Single-slot navigation state machine.
#[derive(Debug, Clone)]
pub struct Navigator {
    config: NavigatorConfig,
    state: NavState,
    next_tick: Option<Duration>,
}

impl Navigator {
    #[must_use]
    pub fn new(config: NavigatorConfig) -> Self {
        Self {
            config,
            state: NavState::Idle,
            next_tick: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &NavState {
        &self.state
    }

    #[must_use]
    pub const fn is_polling(&self) -> bool {
        matches!(self.state, NavState::Polling(_))
    }

    /// When the next poll tick is due.
    #[must_use]
    pub const fn next_tick(&self) -> Option<Duration> {
        self.next_tick
    }

    /// Start a request. The first tick is due at `now`.
    ///
    /// Returns [`NavOutcome::Superseded`] carrying the replaced request when
    /// one was in flight.
    pub fn request(&mut self, request: NavigationRequest, now: Duration) -> Option<NavOutcome> {
        tracing::debug!(
            target: "branchmap.navigator",
            turn = %request.turn_key,
            depth = request.depth,
            from = request.known_current,
            to = request.target_branch,
            "navigation requested"
        );
        let flight = Flight {
            last_known: request.known_current,
            request,
            ticks: 0,
            clicks: 0,
            awaiting: None,
        };
        let previous = std::mem::replace(&mut self.state, NavState::Polling(flight));
        self.next_tick = Some(now);
        match previous {
            NavState::Polling(old) => {
                tracing::debug!(target: "branchmap.navigator", turn = %old.request.turn_key, "superseding in-flight navigation");
                Some(NavOutcome::Superseded(old.request))
            }
            _ => None,
        }
    }

    /// Drop the in-flight request, if any.
    pub fn cancel(&mut self) -> Option<NavigationRequest> {
        self.next_tick = None;
        match std::mem::take(&mut self.state) {
            NavState::Polling(flight) => Some(flight.request),
            _ => None,
        }
    }

    /// Run one poll tick if it is due at `now`.
    pub fn tick<H: HostPage + ?Sized>(&mut self, host: &mut H, now: Duration) -> NavOutcome {
        match self.next_tick {
            Some(due) if due <= now => {}
            Some(_) => return NavOutcome::Pending,
            None => return NavOutcome::Idle,
        }
        let NavState::Polling(flight) = &mut self.state else {
            self.next_tick = None;
            return NavOutcome::Idle;
        };
        let _span = tracing::debug_span!(
            target: "branchmap.navigator",
            "navigate",
            depth = flight.request.depth,
            branch = flight.request.target_branch,
        )
        .entered();

        flight.ticks += 1;
        if flight.ticks > self.config.max_ticks {
            tracing::warn!(
                target: "branchmap.navigator",
                turn = %flight.request.turn_key,
                ticks = flight.ticks - 1,
                clicks = flight.clicks,
                "navigation aborted: target branch not reached"
            );
            let outcome = NavOutcome::Aborted {
                request: flight.request.clone(),
                ticks: flight.ticks - 1,
                clicks: flight.clicks,
            };
            self.finish(&outcome);
            return outcome;
        }

        match poll_once(flight, host) {
            Step::Reached => {
                tracing::debug!(
                    target: "branchmap.navigator",
                    ticks = flight.ticks,
                    clicks = flight.clicks,
                    "reached target branch"
                );
                let outcome = NavOutcome::Reached {
                    request: flight.request.clone(),
                    ticks: flight.ticks,
                    clicks: flight.clicks,
                };
                self.finish(&outcome);
                outcome
            }
            Step::Continue => {
                self.next_tick = Some(now + self.config.poll_interval());
                NavOutcome::Pending
            }
        }
    }

    fn finish(&mut self, outcome: &NavOutcome) {
        self.next_tick = None;
        self.state = match outcome {
            NavOutcome::Reached {
                request,
                ticks,
                clicks,
            } => NavState::Reached {
                request: request.clone(),
                ticks: *ticks,
                clicks: *clicks,
            },
            NavOutcome::Aborted {
                request,
                ticks,
                clicks,
            } => NavState::Aborted {
                request: request.clone(),
                ticks: *ticks,
                clicks: *clicks,
            },
            _ => NavState::Idle,
        };
    }
}

enum Step {
    Reached,
    Continue,
}

fn resolve<'a>(views: &'a [TurnView], request: &NavigationRequest) -> Option<&'a TurnView> {
    views
        .iter()
        .find(|v| v.turn_key.as_ref() == Some(&request.turn_key))
        .or_else(|| views.get(request.depth))
}

fn poll_once<H: HostPage + ?Sized>(flight: &mut Flight, host: &mut H) -> Step {
    let views = host.user_turns();
    let Some(view) = resolve(&views, &flight.request) else {
        tracing::trace!(target: "branchmap.navigator", "turn not rendered yet");
        return Step::Continue;
    };
    let observed = view
        .indicator_text
        .as_deref()
        .and_then(parse_indicator)
        .map(|(k, _)| k - 1);
    let target = flight.request.target_branch;
    if observed == Some(target) {
        return Step::Reached;
    }
    if let Some(seen) = observed {
        flight.last_known = seen;
    }

    if let Some(awaiting) = &mut flight.awaiting {
        if observed == awaiting.observed && awaiting.waited < CLICK_SETTLE_TICKS {
            awaiting.waited += 1;
            return Step::Continue;
        }
        flight.awaiting = None;
    }

    // Without an indicator the assumed position is all there is; once it
    // says target, any further click would step away from it.
    if observed.is_none() && flight.last_known == target {
        return Step::Reached;
    }

    let control = NavControl::toward(flight.last_known, target);
    if !view.control(control).is_some_and(|c| c.enabled) {
        tracing::trace!(target: "branchmap.navigator", %control, "control missing or disabled");
        return Step::Continue;
    }
    let key = view
        .turn_key
        .clone()
        .unwrap_or_else(|| flight.request.turn_key.clone());
    if host.activate(&key, control) {
        flight.clicks += 1;
        flight.awaiting = Some(AwaitingClick {
            observed,
            waited: 0,
        });
        if observed.is_none() {
            flight.last_known = match control {
                NavControl::Next => flight.last_known + 1,
                NavControl::Previous => flight.last_known.saturating_sub(1),
            };
        }
        tracing::trace!(target: "branchmap.navigator", %control, clicks = flight.clicks, "clicked");
    }
    Step::Continue
}
