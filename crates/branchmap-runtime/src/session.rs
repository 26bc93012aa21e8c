#![forbid(unsafe_code)]

//! The tracker session.
//!
//! [`Session`] owns everything one tracked page needs: the host, the store,
//! the current tree and scene, the navigator, the scheduler, and the overlay
//! window state. The embedding (a browser runner or a test) drives it with
//! three kinds of input:
//!
//! - **time**: [`Session::tick`] with a monotonically increasing offset,
//! - **host notifications**: [`Session::notify`] for document mutations and
//!   [`Session::ingest_payload`] for observed network responses,
//! - **user input**: clicks, hover, drag, resize, and the visibility toggle.
//!
//! Nothing blocks. Host interactions are issued during a tick and their
//! effect is read on a later one.
//!
//! # Pass suppression
//!
//! An extraction pass is held back while the host streams a response and
//! while the overlay is dragged or resized. Held-back passes collapse into
//! exactly one pass after the last reason lifts. A hidden overlay still
//! extracts and persists but does not render until it is shown again.

use std::time::Duration;

use branchmap_core::{
    ConversationTree, HostPage, MutationHint, Point, Size, TrackerConfig, TreeSource,
    conversation_id_from_path,
};
use branchmap_render::{
    NodeAction, RedrawGate, Scene, Suppression, TooltipState, action_for, render,
};
use branchmap_tree::{
    FeedEvent, MessageGraph, append_incremental, build, decode_payload, extract,
    is_conversation_url,
};
use web_time::Instant;

use crate::navigator::{NavOutcome, NavigationRequest, Navigator};
use crate::overlay::{OverlayGeometry, ResizeEdges};
use crate::schedule::{ChangeSource, Debouncer, Timers};
use crate::store::{KeyValueStore, TreeStore};

/// What a pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Extracted, persisted, and drew a new scene.
    Rendered,
    /// Extracted and persisted; the overlay is hidden so nothing was drawn.
    Extracted,
    /// Held back until suppression lifts.
    Deferred,
}

/// Result of one [`Session::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub pass: Option<PassOutcome>,
    pub navigation: NavOutcome,
}

/// Running counters, mostly for tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub passes: u64,
    pub renders: u64,
    pub deferred: u64,
    pub navigations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Interaction {
    Drag {
        /// Pointer offset from the overlay origin.
        grab: Point,
    },
    Resize {
        edges: ResizeEdges,
        start: Point,
        from: OverlayGeometry,
    },
}

/// One tracked page.
pub struct Session<H, S> {
    host: H,
    store: TreeStore<S>,
    config: TrackerConfig,
    conversation_id: String,
    graph: Option<MessageGraph>,
    tree: ConversationTree,
    scene: Scene,
    scene_stale: bool,
    navigator: Navigator,
    debouncer: Debouncer,
    timers: Timers,
    gate: RedrawGate,
    tooltip: TooltipState,
    viewport: Size,
    geometry: OverlayGeometry,
    visible: bool,
    interaction: Option<Interaction>,
    last_turn_count: usize,
    pending_scroll: Option<usize>,
    stats: SessionStats,
}

impl<H: HostPage, S: KeyValueStore> Session<H, S> {
    /// Create a session for the conversation the host currently shows.
    ///
    /// A saved tree, overlay geometry, and visibility are restored from the
    /// store, and the saved tree is drawn right away.
    pub fn new(host: H, backend: S, config: TrackerConfig, viewport: Size) -> Self {
        let conversation_id = conversation_id_from_path(&host.location_path());
        let geometry = OverlayGeometry::default_for(viewport, &config.overlay);
        let mut session = Self {
            store: TreeStore::new(backend),
            navigator: Navigator::new(config.navigator.clone()),
            debouncer: Debouncer::new(config.schedule.debounce()),
            timers: Timers::new(&config.schedule),
            tooltip: TooltipState::new(config.schedule.tooltip_delay()),
            tree: ConversationTree::empty(conversation_id.clone()),
            conversation_id,
            graph: None,
            scene: Scene::default(),
            scene_stale: true,
            gate: RedrawGate::new(),
            viewport,
            geometry,
            visible: true,
            interaction: None,
            last_turn_count: 0,
            pending_scroll: None,
            stats: SessionStats::default(),
            host,
            config,
        };
        session.load_conversation();
        session
    }

    fn load_conversation(&mut self) {
        let id = self.conversation_id.clone();
        self.graph = None;
        self.tree = self
            .store
            .load_tree(&id)
            .unwrap_or_else(|| ConversationTree::empty(id.clone()));
        self.geometry = self.store.load_geometry(&id).map_or_else(
            || OverlayGeometry::default_for(self.viewport, &self.config.overlay),
            |g| g.clamped(self.viewport, &self.config.overlay),
        );
        self.visible = self.store.load_visible(&id).unwrap_or(true);
        tracing::debug!(
            target: "branchmap.session",
            conversation = %id,
            cached_nodes = self.tree.len(),
            visible = self.visible,
            "loaded conversation state"
        );
        self.draw();
    }

    /// Arm the startup delay and the background timers.
    pub fn start(&mut self, now: Duration) {
        self.timers
            .startup
            .arm(now + self.config.schedule.startup_delay());
        self.timers.poll.start(now);
        self.timers.reconcile.start(now);
        self.last_turn_count = self.host.user_turn_count();
        tracing::info!(
            target: "branchmap.session",
            conversation = %self.conversation_id,
            turns = self.last_turn_count,
            "tracking started"
        );
    }

    /// Report a host document mutation. Returns `true` if it queued a pass.
    pub fn notify(&mut self, hint: MutationHint, now: Duration) -> bool {
        if !hint.is_relevant() {
            return false;
        }
        self.debouncer.notify(ChangeSource::Mutation, now);
        true
    }

    /// Ask for a pass right away.
    pub fn refresh(&mut self, now: Duration) {
        self.debouncer.notify(ChangeSource::UserAction, now);
    }

    /// Feed an observed network response.
    ///
    /// Returns the number of events that changed tracker state. Responses
    /// from unrelated URLs are ignored without parsing.
    pub fn ingest_payload(&mut self, url: &str, body: &str, now: Duration) -> usize {
        if !is_conversation_url(url) {
            return 0;
        }
        let mut used = 0;
        for event in decode_payload(body) {
            match event {
                FeedEvent::Graph(graph) => {
                    if graph.is_empty() {
                        continue;
                    }
                    tracing::debug!(
                        target: "branchmap.session",
                        entries = graph.mapping.len(),
                        "conversation graph observed"
                    );
                    self.graph = Some(graph);
                    self.debouncer.notify(ChangeSource::Feed, now);
                    used += 1;
                }
                FeedEvent::Message(message) => {
                    if let Some(graph) = &mut self.graph {
                        if graph.absorb(message) {
                            self.debouncer.notify(ChangeSource::Feed, now);
                            used += 1;
                        }
                    } else if let Some(next) = append_incremental(&self.tree, &message) {
                        self.tree = next;
                        self.store.save_tree(&self.tree);
                        self.redraw(now);
                        used += 1;
                    }
                }
                FeedEvent::Irrelevant => {
                    self.debouncer.notify(ChangeSource::Feed, now);
                }
            }
        }
        used
    }

    /// Advance the session to `now`.
    pub fn tick(&mut self, now: Duration) -> TickReport {
        self.check_conversation(now);

        if self.timers.startup.fire(now) {
            self.debouncer.notify(ChangeSource::Startup, now);
        }
        if self.timers.poll.fire(now) {
            let count = self.host.user_turn_count();
            if count != self.last_turn_count {
                tracing::debug!(
                    target: "branchmap.session",
                    from = self.last_turn_count,
                    to = count,
                    "turn count changed"
                );
                self.last_turn_count = count;
                self.debouncer.notify(ChangeSource::Poll, now);
            }
        }
        if self.timers.reconcile.fire(now) {
            self.ensure_overlay_exists();
        }
        if self.timers.streaming.fire(now) {
            if self.host.is_streaming() {
                self.timers
                    .streaming
                    .arm(now + self.config.schedule.streaming_recheck());
            } else if self.gate.release(Suppression::STREAMING) {
                self.debouncer.notify(ChangeSource::StreamingEnded, now);
            }
        }
        if self.timers.show_refresh.fire(now) {
            self.debouncer.notify(ChangeSource::Shown, now);
        }

        let navigation = self.navigator.tick(&mut self.host, now);
        if let NavOutcome::Reached { request, .. } = &navigation {
            self.timers
                .settle
                .arm(now + self.config.navigator.settle_delay());
            self.pending_scroll = Some(request.depth);
        }
        if self.timers.settle.fire(now) {
            // The host now shows another branch; a cached graph would point
            // at the old one.
            self.graph = None;
            self.debouncer.notify(ChangeSource::NavigationComplete, now);
        }

        let pass = self.debouncer.fire(now).map(|sources| {
            let outcome = self.run_pass(now, &sources);
            if sources.contains(&ChangeSource::NavigationComplete)
                && let Some(depth) = self.pending_scroll.take()
            {
                self.host.scroll_into_view(depth);
            }
            outcome
        });

        TickReport { pass, navigation }
    }

    /// Earliest time at which [`Session::tick`] has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        [
            self.debouncer.deadline(),
            self.timers.next_deadline(),
            self.navigator.next_tick(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn check_conversation(&mut self, now: Duration) {
        let id = conversation_id_from_path(&self.host.location_path());
        if id == self.conversation_id {
            return;
        }
        tracing::info!(
            target: "branchmap.session",
            from = %self.conversation_id,
            to = %id,
            "conversation changed"
        );
        self.conversation_id = id;
        self.navigator.cancel();
        self.pending_scroll = None;
        self.interaction = None;
        self.load_conversation();
        self.debouncer.notify(ChangeSource::ConversationChanged, now);
    }

    /// Hold the pass back if anything suppresses it.
    fn held_back(&mut self, now: Duration) -> bool {
        if self.gate.is_suppressed() {
            self.gate.request();
            return true;
        }
        if self.host.is_streaming() {
            tracing::debug!(target: "branchmap.session", "host is streaming, holding pass");
            self.gate.suppress(Suppression::STREAMING);
            self.gate.request();
            self.timers
                .streaming
                .arm(now + self.config.schedule.streaming_first_check());
            return true;
        }
        false
    }

    fn run_pass(&mut self, now: Duration, sources: &[ChangeSource]) -> PassOutcome {
        if self.held_back(now) {
            self.stats.deferred += 1;
            return PassOutcome::Deferred;
        }
        let started = Instant::now();
        let _span = tracing::debug_span!(
            target: "branchmap.session",
            "pass",
            conversation = %self.conversation_id,
            sources = sources.len(),
        )
        .entered();

        let extraction = extract(self.graph.as_ref(), &self.host);
        if self.graph.is_some() && extraction.source() != TreeSource::Graph {
            tracing::debug!(target: "branchmap.session", "dropping graph the page no longer agrees with");
            self.graph = None;
        }
        let tree = build(&self.conversation_id, &extraction);
        self.last_turn_count = self.host.user_turn_count();
        let changed = tree != self.tree;
        self.tree = tree;
        self.store.save_tree(&self.tree);
        self.stats.passes += 1;
        let outcome = self.draw();

        tracing::debug!(
            target: "branchmap.session",
            source = ?self.tree.source,
            nodes = self.tree.len(),
            changed,
            elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            "pass complete"
        );
        outcome
    }

    /// Redraw the current tree without extracting.
    fn redraw(&mut self, now: Duration) -> PassOutcome {
        if self.held_back(now) {
            self.stats.deferred += 1;
            return PassOutcome::Deferred;
        }
        self.draw()
    }

    fn draw(&mut self) -> PassOutcome {
        if !self.visible {
            self.scene_stale = true;
            return PassOutcome::Extracted;
        }
        self.scene = render(&self.tree, &self.config.layout);
        self.scene_stale = false;
        self.tooltip.clear();
        self.stats.renders += 1;
        PassOutcome::Rendered
    }

    /// Handle a click at `point` in canvas coordinates.
    pub fn click(&mut self, point: Point, now: Duration) -> Option<NodeAction> {
        if !self.visible {
            return None;
        }
        let id = self.scene.hit_test(point)?.to_owned();
        self.click_node(&id, now)
    }

    /// Handle a click on node `id`.
    ///
    /// A non-current branch starts a navigation request; any other node
    /// scrolls the host to its turn.
    pub fn click_node(&mut self, id: &str, now: Duration) -> Option<NodeAction> {
        let action = action_for(&self.tree, id)?;
        match &action {
            NodeAction::Navigate { .. } => {
                if let Some(request) = NavigationRequest::from_action(&action) {
                    self.stats.navigations += 1;
                    if let Some(NavOutcome::Superseded(old)) = self.navigator.request(request, now) {
                        tracing::debug!(
                            target: "branchmap.session",
                            depth = old.depth,
                            "previous navigation superseded"
                        );
                    }
                }
            }
            NodeAction::ScrollTo { depth } => {
                if !self.host.scroll_into_view(*depth) {
                    tracing::debug!(target: "branchmap.session", depth, "no turn to scroll to");
                }
            }
        }
        Some(action)
    }

    /// Pointer moved to `point` (or left the canvas).
    pub fn hover(&mut self, point: Option<Point>, now: Duration) {
        let id = point
            .filter(|_| self.visible)
            .and_then(|p| self.scene.hit_test(p))
            .map(str::to_owned);
        self.tooltip.hover(id.as_deref(), now);
        self.tooltip.poll(now);
    }

    /// Id and text of the tooltip currently showing.
    #[must_use]
    pub fn tooltip(&self) -> Option<(&str, &str)> {
        let id = self.tooltip.visible()?;
        Some((id, self.scene.title_of(id)?))
    }

    /// Advance the tooltip delay without other work.
    pub fn poll_tooltip(&mut self, now: Duration) -> Option<&str> {
        self.tooltip.poll(now)
    }

    /// Start dragging the overlay header with the pointer at `pointer`.
    pub fn begin_drag(&mut self, pointer: Point) {
        let grab = Point::new(pointer.x - self.geometry.x, pointer.y - self.geometry.y);
        self.interaction = Some(Interaction::Drag { grab });
        self.gate.suppress(Suppression::DRAGGING);
    }

    /// Start resizing from `edges` with the pointer at `pointer`.
    pub fn begin_resize(&mut self, edges: ResizeEdges, pointer: Point) {
        self.interaction = Some(Interaction::Resize {
            edges,
            start: pointer,
            from: self.geometry,
        });
        self.gate.suppress(Suppression::RESIZING);
    }

    /// Pointer moved during a drag or resize.
    pub fn drag_to(&mut self, pointer: Point) {
        let overlay = &self.config.overlay;
        self.geometry = match self.interaction {
            Some(Interaction::Drag { grab }) => self.geometry.moved_to(
                Point::new(pointer.x - grab.x, pointer.y - grab.y),
                self.viewport,
                overlay,
            ),
            Some(Interaction::Resize { edges, start, from }) => from.resized(
                edges,
                pointer.x - start.x,
                pointer.y - start.y,
                self.viewport,
                overlay,
            ),
            None => return,
        };
    }

    pub fn end_drag(&mut self, now: Duration) {
        self.finish_interaction(Suppression::DRAGGING, now);
    }

    pub fn end_resize(&mut self, now: Duration) {
        self.finish_interaction(Suppression::RESIZING, now);
    }

    fn finish_interaction(&mut self, reason: Suppression, now: Duration) {
        if self.interaction.take().is_none() {
            return;
        }
        self.store
            .save_geometry(&self.conversation_id, &self.geometry);
        if self.gate.release(reason) {
            tracing::debug!(target: "branchmap.session", "releasing pass held during drag");
        }
        self.debouncer.notify(ChangeSource::DragReleased, now);
    }

    /// Show or hide the overlay. Returns the new visibility.
    pub fn toggle_visibility(&mut self, now: Duration) -> bool {
        self.visible = !self.visible;
        self.store.save_visible(&self.conversation_id, self.visible);
        if self.visible {
            self.timers
                .show_refresh
                .arm(now + self.config.schedule.show_refresh());
        } else {
            self.tooltip.clear();
            self.timers.show_refresh.disarm();
        }
        tracing::debug!(target: "branchmap.session", visible = self.visible, "overlay toggled");
        self.visible
    }

    /// Re-mount the overlay if the host removed it.
    ///
    /// Idempotent. Returns `true` when the chrome had to be mounted again.
    pub fn ensure_overlay_exists(&mut self) -> bool {
        if self.host.chrome_mounted() {
            return false;
        }
        tracing::info!(target: "branchmap.session", "overlay missing from host, remounting");
        self.host.mount_chrome();
        true
    }

    /// The viewport was resized.
    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.geometry = self.geometry.clamped(viewport, &self.config.overlay);
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// True when the scene lags behind the tree (the overlay was hidden).
    #[must_use]
    pub const fn scene_is_stale(&self) -> bool {
        self.scene_stale
    }

    #[must_use]
    pub fn tree(&self) -> &ConversationTree {
        &self.tree
    }

    #[must_use]
    pub fn graph(&self) -> Option<&MessageGraph> {
        self.graph.as_ref()
    }

    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    #[must_use]
    pub const fn geometry(&self) -> OverlayGeometry {
        self.geometry
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub const fn is_navigating(&self) -> bool {
        self.navigator.is_polling()
    }

    #[must_use]
    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub fn store(&self) -> &TreeStore<S> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use branchmap_harness::{FakePage, FakeTurn};
    use pretty_assertions::assert_eq;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn session(page: FakePage) -> Session<FakePage, MemoryStore> {
        Session::new(
            page,
            MemoryStore::new(),
            TrackerConfig::default(),
            Size::new(1600.0, 1000.0),
        )
    }

    #[test]
    fn startup_runs_first_pass_after_delay() {
        let mut s = session(FakePage::new(vec![FakeTurn::single("hi")]));
        assert!(s.scene().is_empty_state());
        s.start(ms(0));
        assert_eq!(s.tick(ms(1999)).pass, None);
        assert_eq!(s.tick(ms(2000)).pass, Some(PassOutcome::Rendered));
        assert_eq!(s.tree().len(), 1);
        assert_eq!(s.scene().marker_count(), 1);
    }

    #[test]
    fn irrelevant_mutations_do_not_queue() {
        let mut s = session(FakePage::default());
        assert!(!s.notify(MutationHint::Other, ms(0)));
        assert!(s.notify(MutationHint::UserTurnAdded, ms(0)));
        assert_eq!(s.tick(ms(499)).pass, None);
        assert_eq!(s.tick(ms(500)).pass, Some(PassOutcome::Rendered));
    }

    #[test]
    fn hidden_overlay_extracts_without_rendering() {
        let mut s = session(FakePage::new(vec![FakeTurn::single("hi")]));
        assert!(!s.toggle_visibility(ms(0)));
        s.refresh(ms(0));
        assert_eq!(s.tick(ms(0)).pass, Some(PassOutcome::Extracted));
        assert!(s.scene_is_stale());
        assert_eq!(s.store().load_tree(s.conversation_id()).map(|t| t.len()), Some(1));

        assert!(s.toggle_visibility(ms(10)));
        assert_eq!(s.tick(ms(50)).pass, None);
        assert_eq!(s.tick(ms(110)).pass, Some(PassOutcome::Rendered));
        assert!(!s.scene_is_stale());
        assert_eq!(s.store().load_visible(s.conversation_id()), Some(true));
    }

    #[test]
    fn missing_chrome_is_remounted_once() {
        let mut page = FakePage::default();
        page.chrome_mounted = false;
        let mut s = session(page);
        assert!(s.ensure_overlay_exists());
        assert!(!s.ensure_overlay_exists());
        assert_eq!(s.host().mounts(), 1);
    }

    #[test]
    fn reconcile_timer_remounts_chrome() {
        let mut s = session(FakePage::default());
        s.start(ms(0));
        s.host_mut().chrome_mounted = false;
        s.tick(ms(3000));
        assert_eq!(s.host().mounts(), 1);
    }

    #[test]
    fn poll_fallback_notices_new_turns() {
        let mut s = session(FakePage::new(vec![FakeTurn::single("a")]));
        s.start(ms(0));
        s.tick(ms(2000));
        s.host_mut().push_turn(FakeTurn::single("b"));
        assert_eq!(s.tick(ms(3000)).pass, None);
        assert_eq!(s.tick(ms(3500)).pass, Some(PassOutcome::Rendered));
        assert_eq!(s.tree().len(), 2);
    }

    #[test]
    fn next_deadline_tracks_earliest_work() {
        let mut s = session(FakePage::default());
        assert_eq!(s.next_deadline(), None);
        s.start(ms(0));
        assert_eq!(s.next_deadline(), Some(ms(2000)));
        s.notify(MutationHint::IndicatorAdded, ms(100));
        assert_eq!(s.next_deadline(), Some(ms(600)));
    }
}
