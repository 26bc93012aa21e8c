#![forbid(unsafe_code)]

//! Platform-independent runner wrapping `Session<SnapshotHost, MemoryStore>`.
//!
//! This module contains the logic shared between the `wasm-bindgen` exports
//! and native tests. No JS/WASM types here: everything crosses the boundary
//! as plain numbers, strings, or JSON.

use core::time::Duration;
use std::collections::BTreeMap;

use branchmap_core::{ConfigError, MutationHint, Point, Size, TrackerConfig};
use branchmap_render::{NodeAction, Scene, to_svg};
use branchmap_runtime::{
    MemoryStore, NavOutcome, OverlayGeometry, PassOutcome, ResizeEdges, Session,
};
use serde::Serialize;

use crate::clock::DeterministicClock;
use crate::snapshot::{HostCommand, PageSnapshot, SnapshotHost};

/// Runner construction or I/O error.
#[derive(Debug)]
pub enum RunnerError {
    /// Tracker configuration failed to parse or validate.
    Config(ConfigError),
    /// A page snapshot failed to parse.
    Snapshot(serde_json::Error),
    /// Saved state failed to parse or serialize.
    State(serde_json::Error),
}

impl std::fmt::Display for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config error: {e}"),
            Self::Snapshot(e) => write!(f, "invalid page snapshot: {e}"),
            Self::State(e) => write!(f, "invalid saved state: {e}"),
        }
    }
}

impl std::error::Error for RunnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Snapshot(e) | Self::State(e) => Some(e),
        }
    }
}

impl From<ConfigError> for RunnerError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Host-facing summary of one [`OverlayRunner::step`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub now_ms: f64,
    /// `rendered`, `extracted`, `deferred`, or absent when no pass ran.
    pub pass: Option<&'static str>,
    /// `idle`, `pending`, `reached`, `aborted`, or `superseded`.
    pub navigation: &'static str,
    /// Commands waiting in the outbox.
    pub commands: usize,
    /// When the runner next needs a step, if ever.
    pub next_deadline_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gesture {
    Drag,
    Resize,
}

/// Overlay runner driven entirely by the embedder.
pub struct OverlayRunner {
    session: Session<SnapshotHost, MemoryStore>,
    clock: DeterministicClock,
    gesture: Option<Gesture>,
}

impl OverlayRunner {
    /// Runner with no saved state.
    #[must_use]
    pub fn new(config: TrackerConfig, snapshot: PageSnapshot, viewport: Size) -> Self {
        Self::with_state(config, snapshot, viewport, MemoryStore::new())
    }

    /// Runner restoring trees, geometry, and visibility from `state`.
    #[must_use]
    pub fn with_state(
        config: TrackerConfig,
        snapshot: PageSnapshot,
        viewport: Size,
        state: MemoryStore,
    ) -> Self {
        Self {
            session: Session::new(SnapshotHost::new(snapshot), state, config, viewport),
            clock: DeterministicClock::new(),
            gesture: None,
        }
    }

    /// Build a runner from JSON inputs.
    ///
    /// An empty `config_json` means defaults. `state_json` is what an earlier
    /// runner returned from [`OverlayRunner::export_state_json`].
    pub fn from_json(
        config_json: &str,
        snapshot_json: &str,
        state_json: Option<&str>,
        viewport: Size,
    ) -> Result<Self, RunnerError> {
        let config = if config_json.trim().is_empty() {
            TrackerConfig::default()
        } else {
            TrackerConfig::from_json_str(config_json)?.validated()?
        };
        let snapshot = PageSnapshot::from_json(snapshot_json).map_err(RunnerError::Snapshot)?;
        let state = match state_json {
            Some(json) => serde_json::from_str::<BTreeMap<String, String>>(json)
                .map_err(RunnerError::State)?
                .into_iter()
                .collect(),
            None => MemoryStore::new(),
        };
        Ok(Self::with_state(config, snapshot, viewport, state))
    }

    /// Arm the startup delay and background timers at the current time.
    pub fn init(&mut self) {
        self.session.start(self.clock.now());
    }

    #[must_use]
    pub const fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Advance the clock. Invalid values are ignored.
    pub fn advance_time_ms(&mut self, ms: f64) {
        self.clock.advance_ms(ms);
    }

    /// Set the clock. Invalid values and moves backwards are ignored.
    pub fn set_time_ms(&mut self, ms: f64) {
        self.clock.set_ms(ms);
    }

    /// Replace the page state.
    pub fn push_snapshot(&mut self, snapshot: PageSnapshot) {
        self.session.host_mut().push(snapshot);
    }

    /// Replace the page state from JSON. Returns `false` if it did not parse.
    pub fn push_snapshot_json(&mut self, json: &str) -> bool {
        match PageSnapshot::from_json(json) {
            Ok(snapshot) => {
                self.push_snapshot(snapshot);
                true
            }
            Err(err) => {
                tracing::debug!(target: "branchmap.web", error = %err, "snapshot rejected");
                false
            }
        }
    }

    /// Report a document mutation by its snake_case hint name.
    ///
    /// Returns `true` if it queued a pass. Unknown names are ignored.
    pub fn notify_mutation(&mut self, hint: &str) -> bool {
        let Ok(hint) =
            serde_json::from_value::<MutationHint>(serde_json::Value::String(hint.to_owned()))
        else {
            return false;
        };
        self.session.notify(hint, self.clock.now())
    }

    /// Ask for a pass right away.
    pub fn refresh(&mut self) {
        self.session.refresh(self.clock.now());
    }

    /// Feed an observed network response. Returns the number of events used.
    pub fn ingest_response(&mut self, url: &str, body: &str) -> usize {
        self.session.ingest_payload(url, body, self.clock.now())
    }

    /// Run everything due at the current time.
    pub fn step(&mut self) -> StepReport {
        let now = self.clock.now();
        let report = self.session.tick(now);
        self.session.poll_tooltip(now);
        let commands = self.session.host().pending().len();
        if commands > 0 {
            tracing::trace!(target: "branchmap.web", commands, "commands queued for host");
        }
        StepReport {
            now_ms: millis(now),
            pass: report.pass.map(pass_label),
            navigation: navigation_label(&report.navigation),
            commands,
            next_deadline_ms: self.session.next_deadline().map(millis),
        }
    }

    /// Click at a canvas point.
    pub fn click(&mut self, x: f64, y: f64) -> Option<NodeAction> {
        self.session.click(Point::new(x, y), self.clock.now())
    }

    /// Click a node by id.
    pub fn click_node(&mut self, id: &str) -> Option<NodeAction> {
        self.session.click_node(id, self.clock.now())
    }

    pub fn hover(&mut self, x: f64, y: f64) {
        self.session.hover(Some(Point::new(x, y)), self.clock.now());
    }

    pub fn leave(&mut self) {
        self.session.hover(None, self.clock.now());
    }

    /// Id and text of the tooltip currently showing.
    #[must_use]
    pub fn tooltip(&self) -> Option<(&str, &str)> {
        self.session.tooltip()
    }

    /// Pointer pressed on the overlay header.
    pub fn pointer_down_header(&mut self, x: f64, y: f64) {
        self.session.begin_drag(Point::new(x, y));
        self.gesture = Some(Gesture::Drag);
    }

    /// Pointer pressed on a resize handle. `edges` holds [`ResizeEdges`] bits.
    ///
    /// Returns `false` when `edges` names no edge.
    pub fn pointer_down_edge(&mut self, edges: u8, x: f64, y: f64) -> bool {
        let edges = ResizeEdges::from_bits_truncate(edges);
        if edges.is_empty() {
            return false;
        }
        self.session.begin_resize(edges, Point::new(x, y));
        self.gesture = Some(Gesture::Resize);
        true
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if self.gesture.is_some() {
            self.session.drag_to(Point::new(x, y));
        }
    }

    pub fn pointer_up(&mut self) {
        let now = self.clock.now();
        match self.gesture.take() {
            Some(Gesture::Drag) => self.session.end_drag(now),
            Some(Gesture::Resize) => self.session.end_resize(now),
            None => {}
        }
    }

    /// Show or hide the overlay. Returns the new visibility.
    pub fn toggle(&mut self) -> bool {
        self.session.toggle_visibility(self.clock.now())
    }

    pub fn resize_viewport(&mut self, width: f64, height: f64) {
        self.session.set_viewport(Size::new(width, height));
    }

    /// Take all commands queued for the host.
    pub fn take_commands(&mut self) -> Vec<HostCommand> {
        self.session.host_mut().drain()
    }

    /// [`OverlayRunner::take_commands`] as a JSON array.
    pub fn take_commands_json(&mut self) -> Result<String, RunnerError> {
        serde_json::to_string(&self.take_commands()).map_err(RunnerError::State)
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        self.session.scene()
    }

    pub fn scene_json(&self) -> Result<String, RunnerError> {
        serde_json::to_string(self.session.scene()).map_err(RunnerError::State)
    }

    #[must_use]
    pub fn scene_svg(&self) -> String {
        to_svg(self.session.scene())
    }

    #[must_use]
    pub fn geometry(&self) -> OverlayGeometry {
        self.session.geometry()
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.session.is_visible()
    }

    /// Everything persisted so far, as a JSON object of string values.
    pub fn export_state_json(&self) -> Result<String, RunnerError> {
        let entries: BTreeMap<&str, &str> = self.session.store().backend().entries().collect();
        serde_json::to_string(&entries).map_err(RunnerError::State)
    }

    #[must_use]
    pub fn session(&self) -> &Session<SnapshotHost, MemoryStore> {
        &self.session
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

const fn pass_label(outcome: PassOutcome) -> &'static str {
    match outcome {
        PassOutcome::Rendered => "rendered",
        PassOutcome::Extracted => "extracted",
        PassOutcome::Deferred => "deferred",
    }
}

const fn navigation_label(outcome: &NavOutcome) -> &'static str {
    match outcome {
        NavOutcome::Idle => "idle",
        NavOutcome::Pending => "pending",
        NavOutcome::Reached { .. } => "reached",
        NavOutcome::Aborted { .. } => "aborted",
        NavOutcome::Superseded(_) => "superseded",
    }
}
