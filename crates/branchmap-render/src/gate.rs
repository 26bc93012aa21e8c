#![forbid(unsafe_code)]

//! Redraw gating.
//!
//! Redraws are held back while the host streams a response and while the
//! overlay is dragged or resized. A redraw requested
//! during suppression is remembered and handed back exactly once when the
//! last suppression reason lifts.

use bitflags::bitflags;

bitflags! {
    /// Reasons a redraw is held back.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Suppression: u8 {
        /// The host is producing a response.
        const STREAMING = 0b0001;
        /// The overlay is being dragged.
        const DRAGGING  = 0b0010;
        /// The overlay is being resized.
        const RESIZING  = 0b0100;
    }
}

impl Default for Suppression {
    fn default() -> Self {
        Self::empty()
    }
}

/// Tracks suppression reasons and a deferred redraw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedrawGate {
    reasons: Suppression,
    pending: bool,
}

impl RedrawGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current suppression reasons.
    #[must_use]
    pub const fn reasons(&self) -> Suppression {
        self.reasons
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        !self.reasons.is_empty()
    }

    /// True when a redraw is waiting for suppression to lift.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    /// Add a suppression reason.
    pub fn suppress(&mut self, reason: Suppression) {
        self.reasons.insert(reason);
    }

    /// Remove a suppression reason.
    ///
    /// Returns `true` when this lifted the last reason and a redraw was
    /// deferred. The deferred redraw is consumed.
    pub fn release(&mut self, reason: Suppression) -> bool {
        self.reasons.remove(reason);
        if self.pending && self.reasons.is_empty() {
            self.pending = false;
            tracing::trace!(target: "branchmap.render", "releasing deferred redraw");
            return true;
        }
        false
    }

    /// Ask for a redraw. Returns `true` if it may happen now; otherwise it is
    /// deferred.
    pub fn request(&mut self) -> bool {
        if self.reasons.is_empty() {
            true
        } else {
            self.pending = true;
            false
        }
    }
}
