#![forbid(unsafe_code)]

//! Change notification and timers.
//!
//! Every reason to re-extract the tree is a [`ChangeSource`] fed into one
//! [`Debouncer`]. Host mutations, the turn-count poll, and feed payloads wait
//! for a quiet period so a burst becomes one pass. Explicit user actions and
//! completed navigations are due at once but still coalesce with whatever is
//! already queued.
//!
//! All times are offsets from an arbitrary origin supplied by the caller, so
//! the scheduler is driven entirely by the host's clock and is deterministic
//! under test.

use std::fmt;
use std::time::Duration;

use branchmap_core::ScheduleConfig;

/// Why an extraction pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeSource {
    /// The host document changed in a way that may affect user turns.
    Mutation,
    /// The polling fallback saw the user-turn count change.
    Poll,
    /// A network payload was observed.
    Feed,
    /// The page moved to another conversation.
    ConversationChanged,
    /// The user asked for a refresh.
    UserAction,
    /// A branch navigation reached its target and settled.
    NavigationComplete,
    /// The startup delay elapsed.
    Startup,
    /// The host stopped streaming after a pass was held back.
    StreamingEnded,
    /// A drag or resize of the overlay ended.
    DragReleased,
    /// The overlay was shown again.
    Shown,
}

impl ChangeSource {
    /// Sources that skip the quiet period.
    #[must_use]
    pub const fn is_immediate(self) -> bool {
        !matches!(
            self,
            Self::Mutation | Self::Poll | Self::Feed | Self::ConversationChanged
        )
    }
}

impl fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mutation => "mutation",
            Self::Poll => "poll",
            Self::Feed => "feed",
            Self::ConversationChanged => "conversation_changed",
            Self::UserAction => "user_action",
            Self::NavigationComplete => "navigation_complete",
            Self::Startup => "startup",
            Self::StreamingEnded => "streaming_ended",
            Self::DragReleased => "drag_released",
            Self::Shown => "shown",
        };
        f.write_str(name)
    }
}

/// Trailing-edge debouncer over [`ChangeSource`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debouncer {
    quiet: Duration,
    due: Option<Duration>,
    immediate: bool,
    sources: Vec<ChangeSource>,
}

impl Debouncer {
    #[must_use]
    pub const fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            due: None,
            immediate: false,
            sources: Vec::new(),
        }
    }

    /// Queue a notification observed at `now`.
    ///
    /// A quiet-period source pushes the deadline to `now + quiet` unless an
    /// immediate source is already waiting.
    pub fn notify(&mut self, source: ChangeSource, now: Duration) {
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
        if source.is_immediate() {
            self.immediate = true;
            self.due = Some(self.due.map_or(now, |due| due.min(now)));
        } else if !self.immediate {
            self.due = Some(now + self.quiet);
        }
    }

    /// When the queued pass becomes due.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.due
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    /// Take the coalesced sources if the pass is due at `now`.
    pub fn fire(&mut self, now: Duration) -> Option<Vec<ChangeSource>> {
        match self.due {
            Some(due) if due <= now => {
                self.due = None;
                self.immediate = false;
                Some(std::mem::take(&mut self.sources))
            }
            _ => None,
        }
    }

    /// Drop whatever is queued.
    pub fn clear(&mut self) {
        self.due = None;
        self.immediate = false;
        self.sources.clear();
    }
}

/// A one-shot deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline(Option<Duration>);

impl Deadline {
    /// Arm (or re-arm) to fire at `at`.
    pub fn arm(&mut self, at: Duration) {
        self.0 = Some(at);
    }

    pub fn disarm(&mut self) {
        self.0 = None;
    }

    #[must_use]
    pub const fn at(&self) -> Option<Duration> {
        self.0
    }

    /// Returns `true` once when `now` reaches the deadline, and disarms.
    pub fn fire(&mut self, now: Duration) -> bool {
        match self.0 {
            Some(at) if at <= now => {
                self.0 = None;
                true
            }
            _ => false,
        }
    }
}

/// A repeating timer.
///
/// Missed periods are skipped rather than replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    period: Duration,
    next: Option<Duration>,
}

impl Interval {
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    /// Start counting from `now`; the first firing is one period later.
    pub fn start(&mut self, now: Duration) {
        self.next = Some(now + self.period);
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    #[must_use]
    pub const fn next(&self) -> Option<Duration> {
        self.next
    }

    pub fn fire(&mut self, now: Duration) -> bool {
        let Some(next) = self.next else {
            return false;
        };
        if next > now {
            return false;
        }
        if self.period.is_zero() {
            self.next = Some(now);
            return true;
        }
        let mut upcoming = next + self.period;
        while upcoming <= now {
            upcoming += self.period;
        }
        self.next = Some(upcoming);
        true
    }
}

/// Every timer a session runs besides the debouncer and the navigator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timers {
    /// First extraction after start.
    pub startup: Deadline,
    /// Turn-count polling fallback.
    pub poll: Interval,
    /// Overlay existence reconciliation.
    pub reconcile: Interval,
    /// Next check of a held-back pass while the host streams.
    pub streaming: Deadline,
    /// Refresh after the overlay is shown.
    pub show_refresh: Deadline,
    /// Extraction after a navigation settled.
    pub settle: Deadline,
}

impl Timers {
    #[must_use]
    pub fn new(config: &ScheduleConfig) -> Self {
        Self {
            startup: Deadline::default(),
            poll: Interval::new(config.poll_interval()),
            reconcile: Interval::new(config.reconcile_interval()),
            streaming: Deadline::default(),
            show_refresh: Deadline::default(),
            settle: Deadline::default(),
        }
    }

    /// Earliest armed deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        [
            self.startup.at(),
            self.poll.next(),
            self.reconcile.next(),
            self.streaming.at(),
            self.show_refresh.at(),
            self.settle.at(),
        ]
        .into_iter()
        .flatten()
        .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn burst_coalesces_into_one_pass() {
        let mut d = Debouncer::new(ms(500));
        d.notify(ChangeSource::Mutation, ms(0));
        d.notify(ChangeSource::Mutation, ms(300));
        d.notify(ChangeSource::Mutation, ms(600));
        assert_eq!(d.fire(ms(1000)), None);
        assert_eq!(d.fire(ms(1100)), Some(vec![ChangeSource::Mutation]));
        assert_eq!(d.fire(ms(5000)), None);
    }

    #[test]
    fn user_action_is_due_at_once_and_absorbs_queue() {
        let mut d = Debouncer::new(ms(500));
        d.notify(ChangeSource::Mutation, ms(0));
        d.notify(ChangeSource::UserAction, ms(100));
        assert_eq!(d.deadline(), Some(ms(100)));
        d.notify(ChangeSource::Feed, ms(100));
        assert_eq!(d.deadline(), Some(ms(100)));
        assert_eq!(
            d.fire(ms(100)),
            Some(vec![
                ChangeSource::Mutation,
                ChangeSource::UserAction,
                ChangeSource::Feed
            ])
        );
        assert!(!d.is_pending());
    }

    #[test]
    fn quiet_sources_reset_after_firing() {
        let mut d = Debouncer::new(ms(500));
        d.notify(ChangeSource::NavigationComplete, ms(0));
        assert!(d.fire(ms(0)).is_some());
        d.notify(ChangeSource::Poll, ms(10));
        assert_eq!(d.deadline(), Some(ms(510)));
    }

    #[test]
    fn deadline_fires_once() {
        let mut deadline = Deadline::default();
        assert!(!deadline.fire(ms(0)));
        deadline.arm(ms(300));
        assert!(!deadline.fire(ms(299)));
        assert!(deadline.fire(ms(300)));
        assert!(!deadline.fire(ms(400)));
    }

    #[test]
    fn interval_skips_missed_periods() {
        let mut every = Interval::new(ms(3000));
        assert!(!every.fire(ms(10_000)));
        every.start(ms(0));
        assert!(!every.fire(ms(2999)));
        assert!(every.fire(ms(3000)));
        assert_eq!(every.next(), Some(ms(6000)));
        assert!(every.fire(ms(10_000)));
        assert_eq!(every.next(), Some(ms(12_000)));
    }

    #[test]
    fn timers_report_earliest_deadline() {
        let mut timers = Timers::new(&ScheduleConfig::default());
        assert_eq!(timers.next_deadline(), None);
        timers.poll.start(ms(0));
        timers.startup.arm(ms(2000));
        assert_eq!(timers.next_deadline(), Some(ms(2000)));
    }

    #[test]
    fn immediate_classification() {
        assert!(!ChangeSource::Mutation.is_immediate());
        assert!(!ChangeSource::Feed.is_immediate());
        assert!(ChangeSource::StreamingEnded.is_immediate());
        assert_eq!(ChangeSource::DragReleased.to_string(), "drag_released");
    }
}
