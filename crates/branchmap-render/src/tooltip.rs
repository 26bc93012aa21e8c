#![forbid(unsafe_code)]

//! Hover tooltips with a show delay.

use std::time::Duration;

/// Tooltip visibility for the node under the pointer.
///
/// Moving onto a node starts the delay. The tooltip shows once the pointer
/// has stayed on the same node for the whole delay. Leaving hides it at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TooltipState {
    delay: Duration,
    hovered: Option<(String, Duration)>,
    visible: bool,
}

impl TooltipState {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            hovered: None,
            visible: false,
        }
    }

    /// Pointer moved onto `node` (or off every node) at `now`.
    pub fn hover(&mut self, node: Option<&str>, now: Duration) {
        let unchanged = matches!(
            (node, &self.hovered),
            (Some(id), Some((current, _))) if current == id
        );
        if unchanged {
            return;
        }
        self.hovered = node.map(|id| (id.to_owned(), now));
        self.visible = false;
    }

    /// Advance time. Returns the id of the node whose tooltip is showing.
    pub fn poll(&mut self, now: Duration) -> Option<&str> {
        if let Some((_, since)) = &self.hovered
            && now.saturating_sub(*since) >= self.delay
        {
            self.visible = true;
        }
        self.visible()
    }

    /// Id of the node whose tooltip is showing.
    #[must_use]
    pub fn visible(&self) -> Option<&str> {
        match &self.hovered {
            Some((id, _)) if self.visible => Some(id.as_str()),
            _ => None,
        }
    }

    /// Hide and forget the hovered node, e.g. after the scene was rebuilt.
    pub fn clear(&mut self) {
        self.hovered = None;
        self.visible = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(100);

    #[test]
    fn shows_after_delay() {
        let mut tip = TooltipState::new(DELAY);
        tip.hover(Some("n1"), Duration::from_millis(0));
        assert_eq!(tip.poll(Duration::from_millis(99)), None);
        assert_eq!(tip.poll(Duration::from_millis(100)), Some("n1"));
    }

    #[test]
    fn moving_to_another_node_restarts_delay() {
        let mut tip = TooltipState::new(DELAY);
        tip.hover(Some("n1"), Duration::from_millis(0));
        assert_eq!(tip.poll(Duration::from_millis(150)), Some("n1"));
        tip.hover(Some("n2"), Duration::from_millis(160));
        assert_eq!(tip.poll(Duration::from_millis(200)), None);
        tip.hover(Some("n2"), Duration::from_millis(250));
        assert_eq!(tip.poll(Duration::from_millis(260)), Some("n2"));
    }

    #[test]
    fn leaving_hides() {
        let mut tip = TooltipState::new(DELAY);
        tip.hover(Some("n1"), Duration::ZERO);
        tip.poll(Duration::from_secs(1));
        tip.hover(None, Duration::from_secs(1));
        assert_eq!(tip.visible(), None);
    }
}
