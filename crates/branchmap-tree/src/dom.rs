#![forbid(unsafe_code)]

//! DOM-mode observation: one [`TurnObservation`] per rendered user turn.

use branchmap_core::{TurnObservation, TurnView};

use crate::branch;

/// Text for a turn whose rendered text is blank.
#[must_use]
pub fn fallback_text(source_index: usize) -> String {
    format!("Message {}", source_index + 1)
}

/// Observe rendered user turns in document order.
#[must_use]
pub fn observe_dom(views: &[TurnView]) -> Vec<TurnObservation> {
    views
        .iter()
        .enumerate()
        .map(|(index, view)| {
            let text = view.text.trim();
            let raw_text = if text.is_empty() {
                fallback_text(index)
            } else {
                text.to_owned()
            };
            let observation =
                TurnObservation::new(index, raw_text).with_signal(branch::detect(view));
            match &view.turn_key {
                Some(key) => observation.with_turn_key(key.clone()),
                None => observation,
            }
        })
        .collect()
}
