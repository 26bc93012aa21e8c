#![no_main]

use arbitrary::Arbitrary;
use branchmap_core::{ControlState, LayoutConfig, TurnView};
use branchmap_layout::layout;
use branchmap_tree::{build_from_observations, check_invariants, detect, observe_dom};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzTurn {
    text: String,
    indicator: Option<String>,
    previous: Option<bool>,
    next: Option<bool>,
}

impl FuzzTurn {
    fn view(&self) -> TurnView {
        TurnView {
            turn_key: None,
            text: self.text.clone(),
            indicator_text: self.indicator.clone(),
            previous: self.previous.map(|enabled| ControlState { enabled }),
            next: self.next.map(|enabled| ControlState { enabled }),
        }
    }
}

fuzz_target!(|turns: Vec<FuzzTurn>| {
    if turns.len() > 64 {
        return;
    }
    let views: Vec<TurnView> = turns.iter().map(FuzzTurn::view).collect();

    for view in &views {
        let signal = detect(view);
        assert!(signal.total_branches >= 1);
        assert!(signal.current_branch < signal.total_branches);
    }

    let observations = observe_dom(&views);
    assert_eq!(observations.len(), views.len());
    let tree = build_from_observations("fuzz", &observations);
    let violations = check_invariants(&tree);
    assert!(violations.is_empty(), "dom tree violates invariants: {violations:?}");
    assert_eq!(tree.active_path().len(), views.len());

    let placed = layout(&tree, &LayoutConfig::default());
    assert_eq!(placed.positions.len(), tree.len());
    assert!(placed.canvas.width.is_finite() && placed.canvas.height.is_finite());
});
