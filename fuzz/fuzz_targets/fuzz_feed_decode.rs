#![no_main]

use branchmap_tree::{
    FeedEvent, append_incremental, build_from_graph, check_invariants, decode_payload,
    observe_graph,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };
    if body.len() > 64 * 1024 {
        return;
    }

    // Decoding must never panic, whatever the body looks like.
    let events = decode_payload(body);

    let mut tree = None;
    for event in events {
        match event {
            FeedEvent::Graph(graph) => {
                let observations = observe_graph(&graph);
                let built = build_from_graph("fuzz", &observations);
                let violations = check_invariants(&built);
                assert!(violations.is_empty(), "graph tree violates invariants: {violations:?}");
                assert!(built.len() <= observations.len());
                tree = Some(built);
            }
            FeedEvent::Message(message) => {
                let Some(current) = &tree else {
                    continue;
                };
                if let Some(next) = append_incremental(current, &message) {
                    let violations = check_invariants(&next);
                    assert!(violations.is_empty(), "appended tree violates invariants: {violations:?}");
                    assert_eq!(next.len(), current.len() + 1);
                    tree = Some(next);
                }
            }
            FeedEvent::Irrelevant => {}
        }
    }
});
