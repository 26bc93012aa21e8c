//! End-to-end extraction scenarios: graph payloads and rendered turns in,
//! conversation trees out.

use branchmap_core::{
    BranchSignal, Confidence, ControlState, NodeContent, TreeSource, TurnView,
};
use branchmap_harness::{
    FakePage, FakeTurn, edited_graph, linear_graph, shape_fingerprint, sse_body, user_only_chain,
};
use branchmap_tree::{
    Extraction, FeedEvent, MessageGraph, build, check_invariants, decode_payload, detect, extract,
};
use pretty_assertions::assert_eq;

fn graph_from(body: &str) -> MessageGraph {
    match decode_payload(body).pop() {
        Some(FeedEvent::Graph(graph)) => graph,
        other => panic!("expected a graph event, got {other:?}"),
    }
}

#[test]
fn linear_user_graph_builds_three_current_nodes() {
    let graph = graph_from(&user_only_chain().conversation_body());
    let extraction = extract(Some(&graph), &FakePage::default());
    assert_eq!(extraction.source(), TreeSource::Graph);

    let tree = build("conv", &extraction);
    assert_eq!(tree.len(), 3);
    let depths: Vec<usize> = tree.nodes.iter().map(|n| n.depth).collect();
    assert_eq!(depths, vec![0, 1, 2]);
    assert!(tree.nodes.iter().all(|n| n.total_branches == 1 && n.is_current_branch));
    let ids: Vec<&str> = tree.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["u0", "u1", "u2"]);
    assert_eq!(check_invariants(&tree), vec![]);
}

#[test]
fn interleaved_assistant_turns_do_not_count_as_depth() {
    let graph = graph_from(&linear_graph(4).nested_body());
    let tree = build("conv", &extract(Some(&graph), &FakePage::default()));
    assert_eq!(tree.max_depth(), Some(3));
    assert_eq!(tree.nodes[3].parent_id.as_deref(), Some("u2"));
}

#[test]
fn edited_turn_becomes_sibling_group() {
    let graph = graph_from(&edited_graph().current("u2-reply").conversation_body());
    let tree = build("conv", &extract(Some(&graph), &FakePage::default()));
    assert_eq!(check_invariants(&tree), vec![]);

    let siblings = tree.children_of(Some("u0"));
    let ids: Vec<&str> = siblings.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["u1a", "u1b", "u1c"]);
    assert!(siblings.iter().all(|n| n.total_branches == 3));
    let current: Vec<&str> = tree.active_path().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(current, vec!["u0", "u1b", "u2"]);
    assert_eq!(tree.node("u2").and_then(|n| n.parent_id.as_deref()), Some("u1b"));
    // graph mode knows the text of every variant
    assert_eq!(tree.node("u1c").map(|n| n.content.clone()), Some(NodeContent::observed("third try")));
}

#[test]
fn indicator_two_of_three_yields_three_siblings() {
    let page = FakePage::new(vec![
        FakeTurn::single("hello").with_key("conversation-turn-1"),
        FakeTurn::branched(&["edit one", "edit two", "edit three"], 1).with_key("conversation-turn-3"),
    ]);
    let extraction = extract(None, &page);
    assert!(matches!(extraction, Extraction::Dom(_)));
    let tree = build("conv", &extraction);

    let depth1: Vec<_> = tree.at_depth(1).collect();
    assert_eq!(depth1.len(), 3);
    assert_eq!(
        depth1.iter().map(|n| n.branch_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert!(depth1[1].is_current_branch);
    assert_eq!(depth1[1].display_text(), "edit two");
    assert_eq!(depth1[0].display_text(), "Branch 1");
    assert_eq!(depth1[2].display_text(), "Branch 3");
    assert!(depth1.iter().all(|n| n.turn_key.as_ref().map(|k| k.as_str()) == Some("conversation-turn-3")));
    assert_eq!(check_invariants(&tree), vec![]);
}

#[test]
fn next_enabled_previous_disabled_infers_first_of_two() {
    let view = TurnView::new("second")
        .with_controls(Some(ControlState::disabled()), Some(ControlState::enabled()));
    let signal = detect(&view);
    assert_eq!(signal, BranchSignal::new(0, 2, Confidence::Inferred));

    let page = FakePage::new(vec![
        FakeTurn::single("first"),
        FakeTurn::single("middle"),
        FakeTurn::branched(&["second", "hidden"], 0).without_indicator(),
    ]);
    let tree = build("conv", &extract(None, &page));
    let depth2: Vec<_> = tree.at_depth(2).collect();
    assert_eq!(depth2.len(), 2);
    assert!(depth2[0].is_current_branch);
    assert_eq!(depth2[0].total_branches, 2);
}

#[test]
fn nothing_anywhere_is_the_empty_state() {
    let empty_graph = graph_from(r#"{"mapping":{"root":{"message":null,"parent":null}}}"#);
    let extraction = extract(Some(&empty_graph), &FakePage::default());
    assert_eq!(extraction, Extraction::Empty);
    let tree = build("conv", &extraction);
    assert!(tree.nodes.is_empty());
    assert_eq!(tree.source, TreeSource::Empty);

    assert_eq!(extract(None, &FakePage::default()), Extraction::Empty);
}

#[test]
fn empty_graph_falls_back_to_rendered_turns() {
    let empty_graph = MessageGraph::default();
    let page = FakePage::new(vec![FakeTurn::single("only turn")]);
    let tree = build("conv", &extract(Some(&empty_graph), &page));
    assert_eq!(tree.source, TreeSource::Dom);
    assert_eq!(tree.len(), 1);
}

#[test]
fn repeated_passes_are_identical() {
    let page = FakePage::new(vec![
        FakeTurn::single("a"),
        FakeTurn::branched(&["b1", "b2", "b3", "b4"], 2),
        FakeTurn::branched(&["c1", "c2"], 1).without_indicator(),
        FakeTurn::single("d"),
    ]);
    let first = build("conv", &extract(None, &page));
    let second = build("conv", &extract(None, &page));
    assert_eq!(first, second);
    assert_eq!(shape_fingerprint(&first), shape_fingerprint(&second));

    let graph = graph_from(&edited_graph().conversation_body());
    let first = build("conv", &extract(Some(&graph), &page));
    let second = build("conv", &extract(Some(&graph), &page));
    assert_eq!(first, second);
}

#[test]
fn streamed_user_message_is_observed_through_the_feed() {
    let frame = branchmap_harness::message_body("new-user", "user", "typed text");
    let events = decode_payload(&sse_body(&[frame]));
    assert_eq!(events.len(), 1);
    let FeedEvent::Message(message) = &events[0] else {
        panic!("expected message event");
    };

    let base = build("conv", &extract(None, &FakePage::new(vec![FakeTurn::single("hi")])));
    let extended = branchmap_tree::append_incremental(&base, message).expect("new user message");
    assert_eq!(extended.source, TreeSource::Incremental);
    assert_eq!(extended.len(), 2);
    assert_eq!(check_invariants(&extended), vec![]);
}
