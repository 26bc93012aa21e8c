//! Property tests: every tree the builder produces is structurally valid,
//! whatever the observations look like.

use branchmap_core::{BranchSignal, Confidence, TurnObservation};
use branchmap_tree::graph::{Author, GraphEntry, MessageContent};
use branchmap_tree::{
    GraphMessage, MessageGraph, build_from_graph, build_from_observations, check_invariants,
    observe_graph,
};
use proptest::prelude::*;
use serde_json::Value;

fn signal_strategy() -> impl Strategy<Value = BranchSignal> {
    (0usize..6, 1usize..6, any::<bool>()).prop_map(|(current, total, exact)| {
        let confidence = if exact {
            Confidence::Exact
        } else {
            Confidence::Inferred
        };
        BranchSignal::new(current, total, confidence)
    })
}

fn observations_strategy() -> impl Strategy<Value = Vec<TurnObservation>> {
    prop::collection::vec((signal_strategy(), "[a-z ]{0,12}"), 0..12).prop_map(|turns| {
        turns
            .into_iter()
            .enumerate()
            .map(|(i, (signal, text))| TurnObservation::new(i, text).with_signal(signal))
            .collect()
    })
}

/// Messages `m0..m{n}`; each parent index is strictly smaller, so the graph
/// is acyclic.
fn graph_strategy() -> impl Strategy<Value = MessageGraph> {
    prop::collection::vec((any::<bool>(), any::<prop::sample::Index>(), any::<bool>()), 1..16)
        .prop_flat_map(|specs| {
            let n = specs.len();
            (Just(specs), prop::option::of(0..n))
        })
        .prop_map(|(specs, current)| {
            let mut graph = MessageGraph::default();
            for (i, (is_user, parent, has_parent)) in specs.iter().enumerate() {
                let parent = (i > 0 && *has_parent).then(|| format!("m{}", parent.index(i)));
                let role = if *is_user { "user" } else { "assistant" };
                graph.mapping.insert(
                    format!("m{i}"),
                    GraphEntry {
                        message: Some(GraphMessage {
                            id: Some(format!("m{i}")),
                            author: Some(Author { role: role.to_owned() }),
                            content: Some(MessageContent {
                                parts: vec![Value::String(format!("text {i}"))],
                            }),
                            create_time: Some(i as f64),
                        }),
                        parent,
                    },
                );
            }
            graph.current_node = current.map(|c| format!("m{c}"));
            graph
        })
}

proptest! {
    #[test]
    fn dom_trees_satisfy_invariants(observations in observations_strategy()) {
        let tree = build_from_observations("conv", &observations);
        let violations = check_invariants(&tree);
        prop_assert!(violations.is_empty(), "{violations:?}");

        let expected: usize = observations.iter().map(|o| o.branch_signal.total_branches).sum();
        prop_assert_eq!(tree.len(), expected);
        if let Some(max_depth) = tree.max_depth() {
            prop_assert_eq!(tree.active_path().len(), max_depth + 1);
        }
    }

    #[test]
    fn building_is_idempotent(observations in observations_strategy()) {
        let first = build_from_observations("conv", &observations);
        let second = build_from_observations("conv", &observations);
        prop_assert_eq!(first.shape(), second.shape());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn single_branch_input_is_a_chain(texts in prop::collection::vec("[a-z]{1,6}", 1..10)) {
        let observations: Vec<TurnObservation> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| TurnObservation::new(i, t.as_str()))
            .collect();
        let tree = build_from_observations("conv", &observations);
        for (depth, node) in tree.nodes.iter().enumerate() {
            prop_assert_eq!(node.depth, depth);
            prop_assert_eq!(tree.children_of(Some(node.id.as_str())).len(), usize::from(depth + 1 < tree.len()));
            let expected_parent = depth.checked_sub(1).map(|d| tree.nodes[d].id.clone());
            prop_assert_eq!(node.parent_id.clone(), expected_parent);
        }
    }

    #[test]
    fn shuffled_positions_build_the_same_tree(observations in observations_strategy(), seed in any::<u64>()) {
        let mut shuffled = observations.clone();
        let mut state = seed | 1;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            shuffled.swap(i, (state >> 33) as usize % (i + 1));
        }
        prop_assert_eq!(
            build_from_observations("conv", &observations),
            build_from_observations("conv", &shuffled)
        );
    }

    #[test]
    fn graph_trees_satisfy_invariants(graph in graph_strategy()) {
        let observations = observe_graph(&graph);
        let tree = build_from_graph("conv", &observations);
        let violations = check_invariants(&tree);
        prop_assert!(violations.is_empty(), "{violations:?}");
        prop_assert_eq!(tree.len(), graph.user_turn_count());
        prop_assert_eq!(build_from_graph("conv", &observe_graph(&graph)), tree);
    }
}
