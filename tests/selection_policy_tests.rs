use fluxzero::{
    config::SelectionStrategy,
    policy::selection::{FlowPolicy, SelectionPolicy, UcbPolicy},
    FluidTree, FluxConfig, NodeId,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Root with two linked children
fn two_children() -> (FluidTree, NodeId, NodeId) {
    let mut tree = FluidTree::new();
    let a = tree.create_child(NodeId::ROOT).unwrap();
    let b = tree.create_child(NodeId::ROOT).unwrap();
    (tree, a, b)
}

#[test]
fn test_ucb_score_formula() {
    let score = UcbPolicy::score(0.25, 3, 7, 2.0);
    let expected = 0.25 + 2.0 * ((8.0f64).ln() / 4.0).sqrt();
    assert!((score - expected).abs() < 1e-12);

    // Fresh parent and child: ln(1) = 0, so only the value counts
    assert_eq!(UcbPolicy::score(0.5, 0, 0, 10.0), 0.5);

    // Unvisited children stay finite
    assert!(UcbPolicy::score(0.0, 0, u32::MAX, 1.414).is_finite());
}

#[test]
fn test_leaf_start_is_returned_unchanged() {
    let (tree, a, _) = two_children();
    assert_eq!(tree.select_leaf(a, 1.414), a);
}

#[test]
fn test_unknown_start_is_returned_unchanged() {
    let (tree, _, _) = two_children();
    assert_eq!(tree.select_leaf(NodeId(9999), 1.414), NodeId(9999));
    assert_eq!(tree.select_leaf(NodeId(-5), 1.414), NodeId(-5));
}

#[test]
fn test_ties_go_to_lowest_id() {
    let mut tree = FluidTree::new();
    let a = tree.create_node(NodeId::ROOT).unwrap();
    let b = tree.create_node(NodeId::ROOT).unwrap();
    // Link in reverse order; the tie must still resolve to the lower id
    tree.add_child(NodeId::ROOT, b).unwrap();
    tree.add_child(NodeId::ROOT, a).unwrap();

    assert_eq!(tree.select_leaf(NodeId::ROOT, 1.414), a);
    assert_eq!(tree.select_leaf(NodeId::ROOT, 0.0), a);
}

#[test]
fn test_zero_exploration_is_pure_exploitation() {
    let (mut tree, a, b) = two_children();
    for _ in 0..10 {
        tree.backprop(a, 0.6, 0.5);
    }
    tree.backprop(b, 0.9, 0.5);

    // a ~0.6 against b 0.45, despite b being far less visited
    assert_eq!(tree.select_leaf(NodeId::ROOT, 0.0), a);
    tree.backprop(b, 0.9, 0.5);
    // b has 0.675 now
    assert_eq!(tree.select_leaf(NodeId::ROOT, 0.0), b);
}

#[test]
fn test_unvisited_child_is_preferred() {
    let (mut tree, a, b) = two_children();
    for _ in 0..10 {
        tree.backprop(a, 1.0, 1.0);
    }

    // a: 1.0 + 1.414 * sqrt(ln 11 / 11) ~ 1.66, b: 1.414 * sqrt(ln 11) ~ 2.19
    assert_eq!(tree.select_leaf(NodeId::ROOT, 1.414), b);
}

#[test]
fn test_descends_multiple_levels() {
    let mut tree = FluidTree::new();
    let a = tree.create_child(NodeId::ROOT).unwrap();
    let b = tree.create_child(NodeId::ROOT).unwrap();
    let a1 = tree.create_child(a).unwrap();
    let a2 = tree.create_child(a).unwrap();

    for _ in 0..4 {
        tree.backprop(a2, 1.0, 0.5);
    }
    tree.backprop(a1, 0.0, 0.5);
    tree.backprop(b, 0.0, 0.5);

    assert_eq!(tree.select_leaf(NodeId::ROOT, 0.0), a2);
    // Starting below the root works too
    assert_eq!(tree.select_leaf(a, 0.0), a2);
}

#[test]
fn test_selection_always_reaches_a_descendant_leaf() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut tree = FluidTree::new();

    for _ in 0..300 {
        let parent = NodeId(rng.gen_range(0..tree.len() as i32));
        tree.create_child(parent).unwrap();
    }
    for _ in 0..500 {
        let leaf = NodeId(rng.gen_range(0..tree.len() as i32));
        tree.backprop(leaf, rng.gen::<f64>(), 0.3);
    }

    for start in 0..tree.len() as i32 {
        let start = NodeId(start);
        for exploration in [0.0, 0.1, 1.414, 25.0] {
            let leaf = tree.select_leaf(start, exploration);
            assert!(tree.get_children(leaf).is_empty());

            let mut cursor = leaf;
            while cursor != start {
                assert!(cursor.is_some(), "{} is not below {}", leaf, start);
                cursor = tree.get_parent(cursor);
            }
        }
    }
}

#[test]
fn test_flow_low_temperature_is_greedy() {
    let (mut tree, a, b) = two_children();
    for _ in 0..5 {
        tree.backprop(a, 1.0, 1.0);
        tree.backprop(b, 0.0, 1.0);
    }
    let tree = tree.with_selection_policy(FlowPolicy::with_seed(11));

    for _ in 0..50 {
        assert_eq!(tree.select_leaf(NodeId::ROOT, 0.01), a);
    }
}

#[test]
fn test_flow_high_temperature_explores() {
    let (mut tree, a, b) = two_children();
    for _ in 0..5 {
        tree.backprop(a, 1.0, 1.0);
        tree.backprop(b, 0.0, 1.0);
    }
    let tree = tree.with_selection_policy(FlowPolicy::with_seed(5));

    let picks: Vec<NodeId> = (0..200)
        .map(|_| tree.select_leaf(NodeId::ROOT, 1.0e6))
        .collect();
    assert!(picks.contains(&a));
    assert!(picks.contains(&b));
}

#[test]
fn test_flow_zero_temperature_falls_back_to_ucb() {
    let (mut tree, a, b) = two_children();
    tree.backprop(a, 0.1, 1.0);
    tree.backprop(b, 0.8, 1.0);
    let tree = tree.with_selection_policy(FlowPolicy::with_seed(1));

    assert_eq!(tree.select_leaf(NodeId::ROOT, 0.0), b);
    assert_eq!(tree.select_leaf(NodeId::ROOT, f64::NAN), a);
}

#[test]
fn test_flow_is_reproducible_with_seed() {
    let build = || {
        let config = FluxConfig::default()
            .with_selection(SelectionStrategy::Flow)
            .with_seed(99)
            .with_exploration(2.0);
        let mut tree = FluidTree::with_config(config).unwrap();
        for _ in 0..4 {
            tree.create_child(NodeId::ROOT).unwrap();
        }
        tree
    };

    let first = build();
    let second = build();
    let run = |tree: &FluidTree| -> Vec<NodeId> {
        (0..32).map(|_| tree.select(NodeId::ROOT)).collect()
    };

    assert_eq!(run(&first), run(&second));
}

#[test]
fn test_flow_probabilities_sum_to_one() {
    let probs = FlowPolicy::flow_probabilities(&[0.2, 0.4, 1.0], 0.5);
    assert_eq!(probs.len(), 3);
    assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    assert!(probs[2] > probs[1] && probs[1] > probs[0]);

    assert!(FlowPolicy::flow_probabilities(&[], 1.0).is_empty());
    assert!(FlowPolicy::flow_probabilities(&[1.0], -1.0).is_empty());
    assert!(FlowPolicy::flow_probabilities(&[f64::NAN], 1.0).is_empty());
}

#[test]
fn test_selection_policy_cloning() {
    let policy = UcbPolicy::new();
    let boxed: Box<dyn SelectionPolicy> = Box::new(policy);
    let cloned = boxed.clone_box();

    assert!(cloned.as_any().downcast_ref::<UcbPolicy>().is_some());
}
