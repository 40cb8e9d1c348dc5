//! End-to-end training scenarios.

use treeboost::loss::sigmoid;
use treeboost::metrics::{accuracy, log_reg_logloss, logloss_by_pred};
use treeboost::{
    Context, Dataset, FeatureSelectionStrategy, PredictedLabel, PredictorAddAdapter, TrainConfig,
};

fn dataset(text: &str) -> Dataset<PredictedLabel> {
    Dataset::load(text.as_bytes(), None).unwrap()
}

fn constant_dataset() -> Dataset<PredictedLabel> {
    let mut text = String::new();
    for _ in 0..100 {
        text.push_str("1 1:1\n");
    }
    dataset(&text)
}

fn separable_dataset() -> Dataset<PredictedLabel> {
    let mut text = String::new();
    for _ in 0..100 {
        text.push_str("1 7:1\n");
        text.push_str("0\n");
    }
    dataset(&text)
}

fn xor_dataset() -> Dataset<PredictedLabel> {
    let mut text = String::new();
    for _ in 0..100 {
        text.push_str("1 1:1\n");
        text.push_str("1 2:1\n");
        text.push_str("0 1:1 2:1\n");
        text.push_str("0\n");
    }
    dataset(&text)
}

#[test]
fn trivial_constant_label_trains_a_confident_leaf() {
    let context = Context::create(&[constant_dataset()]);
    let mut learner = context.learner(None, None);
    let config = TrainConfig::builder()
        .max_add_depth(3)
        .check_depth(1)
        .alpha(1.0)
        .build()
        .unwrap();

    let tree = learner.train(&config).unwrap();

    let root = tree.node(tree.root());
    assert!(root.branches.is_empty(), "no split should pay off");
    assert!(root.delta_logit > 0.0);
    assert!(sigmoid(root.delta_logit) >= 0.99);

    for group in &constant_dataset().groups {
        for row in &group.rows {
            assert_eq!(tree.predict(&row.features), root.delta_logit);
        }
    }
}

#[test]
fn perfectly_separable_data_branches_on_the_feature() {
    let svm = separable_dataset();
    let context = Context::create(&[svm.clone()]);
    let mut learner = context.learner(None, None);
    let config = TrainConfig::builder().max_add_depth(2).build().unwrap();

    let tree = learner.train(&config).unwrap();

    let root = tree.node(tree.root());
    assert_eq!(root.branches.len(), 1);
    assert_eq!(root.branches[0].feature_id, 7);

    let with_feature = dataset("1 7:1\n");
    let without_feature = dataset("0\n");
    let yes_logit = tree.predict(&with_feature.groups[0].rows[0].features);
    let no_logit = tree.predict(&without_feature.groups[0].rows[0].features);
    assert!(yes_logit > no_logit);

    assert!(log_reg_logloss(&tree, &svm) <= 1e-3);
}

#[test]
fn xor_needs_lookahead() {
    let svm = xor_dataset();

    let context = Context::create(&[svm.clone()]);
    let config = TrainConfig::builder()
        .max_add_depth(2)
        .check_depth(2)
        .build()
        .unwrap();
    let tree = context.learner(None, None).train(&config).unwrap();

    // Both features appear in the tree and the data is fit.
    let mut used = std::collections::HashSet::new();
    for node in tree.nodes() {
        for branch in &node.branches {
            used.insert(branch.feature_id);
        }
    }
    assert!(used.contains(&1) && used.contains(&2), "used: {used:?}");
    assert!(accuracy(&tree, &svm) >= 0.99);

    // Without look-ahead no first split has positive gain.
    let shallow_config = TrainConfig::builder()
        .max_add_depth(2)
        .check_depth(1)
        .build()
        .unwrap();
    let shallow = context.learner(None, None).train(&shallow_config).unwrap();
    assert!(accuracy(&shallow, &svm) <= 0.51);
}

#[test]
fn bag_regret_discounting_keeps_the_true_split() {
    let bags = separable_dataset().split_into(2);
    let context = Context::create(&bags);
    let config = TrainConfig::builder()
        .max_add_depth(2)
        .gain_check_bags(1)
        .build()
        .unwrap();

    let tree = context.learner(None, None).train(&config).unwrap();
    let root = tree.node(tree.root());
    assert_eq!(root.branches.len(), 1);
    assert_eq!(root.branches[0].feature_id, 7);
}

#[test]
fn boosting_monotonically_improves_training_logloss() {
    let mut svm = separable_dataset();
    let config = TrainConfig::builder().max_add_depth(2).build().unwrap();

    let mut losses = vec![logloss_by_pred(&svm)];
    for _ in 0..3 {
        let context = Context::create(&[svm.clone()]);
        let tree = context.learner(None, None).train(&config).unwrap();

        let mut adapter = PredictorAddAdapter::new(&tree);
        svm = svm.copy_with(&mut adapter);
        losses.push(logloss_by_pred(&svm));
    }

    assert!(
        losses[1] < losses[0],
        "first iteration must improve: {losses:?}"
    );
    for pair in losses.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-9, "non-monotone: {losses:?}");
    }
    assert!(*losses.last().unwrap() < 1e-3);
}

#[test]
fn node_count_respects_the_depth_budget() {
    let svm = xor_dataset();
    let context = Context::create(&[svm]);
    let max_add_depth = 3u32;
    let config = TrainConfig::builder()
        .max_add_depth(max_add_depth)
        .check_depth(2)
        .build()
        .unwrap();

    let tree = context.learner(None, None).train(&config).unwrap();

    let max_splits = (max_add_depth as usize) * (1usize << (max_add_depth - 1));
    assert!(tree.node_count() <= 1 + 2 * max_splits);
}

#[test]
fn seeded_top3_random_is_deterministic() {
    let svm = xor_dataset();
    let context = Context::create(&[svm]);
    let config = TrainConfig::builder()
        .max_add_depth(2)
        .check_depth(2)
        .feature_selection(FeatureSelectionStrategy::Top3Random)
        .random_seed(42)
        .build()
        .unwrap();

    let first = context.learner(None, None).train(&config).unwrap();
    let second = context.learner(None, None).train(&config).unwrap();

    let mut first_bytes = Vec::new();
    let mut second_bytes = Vec::new();
    first.save(&mut first_bytes).unwrap();
    second.save(&mut second_bytes).unwrap();
    assert_eq!(first_bytes, second_bytes);
}
