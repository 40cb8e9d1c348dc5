//! Training contexts: bag ownership, the learn-tree holder, and the
//! round-based growth controller.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::dataset::{Dataset, FeatureIndex, PredictedLabel};
use crate::errors::TrainError;
use crate::learner::config::TrainConfig;
use crate::learner::holder::{partition_parts, HolderBranch, HolderNode};
use crate::learner::scoring::{choose, fit_offset, score_leaf, GAIN_EPS};
use crate::learner::task_runner::{SerialRunner, TaskRunner};
use crate::model::DecisionTree;

/// One bag: its immutable feature index plus the bag dataset itself. The
/// index is computed once and reused for every split against the bag.
pub struct BagHolder {
    pub index: FeatureIndex<PredictedLabel>,
    pub dataset: Dataset<PredictedLabel>,
}

/// Owns the bags a model is trained against. Bags are equivalent datasets
/// over the same distribution; extra bags serve hold-out gain checking.
pub struct Context {
    bags: Vec<BagHolder>,
}

impl Context {
    pub fn create(bags: &[Dataset<PredictedLabel>]) -> Self {
        assert!(!bags.is_empty(), "at least one bag is required");
        Self {
            bags: bags
                .iter()
                .map(|bag| BagHolder {
                    index: FeatureIndex::build(bag),
                    dataset: bag.clone(),
                })
                .collect(),
        }
    }

    pub fn bag_count(&self) -> usize {
        self.bags.len()
    }

    /// Seeds a learner, optionally continuing from a base tree and running
    /// candidate scoring on a caller-provided task pool.
    pub fn learner<'a>(
        &'a self,
        base: Option<&DecisionTree>,
        runner: Option<&'a dyn TaskRunner>,
    ) -> LearnContext<'a> {
        let mut next_node_id = 1;
        let parts: Vec<Dataset<PredictedLabel>> =
            self.bags.iter().map(|bag| bag.dataset.clone()).collect();

        let holder = match base {
            Some(tree) => {
                HolderNode::from_tree(tree, tree.root(), parts, &self.bags, &mut next_node_id)
            }
            None => {
                let leaf = HolderNode::new_leaf(next_node_id, 0.0, parts);
                next_node_id += 1;
                leaf
            }
        };

        LearnContext {
            bags: &self.bags,
            runner,
            holder,
            next_node_id,
            dig_cache: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DigEntry {
    best_feature: Option<u32>,
    best_gain: f64,
}

/// Memoized best candidate per (node id, bag id): re-visited leaves whose
/// best candidate was non-improving freeze without rescoring.
type DigCache = HashMap<(u64, usize), DigEntry>;

/// A tree under construction. Owns the learn-tree holder; each `train`
/// call grows it further and returns the tree built so far. A failed call
/// leaves the holder at its pre-call state.
pub struct LearnContext<'a> {
    bags: &'a [BagHolder],
    runner: Option<&'a dyn TaskRunner>,
    holder: HolderNode,
    next_node_id: u64,
    dig_cache: DigCache,
}

impl<'a> LearnContext<'a> {
    pub fn train(&mut self, config: &TrainConfig) -> Result<DecisionTree, TrainError> {
        let serial = SerialRunner;
        let runner = self.runner.unwrap_or(&serial);
        let mut rng = match config.random_seed() {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut working = self.holder.clone();
        let mut next_node_id = self.next_node_id;
        let splits;
        {
            let mut pass = GrowPass {
                bags: self.bags,
                runner,
                config,
                cache: &mut self.dig_cache,
                next_node_id: &mut next_node_id,
                rng: &mut rng,
                splits: 0,
            };

            // One round splits every splittable leaf once, so each round
            // deepens the tree by at most one level.
            for _ in 0..config.max_add_depth() {
                let before = pass.splits;
                pass.grow(&mut working, &mut Vec::new(), 0.0)?;
                if pass.splits == before {
                    break;
                }
            }
            splits = pass.splits;
        }

        self.next_node_id = next_node_id;
        self.holder = working;

        let tree = self.holder.to_tree();
        log::info!(
            "trained tree: {} new splits, {} nodes",
            splits,
            tree.node_count()
        );
        Ok(tree)
    }
}

/// State of one growth pass over the holder.
struct GrowPass<'p> {
    bags: &'p [BagHolder],
    runner: &'p dyn TaskRunner,
    config: &'p TrainConfig,
    cache: &'p mut DigCache,
    next_node_id: &'p mut u64,
    rng: &'p mut ChaCha8Rng,
    splits: u32,
}

impl<'p> GrowPass<'p> {
    fn next_id(&mut self) -> u64 {
        let id = *self.next_node_id;
        *self.next_node_id += 1;
        id
    }

    /// Descends to the leaves of the pre-round tree and splits or freezes
    /// each; children created by this round are not revisited within it.
    fn grow(
        &mut self,
        node: &mut HolderNode,
        path: &mut Vec<u32>,
        ancestors_delta: f64,
    ) -> Result<(), TrainError> {
        if !node.is_leaf() {
            let node_delta = node.delta;
            for branch_idx in 0..node.branches.len() {
                path.push(node.branches[branch_idx].feature_id);
                if let Some(child) = node.branches[branch_idx].yes.as_deref_mut() {
                    self.grow(child, path, ancestors_delta + node_delta)?;
                }
                if let Some(child) = node.branches[branch_idx].no.as_deref_mut() {
                    self.grow(child, path, ancestors_delta + node_delta)?;
                }
                path.pop();
            }
            return Ok(());
        }

        if node.frozen {
            return Ok(());
        }
        if node.parts.is_empty() || node.parts[0].is_empty() {
            node.frozen = true;
            return Ok(());
        }

        // Fit the leaf's own offset first: gains below measure branching
        // value only, not what a plain offset could already achieve.
        let mut background = ancestors_delta + node.delta;
        let offset_fit = fit_offset(&node.parts[0], background)?;
        node.delta += offset_fit.vars[0];
        background += offset_fit.vars[0];

        if !self.config.allow_negative_gain() {
            if let Some(entry) = self.cache.get(&(node.node_id, 0)).copied() {
                if entry.best_gain <= GAIN_EPS {
                    log::debug!(
                        "leaf {} frozen from cache: best feature {:?}, gain {:.6}",
                        node.node_id,
                        entry.best_feature,
                        entry.best_gain
                    );
                    node.frozen = true;
                    return Ok(());
                }
            }
        }

        let skip: std::collections::HashSet<u32> = path.iter().copied().collect();
        let choices = score_leaf(
            &node.parts,
            self.bags,
            background,
            &skip,
            self.config,
            self.runner,
        )?;

        self.cache.insert(
            (node.node_id, 0),
            DigEntry {
                best_feature: choices.first().map(|c| c.feature_id),
                best_gain: choices.first().map_or(0.0, |c| c.gain),
            },
        );

        let chosen = match choose(&choices, self.config.feature_selection(), &mut *self.rng) {
            Some(chosen) => chosen,
            None => {
                node.frozen = true;
                return Ok(());
            }
        };
        if chosen.gain <= GAIN_EPS && !self.config.allow_negative_gain() {
            node.frozen = true;
            return Ok(());
        }

        let (yes_parts, no_parts) = partition_parts(&node.parts, chosen.feature_id, self.bags);
        let yes = HolderNode::new_leaf(self.next_id(), chosen.delta, yes_parts);
        let no = HolderNode::new_leaf(self.next_id(), -chosen.delta, no_parts);

        log::debug!(
            "split node {} on feature {}: gain {:.6}, delta {:.4}",
            node.node_id,
            chosen.feature_id,
            chosen.gain,
            chosen.delta
        );

        node.delta += chosen.offset;
        node.branches.push(HolderBranch {
            feature_id: chosen.feature_id,
            yes: Some(Box::new(yes)),
            no: Some(Box::new(no)),
        });
        self.splits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::sigmoid;
    use crate::metrics::log_reg_logloss;

    fn dataset(text: &str) -> Dataset<PredictedLabel> {
        Dataset::load(text.as_bytes(), None).unwrap()
    }

    #[test]
    fn constant_labels_train_to_a_single_leaf() {
        let mut text = String::new();
        for _ in 0..100 {
            text.push_str("1 1:1\n");
        }
        let context = Context::create(&[dataset(&text)]);
        let mut learner = context.learner(None, None);
        let config = TrainConfig::builder().max_add_depth(3).build().unwrap();

        let tree = learner.train(&config).unwrap();
        assert_eq!(tree.node_count(), 1);
        let root = tree.node(tree.root());
        assert!(root.branches.is_empty());
        assert!(root.delta_logit > 0.0);
        assert!(sigmoid(root.delta_logit) >= 0.99);
    }

    #[test]
    fn separable_data_branches_on_the_feature() {
        let mut text = String::new();
        for _ in 0..100 {
            text.push_str("1 7:1\n0 2:1\n");
        }
        let svm = dataset(&text);
        let context = Context::create(&[svm.clone()]);
        let mut learner = context.learner(None, None);
        let config = TrainConfig::builder().max_add_depth(2).build().unwrap();

        let tree = learner.train(&config).unwrap();
        let root = tree.node(tree.root());
        assert_eq!(root.branches.len(), 1);
        assert!(log_reg_logloss(&tree, &svm) < 1e-3);
    }

    #[test]
    fn training_continues_from_a_base_tree() {
        let mut text = String::new();
        for _ in 0..100 {
            text.push_str("1 7:1\n0 2:1\n");
        }
        let svm = dataset(&text);
        let context = Context::create(&[svm.clone()]);

        let config = TrainConfig::builder().max_add_depth(1).build().unwrap();
        let first = context.learner(None, None).train(&config).unwrap();

        let config = TrainConfig::builder().max_add_depth(2).build().unwrap();
        let second = context
            .learner(Some(&first), None)
            .train(&config)
            .unwrap();

        assert!(second.node_count() >= first.node_count());
        assert!(log_reg_logloss(&second, &svm) <= log_reg_logloss(&first, &svm) + 1e-9);
    }
}
