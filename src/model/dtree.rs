//! Multinode decision trees over an index-based node arena.

use std::collections::HashMap;

use crate::dataset::{Dataset, FeatureVec, Label};
use crate::loss::sigmoid;

/// Index of a node inside its tree's arena.
pub type NodeIdx = usize;

/// One branch of a node: recurse into `yes` when the feature is present in
/// the row, into `no` otherwise. Either side may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeBranch {
    pub feature_id: u32,
    pub yes: Option<NodeIdx>,
    pub no: Option<NodeIdx>,
}

/// A tree node: an additive logit plus any number of branches. A node with
/// no branches is a leaf whose prediction is `delta_logit` alone.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub tree_id: u64,
    pub delta_logit: f64,
    pub branches: Vec<TreeBranch>,
}

/// A decision tree held as an arena of nodes with index links, so trees own
/// no reference cycles by construction. Evaluation starts at the root,
/// sums `delta_logit`, and adds the value of every branch's taken side.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    root: NodeIdx,
}

impl DecisionTree {
    /// A single-leaf tree.
    pub fn leaf(tree_id: u64, delta_logit: f64) -> Self {
        Self {
            nodes: vec![TreeNode {
                tree_id,
                delta_logit,
                branches: Vec::new(),
            }],
            root: 0,
        }
    }

    pub(crate) fn from_arena(nodes: Vec<TreeNode>, root: NodeIdx) -> Self {
        assert!(root < nodes.len());
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeIdx {
        self.root
    }

    pub fn node(&self, idx: NodeIdx) -> &TreeNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter()
    }

    /// Raw logit contribution for a feature vector: the path sum over every
    /// branch of every visited node.
    pub fn predict(&self, features: &FeatureVec) -> f64 {
        self.predict_node(self.root, features)
    }

    fn predict_node(&self, idx: NodeIdx, features: &FeatureVec) -> f64 {
        let node = &self.nodes[idx];
        let mut res = node.delta_logit;
        for branch in &node.branches {
            let side = if features.has(branch.feature_id) {
                branch.yes
            } else {
                branch.no
            };
            if let Some(child) = side {
                res += self.predict_node(child, features);
            }
        }
        res
    }

    /// Number of nodes reached by a full walk from the root.
    pub fn node_count(&self) -> usize {
        self.count_node(self.root)
    }

    fn count_node(&self, idx: NodeIdx) -> usize {
        let node = &self.nodes[idx];
        let mut res = 1;
        for branch in &node.branches {
            if let Some(child) = branch.yes {
                res += self.count_node(child);
            }
            if let Some(child) = branch.no {
                res += self.count_node(child);
            }
        }
        res
    }

    /// Largest `tree_id` in the arena; new nodes are stamped above it.
    pub fn max_tree_id(&self) -> u64 {
        self.nodes.iter().map(|n| n.tree_id).max().unwrap_or(0)
    }

    /// Prunes every sub-tree whose empirical cover on `svm` falls below
    /// `min_cover` (a fraction of the dataset's rows). A branch losing both
    /// sides disappears; the returned tree is rebuilt in a fresh arena.
    pub fn filter<L: Label>(&self, min_cover: f64, svm: &Dataset<L>) -> Self {
        let full_size = svm.size().max(1) as f64;
        let mut nodes = Vec::new();
        let root = self.filter_node(self.root, min_cover, svm, full_size, &mut nodes);
        Self { nodes, root }
    }

    fn filter_node<L: Label>(
        &self,
        idx: NodeIdx,
        min_cover: f64,
        svm: &Dataset<L>,
        full_size: f64,
        out: &mut Vec<TreeNode>,
    ) -> NodeIdx {
        let node = &self.nodes[idx];
        let mut branches = Vec::new();

        for branch in &node.branches {
            let yes_svm = svm.by_feature(branch.feature_id, true);
            let no_svm = svm.by_feature(branch.feature_id, false);

            let yes = branch.yes.and_then(|child| {
                (yes_svm.size() as f64 / full_size >= min_cover)
                    .then(|| self.filter_node(child, min_cover, &yes_svm, full_size, out))
            });
            let no = branch.no.and_then(|child| {
                (no_svm.size() as f64 / full_size >= min_cover)
                    .then(|| self.filter_node(child, min_cover, &no_svm, full_size, out))
            });

            if yes.is_some() || no.is_some() {
                branches.push(TreeBranch {
                    feature_id: branch.feature_id,
                    yes,
                    no,
                });
            }
        }

        out.push(TreeNode {
            tree_id: node.tree_id,
            delta_logit: node.delta_logit,
            branches,
        });
        out.len() - 1
    }

    /// Pretty-prints the tree. Every line is prefixed with `prefix`;
    /// feature ids are annotated from `dict` when provided; each node shows
    /// its own delta, the cumulative logit along the path from `base`, and
    /// the sigmoid probability of that logit.
    pub fn to_string(
        &self,
        prefix: &str,
        dict: Option<&HashMap<u32, String>>,
        base: f64,
    ) -> String {
        let mut out = String::new();
        self.render_node(self.root, prefix, dict, base, &mut out);
        out
    }

    fn render_node(
        &self,
        idx: NodeIdx,
        prefix: &str,
        dict: Option<&HashMap<u32, String>>,
        base: f64,
        out: &mut String,
    ) {
        let node = &self.nodes[idx];
        let cumulative = base + node.delta_logit;
        out.push_str(&format!(
            "{}{{{}}}: {}{} = {}(p = {})\n",
            prefix,
            node.tree_id,
            if node.delta_logit > 0.0 { "+" } else { "" },
            node.delta_logit,
            cumulative,
            sigmoid(cumulative)
        ));

        for branch in &node.branches {
            out.push_str(&format!("{}+   feature #{}", prefix, branch.feature_id));
            if let Some(name) = dict.and_then(|d| d.get(&branch.feature_id)) {
                out.push_str(&format!(" [{}]", name));
            }
            out.push('\n');

            let child_prefix = format!("{}+   >   ", prefix);
            if let Some(child) = branch.yes {
                out.push_str(&format!("{}  yes =>\n", prefix));
                self.render_node(child, &child_prefix, dict, cumulative, out);
            }
            if let Some(child) = branch.no {
                out.push_str(&format!("{}  no =>\n", prefix));
                self.render_node(child, &child_prefix, dict, cumulative, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{BoolLabel, Row};
    use std::sync::Arc;

    /// root {1, 0.5}: branch on 7 -> yes leaf {2, +1.0}, no leaf {3, -1.0}.
    pub(crate) fn stump() -> DecisionTree {
        let nodes = vec![
            TreeNode {
                tree_id: 2,
                delta_logit: 1.0,
                branches: Vec::new(),
            },
            TreeNode {
                tree_id: 3,
                delta_logit: -1.0,
                branches: Vec::new(),
            },
            TreeNode {
                tree_id: 1,
                delta_logit: 0.5,
                branches: vec![TreeBranch {
                    feature_id: 7,
                    yes: Some(0),
                    no: Some(1),
                }],
            },
        ];
        DecisionTree::from_arena(nodes, 2)
    }

    fn features(ids: &[u32]) -> FeatureVec {
        FeatureVec::from_sorted(ids.iter().map(|&id| (id, 1)).collect())
    }

    #[test]
    fn prediction_is_the_path_sum() {
        let tree = stump();
        assert_eq!(tree.predict(&features(&[7])), 1.5);
        assert_eq!(tree.predict(&features(&[])), -0.5);
        assert_eq!(tree.predict(&features(&[3, 7, 9])), 1.5);
    }

    #[test]
    fn multinode_branches_sum_independently() {
        // One node with two branches evaluated and summed independently.
        let nodes = vec![
            TreeNode {
                tree_id: 2,
                delta_logit: 1.0,
                branches: Vec::new(),
            },
            TreeNode {
                tree_id: 3,
                delta_logit: 0.25,
                branches: Vec::new(),
            },
            TreeNode {
                tree_id: 1,
                delta_logit: 0.0,
                branches: vec![
                    TreeBranch {
                        feature_id: 1,
                        yes: Some(0),
                        no: None,
                    },
                    TreeBranch {
                        feature_id: 2,
                        yes: Some(1),
                        no: None,
                    },
                ],
            },
        ];
        let tree = DecisionTree::from_arena(nodes, 2);
        assert_eq!(tree.predict(&features(&[1, 2])), 1.25);
        assert_eq!(tree.predict(&features(&[1])), 1.0);
        assert_eq!(tree.predict(&features(&[2])), 0.25);
        assert_eq!(tree.predict(&features(&[])), 0.0);
    }

    #[test]
    fn node_count_walks_the_tree() {
        assert_eq!(stump().node_count(), 3);
        assert_eq!(DecisionTree::leaf(1, 0.0).node_count(), 1);
    }

    #[test]
    fn copy_is_deep_and_identical() {
        let tree = stump();
        let copy = tree.clone();
        assert_eq!(copy, tree);
        assert_eq!(copy.predict(&features(&[7])), tree.predict(&features(&[7])));
    }

    #[test]
    fn filter_prunes_thin_branches() {
        let tree = stump();

        // Every row has feature 7: the no side covers nothing.
        let mut svm: Dataset<BoolLabel> = Dataset::new();
        for _ in 0..10 {
            svm.add_row(
                Arc::new(Row::new(features(&[7]))),
                BoolLabel::new(true),
            );
        }

        let filtered = tree.filter(0.05, &svm);
        assert_eq!(filtered.node_count(), 2);
        let root = filtered.node(filtered.root());
        assert_eq!(root.branches.len(), 1);
        assert!(root.branches[0].yes.is_some());
        assert!(root.branches[0].no.is_none());

        // A zero threshold keeps everything.
        let kept = tree.filter(0.0, &svm);
        assert_eq!(kept.node_count(), 3);
    }

    #[test]
    fn rendering_shows_features_and_probabilities() {
        let tree = stump();
        let mut dict = HashMap::new();
        dict.insert(7u32, "clicked".to_string());
        let text = tree.to_string("| ", Some(&dict), 0.0);
        assert!(text.contains("| {1}: +0.5"));
        assert!(text.contains("feature #7 [clicked]"));
        assert!(text.contains("yes =>"));
        assert!(text.contains("p = "));
    }
}
