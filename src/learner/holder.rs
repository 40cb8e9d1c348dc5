//! Training-time mirror of a decision tree.
//!
//! Every node carries the per-bag partition of the working dataset it
//! covers, so re-evaluating a candidate split never re-partitions from the
//! root. The holder is converted into a plain arena tree when training
//! completes.

use crate::dataset::{Dataset, PredictedLabel};
use crate::learner::context::BagHolder;
use crate::model::{DecisionTree, NodeIdx, TreeBranch, TreeNode};

#[derive(Debug, Clone)]
pub(crate) struct HolderBranch {
    pub feature_id: u32,
    pub yes: Option<Box<HolderNode>>,
    pub no: Option<Box<HolderNode>>,
}

#[derive(Debug, Clone)]
pub(crate) struct HolderNode {
    pub node_id: u64,
    pub delta: f64,
    /// A leaf with no positive-gain candidate left; skipped by later rounds.
    pub frozen: bool,
    pub branches: Vec<HolderBranch>,
    /// Working dataset per bag, index-aligned with the context's bags.
    pub parts: Vec<Dataset<PredictedLabel>>,
}

impl HolderNode {
    pub fn new_leaf(node_id: u64, delta: f64, parts: Vec<Dataset<PredictedLabel>>) -> Self {
        Self {
            node_id,
            delta,
            frozen: false,
            branches: Vec::new(),
            parts,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.branches.is_empty()
    }

    /// Mirrors a base tree node, partitioning the working sets through every
    /// branch with the bag feature indexes. Node ids are stamped fresh from
    /// `next_node_id`.
    pub fn from_tree(
        tree: &DecisionTree,
        at: NodeIdx,
        parts: Vec<Dataset<PredictedLabel>>,
        bags: &[BagHolder],
        next_node_id: &mut u64,
    ) -> Self {
        let source = tree.node(at);
        let node_id = *next_node_id;
        *next_node_id += 1;

        let mut branches = Vec::with_capacity(source.branches.len());
        for branch in &source.branches {
            let (yes_parts, no_parts) = partition_parts(&parts, branch.feature_id, bags);
            let yes = branch.yes.map(|child| {
                Box::new(Self::from_tree(tree, child, yes_parts.clone(), bags, next_node_id))
            });
            let no = branch.no.map(|child| {
                Box::new(Self::from_tree(tree, child, no_parts.clone(), bags, next_node_id))
            });
            branches.push(HolderBranch {
                feature_id: branch.feature_id,
                yes,
                no,
            });
        }

        Self {
            node_id,
            delta: source.delta_logit,
            frozen: false,
            branches,
            parts,
        }
    }

    /// Converts the holder into a plain tree, dropping working sets.
    pub fn to_tree(&self) -> DecisionTree {
        let mut nodes = Vec::new();
        let root = self.push_into(&mut nodes);
        DecisionTree::from_arena(nodes, root)
    }

    fn push_into(&self, nodes: &mut Vec<TreeNode>) -> NodeIdx {
        let branches = self
            .branches
            .iter()
            .map(|branch| TreeBranch {
                feature_id: branch.feature_id,
                yes: branch.yes.as_ref().map(|child| child.push_into(nodes)),
                no: branch.no.as_ref().map(|child| child.push_into(nodes)),
            })
            .collect();

        nodes.push(TreeNode {
            tree_id: self.node_id,
            delta_logit: self.delta,
            branches,
        });
        nodes.len() - 1
    }
}

/// Splits every bag's working set by a feature, using the bag's index for
/// the "yes" side and pointer-identity difference for the "no" side.
pub(crate) fn partition_parts(
    parts: &[Dataset<PredictedLabel>],
    feature_id: u32,
    bags: &[BagHolder],
) -> (Vec<Dataset<PredictedLabel>>, Vec<Dataset<PredictedLabel>>) {
    let mut yes_parts = Vec::with_capacity(parts.len());
    let mut no_parts = Vec::with_capacity(parts.len());

    for (part, bag) in parts.iter().zip(bags) {
        match bag.index.rows_with(feature_id) {
            Some(feature_rows) => {
                let (yes, no) = Dataset::cross(part, feature_rows);
                yes_parts.push(yes);
                no_parts.push(no);
            }
            None => {
                yes_parts.push(Dataset::new());
                no_parts.push(part.clone());
            }
        }
    }

    (yes_parts, no_parts)
}
