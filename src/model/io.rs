//! Plain-text save/load for trees and predictor sets.
//!
//! A `dtree` block is one node per line, root first, each line
//! `tree_id<TAB>delta_logit<TAB>branches` with branches as `|`-separated
//! `feature_id:yes_tree_id:no_tree_id` tuples and `0` meaning "no subtree
//! on that side". A `union-sum` file holds a count line followed by that
//! many `dtree` blocks, each with its own header and terminated by a blank
//! line.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use crate::errors::ModelError;
use crate::model::dtree::{DecisionTree, NodeIdx, TreeBranch, TreeNode};
use crate::model::predictor_set::PredictorSet;
use crate::model::Predictor;

pub const DTREE_HEAD: &str = "dtree";
pub const UNION_SUM_HEAD: &str = "union-sum";
pub const UNION_HEAD: &str = "union";
/// Accepted by the format grammar but reserved: no writer emits it.
pub const UNION_AVG_HEAD: &str = "union-avg";

/// Line reader tracking 1-based positions for error reporting.
struct LineReader<R: BufRead> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> LineReader<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>, ModelError> {
        match self.lines.next() {
            None => Ok(None),
            Some(line) => {
                self.line_no += 1;
                Ok(Some(line?))
            }
        }
    }

    fn parse_err(&self, reason: impl Into<String>) -> ModelError {
        ModelError::Parse {
            line: self.line_no,
            reason: reason.into(),
        }
    }
}

impl DecisionTree {
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), ModelError> {
        writeln!(writer, "{}", DTREE_HEAD)?;
        self.save_nodes(self.root(), writer)
    }

    fn save_nodes<W: Write>(&self, idx: NodeIdx, writer: &mut W) -> Result<(), ModelError> {
        let node = self.node(idx);

        let mut line = format!("{}\t{:.7}\t", node.tree_id, node.delta_logit);
        for (i, branch) in node.branches.iter().enumerate() {
            if i > 0 {
                line.push('|');
            }
            line.push_str(&format!(
                "{}:{}:{}",
                branch.feature_id,
                branch.yes.map_or(0, |child| self.node(child).tree_id),
                branch.no.map_or(0, |child| self.node(child).tree_id),
            ));
        }
        writeln!(writer, "{}", line)?;

        for branch in &node.branches {
            if let Some(child) = branch.yes {
                self.save_nodes(child, writer)?;
            }
            if let Some(child) = branch.no {
                self.save_nodes(child, writer)?;
            }
        }
        Ok(())
    }

    pub fn load<R: BufRead>(reader: R) -> Result<Self, ModelError> {
        let mut lines = LineReader::new(reader);
        match lines.next_line()? {
            None => Err(ModelError::EmptyInput),
            Some(head) if head == DTREE_HEAD => load_tree_body(&mut lines),
            Some(head) => Err(ModelError::InvalidModelType(head)),
        }
    }
}

/// Parsed but not yet linked node line.
struct PendingNode {
    delta_logit: f64,
    branches: Vec<(u32, u64, u64)>,
}

/// Reads node lines until a blank line or EOF, then links children by id.
fn load_tree_body<R: BufRead>(lines: &mut LineReader<R>) -> Result<DecisionTree, ModelError> {
    let mut order: Vec<u64> = Vec::new();
    let mut pending: HashMap<u64, PendingNode> = HashMap::new();

    loop {
        let line = match lines.next_line()? {
            None => break,
            Some(line) => line,
        };
        if line.is_empty() {
            break;
        }

        let mut columns = line.splitn(3, '\t');
        let tree_id_str = columns.next().ok_or_else(|| lines.parse_err("no id"))?;
        let delta_str = columns
            .next()
            .ok_or_else(|| lines.parse_err("no 'delta logit'"))?;
        let branches_str = columns.next().unwrap_or("");

        let tree_id: u64 = tree_id_str
            .parse()
            .map_err(|_| lines.parse_err(format!("invalid tree id value: '{}'", tree_id_str)))?;
        if tree_id == 0 {
            return Err(lines.parse_err("tree id 0 is reserved for 'no subtree'"));
        }
        let delta_logit: f64 = delta_str
            .parse()
            .map_err(|_| lines.parse_err(format!("invalid delta logit value: '{}'", delta_str)))?;

        let mut branches = Vec::new();
        for tuple in branches_str.split('|').filter(|t| !t.is_empty()) {
            let mut parts = tuple.split(':');
            let feature_id: u32 = parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| lines.parse_err(format!("no 'feature id' in branch '{}'", tuple)))?;
            let yes_id: u64 = parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| lines.parse_err(format!("no 'yes tree id' in branch '{}'", tuple)))?;
            let no_id: u64 = parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| lines.parse_err(format!("no 'no tree id' in branch '{}'", tuple)))?;
            if parts.next().is_some() {
                return Err(lines.parse_err(format!("extra field in branch '{}'", tuple)));
            }
            branches.push((feature_id, yes_id, no_id));
        }

        // A repeated id keeps its first definition.
        if !pending.contains_key(&tree_id) {
            order.push(tree_id);
            pending.insert(
                tree_id,
                PendingNode {
                    delta_logit,
                    branches,
                },
            );
        }
    }

    if order.is_empty() {
        return Err(ModelError::EmptyInput);
    }

    // Stub every node, then link branches by id.
    let index_of: HashMap<u64, NodeIdx> =
        order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let resolve = |id: u64| -> Result<Option<NodeIdx>, ModelError> {
        if id == 0 {
            return Ok(None);
        }
        index_of
            .get(&id)
            .copied()
            .map(Some)
            .ok_or(ModelError::UnresolvedReference(id))
    };

    let mut nodes = Vec::with_capacity(order.len());
    for &tree_id in &order {
        let pending_node = &pending[&tree_id];
        let mut branches = Vec::with_capacity(pending_node.branches.len());
        for &(feature_id, yes_id, no_id) in &pending_node.branches {
            branches.push(TreeBranch {
                feature_id,
                yes: resolve(yes_id)?,
                no: resolve(no_id)?,
            });
        }
        nodes.push(TreeNode {
            tree_id,
            delta_logit: pending_node.delta_logit,
            branches,
        });
    }

    Ok(DecisionTree::from_arena(nodes, 0))
}

impl PredictorSet {
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), ModelError> {
        writeln!(writer, "{}", UNION_SUM_HEAD)?;
        writeln!(writer, "{}", self.trees().len())?;
        for tree in self.trees() {
            tree.save(writer)?;
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn load<R: BufRead>(reader: R) -> Result<Self, ModelError> {
        let mut lines = LineReader::new(reader);
        match lines.next_line()? {
            None => Err(ModelError::EmptyInput),
            Some(head) if head == UNION_SUM_HEAD || head == UNION_HEAD => {
                load_set_body(&mut lines)
            }
            Some(head) => Err(ModelError::InvalidModelType(head)),
        }
    }
}

fn load_set_body<R: BufRead>(lines: &mut LineReader<R>) -> Result<PredictorSet, ModelError> {
    let count_line = lines
        .next_line()?
        .ok_or_else(|| lines.parse_err("missing tree count"))?;
    let count: usize = count_line
        .parse()
        .map_err(|_| lines.parse_err(format!("invalid tree count: '{}'", count_line)))?;

    let mut trees = Vec::with_capacity(count);
    for _ in 0..count {
        let head = lines
            .next_line()?
            .ok_or_else(|| lines.parse_err("missing dtree block"))?;
        if head != DTREE_HEAD {
            return Err(ModelError::InvalidModelType(head));
        }
        trees.push(load_tree_body(lines)?);
    }

    Ok(PredictorSet::new(trees))
}

impl Predictor {
    /// Loads any model file, dispatching on its header line.
    pub fn load<R: BufRead>(reader: R) -> Result<Self, ModelError> {
        let mut lines = LineReader::new(reader);
        match lines.next_line()? {
            None => Err(ModelError::EmptyInput),
            Some(head) if head == DTREE_HEAD => {
                Ok(Predictor::Tree(load_tree_body(&mut lines)?))
            }
            Some(head) if head == UNION_SUM_HEAD || head == UNION_HEAD => {
                Ok(Predictor::Set(load_set_body(&mut lines)?))
            }
            Some(head) => Err(ModelError::InvalidModelType(head)),
        }
    }

    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), ModelError> {
        match self {
            Predictor::Tree(tree) => tree.save(writer),
            Predictor::Set(set) => set.save(writer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text() -> String {
        "dtree\n1\t0.5000000\t7:2:3\n2\t1.0000000\t\n3\t-1.0000000\t\n".to_string()
    }

    #[test]
    fn loads_and_links_a_tree() {
        let tree = DecisionTree::load(sample_text().as_bytes()).unwrap();
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.node(tree.root()).tree_id, 1);
        assert_eq!(tree.node(tree.root()).branches[0].feature_id, 7);
    }

    #[test]
    fn save_load_save_is_a_fixpoint() {
        let tree = DecisionTree::load(sample_text().as_bytes()).unwrap();
        let mut first = Vec::new();
        tree.save(&mut first).unwrap();
        let reloaded = DecisionTree::load(first.as_slice()).unwrap();
        let mut second = Vec::new();
        reloaded.save(&mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_unknown_headers() {
        let err = DecisionTree::load("forest\n1\t0.0\t\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ModelError::InvalidModelType(head) if head == "forest"));

        // union-avg is reserved: recognized by the grammar, refused by the
        // loader.
        let err = Predictor::load("union-avg\n0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ModelError::InvalidModelType(_)));
    }

    #[test]
    fn rejects_unresolved_children() {
        let err = DecisionTree::load("dtree\n1\t0.0000000\t7:2:0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ModelError::UnresolvedReference(2)));
    }

    #[test]
    fn rejects_malformed_nodes() {
        let err = DecisionTree::load("dtree\nx\t0.0\t\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ModelError::Parse { line: 2, .. }));

        let err = DecisionTree::load("dtree\n1\tzz\t\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ModelError::Parse { line: 2, .. }));

        let err = DecisionTree::load("dtree\n1\t0.0\t7:2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ModelError::Parse { .. }));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            DecisionTree::load("".as_bytes()).unwrap_err(),
            ModelError::EmptyInput
        ));
        assert!(matches!(
            DecisionTree::load("dtree\n".as_bytes()).unwrap_err(),
            ModelError::EmptyInput
        ));
    }

    #[test]
    fn union_round_trip() {
        let tree = DecisionTree::load(sample_text().as_bytes()).unwrap();
        let set = PredictorSet::new(vec![tree.clone(), tree]);

        let mut buf = Vec::new();
        set.save(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("union-sum\n2\ndtree\n"));

        let reloaded = PredictorSet::load(buf.as_slice()).unwrap();
        assert_eq!(reloaded.trees().len(), 2);

        let mut again = Vec::new();
        reloaded.save(&mut again).unwrap();
        assert_eq!(buf, again);
    }

    #[test]
    fn legacy_union_header_is_accepted() {
        let tree = DecisionTree::load(sample_text().as_bytes()).unwrap();
        let set = PredictorSet::new(vec![tree]);
        let mut buf = Vec::new();
        set.save(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap().replacen("union-sum", "union", 1);
        let reloaded = Predictor::load(text.as_bytes()).unwrap();
        assert!(matches!(reloaded, Predictor::Set(s) if s.trees().len() == 1));
    }
}
