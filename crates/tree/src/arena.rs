use crate::error::{Result, TreeError};
use crate::types::{MetadataType, NodeId, TreeNode};
use std::collections::HashMap;

/// Flat node storage for one axis of the pivot (rows, columns or corner).
///
/// Creation is idempotent over the position key; children keep arrival
/// order. Nodes are never removed individually; a new query replaces the
/// whole arena.
#[derive(Debug, Clone)]
pub struct TreeArena {
    metadata_type: MetadataType,
    nodes: Vec<TreeNode>,
    position_index: HashMap<String, NodeId>,
    roots: Vec<NodeId>,
}

impl TreeArena {
    pub fn new(metadata_type: MetadataType) -> Self {
        Self {
            metadata_type,
            nodes: Vec::new(),
            position_index: HashMap::new(),
            roots: Vec::new(),
        }
    }

    pub fn metadata_type(&self) -> MetadataType {
        self.metadata_type
    }

    /// Inserts a node at the given position, or returns the existing node's
    /// id when the position is already occupied.
    pub fn create_node(&mut self, position: &str, level: usize) -> NodeId {
        if let Some(&id) = self.position_index.get(position) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes
            .push(TreeNode::new(id, position.to_string(), level, self.metadata_type));
        self.position_index.insert(position.to_string(), id);
        if level == 0 {
            self.roots.push(id);
        }
        id
    }

    pub fn contains(&self, position: &str) -> bool {
        self.position_index.contains_key(position)
    }

    pub fn get(&self, position: &str) -> Option<NodeId> {
        self.position_index.get(position).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(id.index())
    }

    /// Appends `child` to `parent`, preserving arrival order. Re-attaching
    /// an already attached child is a no-op. Total nodes are leaves and
    /// refuse children.
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_node = self
            .nodes
            .get(parent.index())
            .ok_or(TreeError::NodeNotFound(parent))?;
        if parent_node.user_type.is_some() {
            return Err(TreeError::InvalidTreeOperation(format!(
                "node {:?} ({:?}) is a leaf and cannot receive children",
                parent, parent_node.user_type
            )));
        }

        let child_node = self
            .nodes
            .get(child.index())
            .ok_or(TreeError::NodeNotFound(child))?;
        if child_node.parent == Some(parent) {
            return Ok(());
        }
        if child_node.parent.is_some() {
            return Err(TreeError::InvalidTreeOperation(format!(
                "node {child:?} is already attached elsewhere"
            )));
        }

        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
        Ok(())
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter()
    }

    /// Returns, for the given slice of the tree, only the deepest (leaf)
    /// nodes, in order.
    pub fn last_level_nodes(&self, slice: &[NodeId]) -> Vec<NodeId> {
        let mut out = Vec::new();
        for &id in slice {
            self.collect_leaves(id, &mut out);
        }
        out
    }

    fn collect_leaves(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else { return };
        if node.children.is_empty() {
            out.push(id);
            return;
        }
        for &child in &node.children {
            self.collect_leaves(child, out);
        }
    }

    /// Recomputes merged-cell spans over the current child ordering.
    ///
    /// `master_span` becomes the count of last-level descendants; siblings
    /// that precede a total node are flagged `merged`. Pure over the current
    /// ordering; invoked once per chunk batch, not per node.
    pub fn update_main_cell_margins(&mut self) {
        let spans: Vec<usize> = (0..self.nodes.len())
            .map(|i| self.subtree_leaf_count(NodeId(i)))
            .collect();
        for (i, span) in spans.into_iter().enumerate() {
            self.nodes[i].master_span = span;
        }

        for i in 0..self.nodes.len() {
            let children = self.nodes[i].children.clone();
            let first_total = children
                .iter()
                .position(|c| self.nodes[c.index()].is_total());
            if let Some(pos) = first_total {
                for &sibling in &children[..pos] {
                    self.nodes[sibling.index()].merged = true;
                }
            }
        }
    }

    fn subtree_leaf_count(&self, id: NodeId) -> usize {
        let node = &self.nodes[id.index()];
        if node.children.is_empty() {
            1
        } else {
            node.children
                .iter()
                .map(|c| self.subtree_leaf_count(*c))
                .sum()
        }
    }
}
