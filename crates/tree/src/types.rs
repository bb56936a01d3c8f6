use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Index of a node inside its owning arena. Stable for the lifetime of the
/// query session that owns the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Which part of the pivot a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetadataType {
    Rows,
    Columns,
    Measures,
    Scope,
}

/// Special node roles. A node with any user type is a leaf: it never
/// receives children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserType {
    SubTotal,
    GrandTotal,
    MeasureTop,
    MeasureBottom,
    Corner,
}

/// One row, column or corner cell of the pivot tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: NodeId,
    /// Stable position key: the joined dimension path that created the node.
    pub position: String,
    pub level: usize,
    /// Back-reference for parent lookup only; the arena owns all nodes.
    pub parent: Option<NodeId>,
    /// Contiguous, ordered by arrival sequence.
    pub children: Vec<NodeId>,
    pub metadata_type: MetadataType,
    pub user_type: Option<UserType>,
    /// Alternating-shading flag, 0 or 1, assigned once per chunk in arrival
    /// order.
    pub index_divergence: u8,
    pub value: Option<Value>,
    pub content: Option<String>,
    /// Whether this branch has no further pages.
    pub is_last_page: bool,
    /// Number of last-level descendants this node's main cell spans.
    pub master_span: usize,
    /// Set on siblings preceding a total node: their cells merge visually
    /// into the parent's main cell.
    pub merged: bool,
}

impl TreeNode {
    pub(crate) fn new(id: NodeId, position: String, level: usize, metadata_type: MetadataType) -> Self {
        Self {
            id,
            position,
            level,
            parent: None,
            children: Vec::new(),
            metadata_type,
            user_type: None,
            index_divergence: 0,
            value: None,
            content: None,
            is_last_page: false,
            master_span: 1,
            merged: false,
        }
    }

    pub fn is_total(&self) -> bool {
        matches!(
            self.user_type,
            Some(UserType::SubTotal) | Some(UserType::GrandTotal)
        )
    }
}

/// Memoized metadata of one data cell, looked up by [`cell_key`]. Entries
/// are only removed wholesale, when the owning session's model is replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellMetadata {
    pub value: Value,
    pub content: Option<String>,
    /// Bar-chart fill ratio for the cell, when the stream supplied one.
    pub bar_ratio: Option<f64>,
}

/// Cache key for the cell at a (row node, column node, measure) coordinate.
pub fn cell_key(row: NodeId, column: NodeId, measure_index: usize) -> String {
    format!("{}:{}:{}", row.index(), column.index(), measure_index)
}

/// Value bounds of one measure over the full result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasureBounds {
    pub measure_index: usize,
    pub min: f64,
    pub max: f64,
}
