use crate::arena::TreeArena;
use crate::stripe::DivergenceStriper;
use crate::types::{CellMetadata, MeasureBounds, MetadataType, NodeId};
use std::collections::HashMap;

/// All tree state owned by one query session: the rows, columns and corner
/// arenas, the cell-metadata store and the striping parity carried across
/// chunks.
///
/// A model is never shared between sessions: a new query gets a fresh
/// model, it does not patch the old one.
#[derive(Debug, Clone)]
pub struct PivotTreeModel {
    pub rows: TreeArena,
    pub columns: TreeArena,
    pub corner: TreeArena,
    cells: HashMap<String, CellMetadata>,
    row_striper: DivergenceStriper,
    column_striper: DivergenceStriper,
    total_rows: Option<u64>,
    measure_bounds: Vec<MeasureBounds>,
}

impl PivotTreeModel {
    pub fn new() -> Self {
        Self {
            rows: TreeArena::new(MetadataType::Rows),
            columns: TreeArena::new(MetadataType::Columns),
            corner: TreeArena::new(MetadataType::Scope),
            cells: HashMap::new(),
            row_striper: DivergenceStriper::new(),
            column_striper: DivergenceStriper::new(),
            total_rows: None,
            measure_bounds: Vec::new(),
        }
    }

    pub fn set_cell(&mut self, key: String, metadata: CellMetadata) {
        self.cells.insert(key, metadata);
    }

    pub fn cell(&self, key: &str) -> Option<&CellMetadata> {
        self.cells.get(key)
    }

    pub fn cell_mut(&mut self, key: &str) -> Option<&mut CellMetadata> {
        self.cells.get_mut(key)
    }

    pub fn cells(&self) -> &HashMap<String, CellMetadata> {
        &self.cells
    }

    /// Stripes newly arrived row leaves, carrying parity from the previous
    /// chunk. Call exactly once per chunk, in arrival order.
    pub fn stripe_new_row_leaves(&mut self, leaves: &[NodeId]) {
        self.row_striper.stripe(&mut self.rows, leaves);
    }

    pub fn stripe_new_column_leaves(&mut self, leaves: &[NodeId]) {
        self.column_striper.stripe(&mut self.columns, leaves);
    }

    pub fn set_total_rows(&mut self, total: u64) {
        self.total_rows = Some(total);
    }

    pub fn total_rows(&self) -> Option<u64> {
        self.total_rows
    }

    pub fn set_measure_bounds(&mut self, bounds: Vec<MeasureBounds>) {
        self.measure_bounds = bounds;
    }

    pub fn measure_bounds(&self) -> &[MeasureBounds] {
        &self.measure_bounds
    }

    /// Count of loaded data rows: last-level row nodes that are not totals.
    /// Drives the pagination offset and the last-page decision.
    pub fn loaded_data_rows(&self) -> u64 {
        let roots: Vec<NodeId> = self.rows.roots().to_vec();
        self.rows
            .last_level_nodes(&roots)
            .into_iter()
            .filter(|id| self.rows.node(*id).map(|n| !n.is_total()).unwrap_or(false))
            .count() as u64
    }

    /// Whether further pages exist, given what the stream reported.
    pub fn is_last_page(&self, is_paginated: bool) -> bool {
        if !is_paginated {
            return true;
        }
        match self.total_rows {
            Some(total) => self.loaded_data_rows() >= total,
            None => true,
        }
    }

    /// Marks every row branch with the current last-page flag.
    pub fn mark_rows_last_page(&mut self, is_last: bool) {
        let ids: Vec<NodeId> = (0..self.rows.len()).map(NodeId).collect();
        for id in ids {
            if let Some(node) = self.rows.node_mut(id) {
                node.is_last_page = is_last;
            }
        }
    }
}

impl Default for PivotTreeModel {
    fn default() -> Self {
        Self::new()
    }
}
