use crate::elements::{sorting_settings, validate_elements};
use crate::error::{ProcessError, Result};
use pivot_protocol::{
    CellContent, DataBarsPayload, DataPayload, Datatype, HeadersPayload, MessageBody,
    MetadataPayload, PanelType, SortingSettingsItem,
};
use pivot_tree::{cell_key, CellMetadata, MeasureBounds, NodeId, PivotTreeModel, TreeArena, UserType};

/// Position key of the single synthetic grand-total row.
pub const GRAND_TOTAL_POSITION: &str = "grandTotal";

/// What one applied chunk did to the session. `error` and `finish` markers
/// are settled by the session driver and pass through as [`ChunkOutcome::Terminal`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Headers { settings: Vec<SortingSettingsItem> },
    Metadata { settings: Vec<SortingSettingsItem> },
    Data { rows_added: usize },
    Grand { rows_added: usize },
    DataFinish,
    TotalRows(u64),
    DataBars,
    RangeMinMax,
    Terminal,
}

/// Converts typed chunk bodies into tree-model mutations, one session at a
/// time. Holds the per-session metadata the walks need: measure titles and
/// the latest sorting-settings descriptors.
#[derive(Debug, Default)]
pub struct ResponseProcessor {
    measure_titles: Vec<String>,
    settings: Vec<SortingSettingsItem>,
}

impl ResponseProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn measure_count(&self) -> usize {
        self.measure_titles.len()
    }

    pub fn sorting_settings(&self) -> &[SortingSettingsItem] {
        &self.settings
    }

    /// Applies one chunk body, in arrival order. Striping and margin
    /// recomputation run once per chunk, never per node.
    pub fn apply(&mut self, model: &mut PivotTreeModel, body: &MessageBody) -> Result<ChunkOutcome> {
        match body {
            MessageBody::Headers(payload) => self.apply_headers(model, payload),
            MessageBody::Metadata(payload) => self.apply_metadata(payload),
            MessageBody::Data(payload) => self.apply_rows(model, payload, false),
            MessageBody::Grand(payload) => self.apply_rows(model, payload, true),
            MessageBody::DataFinish => Ok(ChunkOutcome::DataFinish),
            MessageBody::TotalRows(payload) => {
                model.set_total_rows(payload.total_rows);
                Ok(ChunkOutcome::TotalRows(payload.total_rows))
            }
            MessageBody::DataBars(payload) => apply_data_bars(model, payload),
            MessageBody::RangeMinMax(payload) => {
                model.set_measure_bounds(
                    payload
                        .ranges
                        .iter()
                        .map(|r| MeasureBounds {
                            measure_index: r.measure_index,
                            min: r.min,
                            max: r.max,
                        })
                        .collect(),
                );
                Ok(ChunkOutcome::RangeMinMax)
            }
            MessageBody::Error(_) | MessageBody::Finish => Ok(ChunkOutcome::Terminal),
        }
    }

    fn apply_headers(
        &mut self,
        model: &mut PivotTreeModel,
        payload: &HeadersPayload,
    ) -> Result<ChunkOutcome> {
        let mut settings = Vec::new();
        for panel in &payload.panels {
            match panel.name {
                PanelType::Rows => {
                    // Row-dimension captions become the corner cells above
                    // the row headers, in panel order.
                    for item in &panel.items {
                        let existed = model.corner.contains(&item.title);
                        let id = model.corner.create_node(&item.title, 0);
                        if !existed {
                            if let Some(node) = model.corner.node_mut(id) {
                                node.user_type = Some(UserType::Corner);
                                node.content = Some(item.title.clone());
                            }
                        }
                    }
                }
                PanelType::Measures => {
                    self.measure_titles = panel.items.iter().map(|i| i.title.clone()).collect();
                }
                PanelType::Columns | PanelType::Scope => {}
            }

            if panel.name != PanelType::Scope {
                for item in &panel.items {
                    settings.push(SortingSettingsItem {
                        title: item.title.clone(),
                        datatype: item.datatype.unwrap_or(Datatype::Text),
                        selected: item.sort.is_some(),
                        direction: item.sort,
                    });
                }
            }
        }
        self.settings = settings.clone();
        log::debug!(
            "processed headers: {} panels, {} measures",
            payload.panels.len(),
            self.measure_titles.len()
        );
        Ok(ChunkOutcome::Headers { settings })
    }

    fn apply_metadata(&mut self, payload: &MetadataPayload) -> Result<ChunkOutcome> {
        validate_elements(&payload.elements)?;

        let measures: Vec<String> = payload
            .elements
            .iter()
            .filter(|e| e.is_measure())
            .map(|e| e.title_or_dim())
            .collect();
        if !measures.is_empty() {
            self.measure_titles = measures;
        }

        let settings = sorting_settings(&payload.elements);
        if !settings.is_empty() {
            self.settings = settings.clone();
        }
        Ok(ChunkOutcome::Metadata { settings })
    }

    fn apply_rows(
        &mut self,
        model: &mut PivotTreeModel,
        payload: &DataPayload,
        grand: bool,
    ) -> Result<ChunkOutcome> {
        let mut new_row_nodes: Vec<NodeId> = Vec::new();
        let mut new_column_nodes: Vec<NodeId> = Vec::new();

        for row in &payload.rows {
            let row_id = if grand {
                ensure_grand_row(model, &row.row_path, &mut new_row_nodes)?
            } else {
                walk_path(&mut model.rows, &row.row_path, &mut new_row_nodes)?
            };

            for column in &row.columns {
                let anchor = if column.column_path.is_empty() {
                    None
                } else {
                    Some(walk_path(
                        &mut model.columns,
                        &column.column_path,
                        &mut new_column_nodes,
                    )?)
                };

                for (measure_index, value) in column.values.iter().enumerate() {
                    let target =
                        self.measure_node(model, anchor, measure_index, &mut new_column_nodes)?;
                    model.set_cell(
                        cell_key(row_id, target, measure_index),
                        CellMetadata {
                            value: value.value.clone(),
                            content: value.content.clone(),
                            bar_ratio: None,
                        },
                    );
                }
            }
        }

        let rows_added = new_row_nodes.len();

        // Totals carry their own styling; only plain leaves are striped.
        let stripe_rows: Vec<NodeId> = new_row_nodes
            .into_iter()
            .filter(|id| model.rows.node(*id).map(|n| !n.is_total()).unwrap_or(false))
            .collect();
        model.stripe_new_row_leaves(&stripe_rows);

        // A new column anchor may have grown measure children in this same
        // chunk; the striping targets are whatever is last-level now.
        let mut stripe_columns: Vec<NodeId> = Vec::new();
        for id in &new_column_nodes {
            if let Some(node) = model.columns.node(*id) {
                if node.children.is_empty() {
                    stripe_columns.push(*id);
                } else {
                    stripe_columns.extend(node.children.iter().copied());
                }
            }
        }
        model.stripe_new_column_leaves(&stripe_columns);

        model.rows.update_main_cell_margins();
        model.columns.update_main_cell_margins();

        if grand {
            Ok(ChunkOutcome::Grand { rows_added })
        } else {
            Ok(ChunkOutcome::Data { rows_added })
        }
    }

    /// Resolves the column-tree node a cell value belongs to: a measure
    /// node under the column anchor, a measure root when the query has no
    /// column dimensions, or the anchor itself for a single implicit
    /// measure.
    fn measure_node(
        &self,
        model: &mut PivotTreeModel,
        anchor: Option<NodeId>,
        measure_index: usize,
        new_nodes: &mut Vec<NodeId>,
    ) -> Result<NodeId> {
        match anchor {
            None => {
                let position = format!("measure;{measure_index}");
                let existed = model.columns.contains(&position);
                let id = model.columns.create_node(&position, 0);
                if !existed {
                    if let Some(node) = model.columns.node_mut(id) {
                        node.user_type = Some(UserType::MeasureTop);
                        node.content = Some(
                            self.measure_titles
                                .get(measure_index)
                                .cloned()
                                .unwrap_or_else(|| format!("measure {measure_index}")),
                        );
                    }
                    new_nodes.push(id);
                }
                Ok(id)
            }
            Some(anchor_id) => {
                if self.measure_titles.len() <= 1 {
                    return Ok(anchor_id);
                }
                let (anchor_position, level) = model
                    .columns
                    .node(anchor_id)
                    .map(|n| (n.position.clone(), n.level + 1))
                    .ok_or(pivot_tree::TreeError::NodeNotFound(anchor_id))?;
                let position = format!("{anchor_position};measure;{measure_index}");
                let existed = model.columns.contains(&position);
                let id = model.columns.create_node(&position, level);
                if !existed {
                    model.columns.attach_child(anchor_id, id)?;
                    if let Some(node) = model.columns.node_mut(id) {
                        node.user_type = Some(UserType::MeasureBottom);
                        node.content = self.measure_titles.get(measure_index).cloned();
                    }
                    // Striping picks these up through the anchor, which is
                    // always created in the same chunk.
                }
                Ok(id)
            }
        }
    }
}

/// Walks one dimension path, creating missing nodes and attaching them in
/// arrival order. Returns the deepest node, which is the cell anchor for
/// the walked row/column.
fn walk_path(
    arena: &mut TreeArena,
    path: &[CellContent],
    new_nodes: &mut Vec<NodeId>,
) -> Result<NodeId> {
    if path.is_empty() {
        return Err(ProcessError::MalformedChunk("empty dimension path".into()));
    }
    if path[..path.len() - 1].iter().any(|entry| entry.subtotal) {
        return Err(ProcessError::MalformedChunk(
            "subtotal marker on a non-terminal path entry".into(),
        ));
    }

    let last = path.len() - 1;
    let mut position = String::new();
    let mut current: Option<NodeId> = None;

    for (level, entry) in path.iter().enumerate() {
        if entry.subtotal {
            let Some(group) = current else {
                return Err(ProcessError::MalformedChunk(
                    "subtotal row without a parent group".into(),
                ));
            };
            let total_position = format!("{position};total");
            let existed = arena.contains(&total_position);
            let id = arena.create_node(&total_position, level);
            if !existed {
                arena.attach_child(group, id)?;
                if let Some(node) = arena.node_mut(id) {
                    node.content = Some(entry.text());
                    node.value = Some(entry.value.clone());
                    node.user_type = Some(UserType::SubTotal);
                }
                new_nodes.push(id);
            }
            return Ok(id);
        }

        let text = entry.text();
        if position.is_empty() {
            position = text.clone();
        } else {
            position = format!("{position};{text}");
        }

        let existed = arena.contains(&position);
        let id = arena.create_node(&position, level);
        if !existed {
            if let Some(parent) = current {
                arena.attach_child(parent, id)?;
            }
            if let Some(node) = arena.node_mut(id) {
                node.content = Some(text);
                node.value = Some(entry.value.clone());
            }
            if level == last {
                new_nodes.push(id);
            }
        }
        current = Some(id);
    }

    current.ok_or_else(|| ProcessError::MalformedChunk("empty dimension path".into()))
}

/// Grand chunks always target the single synthetic grand-total row.
fn ensure_grand_row(
    model: &mut PivotTreeModel,
    row_path: &[CellContent],
    new_nodes: &mut Vec<NodeId>,
) -> Result<NodeId> {
    let existed = model.rows.contains(GRAND_TOTAL_POSITION);
    let id = model.rows.create_node(GRAND_TOTAL_POSITION, 0);
    if !existed {
        if let Some(node) = model.rows.node_mut(id) {
            node.user_type = Some(UserType::GrandTotal);
            node.content = Some(
                row_path
                    .last()
                    .map(|c| c.text())
                    .unwrap_or_else(|| "Grand Total".to_string()),
            );
        }
        new_nodes.push(id);
    }
    Ok(id)
}

fn apply_data_bars(model: &mut PivotTreeModel, payload: &DataBarsPayload) -> Result<ChunkOutcome> {
    let row_roots = model.rows.roots().to_vec();
    let row_leaves = model.rows.last_level_nodes(&row_roots);
    let column_roots = model.columns.roots().to_vec();
    let column_leaves = model.columns.last_level_nodes(&column_roots);

    for bar in &payload.bars {
        let (Some(&row), Some(&column)) = (row_leaves.get(bar.row), column_leaves.get(bar.column))
        else {
            log::debug!(
                "data bar entry out of range: row={} column={}",
                bar.row,
                bar.column
            );
            continue;
        };
        let key = cell_key(row, column, bar.measure_index);
        match model.cell_mut(&key) {
            Some(cell) => cell.bar_ratio = Some(bar.ratio),
            None => log::debug!("data bar entry for unknown cell {key}"),
        }
    }
    Ok(ChunkOutcome::DataBars)
}
