//! # Pivot Tree
//!
//! In-memory representation of pivot rows, columns and corner cells.
//!
//! Nodes live in an arena ([`TreeArena`]): a flat vector addressed by
//! [`NodeId`], with a position-key index for idempotent creation and parent
//! links stored as plain ids on the child (lookup only; the tree is owned
//! top-down and never freed through a parent pointer). One
//! [`PivotTreeModel`] bundles the three arenas of a query session together
//! with the cell-metadata store and the striping state carried across
//! incrementally appended chunks.

mod arena;
mod error;
mod model;
mod stripe;
mod types;

pub use arena::TreeArena;
pub use error::{Result, TreeError};
pub use model::PivotTreeModel;
pub use stripe::DivergenceStriper;
pub use types::{cell_key, CellMetadata, MeasureBounds, MetadataType, NodeId, TreeNode, UserType};
