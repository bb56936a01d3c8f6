//! # Pivot Processor
//!
//! Converts raw chunk payloads into tree-model mutations.
//!
//! One [`ResponseProcessor`] lives for the duration of a query session. It
//! receives each typed chunk body in arrival order and applies it to the
//! session's [`pivot_tree::PivotTreeModel`]: header scaffolding, element
//! classification, row/column walks with idempotent node creation, cell
//! writes, per-chunk striping and margin recomputation. JAQL shapes the
//! engine cannot translate fail the session with a localized message
//! instead of degrading silently.

mod elements;
mod error;
mod messages;
mod response;

pub use elements::{
    default_direction, element_panel, resolve_datatype, sorting_settings, validate_elements,
};
pub use error::{ProcessError, Result};
pub use messages::localized;
pub use response::{ChunkOutcome, ResponseProcessor, GRAND_TOTAL_POSITION};
