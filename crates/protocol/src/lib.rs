//! # Pivot Protocol
//!
//! Wire-level contract for one pivot query's response stream.
//!
//! A query is submitted as a [`JaqlQuery`] payload and answered by an ordered
//! sequence of chunked messages, each wrapped in a [`MessageEnvelope`]. The
//! set of message kinds is closed ([`MessageType`]) and each kind carries its
//! own payload shape ([`MessageBody`] is a tagged union, matched
//! exhaustively by consumers). [`StreamOrder`] enforces the relative order in
//! which kinds are permitted to appear within a single stream.

mod jaql;
mod message;
mod order;

pub use jaql::{
    Datatype, JaqlElement, JaqlQuery, PanelType, SortDirection, SortingSettingsItem,
};
pub use message::{
    CellContent, DataBarEntry, DataBarsPayload, DataColumnChunk, DataPayload, DataRowChunk,
    ErrorPayload, HeaderItem, HeaderPanel, HeadersPayload, MeasureRange, MessageBody,
    MessageEnvelope, MessageType, MetadataPayload, RangeMinMaxPayload, TotalRowsPayload,
};
pub use order::{OrderCheck, ProtocolError, StreamOrder};
