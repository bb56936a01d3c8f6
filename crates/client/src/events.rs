use pivot_protocol::{MessageType, SortingSettingsItem};

/// Lifecycle notifications consumed by the rendering layer.
///
/// Tree snapshots travel on the operation's return value
/// ([`crate::QueryResultData`] / [`crate::AddMoreData`]); events signal when
/// to pick them up and what changed in between.
#[derive(Debug, Clone)]
pub enum PivotEvent {
    QueryStart {
        query_guid: String,
    },
    QueryEnd {
        query_guid: String,
    },
    ChunkLoaded {
        query_guid: String,
        kind: MessageType,
    },
    SortingSettingsChanged {
        settings: Vec<SortingSettingsItem>,
    },
    ElementChanged {
        title: String,
    },
    /// First full snapshot of a query is ready.
    Initialized {
        query_guid: String,
        is_last_page: bool,
    },
    /// A pagination request appended rows to the existing tree.
    MoreLoaded {
        query_guid: String,
        is_last_page: bool,
    },
}
