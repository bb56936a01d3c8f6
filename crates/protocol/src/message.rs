use crate::jaql::{Datatype, JaqlElement, PanelType, SortDirection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kinds of messages a query response stream may contain.
///
/// Canonical order within one stream:
/// `headers → grand → metadata → data* → dataFinish → totalRows → dataBars →
/// rangeMinMax → finish`, with `data` repeating once per chunk. `error`
/// terminates the stream wherever it appears; `finish` is the only
/// terminal-success marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    Error,
    Headers,
    Grand,
    Metadata,
    Data,
    DataFinish,
    TotalRows,
    DataBars,
    RangeMinMax,
    Finish,
}

/// One message of the response stream: the kind tag plus its payload.
///
/// Wire shape is `{ "type": <kind>, "payload": <kind-specific> }`; kinds
/// without a payload (`dataFinish`, `finish`) omit the `payload` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum MessageBody {
    Error(ErrorPayload),
    Headers(HeadersPayload),
    Grand(DataPayload),
    Metadata(MetadataPayload),
    Data(DataPayload),
    DataFinish,
    TotalRows(TotalRowsPayload),
    DataBars(DataBarsPayload),
    RangeMinMax(RangeMinMaxPayload),
    Finish,
}

impl MessageBody {
    pub fn kind(&self) -> MessageType {
        match self {
            MessageBody::Error(_) => MessageType::Error,
            MessageBody::Headers(_) => MessageType::Headers,
            MessageBody::Grand(_) => MessageType::Grand,
            MessageBody::Metadata(_) => MessageType::Metadata,
            MessageBody::Data(_) => MessageType::Data,
            MessageBody::DataFinish => MessageType::DataFinish,
            MessageBody::TotalRows(_) => MessageType::TotalRows,
            MessageBody::DataBars(_) => MessageType::DataBars,
            MessageBody::RangeMinMax(_) => MessageType::RangeMinMax,
            MessageBody::Finish => MessageType::Finish,
        }
    }
}

/// Transport envelope for one chunk:
/// `{ "type": …, "queryGuid": …, "payload": … }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(rename = "queryGuid")]
    pub query_guid: String,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl MessageEnvelope {
    pub fn new(query_guid: impl Into<String>, body: MessageBody) -> Self {
        Self {
            query_guid: query_guid.into(),
            body,
        }
    }
}

/// Server-reported failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error: bool,
    pub details: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub error_source: String,
    pub http_status_code: u16,
    pub database: String,
}

/// Header scaffolding: one entry per panel of the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadersPayload {
    pub panels: Vec<HeaderPanel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderPanel {
    pub name: PanelType,
    pub items: Vec<HeaderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<Datatype>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortDirection>,
}

/// Echo of the query's JAQL elements, used for element classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataPayload {
    pub elements: Vec<JaqlElement>,
}

/// One chunk of result rows. Shared by `data` and `grand` messages; a grand
/// chunk carries the synthetic grand-total row(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    pub rows: Vec<DataRowChunk>,
}

/// One result row: its row-dimension path plus the cells grouped by
/// column-dimension path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRowChunk {
    pub row_path: Vec<CellContent>,
    pub columns: Vec<DataColumnChunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataColumnChunk {
    pub column_path: Vec<CellContent>,
    /// One value per measure of the query, in measure order.
    pub values: Vec<CellContent>,
}

/// Raw plus formatted content of one header or data cell.
///
/// A path entry with `subtotal` set marks an aggregate row/column attached
/// under the node addressed by the path so far; subtotal nodes are leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellContent {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub subtotal: bool,
}

impl CellContent {
    pub fn text(&self) -> String {
        match (&self.content, &self.value) {
            (Some(content), _) => content.clone(),
            (None, Value::String(s)) => s.clone(),
            (None, other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalRowsPayload {
    pub total_rows: u64,
}

/// Per-cell bar ratios, addressed by (row-leaf ordinal, column-leaf ordinal,
/// measure index) in last-level order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBarsPayload {
    pub bars: Vec<DataBarEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataBarEntry {
    pub row: usize,
    pub column: usize,
    pub measure_index: usize,
    pub ratio: f64,
}

/// Per-measure value bounds over the full (unchunked) result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeMinMaxPayload {
    pub ranges: Vec<MeasureRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureRange {
    pub measure_index: usize,
    pub min: f64,
    pub max: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn envelope_round_trips_through_wire_shape() {
        let envelope = MessageEnvelope::new(
            "g-1",
            MessageBody::TotalRows(TotalRowsPayload { total_rows: 420 }),
        );

        let wire = serde_json::to_value(&envelope).expect("serialize envelope");
        assert_eq!(
            wire,
            json!({ "type": "totalRows", "queryGuid": "g-1", "payload": { "totalRows": 420 } })
        );

        let back: MessageEnvelope = serde_json::from_value(wire).expect("deserialize envelope");
        assert_eq!(back, envelope);
    }

    #[test]
    fn unit_kinds_omit_payload() {
        let wire = serde_json::to_value(MessageEnvelope::new("g-2", MessageBody::Finish))
            .expect("serialize finish");
        assert_eq!(wire, json!({ "type": "finish", "queryGuid": "g-2" }));

        let back: MessageEnvelope =
            serde_json::from_value(json!({ "type": "dataFinish", "queryGuid": "g-2" }))
                .expect("deserialize dataFinish");
        assert_eq!(back.body, MessageBody::DataFinish);
    }

    #[test]
    fn error_payload_uses_wire_field_names() {
        let wire = json!({
            "type": "error",
            "queryGuid": "g-3",
            "payload": {
                "error": true,
                "details": "Current user is not authorized",
                "type": "database",
                "errorSource": "query",
                "httpStatusCode": 403,
                "database": "Sample ECommerce"
            }
        });

        let envelope: MessageEnvelope = serde_json::from_value(wire).expect("deserialize error");
        match envelope.body {
            MessageBody::Error(payload) => {
                assert_eq!(payload.details, "Current user is not authorized");
                assert_eq!(payload.database, "Sample ECommerce");
                assert_eq!(payload.http_status_code, 403);
            }
            other => panic!("expected error body, got {other:?}"),
        }
    }

    #[test]
    fn cell_content_prefers_formatted_text() {
        let formatted = CellContent {
            value: json!(1234.5),
            content: Some("1,234.50".into()),
            subtotal: false,
        };
        assert_eq!(formatted.text(), "1,234.50");

        let raw = CellContent {
            value: json!("Germany"),
            content: None,
            subtotal: false,
        };
        assert_eq!(raw.text(), "Germany");
    }
}
