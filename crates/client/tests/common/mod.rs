#![allow(dead_code)]

use pivot_client::test_support::{channel_transport, ChannelConnector, ServerHarness};
use pivot_client::{new_query_guid, NoAuth, QueryClient};
use pivot_protocol::{
    CellContent, DataColumnChunk, DataPayload, DataRowChunk, Datatype, ErrorPayload, HeaderItem,
    HeaderPanel, HeadersPayload, JaqlElement, JaqlQuery, MessageBody, MessageEnvelope,
    MetadataPayload, PanelType, TotalRowsPayload,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn new_client() -> (Arc<QueryClient>, ServerHarness) {
    let (transport, harness) = channel_transport();
    let client = QueryClient::new(
        "http://sisense.local:8081",
        Arc::new(NoAuth),
        ChannelConnector::new(transport),
    )
    .expect("client construction");
    (Arc::new(client), harness)
}

pub fn new_builder(
    is_paginated: bool,
    elements_per_page: Option<u64>,
) -> (Arc<pivot_client::PivotDataBuilder>, ServerHarness) {
    let (transport, harness) = channel_transport();
    let client = QueryClient::new(
        "http://sisense.local:8081",
        Arc::new(NoAuth),
        ChannelConnector::new(transport),
    )
    .expect("client construction");
    let config = pivot_client::PivotConfig {
        name: "Sample ECommerce".into(),
        metadata: sample_elements(),
        is_paginated,
        elements_per_page,
        use_cache: false,
    };
    let builder = pivot_client::PivotDataBuilder::new(config, client).expect("builder");
    (Arc::new(builder), harness)
}

pub fn entry(text: &str) -> CellContent {
    CellContent {
        value: json!(text),
        content: None,
        subtotal: false,
    }
}

pub fn number(value: f64) -> CellContent {
    CellContent {
        value: json!(value),
        content: Some(format!("{value}")),
        subtotal: false,
    }
}

/// Two dimensions (Country rows, Year columns) plus one Revenue measure.
pub fn headers_body() -> MessageBody {
    MessageBody::Headers(HeadersPayload {
        panels: vec![
            HeaderPanel {
                name: PanelType::Rows,
                items: vec![HeaderItem {
                    title: "Country".into(),
                    datatype: Some(Datatype::Text),
                    sort: None,
                }],
            },
            HeaderPanel {
                name: PanelType::Columns,
                items: vec![HeaderItem {
                    title: "Year".into(),
                    datatype: Some(Datatype::Datetime),
                    sort: None,
                }],
            },
            HeaderPanel {
                name: PanelType::Measures,
                items: vec![HeaderItem {
                    title: "Revenue".into(),
                    datatype: Some(Datatype::Numeric),
                    sort: None,
                }],
            },
        ],
    })
}

pub fn sample_elements() -> Vec<JaqlElement> {
    vec![
        JaqlElement {
            title: Some("Country".into()),
            dim: Some("[Country.Country]".into()),
            panel: Some(PanelType::Rows),
            ..Default::default()
        },
        JaqlElement {
            title: Some("Year".into()),
            dim: Some("[Commerce.Date]".into()),
            datatype: Some(Datatype::Datetime),
            panel: Some(PanelType::Columns),
            level: Some("Years".into()),
            ..Default::default()
        },
        JaqlElement {
            title: Some("Revenue".into()),
            dim: Some("[Commerce.Revenue]".into()),
            agg: Some("sum".into()),
            datatype: Some(Datatype::Numeric),
            ..Default::default()
        },
    ]
}

pub fn metadata_body() -> MessageBody {
    MessageBody::Metadata(MetadataPayload {
        elements: sample_elements(),
    })
}

/// One data chunk of `(country, year, revenue)` rows.
pub fn data_body(rows: &[(&str, &str, f64)]) -> MessageBody {
    MessageBody::Data(DataPayload {
        rows: rows
            .iter()
            .map(|(country, year, revenue)| DataRowChunk {
                row_path: vec![entry(country)],
                columns: vec![DataColumnChunk {
                    column_path: vec![entry(year)],
                    values: vec![number(*revenue)],
                }],
            })
            .collect(),
    })
}

pub fn total_rows_body(total: u64) -> MessageBody {
    MessageBody::TotalRows(TotalRowsPayload { total_rows: total })
}

pub fn error_body(details: &str, database: &str) -> MessageBody {
    MessageBody::Error(ErrorPayload {
        error: true,
        details: details.into(),
        kind: "database".into(),
        error_source: "query".into(),
        http_status_code: 403,
        database: database.into(),
    })
}

pub fn envelope(query_guid: &str, body: MessageBody) -> Value {
    serde_json::to_value(MessageEnvelope::new(query_guid, body)).expect("serialize envelope")
}

/// Reads the next submit payload the client sent and returns its guid.
pub async fn submitted_guid(harness: &mut ServerHarness) -> String {
    let request = harness.requests.recv().await.expect("submit payload");
    request["jaql"]["queryGuid"]
        .as_str()
        .expect("queryGuid on submit")
        .to_string()
}

pub fn sample_jaql() -> JaqlQuery {
    JaqlQuery {
        datasource: "Sample ECommerce".into(),
        metadata: sample_elements(),
        count: None,
        offset: None,
        ungroup: None,
        query_guid: new_query_guid(),
        sort: None,
    }
}

/// Plays the server for one complete happy-path stream.
pub async fn respond_happy(harness: &mut ServerHarness, rows: &[(&str, &str, f64)]) -> String {
    let guid = submitted_guid(harness).await;
    for body in [
        headers_body(),
        metadata_body(),
        data_body(rows),
        MessageBody::DataFinish,
        total_rows_body(rows.len() as u64),
        MessageBody::Finish,
    ] {
        harness
            .chunks
            .send(envelope(&guid, body))
            .await
            .expect("send chunk");
    }
    guid
}
