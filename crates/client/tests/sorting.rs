//! Sort-change resubmission: updating a sorting setting cancels the prior
//! session and starts a new one whose payload carries the new direction.

mod common;

use common::*;
use pivot_client::PivotEvent;
use pivot_protocol::MessageType;
use pretty_assertions::assert_eq;
use serde_json::json;

async fn wait_for_headers(events: &mut tokio::sync::broadcast::Receiver<PivotEvent>) {
    loop {
        if let PivotEvent::ChunkLoaded {
            kind: MessageType::Headers,
            ..
        } = events.recv().await.expect("event stream")
        {
            return;
        }
    }
}

#[tokio::test]
async fn update_sort_cancels_the_prior_session_and_resubmits_with_desc() {
    init_logging();
    let (builder, mut server) = new_builder(false, None);
    let mut events = builder.subscribe();

    let task_a = {
        let builder = builder.clone();
        tokio::spawn(async move { builder.load_init_data().await })
    };
    let guid_a = submitted_guid(&mut server).await;
    server
        .chunks
        .send(envelope(&guid_a, headers_body()))
        .await
        .unwrap();
    wait_for_headers(&mut events).await;

    // Select Country with no explicit direction: categories default to
    // descending.
    let task_b = {
        let builder = builder.clone();
        tokio::spawn(async move { builder.update_sort("Country", None).await })
    };

    let err_a = task_a.await.expect("join").expect_err("A must be cancelled");
    assert!(err_a.is_canceled());

    let request = server.requests.recv().await.expect("resubmission");
    assert_eq!(request["jaql"]["sort"][0]["title"], json!("Country"));
    assert_eq!(request["jaql"]["sort"][0]["direction"], json!("desc"));
    assert_eq!(request["jaql"]["sort"][0]["selected"], json!(true));

    let guid_b = request["jaql"]["queryGuid"].as_str().expect("guid").to_string();
    assert_ne!(guid_a, guid_b);
    for body in [
        headers_body(),
        data_body(&[("Germany", "2012", 10.0)]),
        pivot_protocol::MessageBody::Finish,
    ] {
        server.chunks.send(envelope(&guid_b, body)).await.unwrap();
    }
    let result = task_b.await.expect("join").expect("resubmitted query");
    assert!(result.rows.get("Germany").is_some());

    // The settings change was announced before the resubmission.
    let mut saw_settings_change = false;
    while let Ok(event) = events.try_recv() {
        if let PivotEvent::SortingSettingsChanged { settings } = event {
            if settings.iter().any(|s| s.title == "Country" && s.selected) {
                saw_settings_change = true;
            }
        }
    }
    assert!(saw_settings_change);
}

#[tokio::test]
async fn measures_default_to_ascending() {
    init_logging();
    let (builder, mut server) = new_builder(false, None);

    let task = {
        let builder = builder.clone();
        tokio::spawn(async move { builder.update_sort("Revenue", None).await })
    };

    let request = server.requests.recv().await.expect("submission");
    assert_eq!(request["jaql"]["sort"][0]["title"], json!("Revenue"));
    assert_eq!(request["jaql"]["sort"][0]["direction"], json!("asc"));

    let guid = request["jaql"]["queryGuid"].as_str().expect("guid").to_string();
    for body in [
        headers_body(),
        data_body(&[("Germany", "2012", 10.0)]),
        pivot_protocol::MessageBody::Finish,
    ] {
        server.chunks.send(envelope(&guid, body)).await.unwrap();
    }
    task.await.expect("join").expect("query result");
}

#[tokio::test]
async fn unknown_sort_titles_are_rejected() {
    init_logging();
    let (builder, _server) = new_builder(false, None);
    let err = builder
        .update_sort("NoSuchColumn", None)
        .await
        .expect_err("unknown element");
    assert!(err.to_string().contains("NoSuchColumn"));
}
