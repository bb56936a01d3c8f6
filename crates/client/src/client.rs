use crate::auth::Authenticator;
use crate::cache::QueryCache;
use crate::error::{LoadError, Result};
use crate::events::PivotEvent;
use crate::service::{AddMoreData, DataLoadService, QueryResultData};
use crate::transport::{SharedTransport, TransportConnector};
use pivot_protocol::JaqlQuery;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Socket-backed query client for one pivot view.
///
/// Holds exactly one lazily opened connection, reused across queries, and
/// enforces the at-most-one-in-flight rule through its
/// [`DataLoadService`]. A failed or cancelled session leaves the client
/// ready for the next query.
pub struct QueryClient {
    base_url: String,
    transport: Arc<SharedTransport>,
    service: DataLoadService,
    events: broadcast::Sender<PivotEvent>,
    cache: QueryCache,
}

impl QueryClient {
    pub fn new(
        base_url: &str,
        auth: Arc<dyn Authenticator>,
        connector: Arc<dyn TransportConnector>,
    ) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let transport = Arc::new(SharedTransport::new(
            connector,
            base_url.clone(),
            Arc::clone(&auth),
        ));
        let service = DataLoadService::new(Arc::clone(&transport), auth, events.clone());
        Ok(Self {
            base_url,
            transport,
            service,
            events,
            cache: QueryCache::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PivotEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: PivotEvent) {
        let _ = self.events.send(event);
    }

    /// Executes one query under the at-most-one-in-flight rule. With
    /// `use_cache`, an identical query body replays the cached snapshot
    /// without touching the transport.
    pub async fn query_data(
        &self,
        jaql: JaqlQuery,
        is_paginated: bool,
        elements_per_page: Option<u64>,
        use_cache: bool,
    ) -> Result<QueryResultData> {
        if use_cache {
            if let Some(hit) = self.cache.get(&jaql) {
                log::debug!("query cache hit for {}", jaql.query_guid);
                return Ok(hit);
            }
        }
        let result = self
            .service
            .load_init_data(jaql.clone(), is_paginated, elements_per_page, use_cache)
            .await?;
        if use_cache {
            self.cache.put(&jaql, result.clone());
        }
        Ok(result)
    }

    pub async fn add_more(&self, is_last_page: bool) -> Result<Option<AddMoreData>> {
        self.service.add_more(is_last_page).await
    }

    pub fn cancel(&self) {
        self.service.cancel();
    }

    pub fn active_state(&self) -> Option<crate::session::SessionState> {
        self.service.active_state()
    }

    pub async fn close(&self) {
        self.service.cancel();
        self.transport.close().await;
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LoadError::Config("base URL must not be empty".into()));
    }
    if trimmed.ends_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/"))
    }
}
