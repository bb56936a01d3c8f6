use crate::client::QueryClient;
use crate::error::{LoadError, Result};
use crate::events::PivotEvent;
use crate::service::{AddMoreData, QueryResultData};
use crate::session::new_query_guid;
use pivot_processor::{default_direction, sorting_settings};
use pivot_protocol::{JaqlElement, JaqlQuery, SortDirection, SortingSettingsItem};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Data-model-level configuration for one pivot view. `name` (the
/// datasource) and `metadata` (the panel elements) are required; missing
/// either fails construction, never query time.
#[derive(Debug, Clone, Default)]
pub struct PivotConfig {
    pub name: String,
    pub metadata: Vec<JaqlElement>,
    pub is_paginated: bool,
    pub elements_per_page: Option<u64>,
    pub use_cache: bool,
}

impl PivotConfig {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LoadError::Config(
                "data model config is missing required field `name`".into(),
            ));
        }
        if self.metadata.is_empty() {
            return Err(LoadError::Config(
                "data model config is missing required field `metadata`".into(),
            ));
        }
        Ok(())
    }
}

/// Consumer-facing façade over one pivot view's query lifecycle: initial
/// load, pagination, and resubmission when the sorting settings change.
pub struct PivotDataBuilder {
    config: PivotConfig,
    client: QueryClient,
    sort_settings: Mutex<Vec<SortingSettingsItem>>,
}

impl PivotDataBuilder {
    pub fn new(config: PivotConfig, client: QueryClient) -> Result<Self> {
        config.validate()?;
        let settings = sorting_settings(&config.metadata);
        Ok(Self {
            config,
            client,
            sort_settings: Mutex::new(settings),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PivotEvent> {
        self.client.subscribe()
    }

    pub fn sorting_settings(&self) -> Vec<SortingSettingsItem> {
        self.settings_guard().clone()
    }

    /// Loads the first page (or the whole result when pagination is off).
    pub async fn load_init_data(&self) -> Result<QueryResultData> {
        let jaql = self.build_jaql();
        self.client
            .query_data(
                jaql,
                self.config.is_paginated,
                self.config.elements_per_page,
                self.config.use_cache,
            )
            .await
    }

    /// Executes an explicit query payload under this view's settings.
    pub async fn query_data(&self, jaql: JaqlQuery) -> Result<QueryResultData> {
        self.client
            .query_data(
                jaql,
                self.config.is_paginated,
                self.config.elements_per_page,
                self.config.use_cache,
            )
            .await
    }

    pub async fn add_more(&self, is_last_page: bool) -> Result<Option<AddMoreData>> {
        self.client.add_more(is_last_page).await
    }

    /// Selects a sort direction for one element and resubmits the query.
    /// With no direction given, the default applies: ascending for
    /// measures, descending otherwise. The prior session is cancelled by
    /// the resubmission.
    pub async fn update_sort(
        &self,
        title: &str,
        direction: Option<SortDirection>,
    ) -> Result<QueryResultData> {
        let element = self
            .config
            .metadata
            .iter()
            .find(|e| e.title_or_dim() == title);
        let resolved = direction.or_else(|| element.map(default_direction));

        {
            let mut settings = self.settings_guard();
            let Some(item) = settings.iter_mut().find(|s| s.title == title) else {
                return Err(LoadError::Config(format!(
                    "unknown sorting element: {title}"
                )));
            };
            item.selected = true;
            item.direction = resolved;
            self.client.emit(PivotEvent::SortingSettingsChanged {
                settings: settings.clone(),
            });
        }
        self.client.emit(PivotEvent::ElementChanged {
            title: title.to_string(),
        });

        self.load_init_data().await
    }

    fn build_jaql(&self) -> JaqlQuery {
        let selected: Vec<SortingSettingsItem> = self
            .settings_guard()
            .iter()
            .filter(|s| s.selected)
            .cloned()
            .collect();
        JaqlQuery {
            datasource: self.config.name.clone(),
            metadata: self.config.metadata.clone(),
            count: if self.config.is_paginated {
                self.config.elements_per_page
            } else {
                None
            },
            offset: None,
            ungroup: None,
            query_guid: new_query_guid(),
            sort: if selected.is_empty() {
                None
            } else {
                Some(selected)
            },
        }
    }

    fn settings_guard(&self) -> MutexGuard<'_, Vec<SortingSettingsItem>> {
        self.sort_settings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
