// Copyright 2025 Cowboy AI, LLC.

//! Connector type selection step
//!
//! The catalog endpoint returns the whole (search-filtered) catalog in one
//! response, so category filtering happens here rather than on the wire.

use crate::api::{ApiError, ConnectorType, ItemsPage, ManagementApi};
use crate::paginated::{PagedRequest, ResourceFetcher, ResourceQuery};
use crate::steps::picker::{spawn_picker, PickerConfig, PickerHandle};
use crate::steps::{StepNotification, StepOutput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle to the connector type step
pub type ConnectorTypePickerHandle = PickerHandle<ConnectorType, TypeQuery>;

/// Catalog query: free-text name search plus category filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeQuery {
    /// Name search string
    pub search: Option<String>,
    /// Categories the type must carry, e.g. `sink`
    pub categories: Vec<String>,
}

impl ResourceQuery for TypeQuery {
    fn is_defined(&self) -> bool {
        self.search.as_deref().is_some_and(|s| !s.is_empty()) || !self.categories.is_empty()
    }
}

struct TypeCatalogFetcher {
    api: Arc<dyn ManagementApi>,
}

#[async_trait::async_trait]
impl ResourceFetcher<TypeQuery> for TypeCatalogFetcher {
    type Item = ConnectorType;

    async fn fetch(
        &self,
        request: PagedRequest<TypeQuery>,
    ) -> Result<ItemsPage<ConnectorType>, ApiError> {
        let page = self
            .api
            .list_connector_types(request.query.search.clone(), None)
            .await?;

        if request.query.categories.is_empty() {
            return Ok(page);
        }
        let items: Vec<ConnectorType> = page
            .items
            .into_iter()
            .filter(|item| {
                request
                    .query
                    .categories
                    .iter()
                    .all(|category| item.categories.contains(category))
            })
            .collect();
        let total = items.len() as u64;
        Ok(ItemsPage {
            items,
            page: page.page,
            size: page.size,
            total,
        })
    }
}

/// Spawn the connector type selection step
pub fn spawn_connector_type(
    api: Arc<dyn ManagementApi>,
    config: PickerConfig,
    notify: mpsc::UnboundedSender<StepNotification>,
) -> ConnectorTypePickerHandle {
    spawn_picker(
        "selectConnectorType",
        Arc::new(TypeCatalogFetcher { api }),
        config,
        notify,
        StepOutput::ConnectorType,
    )
}
