// Copyright 2025 Cowboy AI, LLC.

//! Namespace selection step

use crate::api::{ApiError, ItemsPage, ManagementApi, Namespace};
use crate::paginated::{PagedRequest, ResourceFetcher, SearchQuery};
use crate::steps::picker::{spawn_picker, PickerConfig, PickerHandle};
use crate::steps::{StepNotification, StepOutput};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle to the namespace step
pub type NamespacePickerHandle = PickerHandle<Namespace, SearchQuery>;

struct NamespaceFetcher {
    api: Arc<dyn ManagementApi>,
}

#[async_trait::async_trait]
impl ResourceFetcher<SearchQuery> for NamespaceFetcher {
    type Item = Namespace;

    async fn fetch(
        &self,
        request: PagedRequest<SearchQuery>,
    ) -> Result<ItemsPage<Namespace>, ApiError> {
        self.api
            .list_namespaces(request.page, request.size, request.query.search.clone())
            .await
    }
}

/// Spawn the namespace selection step
pub fn spawn_namespace(
    api: Arc<dyn ManagementApi>,
    config: PickerConfig,
    notify: mpsc::UnboundedSender<StepNotification>,
) -> NamespacePickerHandle {
    spawn_picker(
        "selectNamespace",
        Arc::new(NamespaceFetcher { api }),
        config,
        notify,
        StepOutput::Namespace,
    )
}
