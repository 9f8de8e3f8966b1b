// Copyright 2025 Cowboy AI, LLC.

//! Kafka instance selection step

use crate::api::{ApiError, ItemsPage, KafkaInstance, ManagementApi};
use crate::paginated::{PagedRequest, ResourceFetcher, SearchQuery};
use crate::steps::picker::{spawn_picker, PickerConfig, PickerHandle};
use crate::steps::{StepNotification, StepOutput};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle to the Kafka instance step
pub type KafkaPickerHandle = PickerHandle<KafkaInstance, SearchQuery>;

struct KafkaFetcher {
    api: Arc<dyn ManagementApi>,
}

#[async_trait::async_trait]
impl ResourceFetcher<SearchQuery> for KafkaFetcher {
    type Item = KafkaInstance;

    async fn fetch(
        &self,
        request: PagedRequest<SearchQuery>,
    ) -> Result<ItemsPage<KafkaInstance>, ApiError> {
        self.api
            .list_kafka_instances(request.page, request.size, request.query.search.clone())
            .await
    }
}

/// Spawn the Kafka instance selection step
pub fn spawn_kafka(
    api: Arc<dyn ManagementApi>,
    config: PickerConfig,
    notify: mpsc::UnboundedSender<StepNotification>,
) -> KafkaPickerHandle {
    spawn_picker(
        "selectKafka",
        Arc::new(KafkaFetcher { api }),
        config,
        notify,
        StepOutput::Kafka,
    )
}
