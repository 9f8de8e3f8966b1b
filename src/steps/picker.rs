// Copyright 2025 Cowboy AI, LLC.

//! Generic picker step
//!
//! The connector type, Kafka instance and namespace steps are the same
//! machine over different collections: a paginated resource child owns the
//! fetching, a selection machine gates `next` on "an item is selected", and
//! confirming hands the selected entity upward as the step output. The
//! concrete steps in this directory are thin facades over [`spawn_picker`].

use crate::api::Identified;
use crate::errors::{ConsoleError, ConsoleResult};
use crate::paginated::{
    self, IdentityDecorator, ResourceEvent, ResourceFetcher, ResourceHandle, ResourceOptions,
    ResourceQuery, ResourceSnapshot,
};
use crate::selection::SelectionMachine;
use crate::steps::{StepNotification, StepOutput};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Spawn-time configuration of a picker step
#[derive(Debug, Clone, Default)]
pub struct PickerConfig {
    /// Id to auto-select once it appears in a fetched page
    pub preselect: Option<String>,
    /// Options for the paginated resource child
    pub options: ResourceOptions,
}

/// Events accepted by a picker step
#[derive(Debug, Clone)]
pub enum PickerEvent<Q> {
    /// Forwarded to the paginated resource child
    Resource(ResourceEvent<Q>),
    /// Select an item from the current page
    Select {
        /// Id of the item to select
        id: String,
    },
    /// Clear the selection
    Deselect,
    /// Confirm the selection and finish the step
    Confirm,
    /// Tear the step down
    Shutdown,
}

/// Published view of a picker step
#[derive(Debug, Clone)]
pub struct PickerSnapshot<T, Q> {
    /// Collection state owned by the resource child
    pub resource: ResourceSnapshot<Q, T>,
    /// Currently selected entity
    pub selected: Option<T>,
    /// Whether the step gates `next` open
    pub valid: bool,
}

/// Handle to a running picker step
pub struct PickerHandle<T, Q> {
    events: mpsc::UnboundedSender<PickerEvent<Q>>,
    state: watch::Receiver<PickerSnapshot<T, Q>>,
}

impl<T, Q> Clone for PickerHandle<T, Q> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T, Q> PickerHandle<T, Q>
where
    T: Clone,
    Q: Clone,
{
    /// Dispatch an event to the step
    pub fn dispatch(&self, event: PickerEvent<Q>) -> ConsoleResult<()> {
        self.events
            .send(event)
            .map_err(|_| ConsoleError::ChannelClosed("picker step".to_string()))
    }

    /// Select an item by id
    pub fn select(&self, id: impl Into<String>) -> ConsoleResult<()> {
        self.dispatch(PickerEvent::Select { id: id.into() })
    }

    /// Clear the selection
    pub fn deselect(&self) -> ConsoleResult<()> {
        self.dispatch(PickerEvent::Deselect)
    }

    /// Confirm the selection and finish the step
    pub fn confirm(&self) -> ConsoleResult<()> {
        self.dispatch(PickerEvent::Confirm)
    }

    /// Set a new query on the collection
    pub fn query(&self, query: Q) -> ConsoleResult<()> {
        self.dispatch(PickerEvent::Resource(ResourceEvent::Query {
            page: Some(1),
            size: None,
            query: Some(query),
        }))
    }

    /// Fetch the next page
    pub fn next_page(&self) -> ConsoleResult<()> {
        self.dispatch(PickerEvent::Resource(ResourceEvent::NextPage))
    }

    /// Fetch the previous page
    pub fn prev_page(&self) -> ConsoleResult<()> {
        self.dispatch(PickerEvent::Resource(ResourceEvent::PrevPage))
    }

    /// Refetch the current page
    pub fn refresh(&self) -> ConsoleResult<()> {
        self.dispatch(PickerEvent::Resource(ResourceEvent::Refresh))
    }

    /// Tear the step down
    pub fn shutdown(&self) {
        let _ = self.events.send(PickerEvent::Shutdown);
    }

    /// Current snapshot
    pub fn snapshot(&self) -> PickerSnapshot<T, Q> {
        self.state.borrow().clone()
    }

    /// Watch receiver for change notification
    pub fn watch(&self) -> watch::Receiver<PickerSnapshot<T, Q>> {
        self.state.clone()
    }
}

/// Spawn a picker step over a collection
///
/// The step issues its entry fetch immediately. `output` wraps the selected
/// entity into the orchestrator-facing step output.
pub fn spawn_picker<T, Q>(
    name: &'static str,
    fetcher: Arc<dyn ResourceFetcher<Q, Item = T>>,
    config: PickerConfig,
    notify: mpsc::UnboundedSender<StepNotification>,
    output: fn(T) -> StepOutput,
) -> PickerHandle<T, Q>
where
    T: Identified + Clone + Send + Sync + 'static,
    Q: ResourceQuery + Default,
{
    let resource = paginated::spawn(name, fetcher, IdentityDecorator::default(), config.options);
    let resource_watch = resource.watch();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (watch_tx, watch_rx) = watch::channel(PickerSnapshot {
        resource: resource_watch.borrow().clone(),
        selected: None,
        valid: false,
    });

    let actor = PickerActor {
        name,
        resource,
        resource_watch,
        selection: SelectionMachine::new(),
        mailbox: events_rx,
        watch_tx,
        notify,
        preselect: config.preselect,
        output,
        had_error: false,
    };
    tokio::spawn(actor.run());

    PickerHandle {
        events: events_tx,
        state: watch_rx,
    }
}

struct PickerActor<T, Q> {
    name: &'static str,
    resource: ResourceHandle<T, Q, T>,
    resource_watch: watch::Receiver<ResourceSnapshot<Q, T>>,
    selection: SelectionMachine<T>,
    mailbox: mpsc::UnboundedReceiver<PickerEvent<Q>>,
    watch_tx: watch::Sender<PickerSnapshot<T, Q>>,
    notify: mpsc::UnboundedSender<StepNotification>,
    preselect: Option<String>,
    output: fn(T) -> StepOutput,
    had_error: bool,
}

impl<T, Q> PickerActor<T, Q>
where
    T: Identified + Clone + Send + Sync + 'static,
    Q: ResourceQuery + Default,
{
    async fn run(mut self) {
        debug!(step = self.name, "picker step started");
        // Entry fetch with the unfiltered initial query
        if self
            .resource
            .dispatch(ResourceEvent::Query {
                page: Some(1),
                size: None,
                query: None,
            })
            .is_err()
        {
            warn!(step = self.name, "resource child gone before entry fetch");
        }

        loop {
            tokio::select! {
                message = self.mailbox.recv() => match message {
                    None | Some(PickerEvent::Shutdown) => break,
                    Some(event) => self.handle_event(event),
                },
                changed = self.resource_watch.changed() => match changed {
                    Ok(()) => self.on_resource_update(),
                    Err(_) => break,
                },
            }
        }

        let _ = self.resource.stop();
        debug!(step = self.name, "picker step stopped");
    }

    fn handle_event(&mut self, event: PickerEvent<Q>) {
        match event {
            PickerEvent::Resource(event) => {
                if self.resource.dispatch(event).is_err() {
                    warn!(step = self.name, "resource child mailbox closed");
                }
            }
            PickerEvent::Select { id } => {
                if let Some(validity) = self.selection.select(&id) {
                    self.send(StepNotification::ValidityChanged(validity));
                }
                self.publish();
            }
            PickerEvent::Deselect => {
                if let Some(validity) = self.selection.deselect() {
                    self.send(StepNotification::ValidityChanged(validity));
                }
                self.publish();
            }
            PickerEvent::Confirm => match self.selection.confirm() {
                Ok(entity) => {
                    self.send(StepNotification::Done((self.output)(entity)));
                }
                Err(error) => {
                    debug!(step = self.name, %error, "confirm rejected");
                }
            },
            PickerEvent::Shutdown => {}
        }
    }

    fn on_resource_update(&mut self) {
        let snapshot = self.resource_watch.borrow().clone();
        self.selection.set_items(snapshot.items.clone());

        if let Some(id) = self.preselect.clone() {
            if let Some(validity) = self.selection.select(&id) {
                self.send(StepNotification::ValidityChanged(validity));
            }
            if let Some(entity) = self.selection.selected().cloned() {
                if entity.id() == id {
                    self.preselect = None;
                    self.send(StepNotification::Prefilled((self.output)(entity)));
                }
            }
        }

        // Surface new fetch errors once; the orchestrator logs and swallows
        let has_error = snapshot.error.is_some();
        if has_error && !self.had_error {
            if let Some(error) = snapshot.error.clone() {
                self.send(StepNotification::Failed(error));
            }
        }
        self.had_error = has_error;

        self.publish();
    }

    fn send(&self, notification: StepNotification) {
        if self.notify.send(notification).is_err() {
            debug!(step = self.name, "orchestrator notification channel closed");
        }
    }

    fn publish(&mut self) {
        self.watch_tx.send_replace(PickerSnapshot {
            resource: self.resource_watch.borrow().clone(),
            selected: self.selection.selected().cloned(),
            valid: self.selection.is_valid(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ItemsPage};
    use crate::paginated::{PagedRequest, SearchQuery};
    use crate::selection::Validity;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Entity {
        id: String,
    }

    impl Identified for Entity {
        fn id(&self) -> &str {
            &self.id
        }
    }

    struct FixedFetcher {
        ids: Vec<&'static str>,
    }

    #[async_trait::async_trait]
    impl ResourceFetcher<SearchQuery> for FixedFetcher {
        type Item = Entity;

        async fn fetch(
            &self,
            request: PagedRequest<SearchQuery>,
        ) -> Result<ItemsPage<Entity>, ApiError> {
            Ok(ItemsPage {
                items: self
                    .ids
                    .iter()
                    .map(|id| Entity { id: id.to_string() })
                    .collect(),
                page: request.page,
                size: request.size,
                total: self.ids.len() as u64,
            })
        }
    }

    fn entity_output(entity: Entity) -> StepOutput {
        StepOutput::Configuration(serde_json::json!({ "picked": entity.id }))
    }

    async fn next_notification(
        rx: &mut mpsc::UnboundedReceiver<StepNotification>,
    ) -> StepNotification {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("notification before timeout")
            .expect("notification channel open")
    }

    /// Entry fetch, select, confirm: validity then the done output
    #[tokio::test]
    async fn test_select_and_confirm() {
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
        let handle = spawn_picker(
            "test-picker",
            Arc::new(FixedFetcher {
                ids: vec!["a", "b"],
            }),
            PickerConfig::default(),
            notify_tx,
            entity_output,
        );

        // Wait for the entry fetch to land
        let mut watch = handle.watch();
        while watch.borrow().resource.items.is_empty() {
            watch.changed().await.unwrap();
        }

        handle.select("b").unwrap();
        match next_notification(&mut notify_rx).await {
            StepNotification::ValidityChanged(validity) => {
                assert_eq!(validity, Validity::Valid)
            }
            other => panic!("expected validity edge, got {other:?}"),
        }

        handle.confirm().unwrap();
        match next_notification(&mut notify_rx).await {
            StepNotification::Done(StepOutput::Configuration(value)) => {
                assert_eq!(value["picked"], "b");
            }
            other => panic!("expected done, got {other:?}"),
        }

        handle.shutdown();
    }

    /// A seeded id resolves into a prefill without finishing the step
    #[tokio::test]
    async fn test_preselect_prefills() {
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
        let handle = spawn_picker(
            "test-picker",
            Arc::new(FixedFetcher {
                ids: vec!["a", "b"],
            }),
            PickerConfig {
                preselect: Some("a".to_string()),
                options: ResourceOptions::default(),
            },
            notify_tx,
            entity_output,
        );

        match next_notification(&mut notify_rx).await {
            StepNotification::ValidityChanged(validity) => {
                assert_eq!(validity, Validity::Valid)
            }
            other => panic!("expected validity edge, got {other:?}"),
        }
        match next_notification(&mut notify_rx).await {
            StepNotification::Prefilled(StepOutput::Configuration(value)) => {
                assert_eq!(value["picked"], "a");
            }
            other => panic!("expected prefill, got {other:?}"),
        }

        assert!(handle.snapshot().valid);
        handle.shutdown();
    }

    /// Confirm without a selection stays silent
    #[tokio::test]
    async fn test_confirm_without_selection_is_rejected() {
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
        let handle = spawn_picker(
            "test-picker",
            Arc::new(FixedFetcher { ids: vec!["a"] }),
            PickerConfig::default(),
            notify_tx,
            entity_output,
        );

        handle.confirm().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(matches!(
            notify_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Empty)
        ));

        handle.shutdown();
    }

    /// Fetch failures reach the orchestrator as a swallowed failure
    #[tokio::test]
    async fn test_fetch_failure_notifies_once() {
        struct FailingFetcher;

        #[async_trait::async_trait]
        impl ResourceFetcher<SearchQuery> for FailingFetcher {
            type Item = Entity;

            async fn fetch(
                &self,
                _request: PagedRequest<SearchQuery>,
            ) -> Result<ItemsPage<Entity>, ApiError> {
                Err(ApiError::new("catalog unavailable"))
            }
        }

        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
        let handle = spawn_picker(
            "test-picker",
            Arc::new(FailingFetcher),
            PickerConfig::default(),
            notify_tx,
            entity_output,
        );

        match next_notification(&mut notify_rx).await {
            StepNotification::Failed(ConsoleError::FetchFailed { message, .. }) => {
                assert_eq!(message, "catalog unavailable");
            }
            other => panic!("expected failure, got {other:?}"),
        }

        handle.shutdown();
    }
}
