// Copyright 2025 Cowboy AI, LLC.

//! Connectors page
//!
//! The landing page: a polled, paginated, searchable connector list where
//! every row is a live actor. The page decorates each fetched connector
//! into a [`ConnectorHandle`], reusing the actor across page merges and
//! tearing it down when the row disappears from the listing. Row mutation
//! outcomes fan into the page: a success refreshes the listing so the row
//! reflects the server's view, a failure surfaces as a dismissible error
//! and deliberately does not refresh, keeping the rolled-back row visible
//! as the user left it.

use crate::api::{ApiError, Connector, ItemsPage, ManagementApi};
use crate::connector::{self, ConnectorEvent, ConnectorHandle, ConnectorNotification};
use crate::errors::{ConsoleError, ConsoleResult};
use crate::paginated::{
    self, ItemDecorator, PagedRequest, ResourceEvent, ResourceFetcher, ResourceHandle,
    ResourceOptions, ResourceSnapshot, SearchQuery,
};
use crate::wizard::WizardSeed;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

/// Spawn-time options of the connectors page
#[derive(Debug, Clone)]
pub struct ConnectorsPageOptions {
    /// Options of the underlying paginated resource
    pub resource: ResourceOptions,
}

impl Default for ConnectorsPageOptions {
    fn default() -> Self {
        Self {
            resource: ResourceOptions::polling(),
        }
    }
}

/// A failed row action, kept until dismissed or superseded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionError {
    /// Connector the action targeted
    pub id: String,
    /// Reason reported by the API, shown verbatim
    pub message: String,
}

/// Events accepted by the connectors page
#[derive(Debug, Clone)]
pub enum ConnectorsPageEvent {
    /// Forwarded to the paginated resource
    Resource(ResourceEvent<SearchQuery>),
    /// Forwarded to one row's actor
    Row {
        /// Target connector
        id: String,
        /// Event for the row
        event: ConnectorEvent,
    },
    /// Clear the surfaced action error
    DismissError,
    /// Tear the page and every row actor down
    Shutdown,
}

/// Published view of the connectors page
#[derive(Debug, Clone)]
pub struct ConnectorsPageSnapshot {
    /// Collection state; items are live row handles
    pub resource: ResourceSnapshot<SearchQuery, ConnectorHandle>,
    /// Last failed row action, if not yet dismissed
    pub last_error: Option<ActionError>,
    /// Row most recently selected for navigation
    pub selected_id: Option<String>,
}

/// Handle to a running connectors page
pub struct ConnectorsPageHandle {
    events: mpsc::UnboundedSender<ConnectorsPageEvent>,
    state: watch::Receiver<ConnectorsPageSnapshot>,
}

impl Clone for ConnectorsPageHandle {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            state: self.state.clone(),
        }
    }
}

impl ConnectorsPageHandle {
    /// Dispatch an event to the page
    pub fn dispatch(&self, event: ConnectorsPageEvent) -> ConsoleResult<()> {
        self.events
            .send(event)
            .map_err(|_| ConsoleError::ChannelClosed("connectors page".to_string()))
    }

    /// Set a new search query, returning to the first page
    pub fn query(&self, query: SearchQuery) -> ConsoleResult<()> {
        self.dispatch(ConnectorsPageEvent::Resource(ResourceEvent::Query {
            page: Some(1),
            size: None,
            query: Some(query),
        }))
    }

    /// Go to a specific page
    pub fn goto_page(&self, page: u64) -> ConsoleResult<()> {
        self.dispatch(ConnectorsPageEvent::Resource(ResourceEvent::Query {
            page: Some(page),
            size: None,
            query: None,
        }))
    }

    /// Fetch the next page
    pub fn next_page(&self) -> ConsoleResult<()> {
        self.dispatch(ConnectorsPageEvent::Resource(ResourceEvent::NextPage))
    }

    /// Fetch the previous page
    pub fn prev_page(&self) -> ConsoleResult<()> {
        self.dispatch(ConnectorsPageEvent::Resource(ResourceEvent::PrevPage))
    }

    /// Refetch the current page
    pub fn refresh(&self) -> ConsoleResult<()> {
        self.dispatch(ConnectorsPageEvent::Resource(ResourceEvent::Refresh))
    }

    /// Forward an event to one row
    pub fn row_event(&self, id: impl Into<String>, event: ConnectorEvent) -> ConsoleResult<()> {
        self.dispatch(ConnectorsPageEvent::Row {
            id: id.into(),
            event,
        })
    }

    /// Live handle of one row, when present on the current page
    pub fn row(&self, id: &str) -> Option<ConnectorHandle> {
        self.state
            .borrow()
            .resource
            .items
            .iter()
            .find(|handle| handle.id() == id)
            .cloned()
    }

    /// Seed for a wizard that duplicates a listed connector
    ///
    /// The copy points at the same type, instance and namespace, carries the
    /// same configuration, and proposes a derived name.
    pub fn duplicate_seed(&self, id: &str) -> Option<WizardSeed> {
        let row = self.row(id)?;
        let connector = row.snapshot().connector;
        Some(WizardSeed {
            connector_type_id: Some(connector.connector_type_id),
            kafka_id: Some(connector.kafka_id),
            namespace_id: Some(connector.namespace_id),
            name: Some(format!("{}-copy", connector.name)),
            configuration: Some(connector.configuration),
        })
    }

    /// Clear the surfaced action error
    pub fn dismiss_error(&self) -> ConsoleResult<()> {
        self.dispatch(ConnectorsPageEvent::DismissError)
    }

    /// Tear the page and every row actor down
    pub fn shutdown(&self) {
        let _ = self.events.send(ConnectorsPageEvent::Shutdown);
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ConnectorsPageSnapshot {
        self.state.borrow().clone()
    }

    /// Watch receiver for change notification
    pub fn watch(&self) -> watch::Receiver<ConnectorsPageSnapshot> {
        self.state.clone()
    }

    /// Snapshot stream for hosts that consume async streams
    pub fn stream(&self) -> WatchStream<ConnectorsPageSnapshot> {
        WatchStream::new(self.state.clone())
    }
}

struct ConnectorListFetcher {
    api: Arc<dyn ManagementApi>,
}

#[async_trait::async_trait]
impl ResourceFetcher<SearchQuery> for ConnectorListFetcher {
    type Item = Connector;

    async fn fetch(
        &self,
        request: PagedRequest<SearchQuery>,
    ) -> Result<ItemsPage<Connector>, ApiError> {
        self.api
            .list_connectors(
                request.page,
                request.size,
                request.query.search.clone(),
                request.query.order_by.clone(),
            )
            .await
    }
}

/// Decorator that keeps one live actor per listed connector
struct ConnectorsDecorator {
    api: Arc<dyn ManagementApi>,
    notify: mpsc::UnboundedSender<ConnectorNotification>,
    arena: IndexMap<String, ConnectorHandle>,
}

impl ItemDecorator<Connector> for ConnectorsDecorator {
    type Decorated = ConnectorHandle;

    fn decorate(&mut self, item: Connector) -> ConnectorHandle {
        if let Some(handle) = self.arena.get(&item.id) {
            // Same row, fresher entity: merge into the running actor
            if handle.dispatch(ConnectorEvent::SetConnector(item)).is_err() {
                warn!(id = %handle.id(), "row actor gone during merge");
            }
            return handle.clone();
        }
        let handle = connector::spawn(Arc::clone(&self.api), item, self.notify.clone());
        self.arena.insert(handle.id().to_string(), handle.clone());
        handle
    }

    fn before_replace(&mut self, _previous: &[ConnectorHandle], incoming: &[Connector]) {
        let keep: HashSet<&str> = incoming.iter().map(|c| c.id.as_str()).collect();
        let removed: Vec<String> = self
            .arena
            .keys()
            .filter(|id| !keep.contains(id.as_str()))
            .cloned()
            .collect();
        for id in removed {
            if let Some(handle) = self.arena.shift_remove(&id) {
                debug!(id = %id, "connector left the listing, row actor stopped");
                handle.shutdown();
            }
        }
    }
}

/// Spawn the connectors page
pub fn spawn_connectors_page(
    api: Arc<dyn ManagementApi>,
    options: ConnectorsPageOptions,
) -> ConnectorsPageHandle {
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let decorator = ConnectorsDecorator {
        api: Arc::clone(&api),
        notify: notify_tx.clone(),
        arena: IndexMap::new(),
    };
    let fetcher: Arc<dyn ResourceFetcher<SearchQuery, Item = Connector>> =
        Arc::new(ConnectorListFetcher { api });
    let resource = paginated::spawn("connectorsPage", fetcher, decorator, options.resource);
    let resource_watch = resource.watch();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (watch_tx, watch_rx) = watch::channel(ConnectorsPageSnapshot {
        resource: resource_watch.borrow().clone(),
        last_error: None,
        selected_id: None,
    });

    let actor = ConnectorsPageActor {
        resource,
        resource_watch,
        mailbox: events_rx,
        notifications: notify_rx,
        _keepalive: notify_tx,
        watch_tx,
        last_error: None,
        selected_id: None,
    };
    tokio::spawn(actor.run());

    ConnectorsPageHandle {
        events: events_tx,
        state: watch_rx,
    }
}

struct ConnectorsPageActor {
    resource: ResourceHandle<Connector, SearchQuery, ConnectorHandle>,
    resource_watch: watch::Receiver<ResourceSnapshot<SearchQuery, ConnectorHandle>>,
    mailbox: mpsc::UnboundedReceiver<ConnectorsPageEvent>,
    notifications: mpsc::UnboundedReceiver<ConnectorNotification>,
    // Keeps the fan-in channel open while rows come and go
    _keepalive: mpsc::UnboundedSender<ConnectorNotification>,
    watch_tx: watch::Sender<ConnectorsPageSnapshot>,
    last_error: Option<ActionError>,
    selected_id: Option<String>,
}

impl ConnectorsPageActor {
    async fn run(mut self) {
        info!("connectors page started");
        // Entry fetch; with polling enabled the first tick dedupes against it
        if self
            .resource
            .dispatch(ResourceEvent::Query {
                page: Some(1),
                size: None,
                query: None,
            })
            .is_err()
        {
            warn!("resource child gone before entry fetch");
        }

        loop {
            tokio::select! {
                event = self.mailbox.recv() => match event {
                    None | Some(ConnectorsPageEvent::Shutdown) => break,
                    Some(event) => self.handle_event(event),
                },
                notification = self.notifications.recv() => {
                    if let Some(notification) = notification {
                        self.handle_notification(notification);
                    }
                },
                changed = self.resource_watch.changed() => match changed {
                    Ok(()) => self.publish(),
                    Err(_) => break,
                },
            }
        }

        // Stopping the resource tears down every row actor with it
        let _ = self.resource.stop();
        info!("connectors page stopped");
    }

    fn handle_event(&mut self, event: ConnectorsPageEvent) {
        match event {
            ConnectorsPageEvent::Resource(event) => {
                if self.resource.dispatch(event).is_err() {
                    warn!("resource child mailbox closed");
                }
            }
            ConnectorsPageEvent::Row { id, event } => {
                let row = self
                    .resource_watch
                    .borrow()
                    .items
                    .iter()
                    .find(|handle| handle.id() == id)
                    .cloned();
                match row {
                    Some(handle) => {
                        if handle.dispatch(event).is_err() {
                            warn!(id = %id, "row actor mailbox closed");
                        }
                    }
                    None => debug!(id = %id, "row event for a connector not on this page"),
                }
            }
            ConnectorsPageEvent::DismissError => {
                self.last_error = None;
                self.publish();
            }
            ConnectorsPageEvent::Shutdown => {}
        }
    }

    fn handle_notification(&mut self, notification: ConnectorNotification) {
        match notification {
            ConnectorNotification::ActionSuccess { id } => {
                debug!(id = %id, "row action succeeded, listing refreshed");
                if self.last_error.as_ref().is_some_and(|error| error.id == id) {
                    self.last_error = None;
                }
                if self.resource.refresh().is_err() {
                    warn!("resource child mailbox closed");
                }
                self.publish();
            }
            ConnectorNotification::ActionFailure { id, message } => {
                // No refresh: the rolled-back row stays as the user left it
                warn!(id = %id, message = %message, "row action failed");
                self.last_error = Some(ActionError { id, message });
                self.publish();
            }
            ConnectorNotification::Selected { id } => {
                self.selected_id = Some(id);
                self.publish();
            }
        }
    }

    fn publish(&mut self) {
        self.watch_tx.send_replace(ConnectorsPageSnapshot {
            resource: self.resource_watch.borrow().clone(),
            last_error: self.last_error.clone(),
            selected_id: self.selected_id.clone(),
        });
    }
}
