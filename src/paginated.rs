// Copyright 2025 Cowboy AI, LLC.

//! Paginated resource machine
//!
//! One machine instance owns one page of a queryable collection: the current
//! request parameters, the most recent response, and the derived status tag.
//! The transition logic lives in [`ResourceCore`], which is pure and fully
//! unit-testable; [`spawn`] wraps a core in a tokio task that executes fetch
//! directives through the cancellable request layer and publishes snapshots
//! over a watch channel.
//!
//! The same machine backs connectors, connector types, Kafka instances and
//! namespaces. Item decoration (the seam that spawns per-connector actors)
//! is injected through [`ItemDecorator`].

use crate::api::{ApiError, ItemsPage};
use crate::errors::{ConsoleError, ConsoleResult};
use crate::request::{self, RequestHandle, RequestTag};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default delay between polling re-fetches
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Default page size for list requests
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Query parameters for a paginated collection
///
/// A query is `defined` when it actually filters the collection. The
/// distinction drives the `results`/`queryResults` and `empty`/`queryEmpty`
/// status split.
pub trait ResourceQuery: Clone + fmt::Debug + Send + Sync + 'static {
    /// Whether this query filters the collection
    fn is_defined(&self) -> bool;
}

/// Free-text search with an optional ordering, the query shape shared by
/// most list endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Search string, empty or missing means unfiltered
    pub search: Option<String>,
    /// Ordering expression, e.g. `name asc`
    pub order_by: Option<String>,
}

impl SearchQuery {
    /// Query matching a search string
    pub fn matching(search: impl Into<String>) -> Self {
        Self {
            search: Some(search.into()),
            order_by: None,
        }
    }
}

impl ResourceQuery for SearchQuery {
    fn is_defined(&self) -> bool {
        // Ordering alone does not filter
        self.search.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// The request parameters a fetch is issued for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedRequest<Q> {
    /// 1-based page number
    pub page: u64,
    /// Page size, always > 0
    pub size: u64,
    /// Collection query
    pub query: Q,
}

/// Status tag of a paginated resource
///
/// With a response present, exactly one of the non-`Idle`, non-`Loading`
/// tags holds; the guards are evaluated in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceStatus {
    /// No fetch has been requested yet
    Idle,
    /// A foreground fetch is in flight
    Loading,
    /// Filtered fetch returned nothing
    QueryEmpty,
    /// Filtered fetch returned items
    QueryResults,
    /// Unfiltered collection is empty
    Empty,
    /// Unfiltered collection has items
    Results,
    /// The last foreground fetch failed
    Error,
}

impl ResourceStatus {
    /// Derive the status tag from the response facts
    pub fn derive(query_defined: bool, total: u64, has_error: bool) -> Self {
        if has_error {
            ResourceStatus::Error
        } else if query_defined && total == 0 {
            ResourceStatus::QueryEmpty
        } else if query_defined {
            ResourceStatus::QueryResults
        } else if total == 0 {
            ResourceStatus::Empty
        } else {
            ResourceStatus::Results
        }
    }
}

/// Transform applied to every fetched item before storage
///
/// `before_replace` runs with the previous decorated items and the incoming
/// raw ones before the stored list is swapped, so implementations that spawn
/// per-item actors can tear down the actors whose ids disappeared. Tearing
/// down removed actors is a correctness requirement, not an optimization:
/// an orphaned actor keeps issuing requests for a row that no longer exists.
pub trait ItemDecorator<T>: Send + 'static {
    /// The stored item shape
    type Decorated: Clone + Send + Sync + 'static;

    /// Decorate one fetched item
    fn decorate(&mut self, item: T) -> Self::Decorated;

    /// Called before the stored items are replaced
    fn before_replace(&mut self, _previous: &[Self::Decorated], _incoming: &[T]) {}
}

/// Decorator that stores items unchanged
pub struct IdentityDecorator<T>(PhantomData<T>);

impl<T> Default for IdentityDecorator<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T> ItemDecorator<T> for IdentityDecorator<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Decorated = T;

    fn decorate(&mut self, item: T) -> T {
        item
    }
}

/// Fetch implementation for one collection
#[async_trait::async_trait]
pub trait ResourceFetcher<Q>: Send + Sync + 'static {
    /// Raw item type returned by the API
    type Item: Send + 'static;

    /// Fetch one page for the given request
    async fn fetch(&self, request: PagedRequest<Q>) -> Result<ItemsPage<Self::Item>, ApiError>;
}

/// Whether a fetch was user-visible or a background poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    /// User-initiated: publishes `Loading`, failures land in `Error`
    Foreground,
    /// Poll tick: merges silently, failures are logged and retried
    Poll,
}

/// Directive returned by the pure core for the shell to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FetchDirective {
    tag: RequestTag,
    kind: FetchKind,
}

struct StoredPage<D> {
    items: Vec<D>,
    total: u64,
}

/// Pure transition core of the paginated machine
///
/// Owns the request, the stored response and the in-flight bookkeeping.
/// Methods either mutate state directly or hand back a [`FetchDirective`]
/// the shell turns into an actual request. Responses are applied only when
/// their tag matches the request currently in flight; anything else is
/// stale and dropped.
struct ResourceCore<T, Q, C>
where
    C: ItemDecorator<T>,
{
    request: PagedRequest<Q>,
    response: Option<StoredPage<C::Decorated>>,
    error: Option<ConsoleError>,
    in_flight: Option<FetchDirective>,
    decorator: C,
    next_request_id: u64,
    _item: PhantomData<T>,
}

impl<T, Q, C> ResourceCore<T, Q, C>
where
    Q: ResourceQuery,
    C: ItemDecorator<T>,
{
    fn new(request: PagedRequest<Q>, decorator: C) -> Self {
        Self {
            request,
            response: None,
            error: None,
            in_flight: None,
            decorator,
            next_request_id: 0,
            _item: PhantomData,
        }
    }

    fn first_request(&self) -> bool {
        self.response.is_none()
    }

    fn total(&self) -> u64 {
        self.response.as_ref().map_or(0, |r| r.total)
    }

    fn total_pages(&self) -> u64 {
        let size = self.request.size.max(1);
        (self.total() + size - 1) / size
    }

    fn status(&self) -> ResourceStatus {
        if matches!(
            self.in_flight,
            Some(FetchDirective {
                kind: FetchKind::Foreground,
                ..
            })
        ) {
            return ResourceStatus::Loading;
        }
        if self.response.is_none() && self.error.is_none() {
            return ResourceStatus::Idle;
        }
        ResourceStatus::derive(
            self.request.query.is_defined(),
            self.total(),
            self.error.is_some(),
        )
    }

    fn next_directive(&mut self, kind: FetchKind) -> FetchDirective {
        self.next_request_id += 1;
        let directive = FetchDirective {
            tag: RequestTag {
                id: self.next_request_id,
                page: self.request.page,
            },
            kind,
        };
        self.in_flight = Some(directive);
        directive
    }

    /// Merge new request parameters and refetch
    fn on_query(&mut self, page: Option<u64>, size: Option<u64>, query: Option<Q>) -> FetchDirective {
        if let Some(page) = page {
            self.request.page = page.max(1);
        }
        if let Some(size) = size {
            self.request.size = size.max(1);
        }
        if let Some(query) = query {
            self.request.query = query;
        }
        self.next_directive(FetchKind::Foreground)
    }

    /// Advance one page when one exists; silently no-op otherwise
    fn on_next_page(&mut self) -> Option<FetchDirective> {
        if self.request.page >= self.total_pages() {
            debug!(page = self.request.page, "nextPage ignored at last page");
            return None;
        }
        self.request.page += 1;
        Some(self.next_directive(FetchKind::Foreground))
    }

    /// Go back one page unless already at the first
    fn on_prev_page(&mut self) -> Option<FetchDirective> {
        if self.request.page <= 1 {
            debug!("prevPage ignored at first page");
            return None;
        }
        self.request.page -= 1;
        Some(self.next_directive(FetchKind::Foreground))
    }

    fn on_refresh(&mut self) -> FetchDirective {
        self.next_directive(FetchKind::Foreground)
    }

    /// A poll tick refetches the current request in the background,
    /// skipping the tick entirely while a fetch is in flight
    fn on_poll_tick(&mut self) -> Option<FetchDirective> {
        if self.in_flight.is_some() {
            debug!("poll tick skipped, fetch in flight");
            return None;
        }
        let kind = if self.response.is_none() && self.error.is_none() {
            FetchKind::Foreground
        } else {
            FetchKind::Poll
        };
        Some(self.next_directive(kind))
    }

    fn accepts(&self, tag: RequestTag) -> Option<FetchKind> {
        match self.in_flight {
            Some(directive) if directive.tag.id == tag.id => Some(directive.kind),
            _ => None,
        }
    }

    /// Apply a successful response; returns false when the response is stale
    fn apply_success(&mut self, tag: RequestTag, page: ItemsPage<T>) -> bool {
        let Some(_) = self.accepts(tag) else {
            debug!(
                request_id = tag.id,
                page = tag.page,
                "stale response dropped"
            );
            return false;
        };
        self.in_flight = None;

        let previous = self.response.as_ref().map(|r| r.items.as_slice()).unwrap_or(&[]);
        self.decorator.before_replace(previous, &page.items);
        let items = page
            .items
            .into_iter()
            .map(|item| self.decorator.decorate(item))
            .collect();
        self.response = Some(StoredPage {
            items,
            total: page.total,
        });
        self.error = None;
        true
    }

    /// Apply a failed response; returns false when the failure is stale
    fn apply_failure(&mut self, tag: RequestTag, error: ApiError) -> bool {
        let Some(kind) = self.accepts(tag) else {
            debug!(
                request_id = tag.id,
                page = tag.page,
                "stale failure dropped"
            );
            return false;
        };
        self.in_flight = None;

        match kind {
            FetchKind::Foreground => {
                self.error = Some(ConsoleError::FetchFailed {
                    page: tag.page,
                    message: error.reason,
                });
            }
            FetchKind::Poll => {
                // Keep the last good response; the next tick retries
                warn!(
                    page = tag.page,
                    reason = %error.reason,
                    "poll fetch failed, retrying on next tick"
                );
            }
        }
        true
    }

    /// Tear down every decorated item, used when the machine stops
    fn teardown(&mut self) {
        if let Some(stored) = self.response.take() {
            self.decorator.before_replace(&stored.items, &[]);
        }
    }
}

/// Runtime options for a paginated resource machine
#[derive(Debug, Clone)]
pub struct ResourceOptions {
    /// Re-fetch delay; `None` disables the polling region
    pub poll_interval: Option<Duration>,
    /// Initial page
    pub page: u64,
    /// Initial page size
    pub size: u64,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            poll_interval: None,
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ResourceOptions {
    /// Options with polling enabled at the default interval
    pub fn polling() -> Self {
        Self {
            poll_interval: Some(DEFAULT_POLL_INTERVAL),
            ..Self::default()
        }
    }
}

/// Events accepted by a paginated resource machine
#[derive(Debug, Clone)]
pub enum ResourceEvent<Q> {
    /// Merge new request parameters and fetch; absent fields keep their value
    Query {
        /// New page, if changing
        page: Option<u64>,
        /// New size, if changing
        size: Option<u64>,
        /// New query, if changing
        query: Option<Q>,
    },
    /// Fetch the next page; ignored on the last page
    NextPage,
    /// Fetch the previous page; ignored on the first page
    PrevPage,
    /// Refetch the current request
    Refresh,
    /// Stop the machine and tear down decorated items
    Stop,
}

/// Published view of a paginated resource machine
#[derive(Debug, Clone)]
pub struct ResourceSnapshot<Q, D> {
    /// Derived status tag
    pub status: ResourceStatus,
    /// Request the snapshot corresponds to
    pub request: PagedRequest<Q>,
    /// Decorated items of the current page
    pub items: Vec<D>,
    /// Total matching items across all pages
    pub total: u64,
    /// Last foreground fetch error, cleared by the next success
    pub error: Option<ConsoleError>,
    /// True until the first response lands
    pub first_request: bool,
}

impl<Q, D> ResourceSnapshot<Q, D> {
    /// Whether a foreground fetch is in flight
    pub fn is_loading(&self) -> bool {
        self.status == ResourceStatus::Loading
    }

    /// Pages the collection spans under the current size
    pub fn total_pages(&self) -> u64 {
        let size = self.request.size.max(1);
        (self.total + size - 1) / size
    }
}

enum Internal<T, Q> {
    External(ResourceEvent<Q>),
    Succeeded {
        tag: RequestTag,
        page: ItemsPage<T>,
    },
    Failed {
        tag: RequestTag,
        error: ApiError,
    },
}

/// Handle to a running paginated resource machine
///
/// Cheap to clone; events go in, snapshots come out. Dropping every handle
/// stops the machine.
pub struct ResourceHandle<T, Q, D> {
    events: mpsc::UnboundedSender<Internal<T, Q>>,
    state: watch::Receiver<ResourceSnapshot<Q, D>>,
}

impl<T, Q, D> Clone for ResourceHandle<T, Q, D> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T, Q, D> ResourceHandle<T, Q, D>
where
    Q: ResourceQuery,
    D: Clone + Send + Sync + 'static,
    T: Send + 'static,
{
    /// Dispatch an event to the machine
    pub fn dispatch(&self, event: ResourceEvent<Q>) -> ConsoleResult<()> {
        self.events
            .send(Internal::External(event))
            .map_err(|_| ConsoleError::ChannelClosed("paginated resource".to_string()))
    }

    /// Set a new query and fetch from page 1
    pub fn query(&self, query: Q) -> ConsoleResult<()> {
        self.dispatch(ResourceEvent::Query {
            page: Some(1),
            size: None,
            query: Some(query),
        })
    }

    /// Fetch a specific page of the current query
    pub fn goto_page(&self, page: u64) -> ConsoleResult<()> {
        self.dispatch(ResourceEvent::Query {
            page: Some(page),
            size: None,
            query: None,
        })
    }

    /// Fetch the next page; silently ignored on the last page
    pub fn next_page(&self) -> ConsoleResult<()> {
        self.dispatch(ResourceEvent::NextPage)
    }

    /// Fetch the previous page; silently ignored on the first page
    pub fn prev_page(&self) -> ConsoleResult<()> {
        self.dispatch(ResourceEvent::PrevPage)
    }

    /// Refetch the current request
    pub fn refresh(&self) -> ConsoleResult<()> {
        self.dispatch(ResourceEvent::Refresh)
    }

    /// Stop the machine
    pub fn stop(&self) -> ConsoleResult<()> {
        self.dispatch(ResourceEvent::Stop)
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ResourceSnapshot<Q, D> {
        self.state.borrow().clone()
    }

    /// Watch receiver for change notification
    pub fn watch(&self) -> watch::Receiver<ResourceSnapshot<Q, D>> {
        self.state.clone()
    }

    /// Snapshot stream for hosts that consume updates as a `Stream`
    pub fn stream(&self) -> WatchStream<ResourceSnapshot<Q, D>> {
        WatchStream::new(self.state.clone())
    }
}

/// Spawn a paginated resource machine
///
/// With polling enabled the machine fetches on entry and then re-fetches on
/// every interval tick; without it the machine stays `Idle` until the first
/// event arrives.
pub fn spawn<T, Q, C>(
    name: &str,
    fetcher: Arc<dyn ResourceFetcher<Q, Item = T>>,
    decorator: C,
    options: ResourceOptions,
) -> ResourceHandle<T, Q, C::Decorated>
where
    T: Send + 'static,
    Q: ResourceQuery + Default,
    C: ItemDecorator<T>,
{
    let request = PagedRequest {
        page: options.page.max(1),
        size: options.size.max(1),
        query: Q::default(),
    };
    let core = ResourceCore::new(request.clone(), decorator);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (watch_tx, watch_rx) = watch::channel(ResourceSnapshot {
        status: ResourceStatus::Idle,
        request,
        items: Vec::new(),
        total: 0,
        error: None,
        first_request: true,
    });

    let actor = ResourceActor {
        id: Uuid::new_v4(),
        name: name.to_string(),
        core,
        fetcher,
        mailbox: events_rx,
        sink: events_tx.clone(),
        watch_tx,
        handle: None,
        poll_interval: options.poll_interval,
    };
    tokio::spawn(actor.run());

    ResourceHandle {
        events: events_tx,
        state: watch_rx,
    }
}

struct ResourceActor<T, Q, C>
where
    C: ItemDecorator<T>,
{
    id: Uuid,
    name: String,
    core: ResourceCore<T, Q, C>,
    fetcher: Arc<dyn ResourceFetcher<Q, Item = T>>,
    mailbox: mpsc::UnboundedReceiver<Internal<T, Q>>,
    sink: mpsc::UnboundedSender<Internal<T, Q>>,
    watch_tx: watch::Sender<ResourceSnapshot<Q, C::Decorated>>,
    handle: Option<RequestHandle>,
    poll_interval: Option<Duration>,
}

impl<T, Q, C> ResourceActor<T, Q, C>
where
    T: Send + 'static,
    Q: ResourceQuery,
    C: ItemDecorator<T>,
{
    async fn run(mut self) {
        info!(resource_id = %self.id, resource = %self.name, "resource machine started");
        let mut interval = self.poll_interval.map(tokio::time::interval);
        if let Some(interval) = interval.as_mut() {
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        }

        loop {
            let tick = async {
                match interval.as_mut() {
                    // First tick fires immediately and doubles as the
                    // on-entry fetch of the polling region
                    Some(interval) => {
                        interval.tick().await;
                    }
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                message = self.mailbox.recv() => match message {
                    None => break,
                    Some(Internal::External(ResourceEvent::Stop)) => break,
                    Some(message) => self.handle_message(message),
                },
                _ = tick => {
                    if let Some(directive) = self.core.on_poll_tick() {
                        self.execute(directive);
                    }
                }
            }
        }

        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        self.core.teardown();
        info!(resource_id = %self.id, resource = %self.name, "resource machine stopped");
    }

    fn handle_message(&mut self, message: Internal<T, Q>) {
        match message {
            Internal::External(event) => {
                let directive = match event {
                    ResourceEvent::Query { page, size, query } => {
                        Some(self.core.on_query(page, size, query))
                    }
                    ResourceEvent::NextPage => self.core.on_next_page(),
                    ResourceEvent::PrevPage => self.core.on_prev_page(),
                    ResourceEvent::Refresh => Some(self.core.on_refresh()),
                    // Stop is intercepted by the run loop
                    ResourceEvent::Stop => None,
                };
                if let Some(directive) = directive {
                    self.execute(directive);
                } else {
                    // Guard rejected the event; nothing changed
                }
            }
            Internal::Succeeded { tag, page } => {
                if self.core.apply_success(tag, page) {
                    self.publish();
                }
            }
            Internal::Failed { tag, error } => {
                if self.core.apply_failure(tag, error) {
                    self.publish();
                }
            }
        }
    }

    /// Cancel the previous in-flight request and issue the directive
    fn execute(&mut self, directive: FetchDirective) {
        if let Some(previous) = self.handle.take() {
            previous.cancel();
        }

        let fetcher = Arc::clone(&self.fetcher);
        let request = self.core.request.clone();
        debug!(
            resource = %self.name,
            request_id = directive.tag.id,
            page = request.page,
            "issuing fetch"
        );
        let handle = request::issue(
            directive.tag,
            async move { fetcher.fetch(request).await },
            self.sink.clone(),
            |tag, outcome| match outcome {
                Ok(page) => Internal::Succeeded { tag, page },
                Err(error) => Internal::Failed { tag, error },
            },
        );
        self.handle = Some(handle);
        self.publish();
    }

    fn publish(&mut self) {
        let core = &self.core;
        self.watch_tx.send_replace(ResourceSnapshot {
            status: core.status(),
            request: core.request.clone(),
            items: core
                .response
                .as_ref()
                .map(|r| r.items.clone())
                .unwrap_or_default(),
            total: core.total(),
            error: core.error.clone(),
            first_request: core.first_request(),
        });
    }
}
