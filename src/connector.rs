// Copyright 2025 Cowboy AI, LLC.

//! Per-connector lifecycle actor
//!
//! Every row of the connectors page gets one actor tracking that connector's
//! lifecycle. The transition table is pure ([`ConnectorMachine`]); the actor
//! shell issues desired-state patches and deletes through the cancellable
//! request layer and notifies its parent of the outcome. Failures roll the
//! row back to the state it mutated from.

use crate::api::{ApiError, Connector, DesiredState, ManagementApi};
use crate::errors::{ConsoleError, ConsoleResult};
use crate::request::{self, RequestHandle, RequestTag};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Lifecycle state of one connector row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectorState {
    /// Connector is running
    Ready,
    /// Connector is provisioned but stopped
    Stopped,
    /// Connector is gone; terminal for mutations
    Deleted,
    /// Start requested, patch in flight
    StartingConnector,
    /// Stop requested, patch in flight
    StoppingConnector,
    /// Delete requested, call in flight
    DeletingConnector,
}

impl ConnectorState {
    /// State name as observed by hosts
    pub fn name(&self) -> &'static str {
        match self {
            ConnectorState::Ready => "ready",
            ConnectorState::Stopped => "stopped",
            ConnectorState::Deleted => "deleted",
            ConnectorState::StartingConnector => "startingConnector",
            ConnectorState::StoppingConnector => "stoppingConnector",
            ConnectorState::DeletingConnector => "deletingConnector",
        }
    }

    /// Whether a mutation is in flight
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorState::StartingConnector
                | ConnectorState::StoppingConnector
                | ConnectorState::DeletingConnector
        )
    }

    /// Whether no further mutation is accepted
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectorState::Deleted)
    }

    /// Initial verification from the entity's desired state
    pub fn verify(desired: DesiredState) -> Self {
        match desired {
            DesiredState::Ready => ConnectorState::Ready,
            DesiredState::Stopped => ConnectorState::Stopped,
            DesiredState::Deleted => ConnectorState::Deleted,
        }
    }
}

/// Mutation the shell must issue for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationDirective {
    /// Patch the desired state
    Patch(DesiredState),
    /// Delete the connector
    Delete,
}

/// Pure transition table for one connector
#[derive(Debug, Clone)]
pub struct ConnectorMachine {
    connector: Connector,
    state: ConnectorState,
    rollback: Option<ConnectorState>,
}

impl ConnectorMachine {
    /// Build the machine, verifying the initial state from the entity
    pub fn new(connector: Connector) -> Self {
        let state = ConnectorState::verify(connector.desired_state);
        Self {
            connector,
            state,
            rollback: None,
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectorState {
        self.state
    }

    /// Current entity
    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    fn enter_transient(&mut self, target: ConnectorState) {
        self.rollback = Some(self.state);
        self.state = target;
    }

    fn reject(&self, target: ConnectorState) -> ConsoleError {
        ConsoleError::InvalidTransition {
            from: self.state.name().to_string(),
            to: target.name().to_string(),
        }
    }

    /// Start a stopped connector
    fn start(&mut self) -> ConsoleResult<MutationDirective> {
        match self.state {
            ConnectorState::Stopped => {
                self.enter_transient(ConnectorState::StartingConnector);
                Ok(MutationDirective::Patch(DesiredState::Ready))
            }
            _ => Err(self.reject(ConnectorState::StartingConnector)),
        }
    }

    /// Stop a running connector
    fn stop(&mut self) -> ConsoleResult<MutationDirective> {
        match self.state {
            ConnectorState::Ready => {
                self.enter_transient(ConnectorState::StoppingConnector);
                Ok(MutationDirective::Patch(DesiredState::Stopped))
            }
            _ => Err(self.reject(ConnectorState::StoppingConnector)),
        }
    }

    /// Delete a connector in any settled non-terminal state
    fn remove(&mut self) -> ConsoleResult<MutationDirective> {
        match self.state {
            ConnectorState::Ready | ConnectorState::Stopped => {
                self.enter_transient(ConnectorState::DeletingConnector);
                Ok(MutationDirective::Delete)
            }
            _ => Err(self.reject(ConnectorState::DeletingConnector)),
        }
    }

    /// A mutation concluded; re-verify from the updated entity
    fn apply_success(&mut self, updated: Option<Connector>) {
        self.rollback = None;
        match self.state {
            ConnectorState::DeletingConnector => {
                self.connector.desired_state = DesiredState::Deleted;
                self.state = ConnectorState::Deleted;
            }
            _ => {
                if let Some(updated) = updated {
                    self.connector = updated;
                }
                self.state = ConnectorState::verify(self.connector.desired_state);
            }
        }
    }

    /// A mutation failed; return to the state it was issued from
    fn apply_failure(&mut self) {
        if let Some(previous) = self.rollback.take() {
            self.state = previous;
        }
    }

    /// Entity refresh from a polling merge
    ///
    /// Ignored while a mutation is in flight so the in-flight outcome,
    /// not a concurrently fetched page, settles the row.
    fn set_connector(&mut self, connector: Connector) {
        if self.state.is_transient() {
            debug!(connector_id = %connector.id, "entity refresh ignored during mutation");
            return;
        }
        self.connector = connector;
        self.state = ConnectorState::verify(self.connector.desired_state);
    }
}

/// Events accepted by a connector actor
#[derive(Debug, Clone)]
pub enum ConnectorEvent {
    /// Start a stopped connector
    Start,
    /// Stop a running connector
    Stop,
    /// Delete the connector
    Remove,
    /// Select the row; forwarded to the parent in any state
    Select,
    /// Entity refresh from a page merge
    SetConnector(Connector),
    /// Tear the actor down
    Shutdown,
}

/// Notifications a connector actor sends its parent
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorNotification {
    /// A mutation concluded successfully
    ActionSuccess {
        /// Connector the mutation targeted
        id: String,
    },
    /// A mutation was rejected
    ActionFailure {
        /// Connector the mutation targeted
        id: String,
        /// Reason reported by the API, shown verbatim
        message: String,
    },
    /// The row was selected
    Selected {
        /// Selected connector
        id: String,
    },
}

/// Published view of one connector row
#[derive(Debug, Clone)]
pub struct ConnectorSnapshot {
    /// Current entity
    pub connector: Connector,
    /// Lifecycle state
    pub state: ConnectorState,
}

enum Message {
    External(ConnectorEvent),
    Patched {
        tag: RequestTag,
        result: Result<Connector, ApiError>,
    },
    Removed {
        tag: RequestTag,
        result: Result<(), ApiError>,
    },
}

/// Handle to a running connector actor
///
/// This is also the decorated item the connectors page stores per row.
pub struct ConnectorHandle {
    id: String,
    events: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<ConnectorSnapshot>,
}

impl Clone for ConnectorHandle {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            events: self.events.clone(),
            state: self.state.clone(),
        }
    }
}

impl std::fmt::Debug for ConnectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorHandle")
            .field("id", &self.id)
            .field("state", &self.state.borrow().state)
            .finish()
    }
}

impl ConnectorHandle {
    /// Connector id this actor tracks
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Dispatch an event to the actor
    pub fn dispatch(&self, event: ConnectorEvent) -> ConsoleResult<()> {
        self.events
            .send(Message::External(event))
            .map_err(|_| ConsoleError::ChannelClosed(format!("connector {}", self.id)))
    }

    /// Start a stopped connector
    pub fn start(&self) -> ConsoleResult<()> {
        self.dispatch(ConnectorEvent::Start)
    }

    /// Stop a running connector
    pub fn stop(&self) -> ConsoleResult<()> {
        self.dispatch(ConnectorEvent::Stop)
    }

    /// Delete the connector
    pub fn remove(&self) -> ConsoleResult<()> {
        self.dispatch(ConnectorEvent::Remove)
    }

    /// Select the row
    pub fn select(&self) -> ConsoleResult<()> {
        self.dispatch(ConnectorEvent::Select)
    }

    /// Tear the actor down; in-flight mutations are cancelled
    pub fn shutdown(&self) {
        let _ = self.events.send(Message::External(ConnectorEvent::Shutdown));
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ConnectorSnapshot {
        self.state.borrow().clone()
    }

    /// Watch receiver for change notification
    pub fn watch(&self) -> watch::Receiver<ConnectorSnapshot> {
        self.state.clone()
    }
}

/// Spawn an actor for one connector
pub fn spawn(
    api: Arc<dyn ManagementApi>,
    connector: Connector,
    notify: mpsc::UnboundedSender<ConnectorNotification>,
) -> ConnectorHandle {
    let id = connector.id.clone();
    let machine = ConnectorMachine::new(connector);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (watch_tx, watch_rx) = watch::channel(ConnectorSnapshot {
        connector: machine.connector().clone(),
        state: machine.state(),
    });

    let actor = ConnectorActor {
        machine,
        api,
        mailbox: events_rx,
        sink: events_tx.clone(),
        watch_tx,
        notify,
        handle: None,
        next_request_id: 0,
    };
    tokio::spawn(actor.run());

    ConnectorHandle {
        id,
        events: events_tx,
        state: watch_rx,
    }
}

struct ConnectorActor {
    machine: ConnectorMachine,
    api: Arc<dyn ManagementApi>,
    mailbox: mpsc::UnboundedReceiver<Message>,
    sink: mpsc::UnboundedSender<Message>,
    watch_tx: watch::Sender<ConnectorSnapshot>,
    notify: mpsc::UnboundedSender<ConnectorNotification>,
    handle: Option<RequestHandle>,
    next_request_id: u64,
}

impl ConnectorActor {
    async fn run(mut self) {
        let id = self.machine.connector().id.clone();
        debug!(connector_id = %id, state = self.machine.state().name(), "connector actor started");

        while let Some(message) = self.mailbox.recv().await {
            if matches!(message, Message::External(ConnectorEvent::Shutdown)) {
                break;
            }
            self.handle_message(message);
        }

        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        debug!(connector_id = %id, "connector actor stopped");
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::External(event) => self.handle_event(event),
            Message::Patched { tag, result } => match result {
                Ok(updated) => self.conclude_success(tag, Some(updated)),
                Err(error) => self.conclude_failure(tag, error),
            },
            Message::Removed { tag, result } => match result {
                Ok(()) => self.conclude_success(tag, None),
                Err(error) => self.conclude_failure(tag, error),
            },
        }
    }

    fn handle_event(&mut self, event: ConnectorEvent) {
        let id = self.machine.connector().id.clone();
        let directive = match event {
            ConnectorEvent::Start => self.machine.start(),
            ConnectorEvent::Stop => self.machine.stop(),
            ConnectorEvent::Remove => self.machine.remove(),
            ConnectorEvent::Select => {
                self.send_notification(ConnectorNotification::Selected { id });
                return;
            }
            ConnectorEvent::SetConnector(connector) => {
                self.machine.set_connector(connector);
                self.publish();
                return;
            }
            // Intercepted by the run loop
            ConnectorEvent::Shutdown => return,
        };

        match directive {
            Ok(directive) => {
                self.issue(directive);
                self.publish();
            }
            Err(error) => {
                debug!(connector_id = %id, %error, "event rejected in current state");
            }
        }
    }

    fn issue(&mut self, directive: MutationDirective) {
        if let Some(previous) = self.handle.take() {
            previous.cancel();
        }
        self.next_request_id += 1;
        // Row mutations are not page-scoped
        let tag = RequestTag {
            id: self.next_request_id,
            page: 0,
        };

        let api = Arc::clone(&self.api);
        let id = self.machine.connector().id.clone();
        let handle = match directive {
            MutationDirective::Patch(state) => request::issue(
                tag,
                async move { api.patch_connector_desired_state(id, state).await },
                self.sink.clone(),
                |tag, result| Message::Patched { tag, result },
            ),
            MutationDirective::Delete => request::issue(
                tag,
                async move { api.delete_connector(id).await },
                self.sink.clone(),
                |tag, result| Message::Removed { tag, result },
            ),
        };
        self.handle = Some(handle);
    }

    fn conclude_success(&mut self, tag: RequestTag, updated: Option<Connector>) {
        if !self.accepts(tag) {
            return;
        }
        self.handle = None;
        self.machine.apply_success(updated);
        let id = self.machine.connector().id.clone();
        info!(connector_id = %id, state = self.machine.state().name(), "connector mutation succeeded");
        self.publish();
        self.send_notification(ConnectorNotification::ActionSuccess { id });
    }

    fn conclude_failure(&mut self, tag: RequestTag, error: ApiError) {
        if !self.accepts(tag) {
            return;
        }
        self.handle = None;
        self.machine.apply_failure();
        let id = self.machine.connector().id.clone();
        warn!(connector_id = %id, reason = %error.reason, "connector mutation failed");
        self.publish();
        self.send_notification(ConnectorNotification::ActionFailure {
            id,
            message: error.reason,
        });
    }

    fn accepts(&self, tag: RequestTag) -> bool {
        match &self.handle {
            Some(handle) if handle.tag() == tag => true,
            _ => {
                debug!(request_id = tag.id, "stale mutation outcome dropped");
                false
            }
        }
    }

    fn send_notification(&self, notification: ConnectorNotification) {
        if self.notify.send(notification).is_err() {
            debug!("parent notification channel closed");
        }
    }

    fn publish(&mut self) {
        self.watch_tx.send_replace(ConnectorSnapshot {
            connector: self.machine.connector().clone(),
            state: self.machine.state(),
        });
    }
}
