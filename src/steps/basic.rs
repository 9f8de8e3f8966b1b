// Copyright 2025 Cowboy AI, LLC.

//! Basic configuration step
//!
//! Collects the connector name and the service account the connector will
//! run under. The name gates validity; credentials are either entered
//! manually or created on confirm through the management API. A failed
//! creation keeps the step open with a retryable error.

use crate::api::{ApiError, ManagementApi, ServiceAccount};
use crate::errors::{ConsoleError, ConsoleResult};
use crate::request::{self, RequestHandle, RequestTag};
use crate::selection::Validity;
use crate::steps::{StepNotification, StepOutput};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Longest accepted connector name
pub const MAX_NAME_LENGTH: usize = 63;

/// Validate a connector name
///
/// Names are DNS-label shaped: lowercase alphanumerics and dashes, starting
/// and ending with an alphanumeric, at most 63 characters.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name is required".to_string());
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(format!("name must be {MAX_NAME_LENGTH} characters or fewer"));
    }
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_ends = name.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
        && name.ends_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !valid_chars || !valid_ends {
        return Err(
            "name must be lowercase alphanumerics and dashes, starting and ending with an alphanumeric"
                .to_string(),
        );
    }
    Ok(())
}

/// Spawn-time configuration of the basic step
#[derive(Debug, Clone, Default)]
pub struct BasicConfig {
    /// Seeded name, from a duplicate flow or a jump back
    pub name: Option<String>,
    /// Credentials already settled in an earlier pass
    pub service_account: Option<ServiceAccount>,
}

/// Events accepted by the basic step
#[derive(Debug, Clone)]
pub enum BasicEvent {
    /// Set the connector name
    SetName(String),
    /// Toggle automatic service account creation on confirm
    SetAutoCreate(bool),
    /// Supply credentials manually
    SetManualCredentials {
        /// Client id
        client_id: String,
        /// Client secret
        client_secret: String,
    },
    /// Drop any supplied or created credentials
    ClearCredentials,
    /// Finish the step, creating a service account first if requested
    Confirm,
    /// Tear the step down
    Shutdown,
}

/// Published view of the basic step
#[derive(Debug, Clone)]
pub struct BasicSnapshot {
    /// Current name
    pub name: String,
    /// Why the name is invalid, if it is
    pub name_error: Option<String>,
    /// Whether confirm creates a service account
    pub auto_create: bool,
    /// Settled credentials
    pub service_account: Option<ServiceAccount>,
    /// Whether a creation call is in flight
    pub creating: bool,
    /// Last creation failure, retryable via another confirm
    pub error: Option<ConsoleError>,
    /// Whether the step gates `next` open
    pub valid: bool,
}

enum Message {
    External(BasicEvent),
    Created {
        tag: RequestTag,
        result: Result<ServiceAccount, ApiError>,
    },
}

/// Handle to a running basic step
pub struct BasicHandle {
    events: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<BasicSnapshot>,
}

impl Clone for BasicHandle {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            state: self.state.clone(),
        }
    }
}

impl BasicHandle {
    /// Dispatch an event to the step
    pub fn dispatch(&self, event: BasicEvent) -> ConsoleResult<()> {
        self.events
            .send(Message::External(event))
            .map_err(|_| ConsoleError::ChannelClosed("basic step".to_string()))
    }

    /// Set the connector name
    pub fn set_name(&self, name: impl Into<String>) -> ConsoleResult<()> {
        self.dispatch(BasicEvent::SetName(name.into()))
    }

    /// Finish the step
    pub fn confirm(&self) -> ConsoleResult<()> {
        self.dispatch(BasicEvent::Confirm)
    }

    /// Tear the step down
    pub fn shutdown(&self) {
        let _ = self.events.send(Message::External(BasicEvent::Shutdown));
    }

    /// Current snapshot
    pub fn snapshot(&self) -> BasicSnapshot {
        self.state.borrow().clone()
    }

    /// Watch receiver for change notification
    pub fn watch(&self) -> watch::Receiver<BasicSnapshot> {
        self.state.clone()
    }
}

/// Spawn the basic configuration step
pub fn spawn_basic(
    api: Arc<dyn ManagementApi>,
    config: BasicConfig,
    notify: mpsc::UnboundedSender<StepNotification>,
) -> BasicHandle {
    let name = config.name.unwrap_or_default();
    let name_error = match validate_name(&name) {
        Ok(()) => None,
        // A fresh, still-empty name is not an error to show yet
        Err(_) if name.is_empty() => None,
        Err(message) => Some(message),
    };
    let valid = validate_name(&name).is_ok();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (watch_tx, watch_rx) = watch::channel(BasicSnapshot {
        name: name.clone(),
        name_error: name_error.clone(),
        auto_create: true,
        service_account: config.service_account.clone(),
        creating: false,
        error: None,
        valid,
    });

    let actor = BasicActor {
        api,
        name,
        name_error,
        auto_create: true,
        service_account: config.service_account,
        creating: false,
        error: None,
        mailbox: events_rx,
        sink: events_tx.clone(),
        watch_tx,
        notify,
        handle: None,
        next_request_id: 0,
        reported_validity: None,
    };
    tokio::spawn(actor.run());

    BasicHandle {
        events: events_tx,
        state: watch_rx,
    }
}

struct BasicActor {
    api: Arc<dyn ManagementApi>,
    name: String,
    name_error: Option<String>,
    auto_create: bool,
    service_account: Option<ServiceAccount>,
    creating: bool,
    error: Option<ConsoleError>,
    mailbox: mpsc::UnboundedReceiver<Message>,
    sink: mpsc::UnboundedSender<Message>,
    watch_tx: watch::Sender<BasicSnapshot>,
    notify: mpsc::UnboundedSender<StepNotification>,
    handle: Option<RequestHandle>,
    next_request_id: u64,
    reported_validity: Option<Validity>,
}

impl BasicActor {
    async fn run(mut self) {
        debug!(step = "basicConfiguration", "basic step started");
        self.report_validity();

        while let Some(message) = self.mailbox.recv().await {
            match message {
                Message::External(BasicEvent::Shutdown) => break,
                Message::External(event) => self.handle_event(event),
                Message::Created { tag, result } => self.conclude_creation(tag, result),
            }
        }

        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        debug!(step = "basicConfiguration", "basic step stopped");
    }

    fn is_valid(&self) -> bool {
        validate_name(&self.name).is_ok()
    }

    fn handle_event(&mut self, event: BasicEvent) {
        match event {
            BasicEvent::SetName(name) => {
                self.name_error = validate_name(&name).err();
                self.name = name;
                self.report_validity();
                self.publish();
            }
            BasicEvent::SetAutoCreate(auto_create) => {
                self.auto_create = auto_create;
                self.publish();
            }
            BasicEvent::SetManualCredentials {
                client_id,
                client_secret,
            } => {
                self.service_account = Some(ServiceAccount {
                    client_id,
                    client_secret,
                });
                self.publish();
            }
            BasicEvent::ClearCredentials => {
                self.service_account = None;
                self.publish();
            }
            BasicEvent::Confirm => self.confirm(),
            BasicEvent::Shutdown => {}
        }
    }

    fn confirm(&mut self) {
        if !self.is_valid() {
            debug!("confirm rejected, name invalid");
            return;
        }
        if self.creating {
            debug!("confirm ignored, service account creation in flight");
            return;
        }
        if self.service_account.is_none() && self.auto_create {
            self.create_service_account();
            return;
        }
        self.finish();
    }

    fn create_service_account(&mut self) {
        self.creating = true;
        self.error = None;
        self.next_request_id += 1;
        let tag = RequestTag {
            id: self.next_request_id,
            page: 0,
        };

        let api = Arc::clone(&self.api);
        let description = format!("service account for connector {}", self.name);
        let handle = request::issue(
            tag,
            async move { api.create_service_account(description).await },
            self.sink.clone(),
            |tag, result| Message::Created { tag, result },
        );
        self.handle = Some(handle);
        self.publish();
    }

    fn conclude_creation(&mut self, tag: RequestTag, result: Result<ServiceAccount, ApiError>) {
        let current = self.handle.as_ref().map(RequestHandle::tag);
        if current != Some(tag) {
            debug!(request_id = tag.id, "stale service account outcome dropped");
            return;
        }
        self.handle = None;
        self.creating = false;

        match result {
            Ok(account) => {
                self.service_account = Some(account);
                self.error = None;
                self.finish();
            }
            Err(error) => {
                warn!(reason = %error.reason, "service account creation failed");
                let error = ConsoleError::ServiceAccountFailed {
                    reason: error.reason,
                };
                self.error = Some(error.clone());
                self.publish();
                self.send(StepNotification::Failed(error));
            }
        }
    }

    fn finish(&mut self) {
        self.publish();
        self.send(StepNotification::Done(StepOutput::Basic {
            name: self.name.clone(),
            service_account: self.service_account.clone(),
        }));
    }

    fn report_validity(&mut self) {
        let validity = if self.is_valid() {
            Validity::Valid
        } else {
            Validity::Invalid
        };
        // Fresh steps are implicitly invalid; only edges are reported
        let baseline = self.reported_validity.unwrap_or(Validity::Invalid);
        self.reported_validity = Some(validity);
        if validity != baseline {
            self.send(StepNotification::ValidityChanged(validity));
        }
    }

    fn send(&self, notification: StepNotification) {
        if self.notify.send(notification).is_err() {
            debug!(step = "basicConfiguration", "orchestrator notification channel closed");
        }
    }

    fn publish(&mut self) {
        self.watch_tx.send_replace(BasicSnapshot {
            name: self.name.clone(),
            name_error: self.name_error.clone(),
            auto_create: self.auto_create,
            service_account: self.service_account.clone(),
            creating: self.creating,
            error: self.error.clone(),
            valid: self.is_valid(),
        });
    }
}
