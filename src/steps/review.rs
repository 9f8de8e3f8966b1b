// Copyright 2025 Cowboy AI, LLC.

//! Review and save step
//!
//! Shows the assembled connector definition with the configuration as
//! editable JSON text. Every edit re-runs the schema check; save is gated on
//! a clean check and submits the definition through the management API. A
//! rejected save surfaces the reason and leaves the step open, so the user
//! can adjust and try again.

use crate::api::{ApiError, Connector, ConnectorDefinition, ConnectorType, ManagementApi, ServiceAccount};
use crate::errors::{ConsoleError, ConsoleResult};
use crate::request::{self, RequestHandle, RequestTag};
use crate::steps::{StepNotification, StepOutput};
use crate::validation::{
    parse_configuration, ConfigurationCheck, SchemaValidator, ValidatorCache, Violation,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Spawn-time configuration of the review step
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Connector type whose schema gates the save
    pub connector_type: ConnectorType,
    /// Validated connector name
    pub name: String,
    /// Target Kafka instance
    pub kafka_id: String,
    /// Target namespace
    pub namespace_id: String,
    /// Credentials to attach, when settled earlier
    pub service_account: Option<ServiceAccount>,
    /// Configuration assembled by the configure step
    pub configuration: Value,
}

/// Events accepted by the review step
#[derive(Debug, Clone)]
pub enum ReviewEvent {
    /// The configuration text was edited
    EditConfiguration {
        /// New text, checked on arrival
        text: String,
    },
    /// Submit the definition
    Save,
    /// Tear the step down
    Shutdown,
}

/// Published view of the review step
#[derive(Debug, Clone)]
pub struct ReviewSnapshot {
    /// Connector name under review
    pub name: String,
    /// Configuration text as currently edited
    pub text: String,
    /// Violations from the latest check; empty when clean
    pub violations: Vec<Violation>,
    /// Whether the definition is submittable
    pub valid: bool,
    /// Whether a save call is in flight
    pub saving: bool,
    /// Reason the last save was rejected
    pub save_error: Option<String>,
}

enum Message {
    External(ReviewEvent),
    Saved {
        tag: RequestTag,
        result: Result<Connector, ApiError>,
    },
}

/// Handle to a running review step
pub struct ReviewHandle {
    events: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<ReviewSnapshot>,
}

impl Clone for ReviewHandle {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            state: self.state.clone(),
        }
    }
}

impl ReviewHandle {
    /// Dispatch an event to the step
    pub fn dispatch(&self, event: ReviewEvent) -> ConsoleResult<()> {
        self.events
            .send(Message::External(event))
            .map_err(|_| ConsoleError::ChannelClosed("review step".to_string()))
    }

    /// Replace the configuration text
    pub fn edit(&self, text: impl Into<String>) -> ConsoleResult<()> {
        self.dispatch(ReviewEvent::EditConfiguration { text: text.into() })
    }

    /// Submit the definition
    pub fn save(&self) -> ConsoleResult<()> {
        self.dispatch(ReviewEvent::Save)
    }

    /// Tear the step down
    pub fn shutdown(&self) {
        let _ = self.events.send(Message::External(ReviewEvent::Shutdown));
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ReviewSnapshot {
        self.state.borrow().clone()
    }

    /// Watch receiver for change notification
    pub fn watch(&self) -> watch::Receiver<ReviewSnapshot> {
        self.state.clone()
    }
}

/// Spawn the review step
pub fn spawn_review(
    api: Arc<dyn ManagementApi>,
    validators: Arc<ValidatorCache>,
    config: ReviewConfig,
    notify: mpsc::UnboundedSender<StepNotification>,
) -> ReviewHandle {
    let text = serde_json::to_string_pretty(&config.configuration)
        .unwrap_or_else(|_| config.configuration.to_string());

    // A schema that fails to compile downgrades the check to parse-only;
    // the server still validates on save
    let validator = match validators.validator_for(&config.connector_type.id, &config.connector_type.schema)
    {
        Ok(validator) => Some(validator),
        Err(error) => {
            warn!(type_id = %config.connector_type.id, error = %error, "schema unusable, parse-only checks");
            None
        }
    };

    let check = check_configuration(validator.as_deref(), &text);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (watch_tx, watch_rx) = watch::channel(ReviewSnapshot {
        name: config.name.clone(),
        text: text.clone(),
        violations: check.violations.clone(),
        valid: check.is_valid(),
        saving: false,
        save_error: None,
    });

    let actor = ReviewActor {
        api,
        validator,
        connector_type: config.connector_type,
        name: config.name,
        kafka_id: config.kafka_id,
        namespace_id: config.namespace_id,
        service_account: config.service_account,
        text,
        check,
        saving: false,
        save_error: None,
        mailbox: events_rx,
        sink: events_tx.clone(),
        watch_tx,
        notify,
        handle: None,
        next_request_id: 0,
    };
    tokio::spawn(actor.run());

    ReviewHandle {
        events: events_tx,
        state: watch_rx,
    }
}

fn check_configuration(validator: Option<&SchemaValidator>, text: &str) -> ConfigurationCheck {
    match validator {
        Some(validator) => validator.check_text(text),
        None => match parse_configuration(text) {
            Ok(value) => ConfigurationCheck {
                value: Some(value),
                violations: Vec::new(),
            },
            Err(error) => ConfigurationCheck {
                value: None,
                violations: vec![Violation {
                    path: "/".to_string(),
                    message: error.to_string(),
                }],
            },
        },
    }
}

struct ReviewActor {
    api: Arc<dyn ManagementApi>,
    validator: Option<Arc<SchemaValidator>>,
    connector_type: ConnectorType,
    name: String,
    kafka_id: String,
    namespace_id: String,
    service_account: Option<ServiceAccount>,
    text: String,
    check: ConfigurationCheck,
    saving: bool,
    save_error: Option<String>,
    mailbox: mpsc::UnboundedReceiver<Message>,
    sink: mpsc::UnboundedSender<Message>,
    watch_tx: watch::Sender<ReviewSnapshot>,
    notify: mpsc::UnboundedSender<StepNotification>,
    handle: Option<RequestHandle>,
    next_request_id: u64,
}

impl ReviewActor {
    async fn run(mut self) {
        debug!(name = %self.name, "review step started");

        while let Some(message) = self.mailbox.recv().await {
            match message {
                Message::External(ReviewEvent::Shutdown) => break,
                Message::External(event) => self.handle_event(event),
                Message::Saved { tag, result } => self.conclude_save(tag, result),
            }
        }

        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        debug!(name = %self.name, "review step stopped");
    }

    fn handle_event(&mut self, event: ReviewEvent) {
        match event {
            ReviewEvent::EditConfiguration { text } => {
                self.check = check_configuration(self.validator.as_deref(), &text);
                self.text = text;
                self.save_error = None;
                self.publish();
            }
            ReviewEvent::Save => self.save(),
            ReviewEvent::Shutdown => {}
        }
    }

    fn save(&mut self) {
        if self.saving {
            debug!("save ignored, already in flight");
            return;
        }
        if !self.check.is_valid() {
            debug!(
                violations = self.check.violations.len(),
                "save rejected, configuration not valid"
            );
            return;
        }
        let Some(configuration) = self.check.value.clone() else {
            return;
        };

        self.saving = true;
        self.save_error = None;
        self.next_request_id += 1;
        let tag = RequestTag {
            id: self.next_request_id,
            page: 0,
        };

        let definition = ConnectorDefinition {
            name: self.name.clone(),
            connector_type_id: self.connector_type.id.clone(),
            kafka_id: self.kafka_id.clone(),
            namespace_id: self.namespace_id.clone(),
            configuration,
            service_account: self.service_account.clone(),
        };
        info!(name = %definition.name, type_id = %definition.connector_type_id, "saving connector");

        let api = Arc::clone(&self.api);
        let handle = request::issue(
            tag,
            async move { api.create_connector(definition).await },
            self.sink.clone(),
            |tag, result| Message::Saved { tag, result },
        );
        self.handle = Some(handle);
        self.publish();
    }

    fn conclude_save(&mut self, tag: RequestTag, result: Result<Connector, ApiError>) {
        let current = self.handle.as_ref().map(RequestHandle::tag);
        if current != Some(tag) {
            debug!(request_id = tag.id, "stale save outcome dropped");
            return;
        }
        self.handle = None;
        self.saving = false;

        match result {
            Ok(connector) => {
                info!(id = %connector.id, name = %connector.name, "connector saved");
                self.publish();
                self.send(StepNotification::Done(StepOutput::Saved(connector)));
            }
            Err(error) => {
                warn!(reason = %error.reason, "save rejected");
                self.save_error = Some(error.reason.clone());
                self.publish();
                self.send(StepNotification::SaveFailed {
                    reason: error.reason,
                });
            }
        }
    }

    fn send(&self, notification: StepNotification) {
        if self.notify.send(notification).is_err() {
            debug!(step = "reviewConfiguration", "orchestrator notification channel closed");
        }
    }

    fn snapshot(&self) -> ReviewSnapshot {
        ReviewSnapshot {
            name: self.name.clone(),
            text: self.text.clone(),
            violations: self.check.violations.clone(),
            valid: self.check.is_valid(),
            saving: self.saving,
            save_error: self.save_error.clone(),
        }
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.watch_tx.send_replace(snapshot);
    }
}
