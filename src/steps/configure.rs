// Copyright 2025 Cowboy AI, LLC.

//! Connector configuration step
//!
//! Loads the configurator for the chosen connector type and then tracks the
//! configuration the host-rendered component reports back. A configurator may
//! declare named sub-steps; navigation between them is monotonic, forward
//! moves require every earlier sub-step to be valid. A type without a
//! configurator renders as one implicit schema-driven step. Load failures
//! park the step in a retryable phase instead of poisoning the wizard.

use crate::api::ConnectorType;
use crate::configurator::{ConfiguratorBundle, ConfiguratorLoader};
use crate::errors::{ConsoleError, ConsoleResult};
use crate::request::{self, RequestHandle, RequestTag};
use crate::steps::{ConfigureProgress, StepNotification, StepOutput};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Spawn-time configuration of the configure step
#[derive(Debug, Clone)]
pub struct ConfigureConfig {
    /// Connector type whose configurator drives the step
    pub connector_type: ConnectorType,
    /// Configuration carried in from a duplicate flow or a jump back
    pub initial_configuration: Option<Value>,
    /// Sub-step to land on once the configurator is loaded
    pub target_sub_step: Option<usize>,
}

/// Lifecycle of the configurator load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurePhase {
    /// The loader call is in flight
    Loading,
    /// The configurator (or the implicit step) is ready
    Ready,
    /// The loader call failed; a retry re-enters `Loading`
    LoadFailed {
        /// Why the load failed
        message: String,
    },
}

/// Events accepted by the configure step
#[derive(Debug, Clone)]
pub enum ConfigureEvent {
    /// The rendered configurator reported a new configuration
    ConfigurationChanged {
        /// Current configuration value
        configuration: Value,
        /// Whether the active sub-step accepts it
        valid: bool,
    },
    /// Advance to the next sub-step
    NextSubStep,
    /// Return to the previous sub-step
    PrevSubStep,
    /// Jump to a sub-step directly
    SetSubStep(usize),
    /// Retry a failed configurator load
    RetryLoad,
    /// Finish the step from its last sub-step
    Confirm,
    /// Tear the step down
    Shutdown,
}

/// Published view of the configure step
#[derive(Debug, Clone)]
pub struct ConfigureSnapshot {
    /// Connector type being configured
    pub connector_type: ConnectorType,
    /// Load lifecycle
    pub phase: ConfigurePhase,
    /// Loaded configurator, absent for the implicit step
    pub bundle: Option<ConfiguratorBundle>,
    /// Sub-step labels, absent for the implicit step
    pub steps: Option<Vec<String>>,
    /// Active sub-step index
    pub active: usize,
    /// Whether the active sub-step is currently submittable
    pub valid: bool,
    /// Latest configuration value
    pub configuration: Option<Value>,
}

enum Message {
    External(ConfigureEvent),
    Loaded {
        tag: RequestTag,
        result: ConsoleResult<Option<ConfiguratorBundle>>,
    },
}

/// Handle to a running configure step
pub struct ConfigureHandle {
    events: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<ConfigureSnapshot>,
}

impl Clone for ConfigureHandle {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            state: self.state.clone(),
        }
    }
}

impl ConfigureHandle {
    /// Dispatch an event to the step
    pub fn dispatch(&self, event: ConfigureEvent) -> ConsoleResult<()> {
        self.events
            .send(Message::External(event))
            .map_err(|_| ConsoleError::ChannelClosed("configure step".to_string()))
    }

    /// Report a configuration change from the rendered component
    pub fn configuration_changed(&self, configuration: Value, valid: bool) -> ConsoleResult<()> {
        self.dispatch(ConfigureEvent::ConfigurationChanged {
            configuration,
            valid,
        })
    }

    /// Advance to the next sub-step
    pub fn next_sub_step(&self) -> ConsoleResult<()> {
        self.dispatch(ConfigureEvent::NextSubStep)
    }

    /// Return to the previous sub-step
    pub fn prev_sub_step(&self) -> ConsoleResult<()> {
        self.dispatch(ConfigureEvent::PrevSubStep)
    }

    /// Retry a failed configurator load
    pub fn retry_load(&self) -> ConsoleResult<()> {
        self.dispatch(ConfigureEvent::RetryLoad)
    }

    /// Finish the step
    pub fn confirm(&self) -> ConsoleResult<()> {
        self.dispatch(ConfigureEvent::Confirm)
    }

    /// Tear the step down
    pub fn shutdown(&self) {
        let _ = self.events.send(Message::External(ConfigureEvent::Shutdown));
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ConfigureSnapshot {
        self.state.borrow().clone()
    }

    /// Watch receiver for change notification
    pub fn watch(&self) -> watch::Receiver<ConfigureSnapshot> {
        self.state.clone()
    }
}

/// Spawn the connector configuration step
pub fn spawn_configure(
    loader: Arc<dyn ConfiguratorLoader>,
    config: ConfigureConfig,
    notify: mpsc::UnboundedSender<StepNotification>,
) -> ConfigureHandle {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (watch_tx, watch_rx) = watch::channel(ConfigureSnapshot {
        connector_type: config.connector_type.clone(),
        phase: ConfigurePhase::Loading,
        bundle: None,
        steps: None,
        active: 0,
        valid: false,
        configuration: config.initial_configuration.clone(),
    });

    let actor = ConfigureActor {
        loader,
        connector_type: config.connector_type,
        phase: ConfigurePhase::Loading,
        bundle: None,
        steps: None,
        active: 0,
        validity: Vec::new(),
        configuration: config.initial_configuration,
        target: config.target_sub_step,
        mailbox: events_rx,
        sink: events_tx.clone(),
        watch_tx,
        notify,
        handle: None,
        next_request_id: 0,
    };
    tokio::spawn(actor.run());

    ConfigureHandle {
        events: events_tx,
        state: watch_rx,
    }
}

struct ConfigureActor {
    loader: Arc<dyn ConfiguratorLoader>,
    connector_type: ConnectorType,
    phase: ConfigurePhase,
    bundle: Option<ConfiguratorBundle>,
    steps: Option<Vec<String>>,
    active: usize,
    validity: Vec<bool>,
    configuration: Option<Value>,
    target: Option<usize>,
    mailbox: mpsc::UnboundedReceiver<Message>,
    sink: mpsc::UnboundedSender<Message>,
    watch_tx: watch::Sender<ConfigureSnapshot>,
    notify: mpsc::UnboundedSender<StepNotification>,
    handle: Option<RequestHandle>,
    next_request_id: u64,
}

impl ConfigureActor {
    async fn run(mut self) {
        debug!(type_id = %self.connector_type.id, "configure step started");
        self.start_load();

        while let Some(message) = self.mailbox.recv().await {
            match message {
                Message::External(ConfigureEvent::Shutdown) => break,
                Message::External(event) => self.handle_event(event),
                Message::Loaded { tag, result } => self.conclude_load(tag, result),
            }
        }

        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        debug!(type_id = %self.connector_type.id, "configure step stopped");
    }

    fn sub_step_count(&self) -> usize {
        self.validity.len().max(1)
    }

    fn active_valid(&self) -> bool {
        self.validity.get(self.active).copied().unwrap_or(false)
    }

    fn start_load(&mut self) {
        self.phase = ConfigurePhase::Loading;
        self.next_request_id += 1;
        let tag = RequestTag {
            id: self.next_request_id,
            page: 0,
        };

        let loader = Arc::clone(&self.loader);
        let type_id = self.connector_type.id.clone();
        let handle = request::issue(
            tag,
            async move { loader.load(type_id).await },
            self.sink.clone(),
            |tag, result| Message::Loaded { tag, result },
        );
        self.handle = Some(handle);
        self.publish();
    }

    fn conclude_load(&mut self, tag: RequestTag, result: ConsoleResult<Option<ConfiguratorBundle>>) {
        let current = self.handle.as_ref().map(RequestHandle::tag);
        if current != Some(tag) {
            debug!(request_id = tag.id, "stale configurator load dropped");
            return;
        }
        self.handle = None;

        match result {
            Ok(bundle) => {
                let count = bundle.as_ref().map_or(1, ConfiguratorBundle::step_count);
                self.steps = bundle.as_ref().and_then(|b| b.steps.clone());
                self.bundle = bundle;
                self.validity = vec![false; count];
                // Jump targets come from sub-steps a previous pass visited
                self.active = self.target.take().map_or(0, |t| t.min(count - 1));
                self.phase = ConfigurePhase::Ready;
                debug!(
                    type_id = %self.connector_type.id,
                    sub_steps = count,
                    "configurator ready"
                );
                self.report_progress();
                self.publish();
            }
            Err(error) => {
                warn!(type_id = %self.connector_type.id, error = %error, "configurator load failed");
                self.phase = ConfigurePhase::LoadFailed {
                    message: error.to_string(),
                };
                self.publish();
                self.send(StepNotification::Failed(error));
            }
        }
    }

    fn handle_event(&mut self, event: ConfigureEvent) {
        match event {
            ConfigureEvent::RetryLoad => {
                if matches!(self.phase, ConfigurePhase::LoadFailed { .. }) {
                    self.start_load();
                } else {
                    debug!("retry ignored, load has not failed");
                }
                return;
            }
            ConfigureEvent::Shutdown => return,
            _ => {}
        }
        if self.phase != ConfigurePhase::Ready {
            debug!(?event, "event ignored, configurator not ready");
            return;
        }

        match event {
            ConfigureEvent::ConfigurationChanged {
                configuration,
                valid,
            } => {
                self.configuration = Some(configuration);
                if let Some(slot) = self.validity.get_mut(self.active) {
                    *slot = valid;
                }
                self.report_progress();
                self.publish();
            }
            ConfigureEvent::NextSubStep => {
                if !self.active_valid() {
                    debug!(active = self.active, "advance rejected, sub-step invalid");
                    return;
                }
                if self.active + 1 >= self.sub_step_count() {
                    debug!("advance rejected, already on last sub-step");
                    return;
                }
                self.active += 1;
                self.report_progress();
                self.publish();
            }
            ConfigureEvent::PrevSubStep => {
                if self.active == 0 {
                    debug!("already on first sub-step");
                    return;
                }
                self.active -= 1;
                self.report_progress();
                self.publish();
            }
            ConfigureEvent::SetSubStep(index) => self.set_sub_step(index),
            ConfigureEvent::Confirm => self.confirm(),
            ConfigureEvent::RetryLoad | ConfigureEvent::Shutdown => {}
        }
    }

    fn set_sub_step(&mut self, index: usize) {
        if index >= self.sub_step_count() {
            debug!(index, "jump rejected, no such sub-step");
            return;
        }
        // Backward jumps are free; forward jumps need a valid prefix
        if index > self.active && !self.validity[..index].iter().all(|valid| *valid) {
            debug!(index, "jump rejected, earlier sub-steps not valid");
            return;
        }
        self.active = index;
        self.report_progress();
        self.publish();
    }

    fn confirm(&mut self) {
        if self.active + 1 != self.sub_step_count() {
            debug!(active = self.active, "confirm rejected, not on last sub-step");
            return;
        }
        if !self.active_valid() {
            debug!("confirm rejected, configuration invalid");
            return;
        }
        let Some(configuration) = self.configuration.clone() else {
            debug!("confirm rejected, no configuration reported");
            return;
        };
        self.send(StepNotification::Done(StepOutput::Configuration(
            configuration,
        )));
    }

    fn report_progress(&self) {
        self.send(StepNotification::Progress(ConfigureProgress {
            steps: self.steps.clone(),
            active: self.active,
            valid: self.active_valid(),
            configuration: self.configuration.clone(),
        }));
    }

    fn send(&self, notification: StepNotification) {
        if self.notify.send(notification).is_err() {
            debug!(step = "configureConnector", "orchestrator notification channel closed");
        }
    }

    fn publish(&mut self) {
        self.watch_tx.send_replace(ConfigureSnapshot {
            connector_type: self.connector_type.clone(),
            phase: self.phase.clone(),
            bundle: self.bundle.clone(),
            steps: self.steps.clone(),
            active: self.active,
            valid: self.active_valid(),
            configuration: self.configuration.clone(),
        });
    }
}
