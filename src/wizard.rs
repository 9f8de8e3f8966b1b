// Copyright 2025 Cowboy AI, LLC.

//! Connector creation wizard
//!
//! Sequential steps with exactly one live child machine at a time: pick a
//! connector type, a Kafka instance and a namespace, settle name and
//! credentials, configure the connector, then review and save. Finished
//! steps hand their output upward and the orchestrator merges it into the
//! wizard context, which in turn unlocks jumps to later steps. Every step
//! switch tears the previous child down and replaces the notification
//! channel, so a straggling message from a dead step can never touch the
//! context.
//!
//! A seeded wizard (duplicate an existing connector, resume after a failed
//! save) starts with ids and values already merged; pickers resolve seeded
//! ids into entities as their pages arrive and report them as prefills,
//! which merge without advancing the active step.

use crate::api::{Connector, ConnectorType, KafkaInstance, ManagementApi, Namespace, ServiceAccount};
use crate::configurator::ConfiguratorLoader;
use crate::errors::{ConsoleError, ConsoleResult};
use crate::paginated::{ResourceOptions, SearchQuery};
use crate::selection::Validity;
use crate::steps::{
    spawn_basic, spawn_configure, spawn_connector_type, spawn_kafka, spawn_namespace, spawn_review,
    BasicConfig, BasicEvent, BasicHandle, ConfigureConfig, ConfigureEvent, ConfigureHandle,
    ConnectorTypePickerHandle, KafkaPickerHandle, NamespacePickerHandle, PickerConfig, PickerEvent,
    ReviewConfig, ReviewEvent, ReviewHandle, StepNotification, StepOutput, TypeQuery,
};
use crate::validation::ValidatorCache;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

/// The wizard's steps, in traversal order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardStep {
    /// Pick a connector type from the catalog
    SelectConnectorType,
    /// Pick the Kafka instance the connector attaches to
    SelectKafka,
    /// Pick the deployment namespace
    SelectNamespace,
    /// Name the connector and settle credentials
    BasicConfiguration,
    /// Configure the connector through its configurator
    ConfigureConnector,
    /// Review the definition and save it
    ReviewConfiguration,
    /// Terminal state after a successful save
    Saved,
}

impl WizardStep {
    /// Step name as used in logs and guard messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectConnectorType => "selectConnectorType",
            Self::SelectKafka => "selectKafka",
            Self::SelectNamespace => "selectNamespace",
            Self::BasicConfiguration => "basicConfiguration",
            Self::ConfigureConnector => "configureConnector",
            Self::ReviewConfiguration => "reviewConfiguration",
            Self::Saved => "saved",
        }
    }

    /// Position in traversal order
    pub fn index(&self) -> usize {
        match self {
            Self::SelectConnectorType => 0,
            Self::SelectKafka => 1,
            Self::SelectNamespace => 2,
            Self::BasicConfiguration => 3,
            Self::ConfigureConnector => 4,
            Self::ReviewConfiguration => 5,
            Self::Saved => 6,
        }
    }

    /// The step a finished step advances into
    pub fn next(&self) -> Option<WizardStep> {
        match self {
            Self::SelectConnectorType => Some(Self::SelectKafka),
            Self::SelectKafka => Some(Self::SelectNamespace),
            Self::SelectNamespace => Some(Self::BasicConfiguration),
            Self::BasicConfiguration => Some(Self::ConfigureConnector),
            Self::ConfigureConnector => Some(Self::ReviewConfiguration),
            Self::ReviewConfiguration | Self::Saved => None,
        }
    }

    fn jump_event_name(&self) -> &'static str {
        match self {
            Self::SelectConnectorType => "jumpToSelectConnectorType",
            Self::SelectKafka => "jumpToSelectKafka",
            Self::SelectNamespace => "jumpToSelectNamespace",
            Self::BasicConfiguration => "jumpToBasicConfiguration",
            Self::ConfigureConnector => "jumpToConfigureConnector",
            Self::ReviewConfiguration => "jumpToReviewConfiguration",
            Self::Saved => "jumpToSaved",
        }
    }
}

/// What a jump back to an earlier step does to later answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JumpBackBehavior {
    /// Keep everything; later steps re-open with their answers intact
    #[default]
    Preserve,
    /// Drop every answer belonging to steps after the jump target
    ClearDownstream,
}

/// Spawn-time options of the wizard
#[derive(Debug, Clone, Default)]
pub struct WizardOptions {
    /// Behavior of jumps to earlier steps
    pub jump_back: JumpBackBehavior,
}

/// Values to prefill a fresh wizard with
///
/// Used when duplicating an existing connector and when re-entering after
/// a failed save. Ids resolve into entities once the matching picker page
/// arrives; the name and configuration merge immediately.
#[derive(Debug, Clone, Default)]
pub struct WizardSeed {
    /// Connector type to preselect
    pub connector_type_id: Option<String>,
    /// Kafka instance to preselect
    pub kafka_id: Option<String>,
    /// Namespace to preselect
    pub namespace_id: Option<String>,
    /// Connector name to prefill
    pub name: Option<String>,
    /// Configuration to carry in, treated as already configured
    pub configuration: Option<Value>,
}

/// Mirror of the configure step inside the wizard context
#[derive(Debug, Clone, Default)]
pub struct ConfigureState {
    /// Whether a configurator load has completed at least once
    pub loaded: bool,
    /// Sub-step labels, `None` for the implicit single step
    pub steps: Option<Vec<String>>,
    /// The sub-step the configure step is (or was last) on
    pub active: usize,
    /// Validity of that sub-step at the last report
    pub valid: bool,
    /// Whether configuration has been settled once
    pub done: bool,
}

/// Everything the steps have answered so far
///
/// The ids live alongside the entities because a seeded wizard knows ids
/// before any picker has resolved them, and the review step only needs ids.
#[derive(Debug, Clone, Default)]
pub struct WizardContext {
    /// Chosen connector type, with its configuration schema
    pub connector_type: Option<ConnectorType>,
    /// Chosen Kafka instance id
    pub kafka_id: Option<String>,
    /// Chosen Kafka instance, when resolved by the picker
    pub kafka: Option<KafkaInstance>,
    /// Chosen namespace id
    pub namespace_id: Option<String>,
    /// Chosen namespace, when resolved by the picker
    pub namespace: Option<Namespace>,
    /// Validated connector name
    pub name: Option<String>,
    /// Settled credentials
    pub service_account: Option<ServiceAccount>,
    /// Latest configuration value
    pub configuration: Option<Value>,
    /// Configure step progress
    pub configure: ConfigureState,
}

impl WizardContext {
    /// Whether a jump to `step` would be accepted right now
    ///
    /// Steps unlock in order: each one requires every earlier answer. The
    /// saved state is never a jump target.
    pub fn can_enter(&self, step: WizardStep) -> ConsoleResult<()> {
        if step == WizardStep::Saved {
            return Err(ConsoleError::GuardRejected {
                event: step.jump_event_name().to_string(),
                reason: "saving is the only way into the saved state".to_string(),
            });
        }
        match self.first_gap(step) {
            None => Ok(()),
            Some(reason) => Err(ConsoleError::GuardRejected {
                event: step.jump_event_name().to_string(),
                reason: reason.to_string(),
            }),
        }
    }

    fn first_gap(&self, upto: WizardStep) -> Option<&'static str> {
        let index = upto.index();
        if index > WizardStep::SelectConnectorType.index() && self.connector_type.is_none() {
            return Some("no connector type selected");
        }
        if index > WizardStep::SelectKafka.index() && self.kafka_id.is_none() {
            return Some("no kafka instance selected");
        }
        if index > WizardStep::SelectNamespace.index() && self.namespace_id.is_none() {
            return Some("no namespace selected");
        }
        if index > WizardStep::BasicConfiguration.index() && self.name.is_none() {
            return Some("basic configuration not finished");
        }
        if index > WizardStep::ConfigureConnector.index()
            && !(self.configure.done && self.configuration.is_some())
        {
            return Some("connector not configured");
        }
        None
    }

    /// Drop every answer belonging to steps after `step`
    pub fn clear_after(&mut self, step: WizardStep) {
        let index = step.index();
        if index < WizardStep::SelectKafka.index() {
            self.kafka_id = None;
            self.kafka = None;
        }
        if index < WizardStep::SelectNamespace.index() {
            self.namespace_id = None;
            self.namespace = None;
        }
        if index < WizardStep::BasicConfiguration.index() {
            self.name = None;
            self.service_account = None;
        }
        if index < WizardStep::ConfigureConnector.index() {
            self.clear_configuration();
        }
    }

    fn clear_configuration(&mut self) {
        self.configuration = None;
        self.configure = ConfigureState::default();
    }
}

/// The live child machine of the active step
#[derive(Clone)]
pub enum ActiveStep {
    /// Connector type picker
    ConnectorType(ConnectorTypePickerHandle),
    /// Kafka instance picker
    Kafka(KafkaPickerHandle),
    /// Namespace picker
    Namespace(NamespacePickerHandle),
    /// Basic configuration machine
    Basic(BasicHandle),
    /// Configure machine
    Configure(ConfigureHandle),
    /// Review machine
    Review(ReviewHandle),
    /// No child; the wizard finished with this connector
    Saved(Connector),
}

impl fmt::Debug for ActiveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectorType(_) => write!(f, "ActiveStep::ConnectorType"),
            Self::Kafka(_) => write!(f, "ActiveStep::Kafka"),
            Self::Namespace(_) => write!(f, "ActiveStep::Namespace"),
            Self::Basic(_) => write!(f, "ActiveStep::Basic"),
            Self::Configure(_) => write!(f, "ActiveStep::Configure"),
            Self::Review(_) => write!(f, "ActiveStep::Review"),
            Self::Saved(connector) => write!(f, "ActiveStep::Saved({})", connector.id),
        }
    }
}

/// Published view of the wizard
#[derive(Debug, Clone)]
pub struct WizardSnapshot {
    /// Active step
    pub step: WizardStep,
    /// Handle to the active step's machine
    pub active: ActiveStep,
    /// Answers merged so far
    pub context: WizardContext,
    /// Whether the active step reports itself completable; meaningful for
    /// the picker, basic and configure steps
    pub step_valid: bool,
    /// Reason the last save was rejected, cleared on step changes
    pub save_error: Option<String>,
}

/// Events accepted by the wizard
#[derive(Debug, Clone)]
pub enum WizardEvent {
    /// Jump to the connector type step
    JumpToSelectConnectorType,
    /// Jump to the Kafka step
    JumpToSelectKafka,
    /// Jump to the namespace step
    JumpToSelectNamespace,
    /// Jump to the basic configuration step
    JumpToBasicConfiguration,
    /// Jump to the configure step, optionally onto a sub-step
    JumpToConfigureConnector {
        /// Sub-step to land on; defaults to where the step last was
        sub_step: Option<usize>,
    },
    /// Jump to the review step
    JumpToReviewConfiguration,
    /// Forward to the connector type picker
    ConnectorType(PickerEvent<TypeQuery>),
    /// Forward to the Kafka picker
    Kafka(PickerEvent<SearchQuery>),
    /// Forward to the namespace picker
    Namespace(PickerEvent<SearchQuery>),
    /// Forward to the basic configuration step
    Basic(BasicEvent),
    /// Forward to the configure step
    Configure(ConfigureEvent),
    /// Forward to the review step
    Review(ReviewEvent),
    /// Tear the wizard and its active child down
    Stop,
}

/// Handle to a running wizard
pub struct WizardHandle {
    events: mpsc::UnboundedSender<WizardEvent>,
    state: watch::Receiver<WizardSnapshot>,
}

impl Clone for WizardHandle {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            state: self.state.clone(),
        }
    }
}

impl WizardHandle {
    /// Dispatch an event to the wizard
    pub fn dispatch(&self, event: WizardEvent) -> ConsoleResult<()> {
        self.events
            .send(event)
            .map_err(|_| ConsoleError::ChannelClosed("creation wizard".to_string()))
    }

    /// Jump to a step; the wizard enforces the entry guards
    pub fn jump_to(&self, step: WizardStep) -> ConsoleResult<()> {
        let event = match step {
            WizardStep::SelectConnectorType => WizardEvent::JumpToSelectConnectorType,
            WizardStep::SelectKafka => WizardEvent::JumpToSelectKafka,
            WizardStep::SelectNamespace => WizardEvent::JumpToSelectNamespace,
            WizardStep::BasicConfiguration => WizardEvent::JumpToBasicConfiguration,
            WizardStep::ConfigureConnector => {
                WizardEvent::JumpToConfigureConnector { sub_step: None }
            }
            WizardStep::ReviewConfiguration => WizardEvent::JumpToReviewConfiguration,
            WizardStep::Saved => {
                return Err(ConsoleError::GuardRejected {
                    event: step.jump_event_name().to_string(),
                    reason: "saving is the only way into the saved state".to_string(),
                })
            }
        };
        self.dispatch(event)
    }

    /// Jump to a specific configurator sub-step
    pub fn jump_to_configure_sub_step(&self, sub_step: usize) -> ConsoleResult<()> {
        self.dispatch(WizardEvent::JumpToConfigureConnector {
            sub_step: Some(sub_step),
        })
    }

    /// Tear the wizard down
    pub fn stop(&self) {
        let _ = self.events.send(WizardEvent::Stop);
    }

    /// Current snapshot
    pub fn snapshot(&self) -> WizardSnapshot {
        self.state.borrow().clone()
    }

    /// Watch receiver for change notification
    pub fn watch(&self) -> watch::Receiver<WizardSnapshot> {
        self.state.clone()
    }

    /// Snapshot stream for hosts that consume async streams
    pub fn stream(&self) -> WatchStream<WizardSnapshot> {
        WatchStream::new(self.state.clone())
    }
}

/// Spawn a creation wizard
///
/// `on_save` fires exactly once, with the saved connector, when the review
/// step's save succeeds.
pub fn spawn(
    api: Arc<dyn ManagementApi>,
    loader: Arc<dyn ConfiguratorLoader>,
    options: WizardOptions,
    seed: Option<WizardSeed>,
    on_save: impl FnOnce(Connector) + Send + 'static,
) -> WizardHandle {
    let seed = seed.unwrap_or_default();
    let configured = seed.configuration.is_some();
    let context = WizardContext {
        kafka_id: seed.kafka_id,
        namespace_id: seed.namespace_id,
        name: seed.name,
        configuration: seed.configuration,
        configure: ConfigureState {
            done: configured,
            ..ConfigureState::default()
        },
        ..WizardContext::default()
    };
    let type_preselect = seed.connector_type_id;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let first = spawn_connector_type(
        Arc::clone(&api),
        PickerConfig {
            preselect: type_preselect.clone(),
            options: ResourceOptions::default(),
        },
        notify_tx.clone(),
    );
    let active = ActiveStep::ConnectorType(first);

    let (watch_tx, watch_rx) = watch::channel(WizardSnapshot {
        step: WizardStep::SelectConnectorType,
        active: active.clone(),
        context: context.clone(),
        step_valid: false,
        save_error: None,
    });

    let actor = WizardActor {
        api,
        loader,
        validators: Arc::new(ValidatorCache::default()),
        options,
        type_preselect,
        context,
        step: WizardStep::SelectConnectorType,
        active,
        step_valid: false,
        save_error: None,
        mailbox: events_rx,
        notifications: notify_rx,
        keepalive: notify_tx,
        watch_tx,
        on_save: Some(Box::new(on_save)),
    };
    tokio::spawn(actor.run());

    WizardHandle {
        events: events_tx,
        state: watch_rx,
    }
}

/// Spawn-time configuration of a child step, gathered before the switch
enum ChildSpec {
    ConnectorType { preselect: Option<String> },
    Kafka { preselect: Option<String> },
    Namespace { preselect: Option<String> },
    Basic(BasicConfig),
    Configure(ConfigureConfig),
    Review(ReviewConfig),
}

struct WizardActor {
    api: Arc<dyn ManagementApi>,
    loader: Arc<dyn ConfiguratorLoader>,
    validators: Arc<ValidatorCache>,
    options: WizardOptions,
    type_preselect: Option<String>,
    context: WizardContext,
    step: WizardStep,
    active: ActiveStep,
    step_valid: bool,
    save_error: Option<String>,
    mailbox: mpsc::UnboundedReceiver<WizardEvent>,
    notifications: mpsc::UnboundedReceiver<StepNotification>,
    // Keeps the notification channel open after a child is torn down, so
    // the select loop idles instead of spinning on a closed receiver
    keepalive: mpsc::UnboundedSender<StepNotification>,
    watch_tx: watch::Sender<WizardSnapshot>,
    on_save: Option<Box<dyn FnOnce(Connector) + Send>>,
}

impl WizardActor {
    async fn run(mut self) {
        info!(step = self.step.name(), "creation wizard started");

        loop {
            tokio::select! {
                event = self.mailbox.recv() => match event {
                    None | Some(WizardEvent::Stop) => break,
                    Some(event) => self.handle_event(event),
                },
                notification = self.notifications.recv() => match notification {
                    Some(notification) => self.handle_notification(notification),
                    None => {
                        debug!("notification channel closed, rearming");
                        let _ = self.fresh_channel();
                    }
                },
            }
        }

        self.shutdown_active();
        info!("creation wizard stopped");
    }

    fn fresh_channel(&mut self) -> mpsc::UnboundedSender<StepNotification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.notifications = rx;
        self.keepalive = tx.clone();
        tx
    }

    fn handle_event(&mut self, event: WizardEvent) {
        if self.step == WizardStep::Saved {
            debug!(?event, "wizard already saved, event ignored");
            return;
        }
        match event {
            WizardEvent::JumpToSelectConnectorType => {
                self.jump(WizardStep::SelectConnectorType, None)
            }
            WizardEvent::JumpToSelectKafka => self.jump(WizardStep::SelectKafka, None),
            WizardEvent::JumpToSelectNamespace => self.jump(WizardStep::SelectNamespace, None),
            WizardEvent::JumpToBasicConfiguration => {
                self.jump(WizardStep::BasicConfiguration, None)
            }
            WizardEvent::JumpToConfigureConnector { sub_step } => {
                self.jump(WizardStep::ConfigureConnector, sub_step)
            }
            WizardEvent::JumpToReviewConfiguration => {
                self.jump(WizardStep::ReviewConfiguration, None)
            }
            WizardEvent::ConnectorType(event) => {
                if let ActiveStep::ConnectorType(handle) = &self.active {
                    if handle.dispatch(event).is_err() {
                        warn!("connector type step mailbox closed");
                    }
                } else {
                    debug!(step = self.step.name(), "connector type event outside its step");
                }
            }
            WizardEvent::Kafka(event) => {
                if let ActiveStep::Kafka(handle) = &self.active {
                    if handle.dispatch(event).is_err() {
                        warn!("kafka step mailbox closed");
                    }
                } else {
                    debug!(step = self.step.name(), "kafka event outside its step");
                }
            }
            WizardEvent::Namespace(event) => {
                if let ActiveStep::Namespace(handle) = &self.active {
                    if handle.dispatch(event).is_err() {
                        warn!("namespace step mailbox closed");
                    }
                } else {
                    debug!(step = self.step.name(), "namespace event outside its step");
                }
            }
            WizardEvent::Basic(event) => {
                if let ActiveStep::Basic(handle) = &self.active {
                    if handle.dispatch(event).is_err() {
                        warn!("basic step mailbox closed");
                    }
                } else {
                    debug!(step = self.step.name(), "basic event outside its step");
                }
            }
            WizardEvent::Configure(event) => {
                if let ActiveStep::Configure(handle) = &self.active {
                    if handle.dispatch(event).is_err() {
                        warn!("configure step mailbox closed");
                    }
                } else {
                    debug!(step = self.step.name(), "configure event outside its step");
                }
            }
            WizardEvent::Review(event) => {
                if let ActiveStep::Review(handle) = &self.active {
                    if handle.dispatch(event).is_err() {
                        warn!("review step mailbox closed");
                    }
                } else {
                    debug!(step = self.step.name(), "review event outside its step");
                }
            }
            WizardEvent::Stop => {}
        }
    }

    fn jump(&mut self, target: WizardStep, sub_step: Option<usize>) {
        if target == self.step {
            if target == WizardStep::ConfigureConnector {
                if let (Some(index), ActiveStep::Configure(handle)) = (sub_step, &self.active) {
                    if handle.dispatch(ConfigureEvent::SetSubStep(index)).is_err() {
                        warn!("configure step mailbox closed");
                    }
                }
            } else {
                debug!(step = self.step.name(), "already on the requested step");
            }
            return;
        }
        if let Err(error) = self.context.can_enter(target) {
            debug!(target = target.name(), %error, "jump rejected");
            return;
        }
        if target.index() < self.step.index()
            && self.options.jump_back == JumpBackBehavior::ClearDownstream
        {
            self.context.clear_after(target);
        }
        self.switch_step(target, sub_step);
    }

    fn switch_step(&mut self, target: WizardStep, sub_step: Option<usize>) {
        let Some(spec) = self.child_spec(target, sub_step) else {
            debug!(target = target.name(), "step entry requirements missing");
            return;
        };
        let from = self.step;
        self.shutdown_active();
        let notify = self.fresh_channel();
        self.active = self.spawn_child(spec, notify);
        self.step = target;
        self.step_valid = false;
        self.save_error = None;
        info!(from = from.name(), to = target.name(), "wizard step changed");
        self.publish();
    }

    fn child_spec(&self, target: WizardStep, sub_step: Option<usize>) -> Option<ChildSpec> {
        match target {
            WizardStep::SelectConnectorType => Some(ChildSpec::ConnectorType {
                preselect: self
                    .context
                    .connector_type
                    .as_ref()
                    .map(|t| t.id.clone())
                    .or_else(|| self.type_preselect.clone()),
            }),
            WizardStep::SelectKafka => Some(ChildSpec::Kafka {
                preselect: self.context.kafka_id.clone(),
            }),
            WizardStep::SelectNamespace => Some(ChildSpec::Namespace {
                preselect: self.context.namespace_id.clone(),
            }),
            WizardStep::BasicConfiguration => Some(ChildSpec::Basic(BasicConfig {
                name: self.context.name.clone(),
                service_account: self.context.service_account.clone(),
            })),
            WizardStep::ConfigureConnector => Some(ChildSpec::Configure(ConfigureConfig {
                connector_type: self.context.connector_type.clone()?,
                initial_configuration: self.context.configuration.clone(),
                target_sub_step: sub_step.or(Some(self.context.configure.active)),
            })),
            WizardStep::ReviewConfiguration => Some(ChildSpec::Review(ReviewConfig {
                connector_type: self.context.connector_type.clone()?,
                name: self.context.name.clone()?,
                kafka_id: self.context.kafka_id.clone()?,
                namespace_id: self.context.namespace_id.clone()?,
                service_account: self.context.service_account.clone(),
                configuration: self.context.configuration.clone()?,
            })),
            WizardStep::Saved => None,
        }
    }

    fn spawn_child(
        &self,
        spec: ChildSpec,
        notify: mpsc::UnboundedSender<StepNotification>,
    ) -> ActiveStep {
        match spec {
            ChildSpec::ConnectorType { preselect } => {
                ActiveStep::ConnectorType(spawn_connector_type(
                    Arc::clone(&self.api),
                    PickerConfig {
                        preselect,
                        options: ResourceOptions::default(),
                    },
                    notify,
                ))
            }
            ChildSpec::Kafka { preselect } => ActiveStep::Kafka(spawn_kafka(
                Arc::clone(&self.api),
                PickerConfig {
                    preselect,
                    options: ResourceOptions::default(),
                },
                notify,
            )),
            ChildSpec::Namespace { preselect } => ActiveStep::Namespace(spawn_namespace(
                Arc::clone(&self.api),
                PickerConfig {
                    preselect,
                    options: ResourceOptions::default(),
                },
                notify,
            )),
            ChildSpec::Basic(config) => {
                ActiveStep::Basic(spawn_basic(Arc::clone(&self.api), config, notify))
            }
            ChildSpec::Configure(config) => {
                ActiveStep::Configure(spawn_configure(Arc::clone(&self.loader), config, notify))
            }
            ChildSpec::Review(config) => ActiveStep::Review(spawn_review(
                Arc::clone(&self.api),
                Arc::clone(&self.validators),
                config,
                notify,
            )),
        }
    }

    fn shutdown_active(&self) {
        match &self.active {
            ActiveStep::ConnectorType(handle) => handle.shutdown(),
            ActiveStep::Kafka(handle) => handle.shutdown(),
            ActiveStep::Namespace(handle) => handle.shutdown(),
            ActiveStep::Basic(handle) => handle.shutdown(),
            ActiveStep::Configure(handle) => handle.shutdown(),
            ActiveStep::Review(handle) => handle.shutdown(),
            ActiveStep::Saved(_) => {}
        }
    }

    fn handle_notification(&mut self, notification: StepNotification) {
        match notification {
            StepNotification::ValidityChanged(validity) => {
                self.step_valid = validity == Validity::Valid;
                self.publish();
            }
            StepNotification::Prefilled(output) => {
                self.merge_output(output);
                self.publish();
            }
            StepNotification::Done(output) => {
                if let StepOutput::Saved(connector) = output {
                    self.enter_saved(connector);
                } else {
                    self.merge_output(output);
                    if let Some(next) = self.step.next() {
                        self.switch_step(next, None);
                    }
                }
            }
            StepNotification::Progress(progress) => {
                self.context.configure.loaded = true;
                self.context.configure.steps = progress.steps;
                self.context.configure.active = progress.active;
                self.context.configure.valid = progress.valid;
                if progress.configuration.is_some() {
                    self.context.configuration = progress.configuration;
                }
                self.step_valid = self.context.configure.valid;
                self.publish();
            }
            StepNotification::SaveFailed { reason } => {
                warn!(reason = %reason, "save rejected, review stays open");
                self.save_error = Some(reason);
                self.publish();
            }
            StepNotification::Failed(error) => {
                warn!(step = self.step.name(), %error, "step failure");
            }
        }
    }

    fn merge_output(&mut self, output: StepOutput) {
        match output {
            StepOutput::ConnectorType(connector_type) => {
                let changed = self
                    .context
                    .connector_type
                    .as_ref()
                    .is_some_and(|current| current.id != connector_type.id);
                if changed {
                    debug!(type_id = %connector_type.id, "connector type changed, configuration reset");
                    self.context.clear_configuration();
                    self.save_error = None;
                }
                self.context.connector_type = Some(connector_type);
            }
            StepOutput::Kafka(kafka) => {
                self.context.kafka_id = Some(kafka.id.clone());
                self.context.kafka = Some(kafka);
            }
            StepOutput::Namespace(namespace) => {
                self.context.namespace_id = Some(namespace.id.clone());
                self.context.namespace = Some(namespace);
            }
            StepOutput::Basic {
                name,
                service_account,
            } => {
                self.context.name = Some(name);
                self.context.service_account = service_account;
            }
            StepOutput::Configuration(value) => {
                self.context.configuration = Some(value);
                self.context.configure.done = true;
            }
            StepOutput::Saved(connector) => {
                debug!(id = %connector.id, "saved output outside the done path ignored");
            }
        }
    }

    fn enter_saved(&mut self, connector: Connector) {
        info!(id = %connector.id, name = %connector.name, "connector saved, wizard finished");
        self.shutdown_active();
        let _ = self.fresh_channel();
        self.step = WizardStep::Saved;
        self.active = ActiveStep::Saved(connector.clone());
        self.step_valid = false;
        self.save_error = None;
        if let Some(on_save) = self.on_save.take() {
            on_save(connector);
        }
        self.publish();
    }

    fn publish(&mut self) {
        self.watch_tx.send_replace(WizardSnapshot {
            step: self.step,
            active: self.active.clone(),
            context: self.context.clone(),
            step_valid: self.step_valid,
            save_error: self.save_error.clone(),
        });
    }
}
