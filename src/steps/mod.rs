// Copyright 2025 Cowboy AI, LLC.

//! Wizard step machines
//!
//! One actor per wizard step. The three picker steps share the generic
//! machinery in [`picker`]; basic configuration, connector configuration and
//! review each have their own machine. Steps never touch the orchestrator's
//! context directly: results flow upward as [`StepNotification`]s over the
//! channel captured at spawn and the orchestrator merges them.

pub mod basic;
pub mod configure;
pub mod connector_type;
pub mod kafka;
pub mod namespace;
pub mod picker;
pub mod review;

use crate::api::{Connector, ConnectorType, KafkaInstance, Namespace, ServiceAccount};
use crate::errors::ConsoleError;
use crate::selection::Validity;
use serde_json::Value;

pub use basic::{spawn_basic, BasicConfig, BasicEvent, BasicHandle, BasicSnapshot};
pub use configure::{
    spawn_configure, ConfigureConfig, ConfigureEvent, ConfigureHandle, ConfigurePhase,
    ConfigureSnapshot,
};
pub use connector_type::{spawn_connector_type, ConnectorTypePickerHandle, TypeQuery};
pub use kafka::{spawn_kafka, KafkaPickerHandle};
pub use namespace::{spawn_namespace, NamespacePickerHandle};
pub use picker::{PickerConfig, PickerEvent, PickerHandle, PickerSnapshot};
pub use review::{spawn_review, ReviewConfig, ReviewEvent, ReviewHandle, ReviewSnapshot};

/// Result a finished or prefilled step hands the orchestrator
#[derive(Debug, Clone)]
pub enum StepOutput {
    /// A connector type was picked
    ConnectorType(ConnectorType),
    /// A Kafka instance was picked
    Kafka(KafkaInstance),
    /// A namespace was picked
    Namespace(Namespace),
    /// Basic configuration finished
    Basic {
        /// Validated connector name
        name: String,
        /// Credentials, when supplied or auto-created
        service_account: Option<ServiceAccount>,
    },
    /// Connector configuration finished
    Configuration(Value),
    /// The definition was saved
    Saved(Connector),
}

/// Live progress of the configure step, mirrored into wizard context
#[derive(Debug, Clone)]
pub struct ConfigureProgress {
    /// Sub-step labels; `None` means the implicit single step
    pub steps: Option<Vec<String>>,
    /// Active sub-step index
    pub active: usize,
    /// Whether the active sub-step is currently submittable
    pub valid: bool,
    /// Latest configuration value reported by the configurator
    pub configuration: Option<Value>,
}

/// Notifications a step sends its orchestrator
#[derive(Debug, Clone)]
pub enum StepNotification {
    /// The step's validity flipped
    ValidityChanged(Validity),
    /// A seeded value resolved; merge without advancing
    Prefilled(StepOutput),
    /// The step finished with its output
    Done(StepOutput),
    /// Configure-step progress for jump-guard evaluation
    Progress(ConfigureProgress),
    /// The save call was rejected; review stays open for a retry
    SaveFailed {
        /// Reason reported by the API
        reason: String,
    },
    /// A step-local failure the orchestrator logs and swallows
    Failed(ConsoleError),
}
