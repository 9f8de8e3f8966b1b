//! # Connectors Console
//!
//! Headless state machines for a managed-connectors console.
//!
//! This crate provides the behavioral core of the console, with no rendering
//! attached:
//! - **Paginated resources**: Polled, searchable collection machines with
//!   decorated items
//! - **Connector rows**: One actor per listed connector, applying lifecycle
//!   actions optimistically and rolling back on failure
//! - **Connectors page**: The listing machine that owns the row actors and
//!   fans their outcomes back in
//! - **Creation wizard**: A guarded multi-step flow with one live step actor
//!   at a time, dynamic configurator sub-steps and seeded re-entry
//! - **Validation**: Cached JSON Schema checking of connector configurations
//!
//! ## Design Principles
//!
//! 1. **Pure cores**: Transition decisions are plain functions over state,
//!    tested without a runtime
//! 2. **Actor shells**: Each machine runs on its own task with a single
//!    mailbox; effects never mutate state directly
//! 3. **Snapshots**: State leaves a machine only as a cloned snapshot over a
//!    watch channel
//! 4. **Stale outcomes drop**: Request tags and channel replacement keep
//!    superseded responses from touching current state
//! 5. **Host agnostic**: Any frontend that can send events and read
//!    snapshots can drive the console

#![warn(missing_docs)]

pub mod api;
pub mod configurator;
pub mod connector;
pub mod connectors_page;
mod errors;
pub mod paginated;
pub mod request;
pub mod selection;
pub mod steps;
pub mod validation;
pub mod wizard;

// Re-export core types
pub use api::{
    ApiError, Connector, ConnectorDefinition, ConnectorType, DesiredState, Identified, ItemsPage,
    KafkaInstance, ManagementApi, Namespace, ServiceAccount,
};
pub use errors::{ConsoleError, ConsoleResult};
pub use selection::{SelectionMachine, Validity};

// Re-export the collection machinery
pub use paginated::{
    IdentityDecorator, ItemDecorator, ResourceEvent, ResourceFetcher, ResourceHandle,
    ResourceOptions, ResourceSnapshot, ResourceStatus, SearchQuery,
};

// Re-export the page surfaces hosts embed
pub use connector::{
    ConnectorEvent, ConnectorHandle, ConnectorNotification, ConnectorSnapshot, ConnectorState,
};
pub use connectors_page::{
    spawn_connectors_page, ActionError, ConnectorsPageEvent, ConnectorsPageHandle,
    ConnectorsPageOptions, ConnectorsPageSnapshot,
};
pub use wizard::{
    JumpBackBehavior, WizardEvent, WizardHandle, WizardOptions, WizardSeed, WizardSnapshot,
    WizardStep,
};

// Re-export configurator and validation seams
pub use configurator::{CachingLoader, ConfiguratorBundle, ConfiguratorLoader, NullLoader};
pub use validation::{ConfigurationCheck, SchemaValidator, ValidatorCache, Violation};
