// Copyright 2025 Cowboy AI, LLC.

//! Management API data model and access trait
//!
//! The console never talks to a transport directly. Every machine that needs
//! the backend holds an `Arc<dyn ManagementApi>` and issues calls through the
//! cancellable request layer. The trait is the black-box boundary of the
//! system; implementations adapt it to whatever REST client the host uses.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Anything the console can address by a stable backend id
pub trait Identified {
    /// Stable id of the entity
    fn id(&self) -> &str;
}

impl Identified for Connector {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for ConnectorType {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for KafkaInstance {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Namespace {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Structured error returned by every management API operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{reason}")]
pub struct ApiError {
    /// Machine-readable reason string, surfaced to users verbatim
    pub reason: String,
}

impl ApiError {
    /// Create an error from a reason string
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Desired lifecycle state of a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    /// Connector should be running
    Ready,
    /// Connector should be provisioned but not running
    Stopped,
    /// Connector should be removed
    Deleted,
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredState::Ready => write!(f, "ready"),
            DesiredState::Stopped => write!(f, "stopped"),
            DesiredState::Deleted => write!(f, "deleted"),
        }
    }
}

/// A managed connector as returned by the listing and mutation operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Connector {
    /// Backend-assigned connector id
    pub id: String,
    /// User-chosen connector name
    pub name: String,
    /// Desired lifecycle state
    pub desired_state: DesiredState,
    /// Connector type this instance was created from
    pub connector_type_id: String,
    /// Kafka instance the connector is attached to
    pub kafka_id: String,
    /// Namespace the connector is deployed into
    pub namespace_id: String,
    /// Connector-specific configuration object
    pub configuration: serde_json::Value,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

/// A connector type in the catalog, carrying its configuration schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConnectorType {
    /// Catalog id, e.g. `slack_sink_0.1`
    pub id: String,
    /// Display name
    pub name: String,
    /// Type version
    pub version: String,
    /// Categories such as `sink` or `source`
    pub categories: Vec<String>,
    /// Short description
    pub description: String,
    /// JSON Schema describing valid configuration objects for this type
    pub schema: serde_json::Value,
}

/// A Kafka instance a connector can be attached to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KafkaInstance {
    /// Backend-assigned instance id
    pub id: String,
    /// Instance name
    pub name: String,
    /// Bootstrap server host for the instance
    pub bootstrap_server: String,
    /// Owning user or organization
    pub owner: String,
}

/// A deployment namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Namespace {
    /// Backend-assigned namespace id
    pub id: String,
    /// Namespace name
    pub name: String,
    /// Cluster the namespace lives on
    pub cluster_id: String,
    /// Expiration timestamp for evaluation namespaces, if any
    pub expiration: Option<DateTime<Utc>>,
}

/// Service account credentials used by a connector to reach Kafka
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceAccount {
    /// Client id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
}

/// The connector definition submitted on save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConnectorDefinition {
    /// User-chosen connector name
    pub name: String,
    /// Connector type id from the catalog
    pub connector_type_id: String,
    /// Kafka instance reference
    pub kafka_id: String,
    /// Namespace reference
    pub namespace_id: String,
    /// Connector-specific configuration object
    pub configuration: serde_json::Value,
    /// Credentials the connector runs under, when user-supplied or auto-created
    pub service_account: Option<ServiceAccount>,
}

/// One page of a listed collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ItemsPage<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// 1-based page number this response is for
    pub page: u64,
    /// Requested page size
    pub size: u64,
    /// Total matching items across all pages
    pub total: u64,
}

impl<T> ItemsPage<T> {
    /// An empty page, used when a collection has no matches
    pub fn empty(page: u64, size: u64) -> Self {
        Self {
            items: Vec::new(),
            page,
            size,
            total: 0,
        }
    }
}

/// Access to the remote management service
///
/// All list operations take a 1-based `page`. Mutations fail with a
/// structured [`ApiError`] whose reason is shown to the user unchanged.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// List connectors, optionally filtered by a search string
    async fn list_connectors(
        &self,
        page: u64,
        size: u64,
        search: Option<String>,
        order_by: Option<String>,
    ) -> Result<ItemsPage<Connector>, ApiError>;

    /// Patch the desired state of a connector to `Ready` or `Stopped`
    async fn patch_connector_desired_state(
        &self,
        id: String,
        state: DesiredState,
    ) -> Result<Connector, ApiError>;

    /// Delete a connector
    async fn delete_connector(&self, id: String) -> Result<(), ApiError>;

    /// List the connector type catalog, filtered by name or category
    async fn list_connector_types(
        &self,
        search: Option<String>,
        order_by: Option<String>,
    ) -> Result<ItemsPage<ConnectorType>, ApiError>;

    /// List Kafka instances visible to the caller
    async fn list_kafka_instances(
        &self,
        page: u64,
        size: u64,
        search: Option<String>,
    ) -> Result<ItemsPage<KafkaInstance>, ApiError>;

    /// List deployment namespaces visible to the caller
    async fn list_namespaces(
        &self,
        page: u64,
        size: u64,
        search: Option<String>,
    ) -> Result<ItemsPage<Namespace>, ApiError>;

    /// Create a connector from a completed definition
    async fn create_connector(
        &self,
        definition: ConnectorDefinition,
    ) -> Result<Connector, ApiError>;

    /// Create a service account for a new connector
    async fn create_service_account(
        &self,
        description: String,
    ) -> Result<ServiceAccount, ApiError>;
}
