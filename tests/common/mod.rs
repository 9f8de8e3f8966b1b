// Copyright 2025 Cowboy AI, LLC.

//! Shared fixtures for the console integration tests
//!
//! Integration tests drive the machines through the public crate surface,
//! so the management service and the configurator loader are scripted by
//! hand here instead of mocked.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use connectors_console::configurator::{ConfiguratorBundle, ConfiguratorLoader};
use connectors_console::{
    ApiError, Connector, ConnectorDefinition, ConnectorType, ConsoleError, ConsoleResult,
    DesiredState, ItemsPage, KafkaInstance, ManagementApi, Namespace, ServiceAccount,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// A queue of scripted responses; the last one repeats once drained
pub struct Script<T> {
    responses: Mutex<VecDeque<Result<T, ApiError>>>,
}

impl<T: Clone> Script<T> {
    fn next(&self, operation: &str) -> Result<T, ApiError> {
        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => Err(ApiError::new(format!("unscripted call to {operation}"))),
            1 => responses.front().cloned().unwrap(),
            _ => responses.pop_front().unwrap(),
        }
    }

    /// Append a successful response
    pub fn push_ok(&self, value: T) {
        self.responses.lock().unwrap().push_back(Ok(value));
    }

    /// Append a failure with the given reason
    pub fn push_err(&self, reason: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(ApiError::new(reason)));
    }
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
        }
    }
}

/// Hand-scripted management service
///
/// Responses are queued per operation; calls and submitted payloads are
/// recorded for assertions.
#[derive(Default)]
pub struct ScriptedApi {
    pub connectors: Script<ItemsPage<Connector>>,
    pub connector_types: Script<ItemsPage<ConnectorType>>,
    pub kafkas: Script<ItemsPage<KafkaInstance>>,
    pub namespaces: Script<ItemsPage<Namespace>>,
    pub patches: Script<Connector>,
    pub deletions: Script<()>,
    pub creations: Script<Connector>,
    pub service_accounts: Script<ServiceAccount>,
    /// Number of connector list calls observed
    pub connector_list_calls: AtomicUsize,
    /// Search strings the connector list was called with
    pub connector_searches: Mutex<Vec<Option<String>>>,
    /// Definitions submitted through `create_connector`
    pub submitted: Mutex<Vec<ConnectorDefinition>>,
    /// Desired-state patches observed as `(id, state)`
    pub patched: Mutex<Vec<(String, DesiredState)>>,
}

#[async_trait]
impl ManagementApi for ScriptedApi {
    async fn list_connectors(
        &self,
        _page: u64,
        _size: u64,
        search: Option<String>,
        _order_by: Option<String>,
    ) -> Result<ItemsPage<Connector>, ApiError> {
        self.connector_list_calls.fetch_add(1, Ordering::SeqCst);
        self.connector_searches.lock().unwrap().push(search);
        self.connectors.next("list_connectors")
    }

    async fn patch_connector_desired_state(
        &self,
        id: String,
        state: DesiredState,
    ) -> Result<Connector, ApiError> {
        self.patched.lock().unwrap().push((id, state));
        self.patches.next("patch_connector_desired_state")
    }

    async fn delete_connector(&self, _id: String) -> Result<(), ApiError> {
        self.deletions.next("delete_connector")
    }

    async fn list_connector_types(
        &self,
        _search: Option<String>,
        _order_by: Option<String>,
    ) -> Result<ItemsPage<ConnectorType>, ApiError> {
        self.connector_types.next("list_connector_types")
    }

    async fn list_kafka_instances(
        &self,
        _page: u64,
        _size: u64,
        _search: Option<String>,
    ) -> Result<ItemsPage<KafkaInstance>, ApiError> {
        self.kafkas.next("list_kafka_instances")
    }

    async fn list_namespaces(
        &self,
        _page: u64,
        _size: u64,
        _search: Option<String>,
    ) -> Result<ItemsPage<Namespace>, ApiError> {
        self.namespaces.next("list_namespaces")
    }

    async fn create_connector(
        &self,
        definition: ConnectorDefinition,
    ) -> Result<Connector, ApiError> {
        self.submitted.lock().unwrap().push(definition);
        self.creations.next("create_connector")
    }

    async fn create_service_account(
        &self,
        _description: String,
    ) -> Result<ServiceAccount, ApiError> {
        self.service_accounts.next("create_service_account")
    }
}

/// Hand-scripted configurator loader
#[derive(Default)]
pub struct ScriptedLoader {
    responses: Mutex<VecDeque<ConsoleResult<Option<ConfiguratorBundle>>>>,
    /// Number of load calls observed
    pub load_calls: AtomicUsize,
}

impl ScriptedLoader {
    /// Append a successful load of the given bundle
    pub fn push_bundle(&self, bundle: Option<ConfiguratorBundle>) {
        self.responses.lock().unwrap().push_back(Ok(bundle));
    }

    /// Append a failed load
    pub fn push_err(&self, type_id: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(ConsoleError::ConfiguratorLoadFailed {
                type_id: type_id.to_string(),
                message: message.to_string(),
            }));
    }
}

#[async_trait]
impl ConfiguratorLoader for ScriptedLoader {
    async fn load(&self, _connector_type_id: String) -> ConsoleResult<Option<ConfiguratorBundle>> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => Ok(None),
            1 => responses.front().cloned().unwrap(),
            _ => responses.pop_front().unwrap(),
        }
    }
}

/// A configurator bundle with the given sub-step labels
pub fn bundle(steps: &[&str]) -> ConfiguratorBundle {
    ConfiguratorBundle {
        component: Arc::new(()),
        steps: Some(steps.iter().map(|s| s.to_string()).collect()),
    }
}

/// A connector type whose schema requires a `channel` string
pub fn connector_type(id: &str) -> ConnectorType {
    ConnectorType {
        id: id.to_string(),
        name: format!("{id} type"),
        version: "0.1".to_string(),
        categories: vec!["sink".to_string()],
        description: "test connector type".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "channel": { "type": "string" }
            },
            "required": ["channel"]
        }),
    }
}

pub fn kafka(id: &str) -> KafkaInstance {
    KafkaInstance {
        id: id.to_string(),
        name: format!("{id} instance"),
        bootstrap_server: format!("{id}.kafka.example:443"),
        owner: "tester".to_string(),
    }
}

pub fn namespace(id: &str) -> Namespace {
    Namespace {
        id: id.to_string(),
        name: format!("{id} namespace"),
        cluster_id: "cluster-1".to_string(),
        expiration: None,
    }
}

pub fn connector(id: &str, name: &str, desired: DesiredState) -> Connector {
    Connector {
        id: id.to_string(),
        name: name.to_string(),
        desired_state: desired,
        connector_type_id: "slack_sink_0.1".to_string(),
        kafka_id: "k1".to_string(),
        namespace_id: "ns1".to_string(),
        configuration: json!({ "channel": "#alerts" }),
        created_at: Utc::now(),
        modified_at: Utc::now(),
    }
}

/// A single full page holding the given items
pub fn page<T>(items: Vec<T>) -> ItemsPage<T> {
    let total = items.len() as u64;
    ItemsPage {
        items,
        page: 1,
        size: 20,
        total,
    }
}

/// A valid configuration for [`connector_type`]'s schema
pub fn configuration() -> Value {
    json!({ "channel": "#alerts" })
}

/// Wait until a published snapshot satisfies the predicate
pub async fn wait_until<S, F>(watch: &mut watch::Receiver<S>, predicate: F)
where
    S: Clone,
    F: Fn(&S) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if predicate(&watch.borrow()) {
                return;
            }
            watch.changed().await.expect("snapshot channel open");
        }
    })
    .await
    .expect("condition reached before timeout");
}
