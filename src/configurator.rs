// Copyright 2025 Cowboy AI, LLC.

//! Dynamic configurator plugin contract
//!
//! Connector types can ship their own configuration UI. The console only
//! ever sees an opaque component reference and the ordered step labels the
//! configurator wants rendered; a type without a configurator falls back to
//! the implicit single schema-driven step. Loading is async and keyed by
//! connector type id, with successful results cached.

use crate::errors::{ConsoleError, ConsoleResult};
use async_trait::async_trait;
use lru::LruCache;
use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Loader results cached per connector type
pub const DEFAULT_CONFIGURATOR_CACHE: usize = 16;

/// Opaque reference to a host-rendered configurator component
pub type ComponentRef = Arc<dyn Any + Send + Sync>;

/// A loaded configurator: the component plus its step labels
///
/// `steps` of `None` means the configurator renders as one unnamed step.
#[derive(Clone)]
pub struct ConfiguratorBundle {
    /// Component reference the host downcasts and renders
    pub component: ComponentRef,
    /// Ordered sub-step labels, when the configurator is multi-step
    pub steps: Option<Vec<String>>,
}

impl ConfiguratorBundle {
    /// Number of sub-steps this configurator renders
    pub fn step_count(&self) -> usize {
        self.steps.as_ref().map_or(1, |steps| steps.len().max(1))
    }

    /// Downcast the component to the host's concrete type
    pub fn component_as<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        Arc::clone(&self.component).downcast::<C>().ok()
    }
}

impl std::fmt::Debug for ConfiguratorBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguratorBundle")
            .field("steps", &self.steps)
            .finish()
    }
}

/// Resolves the configurator for a connector type
///
/// `Ok(None)` means the type ships no configurator and the implicit
/// schema-driven step applies. Errors are retryable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfiguratorLoader: Send + Sync {
    /// Load the configurator for the given connector type
    async fn load(&self, connector_type_id: String) -> ConsoleResult<Option<ConfiguratorBundle>>;
}

/// Loader for hosts without any dynamic configurators
pub struct NullLoader;

#[async_trait]
impl ConfiguratorLoader for NullLoader {
    async fn load(&self, _connector_type_id: String) -> ConsoleResult<Option<ConfiguratorBundle>> {
        Ok(None)
    }
}

/// Caching wrapper around a loader
///
/// Successful results are cached per connector type id, including the
/// "no configurator" answer. Failures are never cached, so a retry always
/// reaches the inner loader.
pub struct CachingLoader {
    inner: Arc<dyn ConfiguratorLoader>,
    cache: Mutex<LruCache<String, Option<ConfiguratorBundle>>>,
}

impl CachingLoader {
    /// Wrap a loader with the default cache capacity
    pub fn new(inner: Arc<dyn ConfiguratorLoader>) -> Self {
        Self::with_capacity(inner, DEFAULT_CONFIGURATOR_CACHE)
    }

    /// Wrap a loader with an explicit cache capacity
    pub fn with_capacity(inner: Arc<dyn ConfiguratorLoader>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl ConfiguratorLoader for CachingLoader {
    async fn load(&self, connector_type_id: String) -> ConsoleResult<Option<ConfiguratorBundle>> {
        if let Some(cached) = self.cache.lock().await.get(&connector_type_id) {
            debug!(type_id = %connector_type_id, "configurator served from cache");
            return Ok(cached.clone());
        }

        let loaded = self
            .inner
            .load(connector_type_id.clone())
            .await
            .map_err(|err| match err {
                already @ ConsoleError::ConfiguratorLoadFailed { .. } => already,
                other => ConsoleError::ConfiguratorLoadFailed {
                    type_id: connector_type_id.clone(),
                    message: other.to_string(),
                },
            })?;

        self.cache
            .lock()
            .await
            .put(connector_type_id, loaded.clone());
        Ok(loaded)
    }
}
