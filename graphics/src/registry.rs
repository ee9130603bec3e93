//! Explicitly owned "create once, look up by key" tables.
//!
//! Shared backend objects (pipeline state objects in particular) are created
//! on first use by whichever loader gets there first. Several recorders may
//! be constructed concurrently, so creation happens under the registry lock:
//! racing callers with the same key observe a single creation.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

use crate::backend::{GpuBackend, PipelineDescriptor};
use crate::error::GraphicsError;
use crate::types::PipelineHandle;

/// A mutex-protected map from key to a `Copy`/`Clone` backend handle.
pub struct Registry<K, V> {
    label: &'static str,
    entries: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone> Registry<K, V> {
    /// Create an empty registry. `label` names it in log messages.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up an existing entry.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Return the entry for `key`, creating it with `create` if missing.
    ///
    /// `create` runs with the registry locked, so it is called at most once
    /// per key even when several threads race. A failed creation leaves the
    /// key absent.
    pub fn get_or_try_insert_with<F>(&self, key: K, create: F) -> Result<V, GraphicsError>
    where
        F: FnOnce() -> Result<V, GraphicsError>,
    {
        let mut entries = self.entries.lock();
        if let Some(value) = entries.get(&key) {
            return Ok(value.clone());
        }
        let value = create()?;
        entries.insert(key, value.clone());
        log::trace!("{} registry: {} entries", self.label, entries.len());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<K, V> std::fmt::Debug for Registry<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("label", &self.label)
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

/// Pipeline state objects keyed by technique label.
pub type PipelineRegistry = Registry<String, PipelineHandle>;

impl PipelineRegistry {
    /// Get the pipeline for `descriptor`, creating it on first use.
    pub fn pipeline(
        &self,
        backend: &dyn GpuBackend,
        descriptor: &PipelineDescriptor,
    ) -> Result<PipelineHandle, GraphicsError> {
        self.get_or_try_insert_with(descriptor.label.clone(), || {
            log::debug!("Creating pipeline '{}'", descriptor.label);
            backend.create_pipeline(descriptor)
        })
    }
}

static_assertions::assert_impl_all!(PipelineRegistry: Send, Sync);
