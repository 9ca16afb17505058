//! Pre-reconcile initializers
//!
//! Initializers run in registration order at the start of every cycle and
//! may mutate the object. If any of them reports a change, the object is
//! persisted before the cycle continues.

use crate::error::InitializerError;
use crate::resource::{external_name, set_external_name, Managed};
use std::collections::BTreeMap;

/// Hook run before the external resource is observed
#[async_trait::async_trait]
pub trait Initializer<K>: Send + Sync {
    /// Mutate the object; returns true when anything changed
    async fn initialize(&self, obj: &mut K) -> Result<bool, InitializerError>;
}

/// Uses `metadata.name` as the external name when none is set
#[derive(Debug, Clone, Copy, Default)]
pub struct NameAsExternalName;

#[async_trait::async_trait]
impl<K: Managed> Initializer<K> for NameAsExternalName {
    async fn initialize(&self, obj: &mut K) -> Result<bool, InitializerError> {
        if external_name(obj).is_some() {
            return Ok(false);
        }
        let name = obj
            .meta()
            .name
            .clone()
            .ok_or_else(|| InitializerError("object has no metadata.name".to_string()))?;
        set_external_name(obj, &name);
        Ok(true)
    }
}

/// Default labels added to the GCP labels of a kind
///
/// Applied by external clients after late-initialization and before a
/// create request is built. Keys already present are left alone.
#[derive(Debug, Clone)]
pub struct DefaultLabels {
    defaults: BTreeMap<String, String>,
}

impl DefaultLabels {
    /// Label stamped on every resource the controllers manage
    pub const MANAGED_BY: &'static str = "managed-by";

    pub fn new(managed_by: &str) -> Self {
        let mut defaults = BTreeMap::new();
        defaults.insert(Self::MANAGED_BY.to_string(), managed_by.to_string());
        Self { defaults }
    }

    /// Add missing default keys; returns true when anything changed
    pub fn apply(&self, labels: &mut Option<BTreeMap<String, String>>) -> bool {
        let labels = labels.get_or_insert_with(BTreeMap::new);
        let mut changed = false;
        for (key, value) in &self.defaults {
            if !labels.contains_key(key) {
                labels.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }
}
