//! Access to managed objects in the Kubernetes API
//!
//! All writes are version-checked: the object's `resourceVersion` travels
//! with the write and a concurrent modification surfaces as
//! [`StoreError::Conflict`], so the cycle is retried from a fresh read.

use crate::error::StoreError;
use crate::resource::{Managed, ObjectKey};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use std::marker::PhantomData;
use tracing::debug;

/// Read and write managed objects
#[async_trait::async_trait]
pub trait ObjectStore<K>: Send + Sync {
    /// Fetch the current object, `None` if it no longer exists
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>;

    /// Write metadata and spec, returning the stored object
    async fn update(&self, obj: &K) -> Result<K, StoreError>;

    /// Write the status subresource, returning the stored object
    async fn update_status(&self, obj: &K) -> Result<K, StoreError>;
}

/// [`ObjectStore`] backed by the Kubernetes API
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> std::fmt::Debug for KubeStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl<K> KubeStore<K>
where
    K: Managed + Resource<Scope = NamespaceResourceScope>,
{
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    fn api(&self, namespace: Option<&str>) -> Api<K> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::default_namespaced(self.client.clone()),
        }
    }
}

fn map_write_error(key: &ObjectKey, error: kube::Error) -> StoreError {
    match error {
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict(key.to_string()),
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound(key.to_string()),
        other => StoreError::Kube(other),
    }
}

#[async_trait::async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Managed + Resource<Scope = NamespaceResourceScope>,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        Ok(self.api(key.namespace.as_deref()).get_opt(&key.name).await?)
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(obj);
        debug!("Updating {} {}", K::kind(&()), key);
        self.api(key.namespace.as_deref())
            .replace(&obj.name_any(), &PostParams::default(), obj)
            .await
            .map_err(|e| map_write_error(&key, e))
    }

    async fn update_status(&self, obj: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(obj);
        debug!("Updating status of {} {}", K::kind(&()), key);
        let value = serde_json::to_value(obj)?;
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": obj.resource_version() },
            "status": value.get("status").cloned().unwrap_or(serde_json::Value::Null),
        });
        self.api(key.namespace.as_deref())
            .patch_status(&obj.name_any(), &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| map_write_error(&key, e))
    }
}
