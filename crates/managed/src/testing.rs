//! In-memory doubles for tests
//!
//! [`MemoryStore`] mimics the Kubernetes API for one kind: writes are
//! checked against `resourceVersion`, the object endpoint ignores status and
//! the status endpoint ignores everything else, and an object marked for
//! deletion disappears once its last finalizer is removed.

use crate::error::{ConnectError, PublishError, StoreError};
use crate::external::ConnectionDetails;
use crate::publisher::{secret_target, ConnectionPublisher, SecretStore};
use crate::resource::{Managed, ObjectKey};
use crate::store::ObjectStore;
use crds::{
    ManagedZone, ManagedZoneParameters, ManagedZoneSpec, SecretKeySelector,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

struct StoreState<K> {
    objects: BTreeMap<ObjectKey, K>,
    next_version: u64,
    updates: usize,
    status_updates: usize,
    conflicts: usize,
}

/// Version-checked in-memory [`ObjectStore`]
#[derive(Clone)]
pub struct MemoryStore<K> {
    state: Arc<Mutex<StoreState<K>>>,
}

impl<K: Managed> Default for MemoryStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

fn replace_status<K: Managed>(target: &K, status_from: &K) -> Result<K, StoreError> {
    let mut value = serde_json::to_value(target)?;
    let status = serde_json::to_value(status_from)?
        .get("status")
        .cloned()
        .unwrap_or(Value::Null);
    if let Some(map) = value.as_object_mut() {
        if status.is_null() {
            map.remove("status");
        } else {
            map.insert("status".to_string(), status);
        }
    }
    Ok(serde_json::from_value(value)?)
}

impl<K: Managed> MemoryStore<K> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                objects: BTreeMap::new(),
                next_version: 1,
                updates: 0,
                status_updates: 0,
                conflicts: 0,
            })),
        }
    }

    /// Store an object as if created through the API
    pub fn insert(&self, mut obj: K) -> K {
        let mut state = self.state.lock().unwrap();
        obj.meta_mut().resource_version = Some(state.next_version.to_string());
        state.next_version += 1;
        state.objects.insert(ObjectKey::of(&obj), obj.clone());
        obj
    }

    /// Current stored object
    pub fn object(&self, key: &ObjectKey) -> Option<K> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    /// Set the deletion timestamp, as `kubectl delete` would
    pub fn mark_deleted(&self, key: &ObjectKey) {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version;
        state.next_version += 1;
        let obj = state.objects.get_mut(key).expect("object to delete");
        let now: Time = serde_json::from_value(Value::String("2024-01-01T00:00:00Z".to_string()))
            .expect("valid timestamp");
        obj.meta_mut().deletion_timestamp = Some(now);
        obj.meta_mut().resource_version = Some(version.to_string());
    }

    /// Mutate the stored object, bumping its version
    pub fn modify(&self, key: &ObjectKey, f: impl FnOnce(&mut K)) {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version;
        state.next_version += 1;
        let obj = state.objects.get_mut(key).expect("object to modify");
        f(obj);
        obj.meta_mut().resource_version = Some(version.to_string());
    }

    /// Reject the next `n` writes with a conflict
    pub fn conflict_next_writes(&self, n: usize) {
        self.state.lock().unwrap().conflicts = n;
    }

    /// Number of successful object (metadata and spec) writes
    pub fn updates(&self) -> usize {
        self.state.lock().unwrap().updates
    }

    /// Number of successful status writes
    pub fn status_updates(&self) -> usize {
        self.state.lock().unwrap().status_updates
    }

    fn check_write(state: &mut StoreState<K>, obj: &K) -> Result<(ObjectKey, K), StoreError> {
        let key = ObjectKey::of(obj);
        if state.conflicts > 0 {
            state.conflicts -= 1;
            return Err(StoreError::Conflict(key.to_string()));
        }
        let stored = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if stored.meta().resource_version != obj.meta().resource_version {
            return Err(StoreError::Conflict(key.to_string()));
        }
        Ok((key, stored))
    }
}

#[async_trait::async_trait]
impl<K: Managed> ObjectStore<K> for MemoryStore<K> {
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        Ok(self.object(key))
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let mut state = self.state.lock().unwrap();
        let (key, stored) = Self::check_write(&mut state, obj)?;

        let mut updated = replace_status(obj, &stored)?;
        updated.meta_mut().deletion_timestamp = stored.meta().deletion_timestamp.clone();
        updated.meta_mut().resource_version = Some(state.next_version.to_string());
        state.next_version += 1;
        state.updates += 1;

        let finalized = updated
            .meta()
            .finalizers
            .as_ref()
            .is_none_or(|f| f.is_empty());
        if updated.meta().deletion_timestamp.is_some() && finalized {
            state.objects.remove(&key);
        } else {
            state.objects.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn update_status(&self, obj: &K) -> Result<K, StoreError> {
        let mut state = self.state.lock().unwrap();
        let (key, stored) = Self::check_write(&mut state, obj)?;

        let mut updated = replace_status(&stored, obj)?;
        updated.meta_mut().resource_version = Some(state.next_version.to_string());
        state.next_version += 1;
        state.status_updates += 1;
        state.objects.insert(key, updated.clone());
        Ok(updated)
    }
}

/// In-memory [`ConnectionPublisher`] keyed by secret namespace and name
#[derive(Clone, Default)]
pub struct MemoryPublisher {
    secrets: Arc<Mutex<BTreeMap<(String, String), ConnectionDetails>>>,
    publishes: Arc<Mutex<usize>>,
    fail: Arc<Mutex<bool>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Published details of a secret
    pub fn secret(&self, namespace: &str, name: &str) -> Option<ConnectionDetails> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Pre-populate a secret
    pub fn insert(&self, namespace: &str, name: &str, details: ConnectionDetails) {
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), details);
    }

    /// Number of writes that changed a secret
    pub fn publishes(&self) -> usize {
        *self.publishes.lock().unwrap()
    }

    /// Make every publish fail
    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }
}

#[async_trait::async_trait]
impl<K: Managed> ConnectionPublisher<K> for MemoryPublisher {
    async fn publish(&self, obj: &K, details: &ConnectionDetails) -> Result<(), PublishError> {
        if details.is_empty() {
            return Ok(());
        }
        let Some(target) = secret_target(obj)? else {
            return Ok(());
        };
        if *self.fail.lock().unwrap() {
            return Err(PublishError::MissingNamespace(target.1));
        }
        let mut secrets = self.secrets.lock().unwrap();
        let secret = secrets.entry(target).or_default();
        let mut changed = false;
        for (key, value) in details {
            if secret.get(key) != Some(value) {
                secret.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        if changed {
            *self.publishes.lock().unwrap() += 1;
        }
        Ok(())
    }

    async fn fetch(&self, obj: &K) -> Result<ConnectionDetails, PublishError> {
        let Some(target) = secret_target(obj)? else {
            return Ok(ConnectionDetails::new());
        };
        Ok(self.secrets.lock().unwrap().get(&target).cloned().unwrap_or_default())
    }
}

/// In-memory [`SecretStore`]
#[derive(Clone, Default)]
pub struct MemorySecrets {
    secrets: Arc<Mutex<BTreeMap<(String, String), BTreeMap<String, Vec<u8>>>>>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, namespace: &str, name: &str, key: &str, value: &[u8]) {
        self.secrets
            .lock()
            .unwrap()
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.to_vec());
    }
}

#[async_trait::async_trait]
impl SecretStore for MemorySecrets {
    async fn get_secret(&self, selector: &SecretKeySelector) -> Result<Vec<u8>, ConnectError> {
        let secrets = self.secrets.lock().unwrap();
        let secret_name = format!("{}/{}", selector.namespace, selector.name);
        let data = secrets
            .get(&(selector.namespace.clone(), selector.name.clone()))
            .ok_or_else(|| ConnectError::CredentialsNotFound(secret_name.clone()))?;
        data.get(&selector.key)
            .cloned()
            .ok_or_else(|| ConnectError::CredentialsKeyMissing {
                secret: secret_name,
                key: selector.key.clone(),
            })
    }
}

/// A ManagedZone with only `dnsName` set
pub fn managed_zone(namespace: &str, name: &str, dns_name: &str) -> ManagedZone {
    ManagedZone {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: ManagedZoneSpec {
            for_provider: ManagedZoneParameters {
                dns_name: dns_name.to_string(),
                ..Default::default()
            },
            provider_config_ref: Default::default(),
            write_connection_secret_to_ref: None,
            deletion_policy: Default::default(),
        },
        status: None,
    }
}
