//! Object identity and metadata helpers
//!
//! Helpers for the metadata the reconciler owns on a managed resource: the
//! external-name annotation and the cleanup finalizer.

use crds::{ManagedResource, EXTERNAL_NAME_ANNOTATION, MANAGED_FINALIZER};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Bounds every managed kind satisfies
pub trait Managed:
    ManagedResource + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<K> Managed for K where
    K: ManagedResource + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Namespace and name of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    /// Key of a namespaced object
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key of an existing object
    pub fn of<K: kube::Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.meta().namespace.clone(),
            name: obj.meta().name.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Provider-side name of the external resource, if assigned
pub fn external_name<K: kube::Resource>(obj: &K) -> Option<&str> {
    obj.meta()
        .annotations
        .as_ref()?
        .get(EXTERNAL_NAME_ANNOTATION)
        .map(String::as_str)
        .filter(|name| !name.is_empty())
}

/// Set the external-name annotation
pub fn set_external_name<K: kube::Resource>(obj: &mut K, name: &str) {
    obj.meta_mut()
        .annotations
        .get_or_insert_with(Default::default)
        .insert(EXTERNAL_NAME_ANNOTATION.to_string(), name.to_string());
}

/// Whether the object is marked for deletion
pub fn is_being_deleted<K: kube::Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}

/// Whether the cleanup finalizer is present
pub fn has_finalizer<K: kube::Resource>(obj: &K) -> bool {
    obj.meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == MANAGED_FINALIZER))
}

/// Add the cleanup finalizer; returns true if it was missing
pub fn add_finalizer<K: kube::Resource>(obj: &mut K) -> bool {
    if has_finalizer(obj) {
        return false;
    }
    obj.meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(MANAGED_FINALIZER.to_string());
    true
}

/// Remove the cleanup finalizer; returns true if it was present
pub fn remove_finalizer<K: kube::Resource>(obj: &mut K) -> bool {
    let Some(finalizers) = obj.meta_mut().finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|f| f != MANAGED_FINALIZER);
    before != finalizers.len()
}

/// Split a serialized object into everything-but-status and status.
///
/// Used to decide which of the two API endpoints (object, status
/// subresource) a cycle has to write.
pub(crate) fn split_status<K: Serialize>(obj: &K) -> Result<(serde_json::Value, serde_json::Value), serde_json::Error> {
    let mut value = serde_json::to_value(obj)?;
    let status = value
        .as_object_mut()
        .and_then(|o| o.remove("status"))
        .unwrap_or(serde_json::Value::Null);
    if let Some(meta) = value.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        meta.remove("resourceVersion");
        meta.remove("managedFields");
    }
    Ok((value, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{ManagedZone, ManagedZoneParameters, ManagedZoneSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn zone() -> ManagedZone {
        ManagedZone {
            metadata: ObjectMeta {
                name: Some("zone".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: ManagedZoneSpec {
                for_provider: ManagedZoneParameters {
                    dns_name: "example.com.".to_string(),
                    ..Default::default()
                },
                provider_config_ref: Default::default(),
                write_connection_secret_to_ref: None,
                deletion_policy: Default::default(),
            },
            status: None,
        }
    }

    #[test]
    fn test_finalizer_add_remove() {
        let mut obj = zone();
        assert!(!has_finalizer(&obj));
        assert!(add_finalizer(&mut obj));
        assert!(!add_finalizer(&mut obj));
        assert_eq!(obj.metadata.finalizers.as_ref().map(Vec::len), Some(1));
        assert!(remove_finalizer(&mut obj));
        assert!(!remove_finalizer(&mut obj));
        assert!(!has_finalizer(&obj));
    }

    #[test]
    fn test_external_name() {
        let mut obj = zone();
        assert_eq!(external_name(&obj), None);
        set_external_name(&mut obj, "my-zone");
        assert_eq!(external_name(&obj), Some("my-zone"));
    }

    #[test]
    fn test_empty_external_name_is_unset() {
        let mut obj = zone();
        set_external_name(&mut obj, "");
        assert_eq!(external_name(&obj), None);
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::of(&zone()).to_string(), "default/zone");
    }

    #[test]
    fn test_split_status_ignores_resource_version() {
        let mut a = zone();
        let mut b = zone();
        a.metadata.resource_version = Some("1".to_string());
        b.metadata.resource_version = Some("2".to_string());
        assert_eq!(split_status(&a).unwrap(), split_status(&b).unwrap());
    }
}
