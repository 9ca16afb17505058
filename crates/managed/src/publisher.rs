//! Connection details publishing and credential lookup
//!
//! Connection details are merged into the Secret named by
//! `spec.writeConnectionSecretToRef`. The Secret is owned by the managed
//! resource so it is garbage-collected with it. Publishing only writes when
//! a key is new or changed.

use crate::error::{ConnectError, PublishError};
use crate::external::ConnectionDetails;
use crate::resource::Managed;
use crds::{SecretKeySelector, SecretReference};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::PostParams;
use kube::{Api, Client};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tracing::{debug, info};

/// Stores connection details for managed objects
#[async_trait::async_trait]
pub trait ConnectionPublisher<K>: Send + Sync {
    /// Merge `details` into the object's connection secret
    async fn publish(&self, obj: &K, details: &ConnectionDetails) -> Result<(), PublishError>;

    /// Details last published for the object (empty if none)
    async fn fetch(&self, obj: &K) -> Result<ConnectionDetails, PublishError>;
}

/// Reads credentials from Secrets
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync {
    /// Value of one key of a Secret
    async fn get_secret(&self, selector: &SecretKeySelector) -> Result<Vec<u8>, ConnectError>;
}

/// Namespace and name of the connection secret of `obj`
pub(crate) fn secret_target<K: Managed>(obj: &K) -> Result<Option<(String, String)>, PublishError> {
    let Some(SecretReference { name, namespace }) = obj.write_connection_secret_to_ref() else {
        return Ok(None);
    };
    let namespace = namespace
        .clone()
        .or_else(|| obj.meta().namespace.clone())
        .ok_or_else(|| PublishError::MissingNamespace(name.clone()))?;
    Ok(Some((namespace, name.clone())))
}

/// Merge `details` into `data`; returns true when anything changed
pub(crate) fn merge_details(data: &mut BTreeMap<String, ByteString>, details: &ConnectionDetails) -> bool {
    let mut changed = false;
    for (key, value) in details {
        if data.get(key).map(|v| &v.0) != Some(value) {
            data.insert(key.clone(), ByteString(value.clone()));
            changed = true;
        }
    }
    changed
}

/// [`ConnectionPublisher`] writing Kubernetes Secrets
pub struct SecretPublisher<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> std::fmt::Debug for SecretPublisher<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretPublisher").finish_non_exhaustive()
    }
}

impl<K> SecretPublisher<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<K: Managed> ConnectionPublisher<K> for SecretPublisher<K> {
    async fn publish(&self, obj: &K, details: &ConnectionDetails) -> Result<(), PublishError> {
        if details.is_empty() {
            return Ok(());
        }
        let Some((namespace, name)) = secret_target(obj)? else {
            return Ok(());
        };
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);

        match api.get_opt(&name).await? {
            Some(mut existing) => {
                let data = existing.data.get_or_insert_with(BTreeMap::new);
                if !merge_details(data, details) {
                    debug!("Connection secret {}/{} is up to date", namespace, name);
                    return Ok(());
                }
                api.replace(&name, &PostParams::default(), &existing).await?;
                info!("Updated connection secret {}/{}", namespace, name);
            }
            None => {
                let mut data = BTreeMap::new();
                merge_details(&mut data, details);
                let secret = Secret {
                    metadata: ObjectMeta {
                        name: Some(name.clone()),
                        namespace: Some(namespace.clone()),
                        owner_references: obj.controller_owner_ref(&()).map(|o| vec![o]),
                        ..Default::default()
                    },
                    type_: Some("connection.gcp.microscaler.io/v1alpha1".to_string()),
                    data: Some(data),
                    ..Default::default()
                };
                api.create(&PostParams::default(), &secret).await?;
                info!("Created connection secret {}/{}", namespace, name);
            }
        }
        Ok(())
    }

    async fn fetch(&self, obj: &K) -> Result<ConnectionDetails, PublishError> {
        let Some((namespace, name)) = secret_target(obj)? else {
            return Ok(ConnectionDetails::new());
        };
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        let data = api
            .get_opt(&name)
            .await?
            .and_then(|s| s.data)
            .unwrap_or_default();
        Ok(data.into_iter().map(|(k, v)| (k, v.0)).collect())
    }
}

/// [`SecretStore`] reading Kubernetes Secrets
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SecretStore for KubeSecretStore {
    async fn get_secret(&self, selector: &SecretKeySelector) -> Result<Vec<u8>, ConnectError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &selector.namespace);
        let secret = api
            .get_opt(&selector.name)
            .await
            .map_err(|e| ConnectError::Lookup(Box::new(e)))?
            .ok_or_else(|| ConnectError::CredentialsNotFound(format!("{}/{}", selector.namespace, selector.name)))?;

        secret
            .data
            .and_then(|mut data| data.remove(&selector.key))
            .map(|v| v.0)
            .ok_or_else(|| ConnectError::CredentialsKeyMissing {
                secret: format!("{}/{}", selector.namespace, selector.name),
                key: selector.key.clone(),
            })
    }
}
