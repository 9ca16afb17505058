//! Test utilities for the GCP controller
//!
//! Builders for CRDs and ProviderConfigs, in-memory doubles for the
//! connector's collaborators, and [`Harness`], which wires a production
//! reconciler to `MockGcpClient` and the in-memory stores.

use crate::connector::{ClientFactory, Credentials, GcpConnector, ProviderConfigs, ProviderResolver};
use crate::controller::{cloudsql_reconciler, managed_zone_reconciler, resource_record_set_reconciler};
use crate::database::CloudSqlExternal;
use crate::dns::{ManagedZoneExternal, ResourceRecordSetExternal};
use crds::{
    CloudSqlInstance, CloudSqlInstanceParameters, CloudSqlInstanceSpec, ConditionReason,
    ConditionStatus, ConditionType, CredentialsSource, ManagedResource, ManagedZone,
    ManagedZoneParameters, ManagedZoneSpec, ProviderConfig, ProviderConfigSpec,
    ProviderCredentials, ResourceRecordSet, ResourceRecordSetParameters, ResourceRecordSetSpec,
    SecretKeySelector, SecretReference, Settings,
};
use gcp_client::{GcpClientTrait, MockGcpClient};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube_runtime::controller::Action;
use managed::testing::{MemoryPublisher, MemorySecrets, MemoryStore};
use managed::{
    ConnectError, ConnectionPublisher, Connector, Managed, ManagedReconciler, ObjectKey,
    ObjectStore, ReconcilerConfig,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NAMESPACE: &str = "default";
pub const PROJECT: &str = "test-project";

/// ProviderConfig reading an access token from `crossplane-system/gcp-creds`
pub fn provider_config(name: &str, project: &str) -> ProviderConfig {
    ProviderConfig {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: ProviderConfigSpec {
            project_id: project.to_string(),
            credentials: ProviderCredentials {
                source: CredentialsSource::Secret,
                secret_ref: Some(SecretKeySelector {
                    name: "gcp-creds".to_string(),
                    namespace: "crossplane-system".to_string(),
                    key: "token".to_string(),
                }),
            },
        },
    }
}

/// Fixed set of ProviderConfigs
#[derive(Debug, Clone, Default)]
pub struct StaticProviderConfigs {
    configs: Arc<Mutex<BTreeMap<String, ProviderConfig>>>,
}

impl StaticProviderConfigs {
    pub fn with(config: ProviderConfig) -> Self {
        let configs = Self::default();
        configs.insert(config);
        configs
    }

    pub fn insert(&self, config: ProviderConfig) {
        let name = config.metadata.name.clone().unwrap_or_default();
        self.configs.lock().unwrap().insert(name, config);
    }
}

#[async_trait::async_trait]
impl ProviderConfigs for StaticProviderConfigs {
    async fn get(&self, name: &str) -> Result<Option<ProviderConfig>, ConnectError> {
        Ok(self.configs.lock().unwrap().get(name).cloned())
    }
}

/// [`ClientFactory`] handing out one shared mock and recording every build
#[derive(Debug, Clone)]
pub struct MockClientFactory {
    client: MockGcpClient,
    builds: Arc<Mutex<Vec<(String, Credentials)>>>,
}

impl MockClientFactory {
    pub fn new(client: MockGcpClient) -> Self {
        Self {
            client,
            builds: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn builds(&self) -> Vec<(String, Credentials)> {
        self.builds.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ClientFactory for MockClientFactory {
    async fn build(
        &self,
        project_id: &str,
        credentials: Credentials,
    ) -> Result<Arc<dyn GcpClientTrait>, ConnectError> {
        self.builds
            .lock()
            .unwrap()
            .push((project_id.to_string(), credentials));
        Ok(Arc::new(self.client.clone()))
    }
}

fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        ..Default::default()
    }
}

/// ManagedZone with only `dnsName` set
pub fn managed_zone(name: &str, dns_name: &str) -> ManagedZone {
    ManagedZone {
        metadata: meta(name),
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

/// Record set in `zone`
pub fn resource_record_set(name: &str, zone: &str, record_type: &str, rrdatas: &[&str]) -> ResourceRecordSet {
    ResourceRecordSet {
        metadata: meta(name),
        spec: ResourceRecordSetSpec {
            for_provider: ResourceRecordSetParameters {
                managed_zone: zone.to_string(),
                record_type: record_type.to_string(),
                ttl: None,
                rrdatas: rrdatas.iter().map(|s| s.to_string()).collect(),
            },
            provider_config_ref: Default::default(),
            write_connection_secret_to_ref: None,
            deletion_policy: Default::default(),
        },
        status: None,
    }
}

/// Cloud SQL instance writing connection details to `<name>-conn`
pub fn cloudsql_instance(name: &str, tier: &str) -> CloudSqlInstance {
    CloudSqlInstance {
        metadata: meta(name),
        spec: CloudSqlInstanceSpec {
            for_provider: CloudSqlInstanceParameters {
                region: "us-central1".to_string(),
                database_version: Some("POSTGRES_15".to_string()),
                settings: Settings {
                    tier: tier.to_string(),
                    ..Default::default()
                },
            },
            provider_config_ref: Default::default(),
            write_connection_secret_to_ref: Some(SecretReference {
                name: format!("{}-conn", name),
                namespace: None,
            }),
            deletion_policy: Default::default(),
        },
        status: None,
    }
}

pub fn test_config() -> ReconcilerConfig {
    ReconcilerConfig {
        short_wait: Duration::from_secs(30),
        long_wait: Duration::from_secs(60),
        config_error_wait: Duration::from_secs(300),
        conflict_wait: Duration::from_secs(600),
        timeout: Duration::from_secs(5),
    }
}

/// Production reconciler over in-memory Kubernetes and a mock GCP project
pub struct Harness<K, C> {
    pub store: MemoryStore<K>,
    pub publisher: MemoryPublisher,
    pub secrets: MemorySecrets,
    pub gcp: MockGcpClient,
    pub reconciler: ManagedReconciler<K, C>,
    pub key: ObjectKey,
}

type Build<K, C> = fn(
    Arc<dyn ObjectStore<K>>,
    Arc<dyn ConnectionPublisher<K>>,
    Arc<ProviderResolver>,
    ReconcilerConfig,
) -> ManagedReconciler<K, C>;

impl<K: Managed, C: Connector<K>> Harness<K, C> {
    fn build(obj: K, build: Build<K, C>) -> Self {
        let store = MemoryStore::new();
        let obj = store.insert(obj);
        let publisher = MemoryPublisher::new();
        let secrets = MemorySecrets::new();
        secrets.insert("crossplane-system", "gcp-creds", "token", b"ya29.test");
        let gcp = MockGcpClient::new(PROJECT);
        let resolver = Arc::new(ProviderResolver::new(
            Arc::new(StaticProviderConfigs::with(provider_config("default", PROJECT))),
            Arc::new(secrets.clone()),
            Arc::new(MockClientFactory::new(gcp.clone())),
        ));
        let reconciler = build(
            Arc::new(store.clone()),
            Arc::new(publisher.clone()),
            resolver,
            test_config(),
        );
        Self {
            store,
            publisher,
            secrets,
            gcp,
            reconciler,
            key: ObjectKey::of(&obj),
        }
    }

    pub async fn reconcile(&self) -> Action {
        self.reconciler.reconcile(&self.key).await.unwrap()
    }

    pub fn stored(&self) -> K {
        self.store.object(&self.key).expect("object in store")
    }

    pub fn condition(&self, type_: ConditionType) -> Option<(ConditionStatus, ConditionReason)> {
        self.stored()
            .conditions()
            .and_then(|c| c.get(type_))
            .map(|c| (c.status, c.reason))
    }

    pub fn condition_message(&self, type_: ConditionType) -> Option<String> {
        self.stored()
            .conditions()
            .and_then(|c| c.get(type_))
            .and_then(|c| c.message.clone())
    }

    pub fn delete(&self) {
        self.store.mark_deleted(&self.key);
    }
}

pub type ZoneHarness = Harness<ManagedZone, GcpConnector<ManagedZone, ManagedZoneExternal>>;
pub type RecordSetHarness = Harness<ResourceRecordSet, GcpConnector<ResourceRecordSet, ResourceRecordSetExternal>>;
pub type CloudSqlHarness = Harness<CloudSqlInstance, GcpConnector<CloudSqlInstance, CloudSqlExternal>>;

pub fn zone_harness(zone: ManagedZone) -> ZoneHarness {
    Harness::build(zone, managed_zone_reconciler)
}

pub fn record_set_harness(rrset: ResourceRecordSet) -> RecordSetHarness {
    Harness::build(rrset, resource_record_set_reconciler)
}

pub fn cloudsql_harness(instance: CloudSqlInstance) -> CloudSqlHarness {
    Harness::build(instance, cloudsql_reconciler)
}
