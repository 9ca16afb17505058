//! Main controller implementation.
//!
//! Composition root of the GCP Controller: builds the Kubernetes-backed
//! collaborators, one [`ManagedReconciler`] per managed kind, and a watcher
//! task per kind.
//!
//! The controller manages three CRD types:
//! - ManagedZone: Cloud DNS managed zones
//! - ResourceRecordSet: Cloud DNS record sets
//! - CloudSqlInstance: Cloud SQL instances

use crate::config::ControllerConfig;
use crate::connector::{
    ExternalFactory, GcpConnector, KubeProviderConfigs, ProviderResolver, RestClientFactory,
};
use crate::database::CloudSqlExternal;
use crate::dns::{ManagedZoneExternal, ResourceRecordSetExternal};
use crate::error::ControllerError;
use crate::watcher::{watch_resource, WatchSettings};
use crds::{CloudSqlInstance, ManagedZone, ResourceRecordSet};
use gcp_client::GcpClientTrait;
use kube::{Api, Client};
use managed::{
    ConnectionPublisher, DefaultLabels, KubeSecretStore, KubeStore, Managed, ManagedReconciler,
    NameAsExternalName, ObjectStore, ReconcilerConfig, SecretPublisher,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Value of the `managed-by` label added to GCP resources
pub const MANAGED_BY: &str = "gcp-controller";

pub type ManagedZoneReconciler = ManagedReconciler<ManagedZone, GcpConnector<ManagedZone, ManagedZoneExternal>>;
pub type ResourceRecordSetReconciler =
    ManagedReconciler<ResourceRecordSet, GcpConnector<ResourceRecordSet, ResourceRecordSetExternal>>;
pub type CloudSqlReconciler = ManagedReconciler<CloudSqlInstance, GcpConnector<CloudSqlInstance, CloudSqlExternal>>;

pub fn managed_zone_reconciler(
    store: Arc<dyn ObjectStore<ManagedZone>>,
    publisher: Arc<dyn ConnectionPublisher<ManagedZone>>,
    resolver: Arc<ProviderResolver>,
    config: ReconcilerConfig,
) -> ManagedZoneReconciler {
    let labels = DefaultLabels::new(MANAGED_BY);
    let external: ExternalFactory<ManagedZoneExternal> =
        Arc::new(move |gcp: Arc<dyn GcpClientTrait>| ManagedZoneExternal::new(gcp, labels.clone()));
    ManagedReconciler::new(store, GcpConnector::new(resolver, external), publisher, config)
        .with_initializer(NameAsExternalName)
}

pub fn resource_record_set_reconciler(
    store: Arc<dyn ObjectStore<ResourceRecordSet>>,
    publisher: Arc<dyn ConnectionPublisher<ResourceRecordSet>>,
    resolver: Arc<ProviderResolver>,
    config: ReconcilerConfig,
) -> ResourceRecordSetReconciler {
    let external: ExternalFactory<ResourceRecordSetExternal> = Arc::new(ResourceRecordSetExternal::new);
    ManagedReconciler::new(store, GcpConnector::new(resolver, external), publisher, config)
        .with_initializer(NameAsExternalName)
}

pub fn cloudsql_reconciler(
    store: Arc<dyn ObjectStore<CloudSqlInstance>>,
    publisher: Arc<dyn ConnectionPublisher<CloudSqlInstance>>,
    resolver: Arc<ProviderResolver>,
    config: ReconcilerConfig,
) -> CloudSqlReconciler {
    let secrets = publisher.clone();
    let labels = DefaultLabels::new(MANAGED_BY);
    let external: ExternalFactory<CloudSqlExternal> = Arc::new(move |gcp: Arc<dyn GcpClientTrait>| {
        CloudSqlExternal::new(gcp, secrets.clone(), labels.clone())
    });
    ManagedReconciler::new(store, GcpConnector::new(resolver, external), publisher, config)
        .with_initializer(NameAsExternalName)
}

fn api<K: Managed>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Main controller for GCP managed resources.
pub struct Controller {
    managed_zone_watcher: JoinHandle<Result<(), ControllerError>>,
    resource_record_set_watcher: JoinHandle<Result<(), ControllerError>>,
    cloudsql_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its watchers.
    pub async fn new(config: &ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing GCP Controller");

        let client = Client::try_default().await?;

        let resolver = Arc::new(ProviderResolver::new(
            Arc::new(KubeProviderConfigs::new(client.clone())),
            Arc::new(KubeSecretStore::new(client.clone())),
            Arc::new(RestClientFactory::new(config.endpoints.clone())),
        ));
        let reconciler_config = config.reconciler_config();
        let settings = WatchSettings {
            concurrency: config.max_concurrent_reconciliations,
            ..Default::default()
        };
        let namespace = config.namespace.as_deref();

        let zones = Arc::new(managed_zone_reconciler(
            Arc::new(KubeStore::new(client.clone())),
            Arc::new(SecretPublisher::new(client.clone())),
            resolver.clone(),
            reconciler_config.clone(),
        ));
        let record_sets = Arc::new(resource_record_set_reconciler(
            Arc::new(KubeStore::new(client.clone())),
            Arc::new(SecretPublisher::new(client.clone())),
            resolver.clone(),
            reconciler_config.clone(),
        ));
        let instances = Arc::new(cloudsql_reconciler(
            Arc::new(KubeStore::new(client.clone())),
            Arc::new(SecretPublisher::new(client.clone())),
            resolver,
            reconciler_config,
        ));

        let managed_zone_watcher =
            tokio::spawn(watch_resource(api::<ManagedZone>(&client, namespace), zones, settings));
        let resource_record_set_watcher = tokio::spawn(watch_resource(
            api::<ResourceRecordSet>(&client, namespace),
            record_sets,
            settings,
        ));
        let cloudsql_watcher =
            tokio::spawn(watch_resource(api::<CloudSqlInstance>(&client, namespace), instances, settings));

        info!(
            "GCP Controller watching {}",
            namespace.unwrap_or("all namespaces")
        );

        Ok(Self {
            managed_zone_watcher,
            resource_record_set_watcher,
            cloudsql_watcher,
        })
    }

    /// Runs until the first watcher stops.
    pub async fn run(self) -> Result<(), ControllerError> {
        let joined = |name: &str, res: Result<Result<(), ControllerError>, tokio::task::JoinError>| {
            res.map_err(|e| {
                error!("{} watcher task failed: {}", name, e);
                ControllerError::Watch(format!("{} watcher task failed: {}", name, e))
            })?
        };

        tokio::select! {
            res = self.managed_zone_watcher => joined("ManagedZone", res),
            res = self.resource_record_set_watcher => joined("ResourceRecordSet", res),
            res = self.cloudsql_watcher => joined("CloudSqlInstance", res),
        }
    }
}
