//! CloudSqlInstance external client
//!
//! Maps `spec.forProvider` of a CloudSqlInstance onto the Cloud SQL Admin
//! `instances` resource. The external name is the instance name.
//!
//! The root password is generated on create, sent with the insert request
//! and published once the insert succeeds. Cloud SQL never returns it, so a
//! retried create that finds the instance already present reuses the
//! password from the connection secret instead of generating a new one.

use crate::error::external_error;
use crds::{CloudSqlInstance, CloudSqlInstanceObservation, CloudSqlInstanceParameters};
use gcp_client::{self as gcp, GcpClientTrait};
use managed::drift::{late_init, overlay_is_up_to_date};
use managed::resource::external_name;
use managed::{
    ConnectionDetails, ConnectionPublisher, DefaultLabels, ErrorKind, ExternalClient, ExternalCreation,
    ExternalError, ExternalObservation, ExternalUpdate, ResourceState, Stage,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const ENDPOINT_KEY: &str = "endpoint";
pub const PUBLIC_IP_KEY: &str = "publicIP";
pub const PRIVATE_IP_KEY: &str = "privateIP";
pub const CONNECTION_NAME_KEY: &str = "connectionName";
pub const SERVER_CA_CERTIFICATE_KEY: &str = "serverCACertificateCert";

const STATE_RUNNABLE: &str = "RUNNABLE";
const STATE_PENDING_CREATE: &str = "PENDING_CREATE";

fn set<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if let Some(value) = value {
        *target = Some(value.clone());
    }
}

/// Write the desired parameters onto an instance payload.
///
/// `settingsVersion` is never written here; updates add it separately.
pub fn generate_into(name: &str, params: &CloudSqlInstanceParameters, instance: &mut gcp::DatabaseInstance) {
    instance.name = Some(name.to_string());
    instance.region = Some(params.region.clone());
    set(&mut instance.database_version, &params.database_version);

    let desired = &params.settings;
    let settings = instance.settings.get_or_insert_with(Default::default);
    settings.tier = Some(desired.tier.clone());
    set(&mut settings.activation_policy, &desired.activation_policy);
    set(&mut settings.availability_type, &desired.availability_type);
    set(&mut settings.data_disk_size_gb, &desired.data_disk_size_gb.map(|gb| gb.to_string()));
    set(&mut settings.data_disk_type, &desired.data_disk_type);
    set(&mut settings.storage_auto_resize, &desired.storage_auto_resize);
    set(&mut settings.user_labels, &desired.user_labels);

    if let Some(backup) = &desired.backup_configuration {
        let target = settings.backup_configuration.get_or_insert_with(Default::default);
        set(&mut target.enabled, &backup.enabled);
        set(&mut target.start_time, &backup.start_time);
        set(&mut target.binary_log_enabled, &backup.binary_log_enabled);
    }

    if let Some(ip) = &desired.ip_configuration {
        let target = settings.ip_configuration.get_or_insert_with(Default::default);
        set(&mut target.ipv4_enabled, &ip.ipv4_enabled);
        set(&mut target.private_network, &ip.private_network);
        set(&mut target.require_ssl, &ip.require_ssl);
        if let Some(networks) = &ip.authorized_networks {
            target.authorized_networks = Some(
                networks
                    .iter()
                    .map(|n| gcp::AclEntry {
                        name: n.name.clone(),
                        value: Some(n.value.clone()),
                    })
                    .collect(),
            );
        }
    }
}

/// Insert request for an instance, without a root password
pub fn generate(name: &str, params: &CloudSqlInstanceParameters) -> gcp::DatabaseInstance {
    let mut instance = gcp::DatabaseInstance::default();
    generate_into(name, params, &mut instance);
    instance
}

fn backup_from(observed: &gcp::BackupConfiguration) -> crds::BackupConfiguration {
    crds::BackupConfiguration {
        enabled: observed.enabled,
        start_time: observed.start_time.clone(),
        binary_log_enabled: observed.binary_log_enabled,
    }
}

fn acl_from(observed: &[gcp::AclEntry]) -> Vec<crds::AclEntry> {
    observed
        .iter()
        .filter_map(|entry| {
            entry.value.clone().map(|value| crds::AclEntry {
                name: entry.name.clone(),
                value,
            })
        })
        .collect()
}

/// Fill unset parameters from the observed instance
pub fn late_initialize(params: &mut CloudSqlInstanceParameters, observed: &gcp::DatabaseInstance) -> bool {
    let mut changed = late_init(&mut params.database_version, observed.database_version.as_ref());

    let Some(observed) = observed.settings.as_ref() else {
        return changed;
    };
    let settings = &mut params.settings;
    let disk_size = observed
        .data_disk_size_gb
        .as_deref()
        .and_then(|gb| gb.parse::<i64>().ok());

    changed |= late_init(&mut settings.activation_policy, observed.activation_policy.as_ref());
    changed |= late_init(&mut settings.availability_type, observed.availability_type.as_ref());
    changed |= late_init(&mut settings.data_disk_size_gb, disk_size.as_ref());
    changed |= late_init(&mut settings.data_disk_type, observed.data_disk_type.as_ref());
    changed |= late_init(&mut settings.storage_auto_resize, observed.storage_auto_resize.as_ref());
    changed |= late_init(&mut settings.user_labels, observed.user_labels.as_ref());

    if let Some(observed_backup) = &observed.backup_configuration {
        match settings.backup_configuration.as_mut() {
            None => {
                settings.backup_configuration = Some(backup_from(observed_backup));
                changed = true;
            }
            Some(backup) => {
                changed |= late_init(&mut backup.enabled, observed_backup.enabled.as_ref());
                changed |= late_init(&mut backup.start_time, observed_backup.start_time.as_ref());
                changed |= late_init(&mut backup.binary_log_enabled, observed_backup.binary_log_enabled.as_ref());
            }
        }
    }

    if let Some(observed_ip) = &observed.ip_configuration {
        let networks = observed_ip.authorized_networks.as_deref().map(acl_from);
        let ip = settings.ip_configuration.get_or_insert_with(|| {
            changed = true;
            Default::default()
        });
        changed |= late_init(&mut ip.ipv4_enabled, observed_ip.ipv4_enabled.as_ref());
        changed |= late_init(&mut ip.private_network, observed_ip.private_network.as_ref());
        changed |= late_init(&mut ip.require_ssl, observed_ip.require_ssl.as_ref());
        changed |= late_init(&mut ip.authorized_networks, networks.as_ref());
    }

    changed
}

/// Whether the observed instance matches the desired parameters
pub fn is_up_to_date(
    name: &str,
    params: &CloudSqlInstanceParameters,
    observed: &gcp::DatabaseInstance,
) -> Result<bool, serde_json::Error> {
    overlay_is_up_to_date(observed, |instance| generate_into(name, params, instance))
}

/// Output-only fields of the instance
pub fn observation(instance: &gcp::DatabaseInstance) -> CloudSqlInstanceObservation {
    CloudSqlInstanceObservation {
        state: instance.state.clone(),
        connection_name: instance.connection_name.clone(),
        gce_zone: instance.gce_zone.clone(),
        ip_addresses: instance
            .ip_addresses
            .iter()
            .flatten()
            .filter_map(|m| {
                Some(crds::IpMapping {
                    ip_address: m.ip_address.clone()?,
                    address_type: m.address_type.clone()?,
                })
            })
            .collect(),
        self_link: instance.self_link.clone(),
        service_account_email_address: instance.service_account_email_address.clone(),
        settings_version: instance
            .settings
            .as_ref()
            .and_then(|s| s.settings_version.as_deref())
            .and_then(|v| v.parse().ok()),
    }
}

/// Readiness derived from the instance state
pub fn resource_state(state: Option<&str>) -> ResourceState {
    match state {
        Some(STATE_RUNNABLE) => ResourceState::Available,
        Some(STATE_PENDING_CREATE) => ResourceState::Creating,
        _ => ResourceState::Unavailable,
    }
}

/// Default administrative user of the database engine
pub fn username(database_version: Option<&str>) -> &'static str {
    match database_version {
        Some(v) if v.starts_with("POSTGRES") => "postgres",
        Some(v) if v.starts_with("SQLSERVER") => "sqlserver",
        _ => "root",
    }
}

/// Connection details derivable from the observed instance
pub fn connection_details(instance: &gcp::DatabaseInstance) -> ConnectionDetails {
    let mut details = ConnectionDetails::new();
    details.insert(
        USERNAME_KEY.to_string(),
        username(instance.database_version.as_deref()).as_bytes().to_vec(),
    );

    let public_ip = instance.ip_address("PRIMARY");
    let private_ip = instance.ip_address("PRIVATE");
    if let Some(endpoint) = public_ip.or(private_ip) {
        details.insert(ENDPOINT_KEY.to_string(), endpoint.as_bytes().to_vec());
    }
    if let Some(ip) = public_ip {
        details.insert(PUBLIC_IP_KEY.to_string(), ip.as_bytes().to_vec());
    }
    if let Some(ip) = private_ip {
        details.insert(PRIVATE_IP_KEY.to_string(), ip.as_bytes().to_vec());
    }
    if let Some(name) = &instance.connection_name {
        details.insert(CONNECTION_NAME_KEY.to_string(), name.as_bytes().to_vec());
    }
    if let Some(cert) = instance.server_ca_cert.as_ref().and_then(|c| c.cert.as_ref()) {
        details.insert(SERVER_CA_CERTIFICATE_KEY.to_string(), cert.as_bytes().to_vec());
    }
    details
}

/// Random root password
pub fn generate_password() -> String {
    Uuid::new_v4().simple().to_string()
}

fn require_name(obj: &CloudSqlInstance, stage: Stage) -> Result<String, ExternalError> {
    external_name(obj)
        .map(str::to_string)
        .ok_or_else(|| ExternalError::new(stage, ErrorKind::Invalid, "external name is not set"))
}

/// [`ExternalClient`] for CloudSqlInstances
pub struct CloudSqlExternal {
    gcp: Arc<dyn GcpClientTrait>,
    publisher: Arc<dyn ConnectionPublisher<CloudSqlInstance>>,
    labels: DefaultLabels,
}

impl std::fmt::Debug for CloudSqlExternal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudSqlExternal")
            .field("project", &self.gcp.project_id())
            .finish_non_exhaustive()
    }
}

impl CloudSqlExternal {
    pub fn new(
        gcp: Arc<dyn GcpClientTrait>,
        publisher: Arc<dyn ConnectionPublisher<CloudSqlInstance>>,
        labels: DefaultLabels,
    ) -> Self {
        Self {
            gcp,
            publisher,
            labels,
        }
    }
}

#[async_trait::async_trait]
impl ExternalClient<CloudSqlInstance> for CloudSqlExternal {
    async fn observe(&self, obj: &mut CloudSqlInstance) -> Result<ExternalObservation, ExternalError> {
        let Some(name) = external_name(obj).map(str::to_string) else {
            return Ok(ExternalObservation::not_found());
        };

        let instance = match self.gcp.get_database_instance(&name).await {
            Ok(instance) => instance,
            Err(e) if e.is_not_found() => {
                debug!("Cloud SQL instance {} does not exist", name);
                return Ok(ExternalObservation::not_found());
            }
            Err(e) => return Err(external_error(Stage::Observe, e)),
        };

        let mut late_initialized = late_initialize(&mut obj.spec.for_provider, &instance);
        late_initialized |= self.labels.apply(&mut obj.spec.for_provider.settings.user_labels);
        obj.status.get_or_insert_with(Default::default).at_provider = Some(observation(&instance));
        let up_to_date = is_up_to_date(&name, &obj.spec.for_provider, &instance)
            .map_err(|e| ExternalError::new(Stage::Observe, ErrorKind::Invalid, e))?;

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: up_to_date,
            resource_late_initialized: late_initialized,
            resource_state: resource_state(instance.state.as_deref()),
            connection_details: connection_details(&instance),
        })
    }

    async fn create(&self, obj: &mut CloudSqlInstance) -> Result<ExternalCreation, ExternalError> {
        let name = require_name(obj, Stage::Create)?;
        self.labels.apply(&mut obj.spec.for_provider.settings.user_labels);
        let password = generate_password();
        let mut instance = generate(&name, &obj.spec.for_provider);
        instance.root_password = Some(password.clone());

        let mut details = ConnectionDetails::new();
        match self.gcp.insert_database_instance(&instance).await {
            Ok(operation) => {
                info!(
                    "Inserting Cloud SQL instance {} (operation {})",
                    name,
                    operation.name.as_deref().unwrap_or("unknown")
                );
                details.insert(PASSWORD_KEY.to_string(), password.into_bytes());
            }
            Err(e) if e.is_already_exists() => {
                warn!(
                    "Cloud SQL instance {} already exists, keeping the published password",
                    name
                );
                let published = self
                    .publisher
                    .fetch(obj)
                    .await
                    .map_err(|e| ExternalError::new(Stage::Create, ErrorKind::Transient, e))?;
                if let Some(existing) = published.get(PASSWORD_KEY) {
                    details.insert(PASSWORD_KEY.to_string(), existing.clone());
                }
            }
            Err(e) => return Err(external_error(Stage::Create, e)),
        }

        let version = obj.spec.for_provider.database_version.as_deref();
        details.insert(USERNAME_KEY.to_string(), username(version).as_bytes().to_vec());
        Ok(ExternalCreation {
            connection_details: details,
        })
    }

    async fn update(&self, obj: &CloudSqlInstance) -> Result<ExternalUpdate, ExternalError> {
        let name = require_name(obj, Stage::Update)?;
        let mut instance = generate(&name, &obj.spec.for_provider);
        let settings_version = obj
            .status
            .as_ref()
            .and_then(|s| s.at_provider.as_ref())
            .and_then(|p| p.settings_version);
        if let (Some(version), Some(settings)) = (settings_version, instance.settings.as_mut()) {
            settings.settings_version = Some(version.to_string());
        }

        self.gcp
            .patch_database_instance(&name, &instance)
            .await
            .map_err(|e| external_error(Stage::Update, e))?;
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, obj: &CloudSqlInstance) -> Result<(), ExternalError> {
        let name = require_name(obj, Stage::Delete)?;
        self.gcp
            .delete_database_instance(&name)
            .await
            .map(|_| ())
            .map_err(|e| external_error(Stage::Delete, e))
    }
}
