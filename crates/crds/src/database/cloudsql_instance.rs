//! CloudSqlInstance Custom Resource Definition
//!
//! Defines a Kubernetes CRD for managing Cloud SQL database instances.
//! Connection details (endpoint, root credentials, CA certificate) are
//! written to `spec.writeConnectionSecretToRef`.

use crate::condition::{Condition, ConditionedStatus};
use crate::managed::DeletionPolicy;
use crate::references::{ProviderConfigReference, SecretReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CloudSqlInstanceSpec defines the desired state of a Cloud SQL instance
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "gcp.microscaler.io",
    version = "v1alpha1",
    kind = "CloudSqlInstance",
    namespaced,
    status = "CloudSqlInstanceStatus",
    printcolumn = r#"{"name":"STATE","type":"string","jsonPath":".status.atProvider.state"}"#,
    printcolumn = r#"{"name":"READY","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"SYNCED","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CloudSqlInstanceSpec {
    /// Desired instance configuration
    pub for_provider: CloudSqlInstanceParameters,

    /// ProviderConfig used to reach GCP
    #[serde(default)]
    pub provider_config_ref: ProviderConfigReference,

    /// Secret receiving connection details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,

    /// What to do with the instance when this resource is deleted
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// Settable fields of a Cloud SQL instance
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CloudSqlInstanceParameters {
    /// Region, e.g. "us-central1" (immutable)
    pub region: String,

    /// Database engine version, e.g. "POSTGRES_15" (defaulted by GCP)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_version: Option<String>,

    /// Instance settings
    pub settings: Settings,
}

/// Cloud SQL instance settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Machine tier, e.g. "db-custom-1-3840"
    pub tier: String,

    /// "ALWAYS", "NEVER" or "ON_DEMAND"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_policy: Option<String>,

    /// "ZONAL" or "REGIONAL"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_type: Option<String>,

    /// Data disk size in GB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_disk_size_gb: Option<i64>,

    /// "PD_SSD" or "PD_HDD"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_disk_type: Option<String>,

    /// Grow storage automatically
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_auto_resize: Option<bool>,

    /// GCP labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_labels: Option<BTreeMap<String, String>>,

    /// Backup configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_configuration: Option<BackupConfiguration>,

    /// IP configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_configuration: Option<IpConfiguration>,
}

/// Backup configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackupConfiguration {
    /// Whether automated backups are enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Backup window start, "HH:MM" in UTC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    /// Binary logging (MySQL only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_log_enabled: Option<bool>,
}

/// IP configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IpConfiguration {
    /// Assign a public IPv4 address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_enabled: Option<bool>,

    /// VPC network for private IP, as a resource link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_network: Option<String>,

    /// Require SSL connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_ssl: Option<bool>,

    /// Networks allowed to connect over the public IP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_networks: Option<Vec<AclEntry>>,
}

/// Authorized network entry
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AclEntry {
    /// Optional label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// CIDR or address
    pub value: String,
}

/// IP address assigned to an instance
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IpMapping {
    /// The address
    pub ip_address: String,

    /// "PRIMARY", "PRIVATE" or "OUTGOING"
    #[serde(rename = "type")]
    pub address_type: String,
}

/// Output-only fields reported by Cloud SQL
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CloudSqlInstanceObservation {
    /// Instance state, e.g. "RUNNABLE", "PENDING_CREATE"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// "project:region:instance" connection name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_name: Option<String>,

    /// Zone currently serving the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gce_zone: Option<String>,

    /// Assigned IP addresses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<IpMapping>,

    /// Server-defined URL of the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,

    /// Service account used by the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_email_address: Option<String>,

    /// Current settings version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_version: Option<i64>,
}

/// CloudSqlInstanceStatus defines the observed state of a Cloud SQL instance
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CloudSqlInstanceStatus {
    /// Ready and Synced conditions
    #[serde(default)]
    #[schemars(with = "Vec<Condition>")]
    pub conditions: ConditionedStatus,

    /// Last observed state of the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_provider: Option<CloudSqlInstanceObservation>,
}

crate::managed_resource!(CloudSqlInstance, CloudSqlInstanceStatus);
