//! ManagedZone Custom Resource Definition
//!
//! Defines a Kubernetes CRD for managing Cloud DNS managed zones.

use crate::condition::{Condition, ConditionedStatus};
use crate::managed::DeletionPolicy;
use crate::references::{ProviderConfigReference, SecretReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ManagedZoneSpec defines the desired state of a Cloud DNS managed zone
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "gcp.microscaler.io",
    version = "v1alpha1",
    kind = "ManagedZone",
    namespaced,
    status = "ManagedZoneStatus",
    printcolumn = r#"{"name":"DNS-NAME","type":"string","jsonPath":".spec.forProvider.dnsName"}"#,
    printcolumn = r#"{"name":"READY","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"SYNCED","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedZoneSpec {
    /// Desired zone configuration
    pub for_provider: ManagedZoneParameters,

    /// ProviderConfig used to reach GCP
    #[serde(default)]
    pub provider_config_ref: ProviderConfigReference,

    /// Secret receiving connection details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,

    /// What to do with the zone when this resource is deleted
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// Settable fields of a managed zone
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ManagedZoneParameters {
    /// DNS name of the zone, e.g. "example.com."
    pub dns_name: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// GCP labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Zone visibility: "public" or "private"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,

    /// Networks that can see a private zone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_visibility_config: Option<PrivateVisibilityConfig>,
}

/// Private zone visibility configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PrivateVisibilityConfig {
    /// VPC networks bound to the zone
    #[serde(default)]
    pub networks: Vec<PrivateVisibilityNetwork>,
}

/// A VPC network bound to a private zone
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrivateVisibilityNetwork {
    /// Fully qualified network URL
    pub network_url: String,
}

/// Output-only fields reported by Cloud DNS
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ManagedZoneObservation {
    /// Server-assigned zone ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Name servers delegated to the zone
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_servers: Vec<String>,

    /// Creation time reported by Cloud DNS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
}

/// ManagedZoneStatus defines the observed state of a managed zone
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ManagedZoneStatus {
    /// Ready and Synced conditions
    #[serde(default)]
    #[schemars(with = "Vec<Condition>")]
    pub conditions: ConditionedStatus,

    /// Last observed state of the zone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_provider: Option<ManagedZoneObservation>,
}

crate::managed_resource!(ManagedZone, ManagedZoneStatus);
