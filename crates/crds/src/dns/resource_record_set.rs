//! ResourceRecordSet Custom Resource Definition
//!
//! Defines a Kubernetes CRD for managing record sets in a Cloud DNS zone.
//! The external name is the record's DNS name.

use crate::condition::{Condition, ConditionedStatus};
use crate::managed::DeletionPolicy;
use crate::references::{ProviderConfigReference, SecretReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ResourceRecordSetSpec defines the desired state of a DNS record set
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "gcp.microscaler.io",
    version = "v1alpha1",
    kind = "ResourceRecordSet",
    namespaced,
    status = "ResourceRecordSetStatus",
    printcolumn = r#"{"name":"TYPE","type":"string","jsonPath":".spec.forProvider.type"}"#,
    printcolumn = r#"{"name":"READY","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"SYNCED","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecordSetSpec {
    /// Desired record configuration
    pub for_provider: ResourceRecordSetParameters,

    /// ProviderConfig used to reach GCP
    #[serde(default)]
    pub provider_config_ref: ProviderConfigReference,

    /// Secret receiving connection details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,

    /// What to do with the record when this resource is deleted
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// Settable fields of a record set
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecordSetParameters {
    /// Name of the Cloud DNS managed zone holding the record
    pub managed_zone: String,

    /// Record type, e.g. "A", "CNAME", "TXT"
    #[serde(rename = "type")]
    pub record_type: String,

    /// Time to live in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,

    /// Record data
    #[serde(default)]
    pub rrdatas: Vec<String>,
}

/// ResourceRecordSetStatus defines the observed state of a record set
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecordSetStatus {
    /// Ready and Synced conditions
    #[serde(default)]
    #[schemars(with = "Vec<Condition>")]
    pub conditions: ConditionedStatus,
}

crate::managed_resource!(ResourceRecordSet, ResourceRecordSetStatus);
