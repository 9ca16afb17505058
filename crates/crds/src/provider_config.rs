//! ProviderConfig Custom Resource Definition
//!
//! Cluster-scoped configuration naming the GCP project and where the
//! controller gets credentials for it. Managed resources select one through
//! `spec.providerConfigRef`.

use crate::references::SecretKeySelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ProviderConfigSpec defines how to connect to a GCP project
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "gcp.microscaler.io",
    version = "v1alpha1",
    kind = "ProviderConfig"
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    /// GCP project ID that owns the managed resources
    pub project_id: String,

    /// Credentials used to authenticate against GCP
    pub credentials: ProviderCredentials,
}

/// Credentials configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    /// Where credentials come from
    pub source: CredentialsSource,

    /// Secret key holding an OAuth2 access token (required when source is Secret)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,
}

/// Source of GCP credentials
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum CredentialsSource {
    /// Read an access token from a Kubernetes Secret
    Secret,
    /// Use the identity of the controller pod (GKE Workload Identity)
    InjectedIdentity,
}
