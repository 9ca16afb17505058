//! Kubernetes object references used by managed resources
//!
//! Managed resources point at their `ProviderConfig` by name and at the
//! Secret their connection details are written to. Credentials are read
//! from a single key of a Secret.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the ProviderConfig used when a resource does not set one
pub const DEFAULT_PROVIDER_CONFIG: &str = "default";

/// Reference to a cluster-scoped `ProviderConfig`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigReference {
    /// Name of the referenced ProviderConfig
    pub name: String,
}

impl Default for ProviderConfigReference {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROVIDER_CONFIG.to_string(),
        }
    }
}

/// Reference to a Secret by name and namespace
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Name of the Secret
    pub name: String,

    /// Namespace of the Secret (defaults to the namespace of the managed resource)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Selects a single key of a Secret
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Name of the Secret
    pub name: String,

    /// Namespace of the Secret
    pub namespace: String,

    /// Key within the Secret's data
    pub key: String,
}

impl std::fmt::Display for SecretKeySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}[{}]", self.namespace, self.name, self.key)
    }
}
