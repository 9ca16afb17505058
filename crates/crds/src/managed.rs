//! Common contract of all managed resources
//!
//! Every GCP kind in this crate carries the same envelope around its
//! provider-specific parameters: a ProviderConfig reference, an optional
//! connection Secret reference, a deletion policy and a conditioned status.
//! [`ManagedResource`] exposes that envelope to the generic reconciler.

use crate::condition::{Condition, ConditionedStatus};
use crate::references::{ProviderConfigReference, SecretReference};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of all managed resources
pub const API_GROUP: &str = "gcp.microscaler.io";

/// Annotation holding the provider-side name of the external resource
pub const EXTERNAL_NAME_ANNOTATION: &str = "gcp.microscaler.io/external-name";

/// Finalizer guarding external cleanup
pub const MANAGED_FINALIZER: &str = "finalizer.managedresource.gcp.microscaler.io";

/// What happens to the external resource when the managed resource is deleted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum DeletionPolicy {
    /// Delete the external resource
    #[default]
    Delete,
    /// Leave the external resource in place
    Orphan,
}

/// Accessors the generic reconciler needs on every managed kind
pub trait ManagedResource: kube::Resource<DynamicType = ()> {
    /// Current conditions, if a status has been written
    fn conditions(&self) -> Option<&ConditionedStatus>;

    /// Set a condition, replacing the existing one of the same type
    fn set_condition(&mut self, condition: Condition);

    /// ProviderConfig used to connect to GCP
    fn provider_config_ref(&self) -> &ProviderConfigReference;

    /// Secret that receives connection details
    fn write_connection_secret_to_ref(&self) -> Option<&SecretReference>;

    /// Deletion policy
    fn deletion_policy(&self) -> DeletionPolicy;
}

/// Implements [`ManagedResource`] for a kind whose spec and status follow the
/// common envelope (`providerConfigRef`, `writeConnectionSecretToRef`,
/// `deletionPolicy`, `status.conditions`).
#[macro_export]
macro_rules! managed_resource {
    ($kind:ty, $status:ty) => {
        impl $crate::managed::ManagedResource for $kind {
            fn conditions(&self) -> Option<&$crate::condition::ConditionedStatus> {
                self.status.as_ref().map(|s| &s.conditions)
            }

            fn set_condition(&mut self, condition: $crate::condition::Condition) {
                self.status
                    .get_or_insert_with(<$status>::default)
                    .conditions
                    .set(condition);
            }

            fn provider_config_ref(&self) -> &$crate::references::ProviderConfigReference {
                &self.spec.provider_config_ref
            }

            fn write_connection_secret_to_ref(&self) -> Option<&$crate::references::SecretReference> {
                self.spec.write_connection_secret_to_ref.as_ref()
            }

            fn deletion_policy(&self) -> $crate::managed::DeletionPolicy {
                self.spec.deletion_policy
            }
        }
    };
}
