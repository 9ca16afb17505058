//! Contract between the reconciler and a provider
//!
//! A [`Connector`] resolves credentials for one object and hands back an
//! [`ExternalClient`], which knows how to observe, create, update and delete
//! the external resource behind that object.

use crate::error::{ConnectError, ExternalError};
use std::collections::BTreeMap;

/// Sensitive connection information (endpoints, credentials) keyed by name
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Readiness of an existing external resource as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceState {
    /// Usable
    #[default]
    Available,
    /// Still being provisioned
    Creating,
    /// Exists but not usable
    Unavailable,
}

/// Result of observing the external resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalObservation {
    /// The external resource exists
    pub resource_exists: bool,
    /// The external resource matches the desired state
    pub resource_up_to_date: bool,
    /// Unset desired fields were filled from the observed resource
    pub resource_late_initialized: bool,
    /// Provider-reported readiness
    pub resource_state: ResourceState,
    /// Connection details derivable from the observed resource
    pub connection_details: ConnectionDetails,
}

impl ExternalObservation {
    /// The external resource does not exist
    pub fn not_found() -> Self {
        Self::default()
    }
}

/// Result of creating the external resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalCreation {
    pub connection_details: ConnectionDetails,
}

/// Result of updating the external resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalUpdate {
    pub connection_details: ConnectionDetails,
}

/// Operations on the external resource behind one managed object
///
/// `observe` and `create` take the object mutably: observe records
/// `status.atProvider` and late-initializes unset spec fields, create may
/// assign the external name.
#[async_trait::async_trait]
pub trait ExternalClient<K: Send + Sync>: Send + Sync {
    async fn observe(&self, obj: &mut K) -> Result<ExternalObservation, ExternalError>;
    async fn create(&self, obj: &mut K) -> Result<ExternalCreation, ExternalError>;
    async fn update(&self, obj: &K) -> Result<ExternalUpdate, ExternalError>;
    async fn delete(&self, obj: &K) -> Result<(), ExternalError>;
}

/// Builds an [`ExternalClient`] for an object. Called once per cycle.
#[async_trait::async_trait]
pub trait Connector<K: Send + Sync>: Send + Sync {
    type Client: ExternalClient<K>;

    async fn connect(&self, obj: &K) -> Result<Self::Client, ConnectError>;
}
