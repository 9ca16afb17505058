//! Managed Resource Reconciler
//!
//! Generic control loop that drives an external (cloud) resource toward the
//! desired state declared by a Kubernetes managed resource. The loop is
//! independent of the resource kind: each kind plugs in a [`Connector`] that
//! builds an [`ExternalClient`] able to observe, create, update and delete
//! the external resource.
//!
//! A cycle for one object runs, in order: initializers, connect, deletion
//! handling, finalizer, observe, then create / update / no-op, and finally
//! persists metadata, spec and status.

pub mod backoff;
pub mod drift;
pub mod error;
pub mod external;
pub mod initializer;
pub mod metrics;
pub mod publisher;
pub mod reconciler;
#[cfg(test)]
mod reconciler_test;
pub mod resource;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use backoff::{BackoffTracker, FibonacciBackoff};
pub use error::{
    ConnectError, ErrorKind, ExternalError, InitializerError, PublishError, ReconcileError, Stage,
    StoreError,
};
pub use external::{
    ConnectionDetails, Connector, ExternalClient, ExternalCreation, ExternalObservation,
    ExternalUpdate, ResourceState,
};
pub use initializer::{DefaultLabels, Initializer, NameAsExternalName};
pub use publisher::{ConnectionPublisher, KubeSecretStore, SecretPublisher, SecretStore};
pub use reconciler::{ManagedReconciler, ReconcilerConfig};
pub use resource::{Managed, ObjectKey};
pub use store::{KubeStore, ObjectStore};
