//! Controller-specific error types.
//!
//! This module defines the errors of the GCP Controller binary and the
//! mapping of GCP API failures onto the reconciler's error taxonomy.

use gcp_client::GcpError;
use kube::Error as KubeError;
use managed::{ErrorKind, ExternalError, ReconcileError, Stage};
use thiserror::Error;

/// Errors that can occur in the GCP Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Reconcile cycle failed to persist its result
    #[error("Reconciliation failed: {0}")]
    Reconciliation(#[from] ReconcileError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Classify a GCP API failure by its HTTP status
pub fn classify(error: &GcpError) -> ErrorKind {
    if error.is_not_found() {
        ErrorKind::NotFound
    } else if error.is_already_exists() {
        ErrorKind::AlreadyExists
    } else if error.status_code() == Some(412) {
        ErrorKind::Conflict
    } else if error.is_transient() {
        ErrorKind::Transient
    } else if error.is_unauthorized() {
        ErrorKind::Configuration
    } else {
        ErrorKind::Invalid
    }
}

/// Wrap a GCP API failure for the reconciler
pub fn external_error(stage: Stage, error: GcpError) -> ExternalError {
    ExternalError::new(stage, classify(&error), error)
}
