//! Errors of the managed reconciler
//!
//! Provider failures are classified into an [`ErrorKind`] at the client
//! boundary, so the control loop branches on the kind and never on message
//! text.

use std::error::Error as StdError;
use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of an external failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource does not exist
    NotFound,
    /// The resource (or its name) already exists
    AlreadyExists,
    /// Concurrent modification
    Conflict,
    /// May succeed if retried
    Transient,
    /// Credentials or permissions are wrong
    Configuration,
    /// The request was rejected as invalid
    Invalid,
}

/// Step of the cycle an external failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Observe,
    Create,
    Update,
    Delete,
}

impl Stage {
    /// Static message used as the error text for the stage
    pub fn message(self) -> &'static str {
        match self {
            Stage::Observe => "cannot observe external resource",
            Stage::Create => "cannot create external resource",
            Stage::Update => "cannot update external resource",
            Stage::Delete => "cannot delete external resource",
        }
    }

    /// Lowercase label for metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Observe => "observe",
            Stage::Create => "create",
            Stage::Update => "update",
            Stage::Delete => "delete",
        }
    }
}

/// Failure of an external client operation
#[derive(Debug, Error)]
#[error("{}", stage.message())]
pub struct ExternalError {
    pub stage: Stage,
    pub kind: ErrorKind,
    #[source]
    pub source: BoxError,
}

impl ExternalError {
    pub fn new(stage: Stage, kind: ErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            stage,
            kind,
            source: source.into(),
        }
    }

    /// Stage message followed by the underlying error, for condition messages
    pub fn detail(&self) -> String {
        format!("{}: {}", self, self.source)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind == ErrorKind::AlreadyExists
    }
}

/// Failure to build an external client
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("cannot connect to provider: ProviderConfig {0} not found")]
    ProviderConfigNotFound(String),

    #[error("cannot connect to provider: credentials secret {0} not found")]
    CredentialsNotFound(String),

    #[error("cannot connect to provider: key {key} missing from credentials secret {secret}")]
    CredentialsKeyMissing { secret: String, key: String },

    #[error("cannot connect to provider: {0}")]
    InvalidConfig(String),

    #[error("cannot connect to provider: cannot create client")]
    Client(#[source] BoxError),

    #[error("cannot connect to provider: lookup failed")]
    Lookup(#[source] BoxError),
}

impl ConnectError {
    /// Will not resolve without a change to the cluster configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ConnectError::ProviderConfigNotFound(_)
                | ConnectError::CredentialsNotFound(_)
                | ConnectError::CredentialsKeyMissing { .. }
                | ConnectError::InvalidConfig(_)
        )
    }

    /// Error text including the underlying cause, for condition messages
    pub fn detail(&self) -> String {
        match self.source() {
            Some(source) => format!("{}: {}", self, source),
            None => self.to_string(),
        }
    }
}

/// Failure reading or writing managed objects
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object {0} not found")]
    NotFound(String),

    #[error("conflict writing {0}: the object has been modified")]
    Conflict(String),

    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure publishing connection details
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("cannot publish connection details: {0}")]
    Kube(#[from] kube::Error),

    #[error("cannot publish connection details: no namespace for secret {0}")]
    MissingNamespace(String),
}

/// Failure of an initializer
#[derive(Debug, Error)]
#[error("cannot initialize managed resource: {0}")]
pub struct InitializerError(pub String);

/// Error returned from a cycle to the runtime, which retries with backoff
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("cannot persist managed resource: {0}")]
    Store(#[from] StoreError),
}
