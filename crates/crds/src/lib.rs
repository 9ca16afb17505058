//! GCP Managed Resource CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the GCP controllers, plus the
//! common envelope ([`ManagedResource`]) shared by every managed kind.

pub mod condition;
pub mod database;
pub mod dns;
pub mod managed;
pub mod provider_config;
pub mod references;

pub use condition::*;
pub use database::*;
pub use dns::*;
pub use managed::*;
pub use provider_config::*;
pub use references::*;
