//! GcpClient trait for mocking
//!
//! This trait abstracts the GcpClient to enable mocking in unit tests.
//! The concrete GcpClient implements this trait, and tests can use `MockGcpClient`.

use crate::error::GcpError;
use crate::models::*;

/// Trait for GCP API client operations
///
/// A client is bound to one project; resource names are relative to it.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait GcpClientTrait: Send + Sync {
    /// Project the client operates on
    fn project_id(&self) -> &str;

    // Cloud DNS: managed zones
    async fn get_managed_zone(&self, name: &str) -> Result<ManagedZone, GcpError>;
    async fn create_managed_zone(&self, zone: &ManagedZone) -> Result<ManagedZone, GcpError>;
    async fn patch_managed_zone(&self, name: &str, zone: &ManagedZone) -> Result<(), GcpError>;
    async fn delete_managed_zone(&self, name: &str) -> Result<(), GcpError>;

    // Cloud DNS: resource record sets
    async fn get_resource_record_set(&self, zone: &str, name: &str, record_type: &str) -> Result<ResourceRecordSet, GcpError>;
    async fn create_resource_record_set(&self, zone: &str, rrset: &ResourceRecordSet) -> Result<ResourceRecordSet, GcpError>;
    async fn patch_resource_record_set(&self, zone: &str, name: &str, record_type: &str, rrset: &ResourceRecordSet) -> Result<ResourceRecordSet, GcpError>;
    async fn delete_resource_record_set(&self, zone: &str, name: &str, record_type: &str) -> Result<(), GcpError>;

    // Cloud SQL: instances
    async fn get_database_instance(&self, name: &str) -> Result<DatabaseInstance, GcpError>;
    async fn insert_database_instance(&self, instance: &DatabaseInstance) -> Result<Operation, GcpError>;
    async fn patch_database_instance(&self, name: &str, instance: &DatabaseInstance) -> Result<Operation, GcpError>;
    async fn delete_database_instance(&self, name: &str) -> Result<Operation, GcpError>;
}
