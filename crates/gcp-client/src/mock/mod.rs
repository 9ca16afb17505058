//! Mock GcpClient for unit testing
//!
//! This module provides a mock implementation of GcpClientTrait that can be used
//! in unit tests without reaching Google Cloud.
//!
//! The mock behaves like the real APIs where controllers care: it fills in
//! server-side defaults, rejects duplicate names with 409, returns 404 for
//! missing resources and bumps the Cloud SQL settings version on update.
//! Failures can be injected per operation and every call is counted.
//!
//! The mock is organized into domain-specific modules:
//! - `dns.rs` - Cloud DNS managed zones and record sets
//! - `sql.rs` - Cloud SQL instances

mod dns;
mod sql;

use crate::error::GcpError;
use crate::gcp_trait::GcpClientTrait;
use crate::models::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Key of a record set: (zone, name, type)
pub(crate) type RecordKey = (String, String, String);

#[derive(Debug, Clone)]
struct Failure {
    code: u16,
    status: String,
}

/// Mock GcpClient for testing
///
/// Clones share state, so a test can keep a handle while the code under test
/// owns another.
#[derive(Debug, Clone)]
pub struct MockGcpClient {
    pub(crate) project_id: String,
    // In-memory storage for resources
    pub(crate) zones: Arc<Mutex<HashMap<String, ManagedZone>>>,
    pub(crate) record_sets: Arc<Mutex<HashMap<RecordKey, ResourceRecordSet>>>,
    pub(crate) instances: Arc<Mutex<HashMap<String, DatabaseInstance>>>,
    pub(crate) root_passwords: Arc<Mutex<HashMap<String, String>>>,
    pub(crate) initial_instance_state: Arc<Mutex<String>>,
    // Injected failures, consumed in order
    failures: Arc<Mutex<HashMap<&'static str, VecDeque<Failure>>>>,
    calls: Arc<Mutex<HashMap<&'static str, usize>>>,
    // Counter for generating IDs
    pub(crate) next_id: Arc<Mutex<u64>>,
}

impl MockGcpClient {
    /// Create a new mock client for a project
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            zones: Arc::new(Mutex::new(HashMap::new())),
            record_sets: Arc::new(Mutex::new(HashMap::new())),
            instances: Arc::new(Mutex::new(HashMap::new())),
            root_passwords: Arc::new(Mutex::new(HashMap::new())),
            initial_instance_state: Arc::new(Mutex::new("PENDING_CREATE".to_string())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Add a managed zone to the mock store as-is (for test setup)
    pub fn add_managed_zone(&self, zone: ManagedZone) {
        let name = zone.name.clone().unwrap_or_default();
        self.zones.lock().unwrap().insert(name, zone);
    }

    /// Add a record set to the mock store as-is (for test setup)
    pub fn add_resource_record_set(&self, zone: &str, rrset: ResourceRecordSet) {
        let key = (
            zone.to_string(),
            rrset.name.clone().unwrap_or_default(),
            rrset.record_type.clone().unwrap_or_default(),
        );
        self.record_sets.lock().unwrap().insert(key, rrset);
    }

    /// Add a database instance to the mock store as-is (for test setup)
    pub fn add_database_instance(&self, instance: DatabaseInstance) {
        let name = instance.name.clone().unwrap_or_default();
        self.instances.lock().unwrap().insert(name, instance);
    }

    /// Current server-side managed zone
    pub fn managed_zone(&self, name: &str) -> Option<ManagedZone> {
        self.zones.lock().unwrap().get(name).cloned()
    }

    /// Current server-side record set
    pub fn resource_record_set(&self, zone: &str, name: &str, record_type: &str) -> Option<ResourceRecordSet> {
        let key = (zone.to_string(), name.to_string(), record_type.to_string());
        self.record_sets.lock().unwrap().get(&key).cloned()
    }

    /// Current server-side database instance
    pub fn database_instance(&self, name: &str) -> Option<DatabaseInstance> {
        self.instances.lock().unwrap().get(name).cloned()
    }

    /// Root password the instance was inserted with
    pub fn root_password(&self, name: &str) -> Option<String> {
        self.root_passwords.lock().unwrap().get(name).cloned()
    }

    /// State assigned to newly inserted instances (default "PENDING_CREATE")
    pub fn set_initial_instance_state(&self, state: &str) {
        *self.initial_instance_state.lock().unwrap() = state.to_string();
    }

    /// Change the state of an existing instance, e.g. to "RUNNABLE"
    pub fn set_instance_state(&self, name: &str, state: &str) {
        if let Some(instance) = self.instances.lock().unwrap().get_mut(name) {
            instance.state = Some(state.to_string());
        }
    }

    /// Make the next call of `operation` fail with the given HTTP code and status
    pub fn fail_next(&self, operation: &'static str, code: u16, status: &str) {
        self.failures
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(Failure {
                code,
                status: status.to_string(),
            });
    }

    /// Number of times `operation` was called
    pub fn calls(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().get(operation).copied().unwrap_or(0)
    }

    /// Number of mutating calls (create/insert, patch, delete) across all kinds
    pub fn mutating_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, _)| !op.starts_with("get_"))
            .map(|(_, n)| n)
            .sum()
    }

    /// Record a call and return an injected failure, if any
    fn enter(&self, operation: &'static str) -> Result<(), GcpError> {
        *self.calls.lock().unwrap().entry(operation).or_insert(0) += 1;
        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(operation)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(f) if f.code == 404 => Err(GcpError::NotFound(format!("injected failure for {}", operation))),
            Some(f) => Err(GcpError::Api {
                code: f.code,
                status: f.status,
                message: format!("injected failure for {}", operation),
            }),
            None => Ok(()),
        }
    }

    /// Generate next ID
    pub(crate) fn next_id(&self) -> u64 {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        current
    }
}

pub(crate) fn already_exists(what: &str) -> GcpError {
    GcpError::Api {
        code: 409,
        status: "ALREADY_EXISTS".to_string(),
        message: format!("The resource '{}' already exists", what),
    }
}

pub(crate) fn invalid(message: impl Into<String>) -> GcpError {
    GcpError::Api {
        code: 400,
        status: "INVALID_ARGUMENT".to_string(),
        message: message.into(),
    }
}

/// Overwrite `target` when the patch carries a value
pub(crate) fn merge<T: Clone>(target: &mut Option<T>, patch: &Option<T>) {
    if patch.is_some() {
        target.clone_from(patch);
    }
}

#[async_trait::async_trait]
impl GcpClientTrait for MockGcpClient {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    // Cloud DNS - delegated to dns module
    async fn get_managed_zone(&self, name: &str) -> Result<ManagedZone, GcpError> {
        self.enter("get_managed_zone")?;
        dns::get_managed_zone(self, name)
    }

    async fn create_managed_zone(&self, zone: &ManagedZone) -> Result<ManagedZone, GcpError> {
        self.enter("create_managed_zone")?;
        dns::create_managed_zone(self, zone)
    }

    async fn patch_managed_zone(&self, name: &str, zone: &ManagedZone) -> Result<(), GcpError> {
        self.enter("patch_managed_zone")?;
        dns::patch_managed_zone(self, name, zone)
    }

    async fn delete_managed_zone(&self, name: &str) -> Result<(), GcpError> {
        self.enter("delete_managed_zone")?;
        dns::delete_managed_zone(self, name)
    }

    async fn get_resource_record_set(&self, zone: &str, name: &str, record_type: &str) -> Result<ResourceRecordSet, GcpError> {
        self.enter("get_resource_record_set")?;
        dns::get_resource_record_set(self, zone, name, record_type)
    }

    async fn create_resource_record_set(&self, zone: &str, rrset: &ResourceRecordSet) -> Result<ResourceRecordSet, GcpError> {
        self.enter("create_resource_record_set")?;
        dns::create_resource_record_set(self, zone, rrset)
    }

    async fn patch_resource_record_set(&self, zone: &str, name: &str, record_type: &str, rrset: &ResourceRecordSet) -> Result<ResourceRecordSet, GcpError> {
        self.enter("patch_resource_record_set")?;
        dns::patch_resource_record_set(self, zone, name, record_type, rrset)
    }

    async fn delete_resource_record_set(&self, zone: &str, name: &str, record_type: &str) -> Result<(), GcpError> {
        self.enter("delete_resource_record_set")?;
        dns::delete_resource_record_set(self, zone, name, record_type)
    }

    // Cloud SQL - delegated to sql module
    async fn get_database_instance(&self, name: &str) -> Result<DatabaseInstance, GcpError> {
        self.enter("get_database_instance")?;
        sql::get_database_instance(self, name)
    }

    async fn insert_database_instance(&self, instance: &DatabaseInstance) -> Result<Operation, GcpError> {
        self.enter("insert_database_instance")?;
        sql::insert_database_instance(self, instance)
    }

    async fn patch_database_instance(&self, name: &str, instance: &DatabaseInstance) -> Result<Operation, GcpError> {
        self.enter("patch_database_instance")?;
        sql::patch_database_instance(self, name, instance)
    }

    async fn delete_database_instance(&self, name: &str) -> Result<Operation, GcpError> {
        self.enter("delete_database_instance")?;
        sql::delete_database_instance(self, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(name: &str) -> ManagedZone {
        ManagedZone {
            name: Some(name.to_string()),
            dns_name: Some("example.com.".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_zone_fills_server_defaults() {
        let client = MockGcpClient::new("proj");
        let created = client.create_managed_zone(&zone("z")).await.unwrap();
        assert!(created.id.is_some());
        assert_eq!(created.visibility.as_deref(), Some("public"));
        assert_eq!(created.name_servers.as_ref().map(Vec::len), Some(4));
    }

    #[tokio::test]
    async fn test_duplicate_zone_is_already_exists() {
        let client = MockGcpClient::new("proj");
        client.create_managed_zone(&zone("z")).await.unwrap();
        let err = client.create_managed_zone(&zone("z")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed_once() {
        let client = MockGcpClient::new("proj");
        client.fail_next("get_managed_zone", 503, "UNAVAILABLE");

        let err = client.get_managed_zone("z").await.unwrap_err();
        assert!(err.is_transient());
        let err = client.get_managed_zone("z").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(client.calls("get_managed_zone"), 2);
        assert_eq!(client.mutating_calls(), 0);
    }

    #[tokio::test]
    async fn test_zone_with_records_cannot_be_deleted() {
        let client = MockGcpClient::new("proj");
        client.create_managed_zone(&zone("z")).await.unwrap();
        let rrset = ResourceRecordSet {
            name: Some("www.example.com.".to_string()),
            record_type: Some("A".to_string()),
            rrdatas: Some(vec!["1.2.3.4".to_string()]),
            ..Default::default()
        };
        let created = client.create_resource_record_set("z", &rrset).await.unwrap();
        assert_eq!(created.ttl, Some(300));

        assert!(client.delete_managed_zone("z").await.is_err());
        client.delete_resource_record_set("z", "www.example.com.", "A").await.unwrap();
        client.delete_managed_zone("z").await.unwrap();
        assert!(client.managed_zone("z").is_none());
    }

    #[tokio::test]
    async fn test_instance_insert_and_patch() {
        let client = MockGcpClient::new("proj");
        let instance = DatabaseInstance {
            name: Some("db".to_string()),
            region: Some("us-central1".to_string()),
            root_password: Some("secret".to_string()),
            settings: Some(InstanceSettings {
                tier: Some("db-f1-micro".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        client.insert_database_instance(&instance).await.unwrap();

        let stored = client.database_instance("db").unwrap();
        assert_eq!(stored.state.as_deref(), Some("PENDING_CREATE"));
        assert_eq!(stored.connection_name.as_deref(), Some("proj:us-central1:db"));
        assert!(stored.root_password.is_none());
        assert_eq!(client.root_password("db").as_deref(), Some("secret"));

        let patch = DatabaseInstance {
            settings: Some(InstanceSettings {
                tier: Some("db-custom-1-3840".to_string()),
                settings_version: Some("1".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        client.patch_database_instance("db", &patch).await.unwrap();
        let settings = client.database_instance("db").unwrap().settings.unwrap();
        assert_eq!(settings.tier.as_deref(), Some("db-custom-1-3840"));
        assert_eq!(settings.settings_version.as_deref(), Some("2"));

        // Stale settings version
        let err = client.patch_database_instance("db", &patch).await.unwrap_err();
        assert_eq!(err.status_code(), Some(412));
    }
}
