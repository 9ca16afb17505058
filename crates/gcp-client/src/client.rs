//! GCP API client
//!
//! Implements the Cloud DNS v1 and Cloud SQL Admin v1beta4 REST clients.
//! Paths follow `projects/{project}/managedZones/...` and
//! `projects/{project}/instances/...`.

use crate::common::HttpClient;
use crate::error::GcpError;
use crate::gcp_trait::GcpClientTrait;
use crate::models::*;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use urlencoding::encode;

/// Default Cloud DNS endpoint
pub const DEFAULT_DNS_ENDPOINT: &str = "https://dns.googleapis.com/dns/v1";

/// Default Cloud SQL Admin endpoint
pub const DEFAULT_SQLADMIN_ENDPOINT: &str = "https://sqladmin.googleapis.com/sql/v1beta4";

/// Default GCE metadata token endpoint
pub const DEFAULT_METADATA_TOKEN_ENDPOINT: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// API base URLs, overridable for emulators and mock servers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpEndpoints {
    pub dns: String,
    pub sqladmin: String,
    pub metadata_token: String,
}

impl Default for GcpEndpoints {
    fn default() -> Self {
        Self {
            dns: DEFAULT_DNS_ENDPOINT.to_string(),
            sqladmin: DEFAULT_SQLADMIN_ENDPOINT.to_string(),
            metadata_token: DEFAULT_METADATA_TOKEN_ENDPOINT.to_string(),
        }
    }
}

/// GCP API client
#[derive(Debug, Clone)]
pub struct GcpClient {
    project_id: String,
    dns: HttpClient,
    sql: HttpClient,
}

impl GcpClient {
    /// Create a new GCP client
    ///
    /// # Arguments
    /// * `project_id` - Project owning the managed resources
    /// * `token` - OAuth2 access token
    /// * `endpoints` - API base URLs
    pub fn new(project_id: String, token: String, endpoints: GcpEndpoints) -> Result<Self, GcpError> {
        let client = http_client()?;
        Ok(Self::with_http_client(client, project_id, token, &endpoints))
    }

    /// Create a client authenticated as the pod's identity (GKE Workload Identity)
    pub async fn from_metadata_server(project_id: String, endpoints: GcpEndpoints) -> Result<Self, GcpError> {
        let client = http_client()?;
        let token = crate::auth::metadata_access_token(&client, &endpoints.metadata_token).await?;
        info!("Retrieved access token from metadata server for project {}", project_id);
        Ok(Self::with_http_client(client, project_id, token, &endpoints))
    }

    fn with_http_client(client: Client, project_id: String, token: String, endpoints: &GcpEndpoints) -> Self {
        Self {
            dns: HttpClient::new(client.clone(), endpoints.dns.clone(), token.clone()),
            sql: HttpClient::new(client, endpoints.sqladmin.clone(), token),
            project_id,
        }
    }

    fn zone_path(&self, zone: &str) -> String {
        format!("projects/{}/managedZones/{}", encode(&self.project_id), encode(zone))
    }

    fn rrset_path(&self, zone: &str, name: &str, record_type: &str) -> String {
        format!("{}/rrsets/{}/{}", self.zone_path(zone), encode(name), encode(record_type))
    }

    fn instance_path(&self, name: &str) -> String {
        format!("projects/{}/instances/{}", encode(&self.project_id), encode(name))
    }
}

fn http_client() -> Result<Client, GcpError> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(GcpError::Http)
}

#[async_trait::async_trait]
impl GcpClientTrait for GcpClient {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn get_managed_zone(&self, name: &str) -> Result<ManagedZone, GcpError> {
        self.dns.get(&self.zone_path(name)).await
    }

    async fn create_managed_zone(&self, zone: &ManagedZone) -> Result<ManagedZone, GcpError> {
        debug!("Creating managed zone {:?}", zone.name);
        let path = format!("projects/{}/managedZones", encode(&self.project_id));
        self.dns.post(&path, zone).await
    }

    async fn patch_managed_zone(&self, name: &str, zone: &ManagedZone) -> Result<(), GcpError> {
        debug!("Patching managed zone {}", name);
        // Returns a DNS operation; completion is observed on the next poll
        let _operation: serde_json::Value = self.dns.patch(&self.zone_path(name), zone).await?;
        Ok(())
    }

    async fn delete_managed_zone(&self, name: &str) -> Result<(), GcpError> {
        debug!("Deleting managed zone {}", name);
        let _: serde_json::Value = self.dns.delete(&self.zone_path(name)).await?;
        Ok(())
    }

    async fn get_resource_record_set(&self, zone: &str, name: &str, record_type: &str) -> Result<ResourceRecordSet, GcpError> {
        self.dns.get(&self.rrset_path(zone, name, record_type)).await
    }

    async fn create_resource_record_set(&self, zone: &str, rrset: &ResourceRecordSet) -> Result<ResourceRecordSet, GcpError> {
        debug!("Creating record set {:?}/{:?} in zone {}", rrset.name, rrset.record_type, zone);
        let path = format!("{}/rrsets", self.zone_path(zone));
        self.dns.post(&path, rrset).await
    }

    async fn patch_resource_record_set(&self, zone: &str, name: &str, record_type: &str, rrset: &ResourceRecordSet) -> Result<ResourceRecordSet, GcpError> {
        debug!("Patching record set {}/{} in zone {}", name, record_type, zone);
        self.dns.patch(&self.rrset_path(zone, name, record_type), rrset).await
    }

    async fn delete_resource_record_set(&self, zone: &str, name: &str, record_type: &str) -> Result<(), GcpError> {
        debug!("Deleting record set {}/{} in zone {}", name, record_type, zone);
        let _: serde_json::Value = self.dns.delete(&self.rrset_path(zone, name, record_type)).await?;
        Ok(())
    }

    async fn get_database_instance(&self, name: &str) -> Result<DatabaseInstance, GcpError> {
        self.sql.get(&self.instance_path(name)).await
    }

    async fn insert_database_instance(&self, instance: &DatabaseInstance) -> Result<Operation, GcpError> {
        debug!("Inserting database instance {:?}", instance.name);
        let path = format!("projects/{}/instances", encode(&self.project_id));
        self.sql.post(&path, instance).await
    }

    async fn patch_database_instance(&self, name: &str, instance: &DatabaseInstance) -> Result<Operation, GcpError> {
        debug!("Patching database instance {}", name);
        self.sql.patch(&self.instance_path(name), instance).await
    }

    async fn delete_database_instance(&self, name: &str) -> Result<Operation, GcpError> {
        debug!("Deleting database instance {}", name);
        self.sql.delete(&self.instance_path(name)).await
    }
}
