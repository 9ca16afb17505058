//! ResourceRecordSet external client
//!
//! A record set is identified by (zone, DNS name, type). The zone and type
//! come from `spec.forProvider`; the external name is the DNS name.
//! Cloud DNS names are fully qualified, so a missing trailing dot is added.

use crate::error::external_error;
use crds::{ResourceRecordSet, ResourceRecordSetParameters};
use gcp_client::{self as gcp, GcpClientTrait};
use managed::drift::{late_init, overlay_is_up_to_date};
use managed::resource::external_name;
use managed::{
    ErrorKind, ExternalClient, ExternalCreation, ExternalError, ExternalObservation,
    ExternalUpdate, ResourceState, Stage,
};
use std::sync::Arc;
use tracing::debug;

/// Fully qualified form of a DNS name
pub fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

/// Write the desired parameters onto a record set payload
pub fn generate_into(name: &str, params: &ResourceRecordSetParameters, rrset: &mut gcp::ResourceRecordSet) {
    rrset.name = Some(fqdn(name));
    rrset.record_type = Some(params.record_type.clone());
    if let Some(ttl) = params.ttl {
        rrset.ttl = Some(ttl);
    }
    rrset.rrdatas = Some(params.rrdatas.clone());
}

pub fn generate(name: &str, params: &ResourceRecordSetParameters) -> gcp::ResourceRecordSet {
    let mut rrset = gcp::ResourceRecordSet::default();
    generate_into(name, params, &mut rrset);
    rrset
}

pub fn late_initialize(params: &mut ResourceRecordSetParameters, observed: &gcp::ResourceRecordSet) -> bool {
    late_init(&mut params.ttl, observed.ttl.as_ref())
}

pub fn is_up_to_date(
    name: &str,
    params: &ResourceRecordSetParameters,
    observed: &gcp::ResourceRecordSet,
) -> Result<bool, serde_json::Error> {
    overlay_is_up_to_date(observed, |rrset| generate_into(name, params, rrset))
}

/// Zone, fully qualified name and type of the record set
fn identity(obj: &ResourceRecordSet, stage: Stage) -> Result<(String, String, String), ExternalError> {
    let name = external_name(obj)
        .ok_or_else(|| ExternalError::new(stage, ErrorKind::Invalid, "external name is not set"))?;
    let params = &obj.spec.for_provider;
    Ok((params.managed_zone.clone(), fqdn(name), params.record_type.clone()))
}

/// [`ExternalClient`] for ResourceRecordSets
pub struct ResourceRecordSetExternal {
    gcp: Arc<dyn GcpClientTrait>,
}

impl std::fmt::Debug for ResourceRecordSetExternal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRecordSetExternal")
            .field("project", &self.gcp.project_id())
            .finish()
    }
}

impl ResourceRecordSetExternal {
    pub fn new(gcp: Arc<dyn GcpClientTrait>) -> Self {
        Self { gcp }
    }
}

#[async_trait::async_trait]
impl ExternalClient<ResourceRecordSet> for ResourceRecordSetExternal {
    async fn observe(&self, obj: &mut ResourceRecordSet) -> Result<ExternalObservation, ExternalError> {
        if external_name(obj).is_none() {
            return Ok(ExternalObservation::not_found());
        }
        let (zone, name, record_type) = identity(obj, Stage::Observe)?;

        let rrset = match self.gcp.get_resource_record_set(&zone, &name, &record_type).await {
            Ok(rrset) => rrset,
            Err(e) if e.is_not_found() => {
                debug!("Record set {} {} in zone {} does not exist", name, record_type, zone);
                return Ok(ExternalObservation::not_found());
            }
            Err(e) => return Err(external_error(Stage::Observe, e)),
        };

        let late_initialized = late_initialize(&mut obj.spec.for_provider, &rrset);
        let up_to_date = is_up_to_date(&name, &obj.spec.for_provider, &rrset)
            .map_err(|e| ExternalError::new(Stage::Observe, ErrorKind::Invalid, e))?;

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: up_to_date,
            resource_late_initialized: late_initialized,
            resource_state: ResourceState::Available,
            connection_details: Default::default(),
        })
    }

    async fn create(&self, obj: &mut ResourceRecordSet) -> Result<ExternalCreation, ExternalError> {
        let (zone, name, _) = identity(obj, Stage::Create)?;
        self.gcp
            .create_resource_record_set(&zone, &generate(&name, &obj.spec.for_provider))
            .await
            .map_err(|e| external_error(Stage::Create, e))?;
        Ok(ExternalCreation::default())
    }

    async fn update(&self, obj: &ResourceRecordSet) -> Result<ExternalUpdate, ExternalError> {
        let (zone, name, record_type) = identity(obj, Stage::Update)?;
        self.gcp
            .patch_resource_record_set(&zone, &name, &record_type, &generate(&name, &obj.spec.for_provider))
            .await
            .map_err(|e| external_error(Stage::Update, e))?;
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, obj: &ResourceRecordSet) -> Result<(), ExternalError> {
        let (zone, name, record_type) = identity(obj, Stage::Delete)?;
        self.gcp
            .delete_resource_record_set(&zone, &name, &record_type)
            .await
            .map_err(|e| external_error(Stage::Delete, e))
    }
}
