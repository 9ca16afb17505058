//! ManagedZone external client
//!
//! Maps `spec.forProvider` of a ManagedZone onto the Cloud DNS
//! `managedZones` resource. The external name is the zone name.

use crate::error::external_error;
use crds::{
    ManagedZone, ManagedZoneObservation, ManagedZoneParameters, PrivateVisibilityConfig,
    PrivateVisibilityNetwork,
};
use gcp_client::{self as gcp, GcpClientTrait};
use managed::drift::{late_init, overlay_is_up_to_date};
use managed::resource::external_name;
use managed::{
    DefaultLabels, ErrorKind, ExternalClient, ExternalCreation, ExternalError, ExternalObservation,
    ExternalUpdate, ResourceState, Stage,
};
use std::sync::Arc;
use tracing::debug;

/// Write the desired parameters onto a zone payload.
///
/// Unset optional parameters leave the payload untouched, so the same
/// function builds create requests and overlays observed zones.
pub fn generate_into(name: &str, params: &ManagedZoneParameters, zone: &mut gcp::ManagedZone) {
    zone.name = Some(name.to_string());
    zone.dns_name = Some(params.dns_name.clone());
    if let Some(description) = &params.description {
        zone.description = Some(description.clone());
    }
    if let Some(labels) = &params.labels {
        zone.labels = Some(labels.clone());
    }
    if let Some(visibility) = &params.visibility {
        zone.visibility = Some(visibility.clone());
    }
    if let Some(config) = &params.private_visibility_config {
        zone.private_visibility_config = Some(gcp::PrivateVisibilityConfig {
            networks: Some(
                config
                    .networks
                    .iter()
                    .map(|n| gcp::PrivateVisibilityNetwork {
                        network_url: Some(n.network_url.clone()),
                    })
                    .collect(),
            ),
        });
    }
}

/// Create request for a zone
pub fn generate(name: &str, params: &ManagedZoneParameters) -> gcp::ManagedZone {
    let mut zone = gcp::ManagedZone::default();
    generate_into(name, params, &mut zone);
    zone
}

/// Fill unset parameters from the observed zone
pub fn late_initialize(params: &mut ManagedZoneParameters, observed: &gcp::ManagedZone) -> bool {
    let observed_config = observed.private_visibility_config.as_ref().map(|c| PrivateVisibilityConfig {
        networks: c
            .networks
            .iter()
            .flatten()
            .filter_map(|n| n.network_url.clone())
            .map(|network_url| PrivateVisibilityNetwork { network_url })
            .collect(),
    });

    let mut changed = late_init(&mut params.description, observed.description.as_ref());
    changed |= late_init(&mut params.labels, observed.labels.as_ref());
    changed |= late_init(&mut params.visibility, observed.visibility.as_ref());
    changed |= late_init(&mut params.private_visibility_config, observed_config.as_ref());
    changed
}

/// Whether the observed zone matches the desired parameters
pub fn is_up_to_date(
    name: &str,
    params: &ManagedZoneParameters,
    observed: &gcp::ManagedZone,
) -> Result<bool, serde_json::Error> {
    overlay_is_up_to_date(observed, |zone| generate_into(name, params, zone))
}

/// Output-only fields of the zone
pub fn observation(zone: &gcp::ManagedZone) -> ManagedZoneObservation {
    ManagedZoneObservation {
        id: zone.id.clone(),
        name_servers: zone.name_servers.clone().unwrap_or_default(),
        creation_time: zone.creation_time.clone(),
    }
}

fn require_name(obj: &ManagedZone, stage: Stage) -> Result<String, ExternalError> {
    external_name(obj)
        .map(str::to_string)
        .ok_or_else(|| ExternalError::new(stage, ErrorKind::Invalid, "external name is not set"))
}

/// [`ExternalClient`] for ManagedZones
pub struct ManagedZoneExternal {
    gcp: Arc<dyn GcpClientTrait>,
    labels: DefaultLabels,
}

impl std::fmt::Debug for ManagedZoneExternal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedZoneExternal")
            .field("project", &self.gcp.project_id())
            .field("labels", &self.labels)
            .finish()
    }
}

impl ManagedZoneExternal {
    pub fn new(gcp: Arc<dyn GcpClientTrait>, labels: DefaultLabels) -> Self {
        Self { gcp, labels }
    }
}

#[async_trait::async_trait]
impl ExternalClient<ManagedZone> for ManagedZoneExternal {
    async fn observe(&self, obj: &mut ManagedZone) -> Result<ExternalObservation, ExternalError> {
        let Some(name) = external_name(obj).map(str::to_string) else {
            return Ok(ExternalObservation::not_found());
        };

        let zone = match self.gcp.get_managed_zone(&name).await {
            Ok(zone) => zone,
            Err(e) if e.is_not_found() => {
                debug!("Managed zone {} does not exist", name);
                return Ok(ExternalObservation::not_found());
            }
            Err(e) => return Err(external_error(Stage::Observe, e)),
        };

        let mut late_initialized = late_initialize(&mut obj.spec.for_provider, &zone);
        late_initialized |= self.labels.apply(&mut obj.spec.for_provider.labels);
        obj.status.get_or_insert_with(Default::default).at_provider = Some(observation(&zone));
        let up_to_date = is_up_to_date(&name, &obj.spec.for_provider, &zone)
            .map_err(|e| ExternalError::new(Stage::Observe, ErrorKind::Invalid, e))?;

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: up_to_date,
            resource_late_initialized: late_initialized,
            resource_state: ResourceState::Available,
            connection_details: Default::default(),
        })
    }

    async fn create(&self, obj: &mut ManagedZone) -> Result<ExternalCreation, ExternalError> {
        let name = require_name(obj, Stage::Create)?;
        self.labels.apply(&mut obj.spec.for_provider.labels);
        let created = self
            .gcp
            .create_managed_zone(&generate(&name, &obj.spec.for_provider))
            .await
            .map_err(|e| external_error(Stage::Create, e))?;
        obj.status.get_or_insert_with(Default::default).at_provider = Some(observation(&created));
        Ok(ExternalCreation::default())
    }

    async fn update(&self, obj: &ManagedZone) -> Result<ExternalUpdate, ExternalError> {
        let name = require_name(obj, Stage::Update)?;
        self.gcp
            .patch_managed_zone(&name, &generate(&name, &obj.spec.for_provider))
            .await
            .map_err(|e| external_error(Stage::Update, e))?;
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, obj: &ManagedZone) -> Result<(), ExternalError> {
        let name = require_name(obj, Stage::Delete)?;
        self.gcp
            .delete_managed_zone(&name)
            .await
            .map_err(|e| external_error(Stage::Delete, e))
    }
}
