//! Cloud DNS operations for MockGcpClient

use super::{already_exists, invalid, merge, MockGcpClient};
use crate::error::GcpError;
use crate::models::*;

pub fn get_managed_zone(client: &MockGcpClient, name: &str) -> Result<ManagedZone, GcpError> {
    client.zones
        .lock()
        .unwrap()
        .get(name)
        .cloned()
        .ok_or_else(|| GcpError::NotFound(format!("The 'parameters.managedZone' resource named '{}' does not exist.", name)))
}

pub fn create_managed_zone(client: &MockGcpClient, zone: &ManagedZone) -> Result<ManagedZone, GcpError> {
    let name = zone.name.clone().ok_or_else(|| invalid("managedZone.name is required"))?;
    let dns_name = zone.dns_name.as_deref().ok_or_else(|| invalid("managedZone.dnsName is required"))?;
    if !dns_name.ends_with('.') {
        return Err(invalid(format!("Invalid value for 'entity.managedZone.dnsName': '{}'", dns_name)));
    }

    let mut zones = client.zones.lock().unwrap();
    if zones.contains_key(&name) {
        return Err(already_exists(&name));
    }

    let id = client.next_id();
    let mut created = zone.clone();
    created.id = Some(id.to_string());
    created.visibility.get_or_insert_with(|| "public".to_string());
    created.name_servers = Some(
        (1..=4)
            .map(|n| format!("ns-cloud-a{}.googledomains.com.", n))
            .collect(),
    );
    created.creation_time = Some(chrono::Utc::now().to_rfc3339());

    zones.insert(name, created.clone());
    Ok(created)
}

pub fn patch_managed_zone(client: &MockGcpClient, name: &str, patch: &ManagedZone) -> Result<(), GcpError> {
    let mut zones = client.zones.lock().unwrap();
    let zone = zones
        .get_mut(name)
        .ok_or_else(|| GcpError::NotFound(format!("managed zone {}", name)))?;

    if patch.dns_name.is_some() && patch.dns_name != zone.dns_name {
        return Err(invalid("managedZone.dnsName cannot be changed"));
    }
    merge(&mut zone.description, &patch.description);
    merge(&mut zone.labels, &patch.labels);
    merge(&mut zone.private_visibility_config, &patch.private_visibility_config);
    Ok(())
}

pub fn delete_managed_zone(client: &MockGcpClient, name: &str) -> Result<(), GcpError> {
    let has_records = client.record_sets
        .lock()
        .unwrap()
        .keys()
        .any(|(zone, _, _)| zone == name);
    if has_records {
        return Err(GcpError::Api {
            code: 400,
            status: "FAILED_PRECONDITION".to_string(),
            message: format!("The resource named '{}' cannot be deleted because it is not empty", name),
        });
    }

    client.zones
        .lock()
        .unwrap()
        .remove(name)
        .map(|_| ())
        .ok_or_else(|| GcpError::NotFound(format!("managed zone {}", name)))
}

pub fn get_resource_record_set(client: &MockGcpClient, zone: &str, name: &str, record_type: &str) -> Result<ResourceRecordSet, GcpError> {
    client.resource_record_set(zone, name, record_type)
        .ok_or_else(|| GcpError::NotFound(format!("record set {}/{} in zone {}", name, record_type, zone)))
}

pub fn create_resource_record_set(client: &MockGcpClient, zone: &str, rrset: &ResourceRecordSet) -> Result<ResourceRecordSet, GcpError> {
    if !client.zones.lock().unwrap().contains_key(zone) {
        return Err(GcpError::NotFound(format!("managed zone {}", zone)));
    }
    let name = rrset.name.clone().ok_or_else(|| invalid("rrset.name is required"))?;
    let record_type = rrset.record_type.clone().ok_or_else(|| invalid("rrset.type is required"))?;

    let key = (zone.to_string(), name.clone(), record_type.clone());
    let mut record_sets = client.record_sets.lock().unwrap();
    if record_sets.contains_key(&key) {
        return Err(already_exists(&format!("{}/{}", name, record_type)));
    }

    let mut created = rrset.clone();
    created.ttl.get_or_insert(300);
    record_sets.insert(key, created.clone());
    Ok(created)
}

pub fn patch_resource_record_set(client: &MockGcpClient, zone: &str, name: &str, record_type: &str, patch: &ResourceRecordSet) -> Result<ResourceRecordSet, GcpError> {
    let key = (zone.to_string(), name.to_string(), record_type.to_string());
    let mut record_sets = client.record_sets.lock().unwrap();
    let rrset = record_sets
        .get_mut(&key)
        .ok_or_else(|| GcpError::NotFound(format!("record set {}/{} in zone {}", name, record_type, zone)))?;

    merge(&mut rrset.ttl, &patch.ttl);
    merge(&mut rrset.rrdatas, &patch.rrdatas);
    Ok(rrset.clone())
}

pub fn delete_resource_record_set(client: &MockGcpClient, zone: &str, name: &str, record_type: &str) -> Result<(), GcpError> {
    let key = (zone.to_string(), name.to_string(), record_type.to_string());
    client.record_sets
        .lock()
        .unwrap()
        .remove(&key)
        .map(|_| ())
        .ok_or_else(|| GcpError::NotFound(format!("record set {}/{} in zone {}", name, record_type, zone)))
}
