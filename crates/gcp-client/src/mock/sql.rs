//! Cloud SQL operations for MockGcpClient

use super::{already_exists, invalid, merge, MockGcpClient};
use crate::error::GcpError;
use crate::models::*;

fn operation(client: &MockGcpClient, operation_type: &str, target: &str) -> Operation {
    Operation {
        name: Some(format!("op-{}", client.next_id())),
        status: Some("PENDING".to_string()),
        operation_type: Some(operation_type.to_string()),
        target_id: Some(target.to_string()),
    }
}

pub fn get_database_instance(client: &MockGcpClient, name: &str) -> Result<DatabaseInstance, GcpError> {
    client.database_instance(name)
        .ok_or_else(|| GcpError::NotFound(format!("The Cloud SQL instance '{}' does not exist.", name)))
}

pub fn insert_database_instance(client: &MockGcpClient, instance: &DatabaseInstance) -> Result<Operation, GcpError> {
    let name = instance.name.clone().ok_or_else(|| invalid("instance.name is required"))?;
    let region = instance.region.clone().ok_or_else(|| invalid("instance.region is required"))?;
    if instance.settings.as_ref().and_then(|s| s.tier.as_ref()).is_none() {
        return Err(invalid("instance.settings.tier is required"));
    }

    let mut instances = client.instances.lock().unwrap();
    if instances.contains_key(&name) {
        return Err(already_exists(&name));
    }

    let id = client.next_id();
    let mut created = instance.clone();
    created.project = Some(client.project_id.clone());
    created.database_version.get_or_insert_with(|| "POSTGRES_15".to_string());
    created.state = Some(client.initial_instance_state.lock().unwrap().clone());
    created.connection_name = Some(format!("{}:{}:{}", client.project_id, region, name));
    created.gce_zone = Some(format!("{}-a", region));
    created.self_link = Some(format!(
        "https://sqladmin.googleapis.com/sql/v1beta4/projects/{}/instances/{}",
        client.project_id, name
    ));
    created.service_account_email_address = Some(format!("p{}-mock@gcp-sa-cloud-sql.iam.gserviceaccount.com", id));
    created.server_ca_cert = Some(SslCert {
        cert: Some(format!("-----BEGIN CERTIFICATE-----\nmock-{}\n-----END CERTIFICATE-----", name)),
        common_name: Some(format!("C=US,O=Google\\, Inc,CN=Google Cloud SQL Server CA,dnQualifier={}", id)),
        expiration_time: Some("2034-01-01T00:00:00Z".to_string()),
    });

    let settings = created.settings.get_or_insert_with(InstanceSettings::default);
    settings.activation_policy.get_or_insert_with(|| "ALWAYS".to_string());
    settings.availability_type.get_or_insert_with(|| "ZONAL".to_string());
    settings.data_disk_size_gb.get_or_insert_with(|| "10".to_string());
    settings.data_disk_type.get_or_insert_with(|| "PD_SSD".to_string());
    settings.storage_auto_resize.get_or_insert(true);
    settings.settings_version = Some("1".to_string());
    let ip_config = settings.ip_configuration.get_or_insert_with(IpConfiguration::default);
    let public = *ip_config.ipv4_enabled.get_or_insert(true);
    let private = ip_config.private_network.is_some();

    let mut addresses = Vec::new();
    if public {
        addresses.push(IpMapping {
            ip_address: Some(format!("34.0.{}.{}", id / 256, id % 256)),
            address_type: Some("PRIMARY".to_string()),
        });
    }
    if private {
        addresses.push(IpMapping {
            ip_address: Some(format!("10.0.{}.{}", id / 256, id % 256)),
            address_type: Some("PRIVATE".to_string()),
        });
    }
    created.ip_addresses = Some(addresses);

    // Write-only
    if let Some(password) = created.root_password.take() {
        client.root_passwords.lock().unwrap().insert(name.clone(), password);
    }

    instances.insert(name.clone(), created);
    Ok(operation(client, "CREATE", &name))
}

pub fn patch_database_instance(client: &MockGcpClient, name: &str, patch: &DatabaseInstance) -> Result<Operation, GcpError> {
    {
        let mut instances = client.instances.lock().unwrap();
        let instance = instances
            .get_mut(name)
            .ok_or_else(|| GcpError::NotFound(format!("The Cloud SQL instance '{}' does not exist.", name)))?;

        if patch.region.is_some() && patch.region != instance.region {
            return Err(invalid("instance.region cannot be changed"));
        }

        if let Some(update) = &patch.settings {
            let settings = instance.settings.get_or_insert_with(InstanceSettings::default);
            if update.settings_version.is_some() && update.settings_version != settings.settings_version {
                return Err(GcpError::Api {
                    code: 412,
                    status: "FAILED_PRECONDITION".to_string(),
                    message: "staleData: the settings version does not match".to_string(),
                });
            }

            merge(&mut settings.tier, &update.tier);
            merge(&mut settings.activation_policy, &update.activation_policy);
            merge(&mut settings.availability_type, &update.availability_type);
            merge(&mut settings.data_disk_size_gb, &update.data_disk_size_gb);
            merge(&mut settings.data_disk_type, &update.data_disk_type);
            merge(&mut settings.storage_auto_resize, &update.storage_auto_resize);
            merge(&mut settings.user_labels, &update.user_labels);
            merge(&mut settings.backup_configuration, &update.backup_configuration);
            merge(&mut settings.ip_configuration, &update.ip_configuration);

            let version = settings
                .settings_version
                .as_deref()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            settings.settings_version = Some((version + 1).to_string());
        }
    }

    Ok(operation(client, "UPDATE", name))
}

pub fn delete_database_instance(client: &MockGcpClient, name: &str) -> Result<Operation, GcpError> {
    client.instances
        .lock()
        .unwrap()
        .remove(name)
        .ok_or_else(|| GcpError::NotFound(format!("The Cloud SQL instance '{}' does not exist.", name)))?;
    Ok(operation(client, "DELETE", name))
}
