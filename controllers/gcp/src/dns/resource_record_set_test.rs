//! Unit tests for the ResourceRecordSet external client

#[cfg(test)]
mod tests {
    use crate::dns::resource_record_set::{fqdn, generate, is_up_to_date, late_initialize};
    use crate::test_utils::{record_set_harness, resource_record_set, RecordSetHarness};
    use crds::{ConditionReason, ConditionStatus, ConditionType, ResourceRecordSetParameters};
    use gcp_client::{self as gcp, GcpClientTrait};
    use kube_runtime::controller::Action;
    use std::time::Duration;

    const ZONE: &str = "example-zone";

    fn params(rrdatas: &[&str]) -> ResourceRecordSetParameters {
        ResourceRecordSetParameters {
            managed_zone: ZONE.to_string(),
            record_type: "A".to_string(),
            ttl: None,
            rrdatas: rrdatas.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn harness() -> RecordSetHarness {
        let h = record_set_harness(resource_record_set("www.example.com", ZONE, "A", &["192.0.2.10"]));
        h.gcp.add_managed_zone(gcp::ManagedZone {
            name: Some(ZONE.to_string()),
            dns_name: Some("example.com.".to_string()),
            ..Default::default()
        });
        h
    }

    #[test]
    fn test_fqdn() {
        assert_eq!(fqdn("www.example.com"), "www.example.com.");
        assert_eq!(fqdn("www.example.com."), "www.example.com.");
    }

    #[test]
    fn test_generate_uses_fully_qualified_name() {
        let rrset = generate("www.example.com", &params(&["192.0.2.10"]));
        assert_eq!(rrset.name.as_deref(), Some("www.example.com."));
        assert_eq!(rrset.record_type.as_deref(), Some("A"));
        assert_eq!(rrset.ttl, None);
    }

    #[test]
    fn test_rrdata_order_is_drift() {
        let observed = generate("www.example.com", &params(&["192.0.2.10", "192.0.2.11"]));
        assert!(is_up_to_date("www.example.com", &params(&["192.0.2.10", "192.0.2.11"]), &observed).unwrap());
        assert!(!is_up_to_date("www.example.com", &params(&["192.0.2.11", "192.0.2.10"]), &observed).unwrap());
    }

    #[test]
    fn test_late_initialize_ttl() {
        let mut observed = generate("www.example.com", &params(&["192.0.2.10"]));
        observed.ttl = Some(300);

        let mut desired = params(&["192.0.2.10"]);
        assert!(late_initialize(&mut desired, &observed));
        assert_eq!(desired.ttl, Some(300));

        let mut explicit = params(&["192.0.2.10"]);
        explicit.ttl = Some(60);
        assert!(!late_initialize(&mut explicit, &observed));
        assert_eq!(explicit.ttl, Some(60));
    }

    #[tokio::test]
    async fn test_record_set_is_created_and_ttl_late_initialized() {
        let h = harness();

        assert_eq!(h.reconcile().await, Action::requeue(Duration::from_secs(30)));
        let created = h
            .gcp
            .resource_record_set(ZONE, "www.example.com.", "A")
            .expect("record set created");
        assert_eq!(created.rrdatas, Some(vec!["192.0.2.10".to_string()]));

        assert_eq!(h.reconcile().await, Action::requeue(Duration::from_secs(60)));
        assert_eq!(h.stored().spec.for_provider.ttl, Some(300));
        assert_eq!(
            h.condition(ConditionType::Ready),
            Some((ConditionStatus::True, ConditionReason::Available))
        );
        assert_eq!(h.gcp.calls("create_resource_record_set"), 1);
    }

    #[tokio::test]
    async fn test_rrdata_change_is_patched() {
        let h = harness();
        h.reconcile().await;
        h.reconcile().await;

        h.store.modify(&h.key, |rrset| {
            rrset.spec.for_provider.rrdatas = vec!["192.0.2.20".to_string()];
        });
        assert_eq!(h.reconcile().await, Action::requeue(Duration::from_secs(30)));
        assert_eq!(
            h.gcp.resource_record_set(ZONE, "www.example.com.", "A").unwrap().rrdatas,
            Some(vec!["192.0.2.20".to_string()])
        );
        assert_eq!(h.reconcile().await, Action::requeue(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_missing_zone_fails_create() {
        let h = record_set_harness(resource_record_set("www.example.com", "no-such-zone", "A", &["192.0.2.10"]));

        assert_eq!(h.reconcile().await, Action::requeue(Duration::from_secs(30)));
        assert_eq!(
            h.condition(ConditionType::Synced),
            Some((ConditionStatus::False, ConditionReason::ReconcileError))
        );
    }

    #[tokio::test]
    async fn test_delete_then_zone_can_be_deleted() {
        let h = harness();
        h.reconcile().await;

        h.delete();
        assert_eq!(h.reconcile().await, Action::await_change());
        assert!(h.gcp.resource_record_set(ZONE, "www.example.com.", "A").is_none());
        assert!(h.store.object(&h.key).is_none());
        h.gcp.delete_managed_zone(ZONE).await.unwrap();
    }
}
