//! Unit tests for the managed reconciler

#[cfg(test)]
mod tests {
    use crate::error::{ConnectError, ErrorKind, ExternalError, ReconcileError, Stage, StoreError};
    use crate::external::{
        ConnectionDetails, Connector, ExternalClient, ExternalCreation, ExternalObservation,
        ExternalUpdate, ResourceState,
    };
    use crate::initializer::NameAsExternalName;
    use crate::reconciler::{ManagedReconciler, ReconcilerConfig};
    use crate::resource::{external_name, has_finalizer, ObjectKey};
    use crate::testing::{managed_zone, MemoryPublisher, MemoryStore};
    use crds::{
        ConditionReason, ConditionStatus, ConditionType, DeletionPolicy, ManagedResource,
        ManagedZone, SecretReference, MANAGED_FINALIZER,
    };
    use kube_runtime::controller::Action;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeState {
        exists: bool,
        up_to_date: bool,
        resource_state: ResourceState,
        fill_description: Option<String>,
        observe_error: Option<ErrorKind>,
        create_error: Option<ErrorKind>,
        update_error: Option<ErrorKind>,
        delete_error: Option<ErrorKind>,
        connect_error: Option<bool>,
        observe_delay: Option<Duration>,
        calls: Vec<&'static str>,
        finalizer_stored_at_create: Option<bool>,
    }

    /// Scripted external API; connecting hands out a clone sharing state
    #[derive(Clone)]
    struct FakeExternal {
        state: Arc<Mutex<FakeState>>,
        store: MemoryStore<ManagedZone>,
    }

    impl FakeExternal {
        fn new(store: MemoryStore<ManagedZone>) -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeState::default())),
                store,
            }
        }

        fn script(&self, f: impl FnOnce(&mut FakeState)) {
            f(&mut self.state.lock().unwrap());
        }

        fn calls(&self, op: &str) -> usize {
            self.state.lock().unwrap().calls.iter().filter(|c| **c == op).count()
        }

        fn fail(stage: Stage, kind: ErrorKind) -> ExternalError {
            let message = match kind {
                ErrorKind::NotFound => "HTTP 404: not found",
                ErrorKind::AlreadyExists => "HTTP 409: already exists",
                _ => "HTTP 400: invalid value for field",
            };
            ExternalError::new(stage, kind, message)
        }
    }

    #[async_trait::async_trait]
    impl ExternalClient<ManagedZone> for FakeExternal {
        async fn observe(&self, obj: &mut ManagedZone) -> Result<ExternalObservation, ExternalError> {
            let delay = self.state.lock().unwrap().observe_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let mut state = self.state.lock().unwrap();
            state.calls.push("observe");
            if let Some(kind) = state.observe_error {
                return Err(Self::fail(Stage::Observe, kind));
            }
            if !state.exists {
                return Ok(ExternalObservation::not_found());
            }
            let mut late = false;
            if obj.spec.for_provider.description.is_none() {
                if let Some(description) = &state.fill_description {
                    obj.spec.for_provider.description = Some(description.clone());
                    late = true;
                }
            }
            Ok(ExternalObservation {
                resource_exists: true,
                resource_up_to_date: state.up_to_date,
                resource_late_initialized: late,
                resource_state: state.resource_state,
                connection_details: ConnectionDetails::new(),
            })
        }

        async fn create(&self, obj: &mut ManagedZone) -> Result<ExternalCreation, ExternalError> {
            let stored = self.store.object(&ObjectKey::of(obj));
            let mut state = self.state.lock().unwrap();
            state.calls.push("create");
            state.finalizer_stored_at_create = Some(stored.as_ref().is_some_and(has_finalizer));
            if let Some(kind) = state.create_error {
                return Err(Self::fail(Stage::Create, kind));
            }
            state.exists = true;
            state.up_to_date = true;
            let mut details = ConnectionDetails::new();
            details.insert("endpoint".to_string(), b"ns-1.example.net.".to_vec());
            Ok(ExternalCreation {
                connection_details: details,
            })
        }

        async fn update(&self, _obj: &ManagedZone) -> Result<ExternalUpdate, ExternalError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("update");
            if let Some(kind) = state.update_error {
                return Err(Self::fail(Stage::Update, kind));
            }
            state.up_to_date = true;
            Ok(ExternalUpdate::default())
        }

        async fn delete(&self, _obj: &ManagedZone) -> Result<(), ExternalError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("delete");
            if let Some(kind) = state.delete_error {
                return Err(Self::fail(Stage::Delete, kind));
            }
            state.exists = false;
            Ok(())
        }
    }

    struct FakeConnector(FakeExternal);

    #[async_trait::async_trait]
    impl Connector<ManagedZone> for FakeConnector {
        type Client = FakeExternal;

        async fn connect(&self, _obj: &ManagedZone) -> Result<FakeExternal, ConnectError> {
            let error = self.0.state.lock().unwrap().connect_error;
            match error {
                Some(true) => Err(ConnectError::ProviderConfigNotFound("default".to_string())),
                Some(false) => Err(ConnectError::Lookup("connection refused".into())),
                None => Ok(self.0.clone()),
            }
        }
    }

    struct Harness {
        store: MemoryStore<ManagedZone>,
        external: FakeExternal,
        publisher: MemoryPublisher,
        reconciler: ManagedReconciler<ManagedZone, FakeConnector>,
        key: ObjectKey,
    }

    fn config() -> ReconcilerConfig {
        ReconcilerConfig {
            short_wait: Duration::from_secs(30),
            long_wait: Duration::from_secs(60),
            config_error_wait: Duration::from_secs(300),
            conflict_wait: Duration::from_secs(600),
            timeout: Duration::from_secs(5),
        }
    }

    fn harness_with(zone: ManagedZone, config: ReconcilerConfig) -> Harness {
        let store = MemoryStore::new();
        let zone = store.insert(zone);
        let external = FakeExternal::new(store.clone());
        let publisher = MemoryPublisher::new();
        let reconciler = ManagedReconciler::new(
            Arc::new(store.clone()),
            FakeConnector(external.clone()),
            Arc::new(publisher.clone()),
            config,
        )
        .with_initializer(NameAsExternalName);
        Harness {
            store,
            external,
            publisher,
            reconciler,
            key: ObjectKey::of(&zone),
        }
    }

    fn harness() -> Harness {
        harness_with(managed_zone("default", "example", "example.com."), config())
    }

    impl Harness {
        fn stored(&self) -> ManagedZone {
            self.store.object(&self.key).expect("object in store")
        }

        fn condition(&self, type_: ConditionType) -> Option<(ConditionStatus, ConditionReason, Option<String>)> {
            let obj = self.stored();
            obj.conditions()
                .and_then(|c| c.get(type_))
                .map(|c| (c.status, c.reason, c.message.clone()))
        }

        /// Create the external resource and reach the up-to-date state
        async fn converge(&self) {
            self.reconciler.reconcile(&self.key).await.unwrap();
            self.reconciler.reconcile(&self.key).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_missing_object_is_not_requeued() {
        let h = harness();
        let action = h
            .reconciler
            .reconcile(&ObjectKey::new("default", "missing"))
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(h.external.calls("observe"), 0);
    }

    #[tokio::test]
    async fn test_create_then_available() {
        let h = harness();

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        assert_eq!(h.external.calls("create"), 1);
        assert_eq!(
            h.condition(ConditionType::Ready).map(|c| c.1),
            Some(ConditionReason::Creating)
        );
        assert_eq!(
            h.condition(ConditionType::Synced).map(|c| c.0),
            Some(ConditionStatus::True)
        );

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(60)));
        assert_eq!(
            h.condition(ConditionType::Ready),
            Some((ConditionStatus::True, ConditionReason::Available, None))
        );
    }

    #[tokio::test]
    async fn test_repeated_cycles_create_once() {
        let h = harness();
        for _ in 0..5 {
            h.reconciler.reconcile(&h.key).await.unwrap();
        }
        assert_eq!(h.external.calls("create"), 1);
        assert_eq!(h.external.calls("update"), 0);
    }

    #[tokio::test]
    async fn test_steady_state_does_not_write() {
        let h = harness();
        h.converge().await;
        let updates = h.store.updates();
        let status_updates = h.store.status_updates();

        h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(h.store.updates(), updates);
        assert_eq!(h.store.status_updates(), status_updates);
    }

    #[tokio::test]
    async fn test_finalizer_and_external_name_persisted_before_create() {
        let h = harness();
        h.reconciler.reconcile(&h.key).await.unwrap();

        assert_eq!(h.external.state.lock().unwrap().finalizer_stored_at_create, Some(true));
        let stored = h.stored();
        assert!(has_finalizer(&stored));
        assert_eq!(external_name(&stored), Some("example"));
    }

    #[tokio::test]
    async fn test_create_publishes_connection_details() {
        let mut zone = managed_zone("default", "example", "example.com.");
        zone.spec.write_connection_secret_to_ref = Some(SecretReference {
            name: "example-conn".to_string(),
            namespace: None,
        });
        let h = harness_with(zone, config());
        h.reconciler.reconcile(&h.key).await.unwrap();

        let secret = h.publisher.secret("default", "example-conn").expect("published secret");
        assert_eq!(secret["endpoint"], b"ns-1.example.net.".to_vec());
    }

    #[tokio::test]
    async fn test_publish_failure_is_reported() {
        let mut zone = managed_zone("default", "example", "example.com.");
        zone.spec.write_connection_secret_to_ref = Some(SecretReference {
            name: "example-conn".to_string(),
            namespace: None,
        });
        let h = harness_with(zone, config());
        h.publisher.set_failing(true);

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        let synced = h.condition(ConditionType::Synced).unwrap();
        assert_eq!(synced.1, ConditionReason::ReconcileError);
        assert!(synced.2.unwrap().starts_with("cannot publish connection details"));
    }

    #[tokio::test]
    async fn test_created_details_survive_failed_publish() {
        let mut zone = managed_zone("default", "example", "example.com.");
        zone.spec.write_connection_secret_to_ref = Some(SecretReference {
            name: "example-conn".to_string(),
            namespace: None,
        });
        let h = harness_with(zone, config());
        h.publisher.set_failing(true);
        h.reconciler.reconcile(&h.key).await.unwrap();
        h.reconciler.reconcile(&h.key).await.unwrap();
        assert!(h.publisher.secret("default", "example-conn").is_none());

        h.publisher.set_failing(false);
        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(60)));
        assert_eq!(h.external.calls("create"), 1);
        let secret = h.publisher.secret("default", "example-conn").expect("published secret");
        assert_eq!(secret["endpoint"], b"ns-1.example.net.".to_vec());
        assert_eq!(
            h.condition(ConditionType::Synced).map(|c| c.1),
            Some(ConditionReason::ReconcileSuccess)
        );
    }

    #[tokio::test]
    async fn test_already_exists_is_name_conflict() {
        let h = harness();
        h.external.script(|s| s.create_error = Some(ErrorKind::AlreadyExists));

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(600)));
        let synced = h.condition(ConditionType::Synced).unwrap();
        assert_eq!(synced.0, ConditionStatus::False);
        assert_eq!(synced.1, ConditionReason::ExternalNameConflict);
        assert!(h.condition(ConditionType::Ready).is_none());
    }

    #[tokio::test]
    async fn test_create_failure_requeues_short() {
        let h = harness();
        h.external.script(|s| s.create_error = Some(ErrorKind::Invalid));

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        let synced = h.condition(ConditionType::Synced).unwrap();
        assert_eq!(synced.1, ConditionReason::ReconcileError);
        assert_eq!(
            synced.2.as_deref(),
            Some("cannot create external resource: HTTP 400: invalid value for field")
        );
    }

    #[tokio::test]
    async fn test_update_failure_leaves_ready_untouched() {
        let h = harness();
        h.converge().await;
        let finalizers = h.stored().metadata.finalizers.clone();

        h.external.script(|s| {
            s.up_to_date = false;
            s.update_error = Some(ErrorKind::Invalid);
        });
        let action = h.reconciler.reconcile(&h.key).await.unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        assert_eq!(
            h.condition(ConditionType::Ready).map(|c| c.1),
            Some(ConditionReason::Available)
        );
        let synced = h.condition(ConditionType::Synced).unwrap();
        assert_eq!(synced.0, ConditionStatus::False);
        assert_eq!(
            synced.2.as_deref(),
            Some("cannot update external resource: HTTP 400: invalid value for field")
        );
        assert_eq!(h.stored().metadata.finalizers, finalizers);
    }

    #[tokio::test]
    async fn test_drift_is_corrected() {
        let h = harness();
        h.converge().await;
        h.external.script(|s| s.up_to_date = false);

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        assert_eq!(h.external.calls("update"), 1);
        assert_eq!(
            h.condition(ConditionType::Synced).map(|c| c.0),
            Some(ConditionStatus::True)
        );
    }

    #[tokio::test]
    async fn test_resource_state_drives_ready() {
        let h = harness();
        h.converge().await;
        h.external.script(|s| s.resource_state = ResourceState::Unavailable);

        h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(
            h.condition(ConditionType::Ready).map(|c| (c.0, c.1)),
            Some((ConditionStatus::False, ConditionReason::Unavailable))
        );
    }

    #[tokio::test]
    async fn test_late_initialized_spec_is_persisted() {
        let h = harness();
        h.converge().await;
        h.external.script(|s| s.fill_description = Some("from provider".to_string()));

        h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(
            h.stored().spec.for_provider.description.as_deref(),
            Some("from provider")
        );
    }

    #[tokio::test]
    async fn test_user_value_is_not_late_initialized() {
        let mut zone = managed_zone("default", "example", "example.com.");
        zone.spec.for_provider.description = Some("mine".to_string());
        let h = harness_with(zone, config());
        h.converge().await;
        h.external.script(|s| s.fill_description = Some("from provider".to_string()));

        h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(h.stored().spec.for_provider.description.as_deref(), Some("mine"));
    }

    #[tokio::test]
    async fn test_observe_failure_requeues_short() {
        let h = harness();
        h.external.script(|s| s.observe_error = Some(ErrorKind::Transient));

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        assert_eq!(h.external.calls("create"), 0);
        assert_eq!(
            h.condition(ConditionType::Synced).map(|c| c.1),
            Some(ConditionReason::ReconcileError)
        );
    }

    #[tokio::test]
    async fn test_rejected_credentials_wait_longer() {
        let h = harness();
        h.external.script(|s| s.observe_error = Some(ErrorKind::Configuration));

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(300)));
        assert_eq!(
            h.condition(ConditionType::Synced).map(|c| c.1),
            Some(ConditionReason::ReconcileError)
        );
    }

    #[tokio::test]
    async fn test_configuration_error_waits_longer() {
        let h = harness();
        h.external.script(|s| s.connect_error = Some(true));

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(300)));
        let synced = h.condition(ConditionType::Synced).unwrap();
        assert_eq!(
            synced.2.as_deref(),
            Some("cannot connect to provider: ProviderConfig default not found")
        );
        assert_eq!(h.external.calls("observe"), 0);
    }

    #[tokio::test]
    async fn test_transient_connect_error_waits_short() {
        let h = harness();
        h.external.script(|s| s.connect_error = Some(false));

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_delete_not_found_removes_finalizer() {
        let h = harness();
        h.converge().await;
        h.store.mark_deleted(&h.key);
        h.external.script(|s| s.delete_error = Some(ErrorKind::NotFound));

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(h.external.calls("delete"), 1);
        assert!(h.store.object(&h.key).is_none());
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_finalizer() {
        let h = harness();
        h.converge().await;
        h.store.mark_deleted(&h.key);
        h.external.script(|s| s.delete_error = Some(ErrorKind::Transient));

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        assert!(has_finalizer(&h.stored()));
        assert_eq!(
            h.condition(ConditionType::Ready).map(|c| c.1),
            Some(ConditionReason::Deleting)
        );
        assert_eq!(
            h.condition(ConditionType::Synced).map(|c| c.1),
            Some(ConditionReason::ReconcileError)
        );
    }

    #[tokio::test]
    async fn test_orphan_skips_external_delete() {
        let mut zone = managed_zone("default", "example", "example.com.");
        zone.spec.deletion_policy = DeletionPolicy::Orphan;
        let h = harness_with(zone, config());
        h.converge().await;
        h.store.mark_deleted(&h.key);

        h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(h.external.calls("delete"), 0);
        assert!(h.store.object(&h.key).is_none());
        assert!(h.external.state.lock().unwrap().exists);
    }

    #[tokio::test]
    async fn test_no_delete_without_finalizer() {
        let mut zone = managed_zone("default", "example", "example.com.");
        zone.metadata.finalizers = Some(vec!["example.com/other".to_string()]);
        let h = harness_with(zone, config());
        h.store.mark_deleted(&h.key);

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(h.external.calls("delete"), 0);
        assert_eq!(h.external.calls("create"), 0);
        assert_eq!(
            h.stored().metadata.finalizers,
            Some(vec!["example.com/other".to_string()])
        );
        assert!(!h.stored().metadata.finalizers.unwrap().contains(&MANAGED_FINALIZER.to_string()));
    }

    #[tokio::test]
    async fn test_persist_conflict_is_returned() {
        let h = harness();
        h.store.conflict_next_writes(1);

        let result = h.reconciler.reconcile(&h.key).await;
        assert!(matches!(
            result,
            Err(ReconcileError::Store(StoreError::Conflict(_)))
        ));
        assert_eq!(h.external.calls("create"), 0);

        // Retried from a fresh read
        h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(h.external.calls("create"), 1);
    }

    #[tokio::test]
    async fn test_cycle_deadline() {
        let mut config = config();
        config.timeout = Duration::from_millis(50);
        let h = harness_with(managed_zone("default", "example", "example.com."), config);
        h.external.script(|s| s.observe_delay = Some(Duration::from_secs(10)));

        let action = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(30)));
        let synced = h.condition(ConditionType::Synced).unwrap();
        assert_eq!(synced.1, ConditionReason::ReconcileError);
        assert!(synced.2.unwrap().contains("timed out"));
    }
}
