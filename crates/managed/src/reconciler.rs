//! The managed resource control loop
//!
//! [`ManagedReconciler`] runs one cycle for one object key. It is generic
//! over the managed kind and its [`Connector`], so the same state machine
//! drives every GCP kind. A cycle never fails because the external API
//! rejected a call: such failures end up in the `Synced` condition and the
//! object is requeued. Only a failure to persist the object is returned as
//! an error, so the runtime retries the whole cycle with backoff.
//!
//! Connection details returned by a create are the only copy of secrets
//! such as generated passwords. When publishing them fails they are held in
//! memory and merged into every later publish of the object until one
//! succeeds.

use crate::error::{ErrorKind, ExternalError, ReconcileError, StoreError};
use crate::external::{ConnectionDetails, Connector, ExternalClient, ResourceState};
use crate::initializer::Initializer;
use crate::metrics;
use crate::publisher::ConnectionPublisher;
use crate::resource::{
    add_finalizer, has_finalizer, is_being_deleted, remove_finalizer, split_status, Managed,
    ObjectKey,
};
use crate::store::ObjectStore;
use crds::{Condition, DeletionPolicy};
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

/// Requeue intervals and the per-cycle deadline
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Wait after a change or a failed cycle
    pub short_wait: Duration,
    /// Poll interval of an up-to-date resource
    pub long_wait: Duration,
    /// Wait after a configuration error (missing ProviderConfig, missing or
    /// rejected credentials)
    pub config_error_wait: Duration,
    /// Wait after a create was rejected because the name is taken
    pub conflict_wait: Duration,
    /// Deadline of one cycle
    pub timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            short_wait: Duration::from_secs(30),
            long_wait: Duration::from_secs(60),
            config_error_wait: Duration::from_secs(300),
            conflict_wait: Duration::from_secs(300),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Outcome label of a cycle, for metrics
type Outcome = &'static str;

/// Generic reconciler for one managed kind
pub struct ManagedReconciler<K, C> {
    store: Arc<dyn ObjectStore<K>>,
    connector: C,
    publisher: Arc<dyn ConnectionPublisher<K>>,
    initializers: Vec<Box<dyn Initializer<K>>>,
    config: ReconcilerConfig,
    /// Created connection details not yet published, by object
    held: Mutex<HashMap<ObjectKey, ConnectionDetails>>,
}

impl<K, C> ManagedReconciler<K, C>
where
    K: Managed,
    C: Connector<K>,
{
    pub fn new(
        store: Arc<dyn ObjectStore<K>>,
        connector: C,
        publisher: Arc<dyn ConnectionPublisher<K>>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            connector,
            publisher,
            initializers: Vec::new(),
            config,
            held: Mutex::new(HashMap::new()),
        }
    }

    /// Register an initializer; initializers run in registration order
    #[must_use]
    pub fn with_initializer(mut self, initializer: impl Initializer<K> + 'static) -> Self {
        self.initializers.push(Box::new(initializer));
        self
    }

    /// Run one cycle for the object identified by `key`
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        let kind = K::kind(&());
        let span = info_span!(
            "reconcile",
            kind = %kind,
            namespace = key.namespace.as_deref().unwrap_or_default(),
            name = %key.name
        );
        let start = Instant::now();

        let result = match tokio::time::timeout(self.config.timeout, self.run(key))
            .instrument(span.clone())
            .await
        {
            Ok(result) => result,
            Err(_) => {
                self.record_timeout(key).instrument(span).await;
                Ok((Action::requeue(self.config.short_wait), "timeout"))
            }
        };

        metrics::observe_reconcile_duration(&kind, start.elapsed().as_secs_f64());
        match result {
            Ok((action, outcome)) => {
                metrics::increment_reconciles(&kind, outcome);
                Ok(action)
            }
            Err(e) => {
                metrics::increment_reconciles(&kind, "persist_error");
                Err(e)
            }
        }
    }

    async fn run(&self, key: &ObjectKey) -> Result<(Action, Outcome), ReconcileError> {
        let Some(mut obj) = self.store.get(key).await? else {
            debug!("{} {} no longer exists", K::kind(&()), key);
            self.release(key);
            return Ok((Action::await_change(), "gone"));
        };
        let mut persisted = obj.clone();

        let mut initialized = false;
        for initializer in &self.initializers {
            match initializer.initialize(&mut obj).await {
                Ok(changed) => initialized |= changed,
                Err(e) => {
                    warn!("Initializer failed for {}: {}", key, e);
                    obj.set_condition(Condition::reconcile_error(e.to_string()));
                    return self.finish(obj, persisted, self.config.short_wait, "error").await;
                }
            }
        }
        if initialized {
            debug!("Persisting initialized {}", key);
            self.persist(&mut obj, &mut persisted).await?;
        }

        let client = match self.connector.connect(&obj).await {
            Ok(client) => client,
            Err(e) => {
                let wait = if e.is_configuration() {
                    self.config.config_error_wait
                } else {
                    self.config.short_wait
                };
                warn!("Cannot connect for {}: {} (retrying in {:?})", key, e.detail(), wait);
                obj.set_condition(Condition::reconcile_error(e.detail()));
                return self.finish(obj, persisted, wait, "error").await;
            }
        };

        if is_being_deleted(&obj) {
            return self.delete(obj, persisted, &client, key).await;
        }

        if add_finalizer(&mut obj) {
            debug!("Adding finalizer to {}", key);
            self.persist(&mut obj, &mut persisted).await?;
        }

        let observation = match client.observe(&mut obj).await {
            Ok(observation) => observation,
            Err(e) => {
                let wait = self.external_failed(&mut obj, key, &e);
                return self.finish(obj, persisted, wait, "error").await;
            }
        };
        if observation.resource_late_initialized {
            info!("Late-initialized spec of {} from the external resource", key);
        }

        if !observation.resource_exists {
            return match client.create(&mut obj).await {
                Ok(creation) => {
                    info!("Created external resource for {} {}", K::kind(&()), key);
                    obj.set_condition(Condition::creating());
                    obj.set_condition(Condition::reconcile_success());
                    let outcome = if self.publish(&mut obj, key, creation.connection_details.clone()).await {
                        "created"
                    } else {
                        self.hold(key, creation.connection_details);
                        "error"
                    };
                    self.finish(obj, persisted, self.config.short_wait, outcome).await
                }
                Err(e) if e.is_already_exists() => {
                    metrics::increment_external_errors(&K::kind(&()), e.stage.as_str());
                    warn!(
                        "External name of {} is already taken: {} (retrying in {:?})",
                        key,
                        e.detail(),
                        self.config.conflict_wait
                    );
                    obj.set_condition(Condition::external_name_conflict(e.detail()));
                    self.finish(obj, persisted, self.config.conflict_wait, "conflict").await
                }
                Err(e) => {
                    let wait = self.external_failed(&mut obj, key, &e);
                    self.finish(obj, persisted, wait, "error").await
                }
            };
        }

        if !observation.resource_up_to_date {
            return match client.update(&obj).await {
                Ok(update) => {
                    info!("Updated external resource for {} {}", K::kind(&()), key);
                    obj.set_condition(Condition::reconcile_success());
                    let mut details = observation.connection_details;
                    details.extend(update.connection_details);
                    let outcome = if self.publish(&mut obj, key, details).await {
                        "updated"
                    } else {
                        "error"
                    };
                    self.finish(obj, persisted, self.config.short_wait, outcome).await
                }
                Err(e) => {
                    let wait = self.external_failed(&mut obj, key, &e);
                    self.finish(obj, persisted, wait, "error").await
                }
            };
        }

        debug!("External resource for {} is up to date", key);
        obj.set_condition(match observation.resource_state {
            ResourceState::Available => Condition::available(),
            ResourceState::Creating => Condition::creating(),
            ResourceState::Unavailable => Condition::unavailable(),
        });
        obj.set_condition(Condition::reconcile_success());
        if self.publish(&mut obj, key, observation.connection_details).await {
            self.finish(obj, persisted, self.config.long_wait, "success").await
        } else {
            self.finish(obj, persisted, self.config.short_wait, "error").await
        }
    }

    /// Deletion branch of a cycle
    async fn delete(
        &self,
        mut obj: K,
        persisted: K,
        client: &C::Client,
        key: &ObjectKey,
    ) -> Result<(Action, Outcome), ReconcileError> {
        if !has_finalizer(&obj) {
            debug!("{} is being deleted and has no finalizer", key);
            return Ok((Action::await_change(), "success"));
        }

        if obj.deletion_policy() == DeletionPolicy::Orphan {
            info!("Orphaning external resource of {} {}", K::kind(&()), key);
        } else {
            match client.delete(&obj).await {
                Ok(()) => info!("Deleted external resource for {} {}", K::kind(&()), key),
                Err(e) if e.is_not_found() => {
                    debug!("External resource for {} is already gone", key)
                }
                Err(e) => {
                    let wait = self.external_failed(&mut obj, key, &e);
                    obj.set_condition(Condition::deleting());
                    return self.finish(obj, persisted, wait, "error").await;
                }
            }
        }

        // The object may disappear once the finalizer is gone, so only
        // metadata is written.
        remove_finalizer(&mut obj);
        self.store.update(&obj).await?;
        self.release(key);
        Ok((Action::await_change(), "deleted"))
    }

    /// Record an external failure on the object and return the requeue wait
    fn external_failed(&self, obj: &mut K, key: &ObjectKey, error: &ExternalError) -> Duration {
        metrics::increment_external_errors(&K::kind(&()), error.stage.as_str());
        let wait = match error.kind {
            ErrorKind::Configuration => self.config.config_error_wait,
            _ => self.config.short_wait,
        };
        warn!("{} for {}: {} (retrying in {:?})", error, key, error.source, wait);
        obj.set_condition(Condition::reconcile_error(error.detail()));
        wait
    }

    /// Keep created details until a publish of the object succeeds
    fn hold(&self, key: &ObjectKey, details: ConnectionDetails) {
        if details.is_empty() {
            return;
        }
        if let Ok(mut held) = self.held.lock() {
            warn!("Holding connection details of {} until they are published", key);
            held.entry(key.clone()).or_default().extend(details);
        }
    }

    fn release(&self, key: &ObjectKey) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(key);
        }
    }

    /// Publish connection details, together with any held for the object.
    /// A failure is recorded on the object.
    async fn publish(&self, obj: &mut K, key: &ObjectKey, mut details: ConnectionDetails) -> bool {
        let held = self.held.lock().ok().and_then(|held| held.get(key).cloned());
        if let Some(held) = &held {
            for (name, value) in held {
                details.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }

        match self.publisher.publish(obj, &details).await {
            Ok(()) => {
                if held.is_some() {
                    info!("Published held connection details of {}", key);
                    self.release(key);
                }
                true
            }
            Err(e) => {
                warn!("{}", e);
                obj.set_condition(Condition::reconcile_error(e.to_string()));
                false
            }
        }
    }

    async fn finish(
        &self,
        mut obj: K,
        mut persisted: K,
        wait: Duration,
        outcome: Outcome,
    ) -> Result<(Action, Outcome), ReconcileError> {
        self.persist(&mut obj, &mut persisted).await?;
        Ok((Action::requeue(wait), outcome))
    }

    /// Write what changed since `persisted`: metadata and spec first, then
    /// status.
    async fn persist(&self, obj: &mut K, persisted: &mut K) -> Result<(), StoreError> {
        let (body, status) = split_status(obj)?;
        let (persisted_body, persisted_status) = split_status(persisted)?;

        if body != persisted_body {
            let stored = self.store.update(obj).await?;
            obj.meta_mut().resource_version = stored.meta().resource_version.clone();
        }
        if status != persisted_status {
            let stored = self.store.update_status(obj).await?;
            obj.meta_mut().resource_version = stored.meta().resource_version.clone();
        }
        *persisted = obj.clone();
        Ok(())
    }

    /// Best-effort error condition after the cycle deadline expired
    async fn record_timeout(&self, key: &ObjectKey) {
        warn!(
            "Reconcile of {} exceeded {:?}, requeueing",
            key, self.config.timeout
        );
        let message = format!("reconcile timed out after {}s", self.config.timeout.as_secs());
        match self.store.get(key).await {
            Ok(Some(mut obj)) => {
                obj.set_condition(Condition::reconcile_error(message));
                if let Err(e) = self.store.update_status(&obj).await {
                    debug!("Cannot record timeout on {}: {}", key, e);
                }
            }
            Ok(None) => {}
            Err(e) => debug!("Cannot record timeout on {}: {}", key, e),
        }
    }
}
