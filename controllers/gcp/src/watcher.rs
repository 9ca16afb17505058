//! Kubernetes resource watchers.
//!
//! Every managed kind is driven by one `kube_runtime::Controller`, which
//! keeps the watch alive across reconnects and guarantees at most one
//! in-flight reconcile per object. The cycle itself is delegated to the
//! kind's [`ManagedReconciler`].

use crate::error::ControllerError;
use futures::StreamExt;
use kube::Api;
use kube_runtime::{
    controller::{Action, Config as RuntimeConfig},
    watcher, Controller,
};
use managed::{BackoffTracker, Connector, Managed, ManagedReconciler, ObjectKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Runtime settings shared by all watchers
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    /// Wait after the last event before reconciling
    pub debounce: Duration,
    /// Concurrent reconciles per kind
    pub concurrency: u16,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(5),
            concurrency: 3,
        }
    }
}

/// Shared state of one watcher
pub struct WatchContext<K, C> {
    reconciler: Arc<ManagedReconciler<K, C>>,
    backoff: BackoffTracker,
}

impl<K, C> WatchContext<K, C> {
    pub fn new(reconciler: Arc<ManagedReconciler<K, C>>) -> Self {
        Self {
            reconciler,
            backoff: BackoffTracker::default(),
        }
    }
}

/// One cycle for the object the runtime handed us.
///
/// A successful cycle resets the object's failure backoff.
pub async fn reconcile<K, C>(obj: Arc<K>, ctx: Arc<WatchContext<K, C>>) -> Result<Action, ControllerError>
where
    K: Managed,
    C: Connector<K> + 'static,
{
    let key = ObjectKey::of(obj.as_ref());
    debug!("Reconciling {} {}", K::kind(&()), key);
    let action = ctx.reconciler.reconcile(&key).await?;
    ctx.backoff.reset(&key);
    Ok(action)
}

/// Requeue a failed object with per-object Fibonacci backoff
pub fn error_policy<K, C>(obj: Arc<K>, err: &ControllerError, ctx: Arc<WatchContext<K, C>>) -> Action
where
    K: Managed,
{
    let key = ObjectKey::of(obj.as_ref());
    let (delay, failures) = ctx.backoff.next_failure(&key);
    if failures > 1 {
        error!(
            "Reconciliation of {} {} failed {} times in a row: {}",
            K::kind(&()),
            key,
            failures,
            err
        );
    } else {
        warn!("Reconciliation of {} {} failed: {}", K::kind(&()), key, err);
    }
    Action::requeue(delay)
}

/// Watch one managed kind until shutdown.
///
/// Returns once the controller stream ends, which happens on SIGTERM or
/// SIGINT.
pub async fn watch_resource<K, C>(
    api: Api<K>,
    reconciler: Arc<ManagedReconciler<K, C>>,
    settings: WatchSettings,
) -> Result<(), ControllerError>
where
    K: Managed,
    C: Connector<K> + 'static,
{
    let kind = K::kind(&()).to_string();
    info!("Starting {} watcher", kind);

    let runtime_config = RuntimeConfig::default()
        .debounce(settings.debounce)
        .concurrency(settings.concurrency);

    Controller::new(api, watcher::Config::default())
        .with_config(runtime_config)
        .shutdown_on_signal()
        .run(
            reconcile::<K, C>,
            error_policy::<K, C>,
            Arc::new(WatchContext::new(reconciler)),
        )
        .for_each(|res| {
            let kind = kind.clone();
            async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled {} {}", kind, obj.name),
                    Err(e) => warn!("Controller error for {}: {}", kind, e),
                }
            }
        })
        .await;

    info!("{} watcher stopped", kind);
    Ok(())
}
