use std::sync::Arc;

use futures::Stream;
use k8s_openapi::api::{apps::v1::Deployment, core::v1::Service, networking::v1::Ingress};
use kube::{
    Api, Client, Resource, ResourceExt,
    runtime::{
        Controller, WatchStreamExt,
        controller::{self, Action, Error as ControllerError},
        reflector::{self, ObjectRef},
        watcher,
    },
};
use tracing::{Level, instrument};

use crate::{
    Error, Result,
    api::Foo,
    config::ControllerConfig,
    filter::{EventFilter, LabelGate, filter_events},
    reconcilers::{deployment, ingress, service},
    store::{KubeStore, Store},
};

/// Synchronizes the children of one Foo at a time.
///
/// Holds no per-pass state, so distinct Foos may be reconciled concurrently.
pub struct Reconciler<S> {
    store: S,
    config: ControllerConfig,
}

impl<S: Store> Reconciler<S> {
    pub fn new(store: S, config: ControllerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run one reconciliation pass for the Foo `namespace/name`.
    ///
    /// Kinds are synchronized in a fixed order and the pass stops at the first
    /// failure; the next pass re-evaluates every kind from scratch.
    #[instrument(level = Level::INFO, skip(self))]
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action> {
        let Some(foo) = self.store.get::<Foo>(namespace, name).await? else {
            tracing::debug!("Foo is gone, nothing to do");
            return Ok(Action::await_change());
        };

        deployment::sync(&self.store, &foo)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to sync deployment"))?;
        service::sync(&self.store, &foo)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to sync service"))?;
        ingress::sync(&self.store, &foo)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to sync ingress"))?;

        Ok(Action::requeue(self.config.resync_interval()))
    }
}

async fn reconcile_foo<S: Store>(foo: Arc<Foo>, context: Arc<Reconciler<S>>) -> Result<Action> {
    let namespace = foo
        .namespace()
        .ok_or(Error::MissingField("metadata.namespace"))?;
    context.reconcile(&namespace, &foo.name_any()).await
}

fn error_policy<S: Store>(foo: Arc<Foo>, error: &Error, context: Arc<Reconciler<S>>) -> Action {
    if error.is_transient() {
        tracing::warn!(name = %foo.name_any(), error = %error, "Reconcile failed, retrying");
        Action::requeue(context.config().error_requeue())
    } else {
        tracing::error!(
            name = %foo.name_any(),
            error = %error,
            "Reconcile failed until the Foo is changed"
        );
        Action::requeue(context.config().resync_interval())
    }
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// Watch Foos and their children and reconcile every admitted change
pub fn control_loop(
    client: Client,
    config: ControllerConfig,
) -> impl Stream<Item = Result<(ObjectRef<Foo>, Action), ControllerError<Error, watcher::Error>>> {
    let namespace = config.namespace.as_deref();
    let foos = api::<Foo>(&client, namespace);
    let deployments = api::<Deployment>(&client, namespace);
    let services = api::<Service>(&client, namespace);
    let ingresses = api::<Ingress>(&client, namespace);

    let filter = EventFilter::new(LabelGate::new(config.label_value.clone()));
    let children = watcher::Config::default().labels(&filter.labels().selector());

    let (reader, writer) = reflector::store();
    let trigger = filter_events(
        watcher(foos, watcher::Config::default())
            .default_backoff()
            .reflect(writer),
        filter,
    );

    let concurrency = config.concurrency;
    let context = Arc::new(Reconciler::new(
        KubeStore::new(client, config.request_timeout()),
        config,
    ));

    Controller::for_stream(trigger, reader)
        .owns(deployments, children.clone())
        .owns(services, children.clone())
        .owns(ingresses, children)
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile_foo, error_policy, context)
}
