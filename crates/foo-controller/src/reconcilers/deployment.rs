use k8s_openapi::api::apps::v1::Deployment;
use tracing::{Level, instrument};

use crate::{
    Result,
    api::{Foo, FooStatus},
    manifest::build_deployment,
    reconcilers::{attach_owner, create_child, replace_child},
    store::{Store, identity},
};

fn replicas(deployment: &Deployment) -> Option<i32> {
    deployment.spec.as_ref().and_then(|spec| spec.replicas)
}

fn available_replicas(deployment: &Deployment) -> i32 {
    deployment
        .status
        .as_ref()
        .and_then(|status| status.available_replicas)
        .unwrap_or_default()
}

/// Keep the Foo's deployment in place with the desired replica count, and
/// project its availability into the Foo's status.
#[instrument(level = Level::DEBUG, skip_all)]
pub async fn sync<S: Store>(store: &S, foo: &Foo) -> Result<()> {
    let (namespace, name) = identity(foo)?;
    let current = store.get::<Deployment>(&namespace, &name).await?;
    let desired = attach_owner(foo, build_deployment(foo)?)?;

    let Some(current) = current else {
        return create_child(store, &desired).await;
    };

    if replicas(&current) != replicas(&desired) {
        tracing::info!(
            current = replicas(&current),
            desired = foo.spec.replicas,
            "Scaling deployment"
        );
        replace_child(store, foo, &current, desired).await?;
    }

    let available = available_replicas(&current);
    if available != foo.available_replicas() {
        tracing::info!(available, "Recording available replicas");
        let mut foo = foo.clone();
        foo.status = Some(FooStatus {
            available_replicas: available,
        });
        store.update_status(&foo).await?;
    }

    Ok(())
}
