use k8s_openapi::{api::core::v1::Service, apimachinery::pkg::util::intstr::IntOrString};
use tracing::{Level, instrument};

use crate::{
    Error, Result,
    api::Foo,
    manifest::build_service,
    reconcilers::{attach_owner, create_child, delete_child, replace_child},
    store::{Store, identity},
};

fn first_target_port(service: &Service) -> Option<Option<&IntOrString>> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| ports.first())
        .map(|port| port.target_port.as_ref())
}

/// Only the first declared port is compared; drift in later ports goes unnoticed.
fn target_port_differs(current: &Service, desired: &Service) -> Result<bool> {
    let Some(desired_port) = first_target_port(desired) else {
        return Err(Error::InvalidManifest(
            "service declares no ports".to_string(),
        ));
    };
    Ok(first_target_port(current) != Some(desired_port))
}

/// Cluster IPs are allocated by the API server and cannot change on update
fn keep_allocated_ips(current: &Service, desired: &mut Service) {
    if let (Some(current), Some(desired)) = (current.spec.as_ref(), desired.spec.as_mut()) {
        desired.cluster_ip = current.cluster_ip.clone();
        desired.cluster_ips = current.cluster_ips.clone();
    }
}

#[instrument(level = Level::DEBUG, skip_all)]
pub async fn sync<S: Store>(store: &S, foo: &Foo) -> Result<()> {
    let (namespace, name) = identity(foo)?;
    let current = store.get::<Service>(&namespace, &name).await?;
    let mut desired = attach_owner(foo, build_service(foo)?)?;

    match (current, foo.spec.enable_service) {
        (None, true) => create_child(store, &desired).await,
        (None, false) => Ok(()),
        (Some(current), false) => delete_child(store, foo, &current).await,
        (Some(current), true) => {
            if target_port_differs(&current, &desired)? {
                keep_allocated_ips(&current, &mut desired);
                replace_child(store, foo, &current, desired).await?;
            }
            Ok(())
        }
    }
}
