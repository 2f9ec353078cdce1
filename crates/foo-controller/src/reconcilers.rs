use k8s_openapi::{
    api::core::v1::ObjectReference, apimachinery::pkg::apis::meta::v1::OwnerReference,
};
use kube::Resource;

use super::{Error, Result};
use crate::{
    api::Foo,
    store::{Store, StoreObject},
};

pub mod deployment;
pub mod ingress;
pub mod service;

pub(crate) fn owner_ref_from_object_ref(object_ref: &ObjectReference) -> Result<OwnerReference> {
    Ok(OwnerReference {
        api_version: object_ref
            .api_version
            .clone()
            .ok_or(Error::MissingField("apiVersion"))?,
        kind: object_ref.kind.clone().ok_or(Error::MissingField("kind"))?,
        name: object_ref.name.clone().ok_or(Error::MissingField("name"))?,
        uid: object_ref.uid.clone().ok_or(Error::MissingField("uid"))?,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

/// Stamp `child` with a controller reference back to `owner`.
///
/// Fails when the owner has no uid to reference.
pub fn attach_owner<K>(owner: &Foo, mut child: K) -> Result<K>
where
    K: Resource<DynamicType = ()>,
{
    let owner_ref = owner_ref_from_object_ref(&owner.object_ref(&()))?;
    let owners = child
        .meta_mut()
        .owner_references
        .get_or_insert_with(Vec::new);
    owners.retain(|o| o.uid != owner_ref.uid);
    owners.push(owner_ref);
    Ok(child)
}

/// Refuse to touch an observed child that another object controls.
///
/// A child without any controller reference is adopted by the next write.
pub(crate) fn ensure_controlled_by<K>(owner: &Foo, current: &K) -> Result<()>
where
    K: Resource<DynamicType = ()>,
{
    let uid = owner.metadata.uid.as_deref().ok_or(Error::MissingField("uid"))?;
    let foreign = current
        .meta()
        .owner_references
        .iter()
        .flatten()
        .find(|o| o.controller == Some(true) && o.uid != uid);

    match foreign {
        Some(other) => Err(Error::OwnerConflict {
            kind: K::kind(&()).to_string(),
            name: current.meta().name.clone().unwrap_or_default(),
            owner: format!("{} {}", other.kind, other.name),
        }),
        None => Ok(()),
    }
}

/// Create a missing child. Losing the creation race to another writer still
/// leaves the child in place, so `AlreadyExists` counts as success.
pub(crate) async fn create_child<S: Store, K: StoreObject>(store: &S, desired: &K) -> Result<()> {
    tracing::info!(kind = %K::kind(&()), "Creating child");
    match store.create(desired).await {
        Err(Error::AlreadyExists { .. }) => {
            tracing::debug!(kind = %K::kind(&()), "Child was created concurrently");
            Ok(())
        }
        res => res,
    }
}

/// Replace a drifted child with its desired value, conditional on the version observed
pub(crate) async fn replace_child<S: Store, K: StoreObject>(
    store: &S,
    owner: &Foo,
    current: &K,
    mut desired: K,
) -> Result<()> {
    ensure_controlled_by(owner, current)?;
    tracing::info!(kind = %K::kind(&()), "Updating drifted child");
    desired.meta_mut().resource_version = current.meta().resource_version.clone();
    store.update(&desired).await
}

/// Remove a child that is no longer wanted; one already gone is fine.
pub(crate) async fn delete_child<S: Store, K: StoreObject>(
    store: &S,
    owner: &Foo,
    current: &K,
) -> Result<()> {
    ensure_controlled_by(owner, current)?;
    tracing::info!(kind = %K::kind(&()), "Deleting disabled child");
    match store.delete(current).await {
        Err(Error::NotFound { .. }) => {
            tracing::debug!(kind = %K::kind(&()), "Child was deleted concurrently");
            Ok(())
        }
        res => res,
    }
}
