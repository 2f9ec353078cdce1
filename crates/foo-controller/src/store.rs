use std::{fmt::Debug, future::Future, time::Duration};

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    Api, Client, Resource, ResourceExt,
    api::{DeleteParams, Patch, PatchParams, PostParams, Preconditions},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::{Error, Result};

/// Namespaced objects the controller reads and writes
pub trait StoreObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> StoreObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Get/create/update/delete primitives against the remote object store.
///
/// Not-found on read is `Ok(None)`. Writes report `AlreadyExists`, `NotFound` and
/// `Conflict` as distinct errors so callers can tell benign races from failures.
/// Dropping a returned future cancels the call.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    async fn create<K: StoreObject>(&self, object: &K) -> Result<()>;

    /// Replace the whole object. A `resourceVersion` on the object makes the write conditional.
    async fn update<K: StoreObject>(&self, object: &K) -> Result<()>;

    /// Write only the status of the object, conditional on its `resourceVersion`.
    async fn update_status<K: StoreObject>(&self, object: &K) -> Result<()>;

    /// Delete the object, conditional on its uid.
    async fn delete<K: StoreObject>(&self, object: &K) -> Result<()>;
}

/// Namespace and name of an object about to be written
pub(crate) fn identity<K: Resource>(object: &K) -> Result<(String, String)> {
    let namespace = object
        .meta()
        .namespace
        .clone()
        .ok_or(Error::MissingField("metadata.namespace"))?;
    let name = object
        .meta()
        .name
        .clone()
        .ok_or(Error::MissingField("metadata.name"))?;
    Ok((namespace, name))
}

/// [`Store`] backed by the K8s API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    timeout: Duration,
}

impl KubeStore {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn api<K: StoreObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn call<K: StoreObject, T>(
        &self,
        verb: &'static str,
        namespace: &str,
        name: &str,
        request: impl Future<Output = kube::Result<T>> + Send,
    ) -> Result<T> {
        let kind = K::kind(&()).to_string();
        let (namespace, name) = (namespace.to_string(), name.to_string());

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(kube::Error::Api(ae))) if ae.code == 404 => Err(Error::NotFound {
                kind,
                namespace,
                name,
            }),
            Ok(Err(kube::Error::Api(ae))) if ae.code == 409 && verb == "create" => {
                Err(Error::AlreadyExists {
                    kind,
                    namespace,
                    name,
                })
            }
            Ok(Err(kube::Error::Api(ae))) if ae.code == 409 => Err(Error::Conflict {
                kind,
                namespace,
                name,
            }),
            Ok(Err(e)) => Err(e.into()),
            Err(_elapsed) => Err(Error::Timeout {
                verb,
                kind,
                namespace,
                name,
            }),
        }
    }
}

#[async_trait]
impl Store for KubeStore {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let api = self.api::<K>(namespace);
        self.call::<K, _>("get", namespace, name, api.get_opt(name))
            .await
    }

    async fn create<K: StoreObject>(&self, object: &K) -> Result<()> {
        let (namespace, name) = identity(object)?;
        let api = self.api::<K>(&namespace);
        self.call::<K, _>(
            "create",
            &namespace,
            &name,
            api.create(&PostParams::default(), object),
        )
        .await?;
        Ok(())
    }

    async fn update<K: StoreObject>(&self, object: &K) -> Result<()> {
        let (namespace, name) = identity(object)?;
        let api = self.api::<K>(&namespace);
        self.call::<K, _>(
            "update",
            &namespace,
            &name,
            api.replace(&name, &PostParams::default(), object),
        )
        .await?;
        Ok(())
    }

    async fn update_status<K: StoreObject>(&self, object: &K) -> Result<()> {
        let (namespace, name) = identity(object)?;
        let api = self.api::<K>(&namespace);

        let value = serde_json::to_value(object)?;
        let patch = json!({
            "metadata": {
                "resourceVersion": object.resource_version(),
            },
            "status": value.get("status"),
        });

        self.call::<K, _>(
            "update_status",
            &namespace,
            &name,
            api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await?;
        Ok(())
    }

    async fn delete<K: StoreObject>(&self, object: &K) -> Result<()> {
        let (namespace, name) = identity(object)?;
        let api = self.api::<K>(&namespace);

        let dp = DeleteParams {
            preconditions: Some(Preconditions {
                uid: object.uid(),
                resource_version: None,
            }),
            ..Default::default()
        };

        self.call::<K, _>("delete", &namespace, &name, api.delete(&name, &dp))
            .await?;
        Ok(())
    }
}
