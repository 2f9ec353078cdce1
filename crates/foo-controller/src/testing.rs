//! In-memory object store and fixtures for unit tests

use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use kube::ResourceExt;
use serde_json::Value;

use crate::{
    Error, Result,
    api::{Foo, FooSpec},
    filter::{PRIVATE_LABEL_KEY, PUBLIC_LABEL_KEY},
    store::{Store, StoreObject, identity},
};

pub fn sample_foo(name: &str, replicas: i32, enable_service: bool, enable_ingress: bool) -> Foo {
    let mut foo = Foo::new(
        name,
        FooSpec {
            replicas,
            image: "nginx:1.27".to_string(),
            port: 8080,
            enable_service,
            enable_ingress,
            host: None,
            path: "/".to_string(),
            ingress_class_name: None,
        },
    );
    foo.metadata.namespace = Some("default".to_string());
    foo.metadata.uid = Some(format!("uid-{name}"));
    foo.metadata.labels = Some(
        [
            (PUBLIC_LABEL_KEY.to_string(), "kubebuilder-demo".to_string()),
            (PRIVATE_LABEL_KEY.to_string(), "alice".to_string()),
        ]
        .into(),
    );
    foo
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Update,
    UpdateStatus,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    pub verb: Verb,
    pub kind: String,
    pub name: String,
}

pub fn write(verb: Verb, kind: &str, name: &str) -> Write {
    Write {
        verb,
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

type Key = (String, String, String);

/// Object store with API-server-like write semantics: resource versions are
/// bumped on every write and checked on update, spec updates leave status alone.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<Key, Value>>,
    writes: Mutex<Vec<Write>>,
    failures: Mutex<Vec<(Verb, String)>>,
    races: Mutex<Vec<(Verb, String)>>,
    version: AtomicU64,
}

fn key<K: StoreObject>(namespace: &str, name: &str) -> Key {
    (K::kind(&()).to_string(), namespace.to_string(), name.to_string())
}

impl MemoryStore {
    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Store an object as if written by another actor, without recording a write
    pub fn insert<K: StoreObject>(&self, mut object: K) -> K {
        let (namespace, name) = identity(&object).unwrap();
        object.meta_mut().resource_version = Some(self.next_version());
        if object.meta().uid.is_none() {
            object.meta_mut().uid = Some(format!("uid-{}-{name}", K::kind(&())));
        }
        self.objects.lock().unwrap().insert(
            key::<K>(&namespace, &name),
            serde_json::to_value(&object).unwrap(),
        );
        object
    }

    /// Change a stored object as another actor would, without recording a write
    pub fn modify<K: StoreObject>(&self, namespace: &str, name: &str, change: impl FnOnce(&mut K)) {
        let mut object = self.object::<K>(namespace, name).unwrap();
        change(&mut object);
        self.insert(object);
    }

    pub fn object<K: StoreObject>(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&key::<K>(namespace, name))
            .map(|value| serde_json::from_value(value.clone()).unwrap())
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    /// Make the next `verb` on `kind` time out
    pub fn fail_on(&self, verb: Verb, kind: &str) {
        self.failures.lock().unwrap().push((verb, kind.to_string()));
    }

    /// Make the next `verb` on `kind` lose a race against another writer:
    /// creates find the object already present, deletes find it already gone.
    pub fn race_on(&self, verb: Verb, kind: &str) {
        self.races.lock().unwrap().push((verb, kind.to_string()));
    }

    fn take(list: &Mutex<Vec<(Verb, String)>>, verb: Verb, kind: &str) -> bool {
        let mut list = list.lock().unwrap();
        match list.iter().position(|(v, k)| *v == verb && k == kind) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    fn begin<K: StoreObject>(&self, verb: Verb, object: &K) -> Result<Key> {
        let (namespace, name) = identity(object)?;
        let kind = K::kind(&()).to_string();
        if Self::take(&self.failures, verb, &kind) {
            return Err(Error::Timeout {
                verb: "write",
                kind,
                namespace,
                name,
            });
        }
        Ok(key::<K>(&namespace, &name))
    }

    fn record(&self, verb: Verb, (kind, _, name): &Key) {
        self.writes.lock().unwrap().push(Write {
            verb,
            kind: kind.clone(),
            name: name.clone(),
        });
    }

    fn check_version<K: StoreObject>(&self, object: &K, stored: &Value) -> Result<()> {
        let stored_version = stored["metadata"]["resourceVersion"].as_str();
        match object.resource_version() {
            Some(version) if Some(version.as_str()) != stored_version => {
                let (namespace, name) = identity(object)?;
                Err(Error::Conflict {
                    kind: K::kind(&()).to_string(),
                    namespace,
                    name,
                })
            }
            _ => Ok(()),
        }
    }
}

fn not_found((kind, namespace, name): Key) -> Error {
    Error::NotFound {
        kind,
        namespace,
        name,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        Ok(self.object(namespace, name))
    }

    async fn create<K: StoreObject>(&self, object: &K) -> Result<()> {
        let key = self.begin(Verb::Create, object)?;
        if Self::take(&self.races, Verb::Create, &key.0) {
            self.insert(object.clone());
        }
        if self.objects.lock().unwrap().contains_key(&key) {
            let (kind, namespace, name) = key;
            return Err(Error::AlreadyExists {
                kind,
                namespace,
                name,
            });
        }

        let mut object = object.clone();
        object.meta_mut().uid = None;
        self.insert(object);
        self.record(Verb::Create, &key);
        Ok(())
    }

    async fn update<K: StoreObject>(&self, object: &K) -> Result<()> {
        let key = self.begin(Verb::Update, object)?;
        let Some(stored) = self.objects.lock().unwrap().get(&key).cloned() else {
            return Err(not_found(key));
        };
        self.check_version(object, &stored)?;

        let mut value = serde_json::to_value(object)?;
        value["metadata"]["uid"] = stored["metadata"]["uid"].clone();
        value["metadata"]["resourceVersion"] = Value::String(self.next_version());
        match stored.get("status") {
            Some(status) => value["status"] = status.clone(),
            None => {
                if let Some(fields) = value.as_object_mut() {
                    fields.remove("status");
                }
            }
        }

        self.objects.lock().unwrap().insert(key.clone(), value);
        self.record(Verb::Update, &key);
        Ok(())
    }

    async fn update_status<K: StoreObject>(&self, object: &K) -> Result<()> {
        let key = self.begin(Verb::UpdateStatus, object)?;
        let Some(mut stored) = self.objects.lock().unwrap().get(&key).cloned() else {
            return Err(not_found(key));
        };
        self.check_version(object, &stored)?;

        let value = serde_json::to_value(object)?;
        stored["status"] = value.get("status").cloned().unwrap_or(Value::Null);
        stored["metadata"]["resourceVersion"] = Value::String(self.next_version());

        self.objects.lock().unwrap().insert(key.clone(), stored);
        self.record(Verb::UpdateStatus, &key);
        Ok(())
    }

    async fn delete<K: StoreObject>(&self, object: &K) -> Result<()> {
        let key = self.begin(Verb::Delete, object)?;
        if Self::take(&self.races, Verb::Delete, &key.0) {
            self.objects.lock().unwrap().remove(&key);
        }
        let Some(stored) = self.objects.lock().unwrap().get(&key).cloned() else {
            return Err(not_found(key));
        };
        if object.uid().as_deref() != stored["metadata"]["uid"].as_str() {
            let (kind, namespace, name) = key;
            return Err(Error::Conflict {
                kind,
                namespace,
                name,
            });
        }

        self.objects.lock().unwrap().remove(&key);
        self.record(Verb::Delete, &key);
        Ok(())
    }
}

/// Pretend the deployment controller observed `available` ready pods
pub fn set_available(store: &MemoryStore, name: &str, available: i32) {
    store.modify::<Deployment>("default", name, |deployment| {
        deployment.status = Some(DeploymentStatus {
            available_replicas: Some(available),
            ..Default::default()
        });
    });
}
