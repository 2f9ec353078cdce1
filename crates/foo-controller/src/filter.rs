use std::collections::{HashMap, HashSet};

use futures::{Stream, StreamExt, future};
use kube::{
    api::ObjectMeta,
    runtime::{reflector::ObjectRef, watcher},
};

use crate::api::Foo;

/// Public opt-in label; its value must match the configured one.
pub const PUBLIC_LABEL_KEY: &str = "myapp.my.domain/use-for";

/// Private opt-in label naming the managing tenant; only its presence is checked.
pub const PRIVATE_LABEL_KEY: &str = "myapp.my.domain/manager-by";

/// Scopes the controller to objects that opted in through labels
#[derive(Debug, Clone)]
pub struct LabelGate {
    public_value: String,
}

impl LabelGate {
    pub fn new(public_value: impl Into<String>) -> Self {
        Self {
            public_value: public_value.into(),
        }
    }

    pub fn admits(&self, meta: &ObjectMeta) -> bool {
        let Some(labels) = meta.labels.as_ref() else {
            return false;
        };
        labels.get(PUBLIC_LABEL_KEY) == Some(&self.public_value)
            && labels.contains_key(PRIVATE_LABEL_KEY)
    }

    /// Equivalent label selector, for scoping API watches
    pub fn selector(&self) -> String {
        format!(
            "{PUBLIC_LABEL_KEY}={},{PRIVATE_LABEL_KEY}",
            self.public_value
        )
    }
}

/// A change notification for a Foo
#[derive(Debug, Clone)]
pub enum FooEvent {
    Create(Foo),
    Update { old: Foo, new: Foo },
    Delete(Foo),
    Generic(Foo),
}

impl FooEvent {
    /// The object as it is after the event
    pub fn object(&self) -> &Foo {
        match self {
            FooEvent::Create(foo) | FooEvent::Delete(foo) | FooEvent::Generic(foo) => foo,
            FooEvent::Update { new, .. } => new,
        }
    }

    pub fn into_object(self) -> Foo {
        match self {
            FooEvent::Create(foo) | FooEvent::Delete(foo) | FooEvent::Generic(foo) => foo,
            FooEvent::Update { new, .. } => new,
        }
    }
}

/// Decides whether an event changes anything worth reconciling.
///
/// Deletions are left to owner-reference garbage collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeGate;

impl ChangeGate {
    pub fn admits(&self, event: &FooEvent) -> bool {
        match event {
            FooEvent::Create(_) => true,
            FooEvent::Update { old, new } => foo_differs(old, new),
            FooEvent::Delete(_) | FooEvent::Generic(_) => false,
        }
    }
}

/// Structural inequality over every part of a Foo
pub fn foo_differs(old: &Foo, new: &Foo) -> bool {
    old.metadata != new.metadata || old.spec != new.spec || old.status != new.status
}

/// Both admission gates; a notification must pass each of them
#[derive(Debug, Clone)]
pub struct EventFilter {
    labels: LabelGate,
    changes: ChangeGate,
}

impl EventFilter {
    pub fn new(labels: LabelGate) -> Self {
        Self {
            labels,
            changes: ChangeGate,
        }
    }

    pub fn labels(&self) -> &LabelGate {
        &self.labels
    }

    pub fn admits(&self, event: &FooEvent) -> bool {
        let admitted =
            self.labels.admits(&event.object().metadata) && self.changes.admits(event);
        if !admitted {
            tracing::trace!(
                name = event.object().metadata.name.as_deref(),
                namespace = event.object().metadata.namespace.as_deref(),
                "Dropping Foo notification"
            );
        }
        admitted
    }
}

/// Turns a raw watch stream into create/update/delete notifications by
/// remembering the last observed value of every Foo.
#[derive(Debug, Default)]
pub struct EventClassifier {
    seen: HashMap<ObjectRef<Foo>, Foo>,
    relisted: Option<HashSet<ObjectRef<Foo>>>,
}

impl EventClassifier {
    pub fn classify(&mut self, event: watcher::Event<Foo>) -> Option<FooEvent> {
        match event {
            watcher::Event::Init => {
                self.relisted = Some(HashSet::new());
                None
            }
            watcher::Event::InitApply(foo) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(ObjectRef::from_obj(&foo));
                }
                Some(self.apply(foo))
            }
            watcher::Event::InitDone => {
                // objects missing from a relist were deleted while the watch was down
                if let Some(relisted) = self.relisted.take() {
                    self.seen.retain(|key, _| relisted.contains(key));
                }
                None
            }
            watcher::Event::Apply(foo) => Some(self.apply(foo)),
            watcher::Event::Delete(foo) => {
                self.seen.remove(&ObjectRef::from_obj(&foo));
                Some(FooEvent::Delete(foo))
            }
        }
    }

    fn apply(&mut self, foo: Foo) -> FooEvent {
        match self.seen.insert(ObjectRef::from_obj(&foo), foo.clone()) {
            Some(old) => FooEvent::Update { old, new: foo },
            None => FooEvent::Create(foo),
        }
    }
}

/// Classify a Foo watch stream and keep only the objects the filter admits
pub fn filter_events<S>(
    events: S,
    filter: EventFilter,
) -> impl Stream<Item = Result<Foo, watcher::Error>> + Send + 'static
where
    S: Stream<Item = Result<watcher::Event<Foo>, watcher::Error>> + Send + 'static,
{
    let mut classifier = EventClassifier::default();
    events.filter_map(move |event| {
        let admitted = match event {
            Ok(event) => classifier
                .classify(event)
                .filter(|event| filter.admits(event))
                .map(|event| Ok(event.into_object())),
            Err(e) => Some(Err(e)),
        };
        future::ready(admitted)
    })
}
