use k8s_openapi::api::networking::v1::{Ingress, IngressRule};
use tracing::{Level, instrument};

use crate::{
    Result,
    api::Foo,
    manifest::build_ingress,
    reconcilers::{attach_owner, create_child, delete_child, replace_child},
    store::{Store, identity},
};

fn rules(ingress: &Ingress) -> &[IngressRule] {
    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.rules.as_deref())
        .unwrap_or_default()
}

#[instrument(level = Level::DEBUG, skip_all)]
pub async fn sync<S: Store>(store: &S, foo: &Foo) -> Result<()> {
    let (namespace, name) = identity(foo)?;
    let current = store.get::<Ingress>(&namespace, &name).await?;
    let desired = attach_owner(foo, build_ingress(foo)?)?;

    match (current, foo.spec.enable_ingress) {
        (None, true) => create_child(store, &desired).await,
        (None, false) => Ok(()),
        (Some(current), false) => delete_child(store, foo, &current).await,
        (Some(current), true) => {
            if rules(&current) != rules(&desired) {
                replace_child(store, foo, &current, desired).await?;
            }
            Ok(())
        }
    }
}
