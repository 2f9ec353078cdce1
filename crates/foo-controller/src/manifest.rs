use std::collections::BTreeMap;

use garde::Validate;
use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
        },
        networking::v1::{
            HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
            IngressServiceBackend, IngressSpec, ServiceBackendPort,
        },
    },
    apimachinery::pkg::{apis::meta::v1::LabelSelector, util::intstr::IntOrString},
};
use kube::api::ObjectMeta;

use crate::{
    Error, Result,
    api::Foo,
    filter::{PRIVATE_LABEL_KEY, PUBLIC_LABEL_KEY},
    store::identity,
};

const PORT_NAME: &str = "http";

fn validated(foo: &Foo) -> Result<(String, String)> {
    foo.spec
        .validate()
        .map_err(|report| Error::InvalidSpec(report.to_string()))?;
    identity(foo)
}

fn selector_labels(name: &str) -> BTreeMap<String, String> {
    [("app".to_string(), name.to_string())].into()
}

/// Children carry the opt-in labels of their Foo so the owned-object watches
/// can be scoped with the same selector as the Foo watch.
fn child_metadata(foo: &Foo, namespace: &str, name: &str) -> ObjectMeta {
    let mut labels = selector_labels(name);
    if let Some(foo_labels) = foo.metadata.labels.as_ref() {
        for key in [PUBLIC_LABEL_KEY, PRIVATE_LABEL_KEY] {
            if let Some(value) = foo_labels.get(key) {
                labels.insert(key.to_string(), value.clone());
            }
        }
    }

    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels),
        ..Default::default()
    }
}

pub fn build_deployment(foo: &Foo) -> Result<Deployment> {
    let (namespace, name) = validated(foo)?;

    Ok(Deployment {
        metadata: child_metadata(foo, &namespace, &name),
        spec: Some(DeploymentSpec {
            replicas: Some(foo.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels(&name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(selector_labels(&name)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: name.clone(),
                        image: Some(foo.spec.image.clone()),
                        ports: Some(vec![ContainerPort {
                            name: Some(PORT_NAME.to_string()),
                            container_port: foo.spec.port,
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn build_service(foo: &Foo) -> Result<Service> {
    let (namespace, name) = validated(foo)?;

    Ok(Service {
        metadata: child_metadata(foo, &namespace, &name),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(&name)),
            ports: Some(vec![ServicePort {
                name: Some(PORT_NAME.to_string()),
                port: foo.spec.port,
                target_port: Some(IntOrString::Int(foo.spec.port)),
                ..Default::default()
            }]),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn build_ingress(foo: &Foo) -> Result<Ingress> {
    let (namespace, name) = validated(foo)?;

    Ok(Ingress {
        metadata: child_metadata(foo, &namespace, &name),
        spec: Some(IngressSpec {
            ingress_class_name: foo.spec.ingress_class_name.clone(),
            rules: Some(vec![IngressRule {
                host: foo.spec.host.clone(),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(foo.spec.path.clone()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: name.clone(),
                                port: Some(ServiceBackendPort {
                                    number: Some(foo.spec.port),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}
