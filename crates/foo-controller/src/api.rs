use garde::Validate;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, Validate, JsonSchema)]
#[kube(group = "myapp.my.domain", version = "v1", kind = "Foo", namespaced)]
#[kube(status = "FooStatus")]
#[serde(rename_all = "camelCase")]
pub struct FooSpec {
    /// Desired number of pods in the managed deployment
    #[garde(range(min = 0))]
    pub replicas: i32,
    #[garde(length(min = 1))]
    pub image: String,
    /// Container port, also used as the service port and target port
    #[garde(range(min = 1, max = 65535))]
    #[serde(default = "default_port")]
    pub port: i32,
    #[garde(skip)]
    #[serde(default)]
    pub enable_service: bool,
    #[garde(skip)]
    #[serde(default)]
    pub enable_ingress: bool,
    #[garde(skip)]
    pub host: Option<String>,
    #[garde(prefix("/"))]
    #[serde(default = "default_path")]
    pub path: String,
    #[garde(skip)]
    pub ingress_class_name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FooStatus {
    #[serde(default)]
    pub available_replicas: i32,
}

fn default_port() -> i32 {
    8080
}

fn default_path() -> String {
    "/".to_string()
}

impl Foo {
    /// Available replicas as last recorded in status, zero when no status was written yet
    pub fn available_replicas(&self) -> i32 {
        self.status
            .as_ref()
            .map(|status| status.available_replicas)
            .unwrap_or_default()
    }
}
