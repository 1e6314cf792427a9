use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;

/// Replica count the API server assumes when `spec.replicas` is unset.
const DEFAULT_REPLICAS: i32 = 1;

/// What a single pass knows about one deployment. Never reused across passes:
/// every update must be issued against a freshly listed snapshot so that the
/// version token is current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WorkloadSnapshot {
    pub(crate) namespace: String,
    pub(crate) name: String,
    /// desired replicas, `spec.replicas`
    pub(crate) replicas: i32,
    pub(crate) annotations: BTreeMap<String, String>,
    /// the `resourceVersion` used for optimistic updates
    pub(crate) resource_version: Option<String>,
}

impl WorkloadSnapshot {
    /// Build a snapshot from a listed deployment, `None` if the object has no name.
    pub(crate) fn from_deployment(deploy: Deployment) -> Option<Self> {
        let meta = deploy.metadata;
        let name = meta.name?;
        let replicas = deploy
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(DEFAULT_REPLICAS);

        Some(Self {
            namespace: meta.namespace.unwrap_or_else(|| String::from("default")),
            name,
            replicas,
            annotations: meta.annotations.unwrap_or_default(),
            resource_version: meta.resource_version,
        })
    }

    pub(crate) fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

impl fmt::Display for WorkloadSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
