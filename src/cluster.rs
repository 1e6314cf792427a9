use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::serde_json::{json, Value};
use kube::{
    api::{Api, ListParams, Patch, PatchParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};

use crate::error::{FetchError, UpdateError};
use crate::workload::WorkloadSnapshot;

/// The two cluster calls the reconciler needs.
#[async_trait]
pub(crate) trait WorkloadApi: Send + Sync {
    /// List every workload across all namespaces.
    async fn list_all(&self) -> Result<Vec<WorkloadSnapshot>, FetchError>;

    /// Set the desired replica count, failing with `UpdateError::Conflict`
    /// if the object changed since `workload` was listed.
    async fn set_replicas(
        &self,
        workload: &WorkloadSnapshot,
        replicas: i32,
    ) -> Result<(), UpdateError>;
}

/// Build a client from an explicit kubeconfig, or fall back to the in-cluster
/// service account / the default kubeconfig lookup.
pub(crate) async fn client(
    kubeconfig: Option<&Path>,
    context: Option<&str>,
) -> Result<Client> {
    let Some(path) = kubeconfig else {
        return Ok(Client::try_default().await?);
    };

    let kubeconfig = Kubeconfig::read_from(path)?;
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
    Ok(Client::try_from(config)?)
}

/// `WorkloadApi` over the apps/v1 Deployment endpoints.
#[derive(Clone)]
pub(crate) struct DeploymentApi {
    client: Client,
}

impl DeploymentApi {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorkloadApi for DeploymentApi {
    async fn list_all(&self) -> Result<Vec<WorkloadSnapshot>, FetchError> {
        let deploys: Api<Deployment> = Api::all(self.client.clone());
        let list = deploys.list(&ListParams::default()).await?;
        Ok(list
            .into_iter()
            .filter_map(WorkloadSnapshot::from_deployment)
            .collect())
    }

    async fn set_replicas(
        &self,
        workload: &WorkloadSnapshot,
        replicas: i32,
    ) -> Result<(), UpdateError> {
        let patch = scale_patch(workload, replicas)?;
        let deploys: Api<Deployment> = Api::namespaced(self.client.clone(), &workload.namespace);
        deploys
            .patch(&workload.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|err| UpdateError::from_kube(&workload.namespace, &workload.name, err))?;
        Ok(())
    }
}

/// Merge patch setting `spec.replicas`. It carries the snapshot's
/// resourceVersion, so the API server rejects it with 409 when the object has
/// moved on since it was listed.
pub(crate) fn scale_patch(
    workload: &WorkloadSnapshot,
    replicas: i32,
) -> Result<Value, UpdateError> {
    let version = workload
        .resource_version
        .as_deref()
        .ok_or_else(|| UpdateError::MissingVersion {
            namespace: workload.namespace.clone(),
            name: workload.name.clone(),
        })?;
    Ok(json!({
        "metadata": { "resourceVersion": version },
        "spec": { "replicas": replicas },
    }))
}
