use tracing::info;

use crate::cluster::WorkloadApi;
use crate::config::ReconcilerConfig;
use crate::error::UpdateError;
use crate::workload::WorkloadSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScaleOutcome {
    Scaled,
    /// dry run, nothing was sent
    Skipped,
}

/// Set the desired replicas of `workload` to the configured target, using the
/// snapshot's version token so a concurrent edit wins over us.
pub(crate) async fn scale_to_zero(
    api: &dyn WorkloadApi,
    workload: &WorkloadSnapshot,
    config: &ReconcilerConfig,
) -> Result<ScaleOutcome, UpdateError> {
    if config.dry_run {
        info!(
            namespace = %workload.namespace,
            name = %workload.name,
            replicas = workload.replicas,
            "dry run, would scale down"
        );
        return Ok(ScaleOutcome::Skipped);
    }

    info!(
        namespace = %workload.namespace,
        name = %workload.name,
        from = workload.replicas,
        to = config.target_replicas,
        "scaling down"
    );
    api.set_replicas(workload, config.target_replicas).await?;
    Ok(ScaleOutcome::Scaled)
}
