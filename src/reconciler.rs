use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cluster::WorkloadApi;
use crate::config::ReconcilerConfig;
use crate::error::FetchError;
use crate::executor::{scale_to_zero, ScaleOutcome};
use crate::predicate::{should_scale, Verdict};

/// Counters for one pass, logged once the pass is over.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PassReport {
    pub(crate) inspected: usize,
    pub(crate) unannotated: usize,
    pub(crate) invalid: usize,
    pub(crate) already_scaled: usize,
    pub(crate) not_due: usize,
    pub(crate) scaled: usize,
    pub(crate) dry_run: usize,
    pub(crate) failed: usize,
}

/// Periodically lists every workload and scales down the ones whose
/// shutdown minute has come.
pub(crate) struct Reconciler {
    api: Arc<dyn WorkloadApi>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub(crate) fn new(api: Arc<dyn WorkloadApi>, config: ReconcilerConfig) -> Self {
        Self { api, config }
    }

    /// Run passes until `shutdown` flips to true or its sender goes away.
    /// A failed listing ends the loop with the error.
    pub(crate) async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), FetchError> {
        let mut tick = interval(self.config.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            annotation = %self.config.annotation_key,
            interval = ?self.config.interval,
            dry_run = self.config.dry_run,
            "starting reconciler"
        );
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let report = self.run_once(Utc::now()).await?;
                    info!(
                        inspected = report.inspected,
                        unannotated = report.unannotated,
                        invalid = report.invalid,
                        already_scaled = report.already_scaled,
                        not_due = report.not_due,
                        scaled = report.scaled,
                        dry_run = report.dry_run,
                        failed = report.failed,
                        "pass finished"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("reconciler stopping");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// One pass over the cluster as seen at `now`. Per-workload failures are
    /// counted and logged, only the listing itself can fail the pass.
    pub(crate) async fn run_once(&self, now: DateTime<Utc>) -> Result<PassReport, FetchError> {
        let workloads = self.api.list_all().await?;
        let key = self.config.annotation_key.as_str();
        let mut report = PassReport::default();

        for workload in &workloads {
            report.inspected += 1;
            let (namespace, name) = (&workload.namespace, &workload.name);

            match should_scale(workload, key, self.config.target_replicas, now) {
                Verdict::Unannotated => {
                    report.unannotated += 1;
                    debug!(%namespace, %name, "deployment is not annotated, ignoring");
                }
                Verdict::Invalid(err) => {
                    report.invalid += 1;
                    warn!(%namespace, %name, error = %err, "skipping deployment");
                }
                Verdict::AlreadyScaled => {
                    report.already_scaled += 1;
                    debug!(%namespace, %name, replicas = workload.replicas, "already scaled down");
                }
                Verdict::NotDue(schedule, decision) => {
                    report.not_due += 1;
                    debug!(%namespace, %name, %schedule, now = %decision, "not due");
                }
                Verdict::Due(schedule, decision) => {
                    debug!(
                        %namespace,
                        %name,
                        %schedule,
                        now = %decision,
                        at = %decision.evaluated_at,
                        "due"
                    );
                    match scale_to_zero(self.api.as_ref(), workload, &self.config).await {
                        Ok(ScaleOutcome::Scaled) => report.scaled += 1,
                        Ok(ScaleOutcome::Skipped) => report.dry_run += 1,
                        Err(err) if err.is_conflict() => {
                            report.failed += 1;
                            info!(%namespace, %name, "changed since listed, retrying next pass");
                        }
                        Err(err) => {
                            report.failed += 1;
                            warn!(%namespace, %name, error = %err, "failed to scale down");
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{Local, TimeZone};

    use super::*;
    use crate::cluster::fake::FakeCluster;

    fn local(h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2024, 3, 5, h, mi, s)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn reconciler(cluster: &Arc<FakeCluster>) -> Reconciler {
        Reconciler::new(cluster.clone(), ReconcilerConfig::default())
    }

    #[tokio::test]
    async fn scales_due_workload() {
        let cluster = Arc::new(FakeCluster::with(&[("web", 3, Some("18:30"))]));
        let report = reconciler(&cluster).run_once(local(18, 30, 0)).await.unwrap();

        assert_eq!(report.scaled, 1);
        assert_eq!(cluster.replicas("web"), 0);
        assert_eq!(cluster.updates(), vec![("web".to_string(), 0)]);
    }

    #[tokio::test]
    async fn leaves_workload_alone_a_minute_later() {
        let cluster = Arc::new(FakeCluster::with(&[("web", 3, Some("18:30"))]));
        let report = reconciler(&cluster).run_once(local(18, 31, 0)).await.unwrap();

        assert_eq!(report.not_due, 1);
        assert!(cluster.updates().is_empty());
        assert_eq!(cluster.replicas("web"), 3);
    }

    #[tokio::test]
    async fn bad_annotation_does_not_stop_the_pass() {
        let cluster = Arc::new(FakeCluster::with(&[
            ("broken", 2, Some("bad-value")),
            ("plain", 2, None),
            ("web", 3, Some("18:30")),
        ]));
        let report = reconciler(&cluster).run_once(local(18, 30, 10)).await.unwrap();

        assert_eq!(report.inspected, 3);
        assert_eq!(report.invalid, 1);
        assert_eq!(report.unannotated, 1);
        assert_eq!(report.scaled, 1);
        assert_eq!(cluster.replicas("broken"), 2);
        assert_eq!(cluster.replicas("web"), 0);
    }

    #[tokio::test]
    async fn repeated_passes_in_the_same_minute_scale_once() {
        let cluster = Arc::new(FakeCluster::with(&[("web", 3, Some("18:30"))]));
        let reconciler = reconciler(&cluster);

        for secs in [0, 10, 20, 30, 40, 50] {
            reconciler.run_once(local(18, 30, secs)).await.unwrap();
        }
        assert_eq!(cluster.updates().len(), 1);

        // scaled back up by someone else: eligible again the next day
        cluster.scale("web", 2);
        let report = reconciler.run_once(local(18, 30, 0)).await.unwrap();
        assert_eq!(report.scaled, 1);
        assert_eq!(cluster.updates().len(), 2);
    }

    #[tokio::test]
    async fn zero_replicas_never_reach_the_executor() {
        let cluster = Arc::new(FakeCluster::with(&[("idle", 0, Some("18:30"))]));
        let reconciler = reconciler(&cluster);

        for minute in 28..33 {
            let report = reconciler.run_once(local(18, minute, 0)).await.unwrap();
            assert_eq!(report.already_scaled, 1);
        }
        assert!(cluster.updates().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_is_fatal_and_mutates_nothing() {
        let cluster = Arc::new(FakeCluster::with(&[("web", 3, Some("18:30"))]));
        cluster.fail_list();

        let err = reconciler(&cluster).run_once(local(18, 30, 0)).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to list deployments"));
        assert!(cluster.updates().is_empty());
    }

    #[tokio::test]
    async fn conflict_is_retried_on_next_pass() {
        let cluster = Arc::new(FakeCluster::with(&[
            ("web", 3, Some("18:30")),
            ("api", 2, Some("18:30")),
        ]));
        cluster.conflict_once("web");
        let reconciler = reconciler(&cluster);

        let first = reconciler.run_once(local(18, 30, 0)).await.unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(first.scaled, 1);
        assert_eq!(cluster.replicas("web"), 3);
        assert_eq!(cluster.replicas("api"), 0);

        let second = reconciler.run_once(local(18, 30, 10)).await.unwrap();
        assert_eq!(second.scaled, 1);
        assert_eq!(second.failed, 0);
        assert_eq!(cluster.replicas("web"), 0);
    }

    #[tokio::test]
    async fn update_failure_is_isolated() {
        let cluster = Arc::new(FakeCluster::with(&[
            ("web", 3, Some("18:30")),
            ("api", 2, Some("18:30")),
        ]));
        cluster.break_updates("web");

        let report = reconciler(&cluster).run_once(local(18, 30, 0)).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.scaled, 1);
        assert_eq!(cluster.replicas("api"), 0);
    }

    #[tokio::test]
    async fn workload_without_version_is_not_updated() {
        let cluster = Arc::new(FakeCluster::with(&[
            ("web", 3, Some("18:30")),
            ("api", 2, Some("18:30")),
        ]));
        cluster.forget_version("web");

        let report = reconciler(&cluster).run_once(local(18, 30, 0)).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.scaled, 1);
        assert_eq!(cluster.replicas("web"), 3);
        assert_eq!(cluster.updates(), vec![("api".to_string(), 0)]);
    }

    #[tokio::test]
    async fn dry_run_counts_but_does_not_scale() {
        let cluster = Arc::new(FakeCluster::with(&[("web", 3, Some("18:30"))]));
        let config = ReconcilerConfig {
            dry_run: true,
            ..Default::default()
        };

        let report = Reconciler::new(cluster.clone(), config)
            .run_once(local(18, 30, 0))
            .await
            .unwrap();
        assert_eq!(report.dry_run, 1);
        assert_eq!(cluster.replicas("web"), 3);
    }

    #[tokio::test]
    async fn custom_annotation_key() {
        let cluster = Arc::new(FakeCluster::with(&[("web", 3, Some("18:30"))]));
        let config = ReconcilerConfig {
            annotation_key: "example.com/stop-at".to_string(),
            ..Default::default()
        };

        let report = Reconciler::new(cluster.clone(), config)
            .run_once(local(18, 30, 0))
            .await
            .unwrap();
        assert_eq!(report.unannotated, 1);
        assert!(cluster.updates().is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let cluster = Arc::new(FakeCluster::with(&[("web", 3, None)]));
        let reconciler = reconciler(&cluster);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { reconciler.run(rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        handle.await.unwrap().unwrap();
        assert!(cluster.list_calls() >= 1);
    }

    #[tokio::test]
    async fn run_ends_with_fetch_error() {
        let cluster = Arc::new(FakeCluster::default());
        cluster.fail_list();
        let (_tx, rx) = watch::channel(false);

        assert!(reconciler(&cluster).run(rx).await.is_err());
        assert_eq!(cluster.list_calls(), 1);
    }
}
