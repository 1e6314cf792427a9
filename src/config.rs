use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

pub(crate) const DEFAULT_ANNOTATION: &str = "shutdown-after";

/// Scale annotated deployments down to zero at a given time of day.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Args {
    /// absolute path to the kubeconfig file, in-cluster config is used when unset
    #[arg(long, env = "SHUTDOWN_AFTER_KUBECONFIG")]
    pub(crate) kubeconfig: Option<PathBuf>,

    /// the kubeconfig context to use, only meaningful with --kubeconfig
    #[arg(long, env = "SHUTDOWN_AFTER_CONTEXT")]
    pub(crate) context: Option<String>,

    /// enable debug logs
    #[arg(long, default_value_t = false, env = "SHUTDOWN_AFTER_DEBUG")]
    pub(crate) debug: bool,

    /// seconds between two passes over the cluster
    #[arg(
        long,
        default_value_t = 10,
        env = "SHUTDOWN_AFTER_INTERVAL_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub(crate) interval_secs: u64,

    /// the annotation holding the shutdown time, e.g. `18:30` or `18:30 -07`
    #[arg(long, default_value_t = String::from(DEFAULT_ANNOTATION), env = "SHUTDOWN_AFTER_ANNOTATION")]
    pub(crate) annotation: String,

    /// if set, due deployments are only logged, not scaled
    #[arg(long, default_value_t = false, env = "SHUTDOWN_AFTER_DRY_RUN")]
    pub(crate) dry_run: bool,
}

impl Args {
    pub(crate) fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            annotation_key: self.annotation.clone(),
            interval: Duration::from_secs(self.interval_secs),
            target_replicas: 0,
            dry_run: self.dry_run,
        }
    }
}

/// Everything the reconciler needs to know, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReconcilerConfig {
    pub(crate) annotation_key: String,
    pub(crate) interval: Duration,
    /// replica count a due workload is scaled to
    pub(crate) target_replicas: i32,
    pub(crate) dry_run: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            annotation_key: DEFAULT_ANNOTATION.to_string(),
            interval: Duration::from_secs(10),
            target_replicas: 0,
            dry_run: false,
        }
    }
}
