use tracing_subscriber::{fmt, EnvFilter};

/// Initialize `tracing` once. `RUST_LOG` wins; otherwise this crate logs at
/// info, or debug when `debug` is set, and everything else at info.
pub(crate) fn init(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,kube_shutdown_after={level}")));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
