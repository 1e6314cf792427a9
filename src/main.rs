//! Scales annotated deployments down to zero replicas once their daily
//! shutdown time arrives.

mod cluster;
mod config;
mod error;
mod executor;
mod logx;
mod predicate;
mod reconciler;
mod schedule;
mod workload;

use std::future::Future;
use std::io;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use cluster::DeploymentApi;
use config::Args;
use reconciler::Reconciler;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logx::init(args.debug);

    let client = cluster::client(args.kubeconfig.as_deref(), args.context.as_deref()).await?;
    let reconciler = Reconciler::new(
        Arc::new(DeploymentApi::new(client)),
        args.reconciler_config(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_interrupt(tokio::signal::ctrl_c(), shutdown_tx));

    // a failed listing ends the process, the supervisor restarts it
    if let Err(err) = reconciler.run(shutdown_rx).await {
        error!(error = %err, "giving up");
        return Err(err.into());
    }
    Ok(())
}

/// Flip `shutdown` once `signal` resolves. If the signal cannot be listened
/// for, the sender is kept alive: the reconciler would read a dropped sender
/// as a request to stop.
async fn forward_interrupt<F>(signal: F, shutdown: watch::Sender<bool>)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("received interrupt");
            let _ = shutdown.send(true);
        }
        Err(err) => {
            error!(error = %err, "cannot listen for interrupts");
            std::future::pending::<()>().await;
        }
    }
}
