//! MPSS node binary.
//!
//! Loads the system config, binds the serve socket, submits the bootstrap
//! share and runs the configured number of re-sharing epochs. Exits 0 on a
//! clean run and nonzero on any fatal protocol or transport error.

use std::process::ExitCode;

use clap::Parser;
use eyre::Context as _;
use mpss_common::{cli::CommonOpts, config::SystemConfig};
use mpss_types::Epoch;

/// Share-holding node of the MPSS protocol.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct NodeOpts {
    #[clap(flatten)]
    common: CommonOpts,

    /// Config label identifying this node (e.g. `node_1`).
    #[clap(long, env = "MPSS_NODE_ID")]
    id: String,
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    let opts = NodeOpts::parse();
    mpss_common::telemetry::init_tracing(
        &format!("mpss-node-{}", opts.id),
        &opts.common.logdir,
        opts.common.verbose,
        opts.common.debug,
    )?;

    tracing::info!("using config file {}", opts.common.config.display());
    let config =
        SystemConfig::from_path(&opts.common.config).context("while loading the system config")?;
    let me = config.peer(&opts.id)?.clone();
    tracing::info!("starting node {}", me.id);

    let listener = mpss_common::net::bind_serve_addr(&me.url).await?;
    let cancellation_token = mpss_common::shutdown::spawn_shutdown_task();

    let running = mpss_node::start(mpss_node::NodeArgs {
        config,
        label: opts.id.clone(),
        max_epoch: Epoch(opts.common.round),
        listener,
        cancellation_token: cancellation_token.clone(),
    })
    .await?;

    let result = tokio::select! {
        res = running.protocol => res,
        () = cancellation_token.cancelled() => {
            tracing::warn!("shutdown requested before the protocol finished");
            let _ = running.server.await;
            return Ok(ExitCode::FAILURE);
        }
    };

    cancellation_token.cancel();
    let _ = running.server.await;

    match result {
        Ok(Ok(())) => {
            tracing::info!("good night!");
            Ok(ExitCode::SUCCESS)
        }
        Ok(Err(err)) => {
            tracing::error!("node failed: {err:?}");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => {
            tracing::error!("protocol task panicked: {err:?}");
            Ok(ExitCode::FAILURE)
        }
    }
}
