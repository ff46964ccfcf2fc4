//! Local single-process simulation of a full MPSS deployment.
//!
//! Brings the board and every configured node up inside one process, runs
//! the configured number of re-sharing epochs and exits once every node
//! finished. Handy for trying a config out and for profiling without a
//! cluster. The board's suicide option is disabled; the simulation tears
//! everything down itself.

use std::process::ExitCode;

use clap::Parser;
use eyre::Context as _;
use mpss_common::{cli::CommonOpts, config::SystemConfig};
use mpss_types::Epoch;
use tokio_util::sync::CancellationToken;

/// Local MPSS protocol simulation.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct SimOpts {
    #[clap(flatten)]
    common: CommonOpts,
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    let opts = SimOpts::parse();
    mpss_common::telemetry::init_tracing(
        "mpss-sim",
        &opts.common.logdir,
        opts.common.verbose,
        opts.common.debug,
    )?;

    tracing::info!("using config file {}", opts.common.config.display());
    let config =
        SystemConfig::from_path(&opts.common.config).context("while loading the system config")?;

    let cancellation_token: CancellationToken = mpss_common::shutdown::spawn_shutdown_task();

    // The board comes up first so the bootstrap shares have somewhere to go.
    let board_listener = mpss_common::net::bind_serve_addr(&config.primary.url).await?;
    let board = mpss_board::start(mpss_board::BoardArgs {
        config: config.clone(),
        listener: board_listener,
        allow_suicide: false,
        cancellation_token: cancellation_token.clone(),
    })
    .await?;

    let labels: Vec<String> = config.peers.keys().cloned().collect();
    let mut nodes = Vec::with_capacity(labels.len());
    for label in labels {
        let listener = mpss_common::net::bind_serve_addr(&config.peers[&label].url).await?;
        tracing::info!(%label, "starting node");
        let running = mpss_node::start(mpss_node::NodeArgs {
            config: config.clone(),
            label: label.clone(),
            max_epoch: Epoch(opts.common.round),
            listener,
            cancellation_token: cancellation_token.clone(),
        })
        .await?;
        nodes.push((label, running));
    }

    let mut failed = false;
    let mut servers = Vec::with_capacity(nodes.len());
    for (label, running) in nodes {
        match running.protocol.await {
            Ok(Ok(())) => tracing::info!(%label, "node finished"),
            Ok(Err(err)) => {
                failed = true;
                tracing::error!(%label, "node failed: {err:?}");
            }
            Err(err) => {
                failed = true;
                tracing::error!(%label, "node task panicked: {err:?}");
            }
        }
        servers.push(running.server);
    }

    cancellation_token.cancel();
    for server in servers {
        let _ = server.await;
    }
    let _ = board.board.await;
    let _ = board.server.await;

    if failed {
        Ok(ExitCode::FAILURE)
    } else {
        tracing::info!("good night!");
        Ok(ExitCode::SUCCESS)
    }
}
