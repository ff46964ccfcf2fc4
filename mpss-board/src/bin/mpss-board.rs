//! MPSS bulletin-board binary.
//!
//! Coordinates the re-sharing epochs: fixes the canonical digest set,
//! collects the fresh shares, logs the diagnostic secret recovery and
//! advances the epoch. Terminates cleanly once every node reported done.

use std::process::ExitCode;

use clap::Parser;
use eyre::Context as _;
use mpss_common::{cli::CommonOpts, config::SystemConfig};

/// Bulletin board (primary) of the MPSS protocol.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct BoardOpts {
    #[clap(flatten)]
    common: CommonOpts,
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    let opts = BoardOpts::parse();
    mpss_common::telemetry::init_tracing(
        "mpss-board",
        &opts.common.logdir,
        opts.common.verbose,
        opts.common.debug,
    )?;

    tracing::info!("using config file {}", opts.common.config.display());
    let config =
        SystemConfig::from_path(&opts.common.config).context("while loading the system config")?;

    let listener = mpss_common::net::bind_serve_addr(&config.primary.url).await?;
    let cancellation_token = mpss_common::shutdown::spawn_shutdown_task();

    let running = mpss_board::start(mpss_board::BoardArgs {
        config,
        listener,
        allow_suicide: true,
        cancellation_token: cancellation_token.clone(),
    })
    .await?;

    // The board loop runs until every node reported done (or a shutdown
    // signal arrives); both paths cancel the token.
    cancellation_token.cancelled().await;

    let _ = running.server.await;
    match running.board.await {
        Ok(Ok(())) => {
            tracing::info!("good night!");
            Ok(ExitCode::SUCCESS)
        }
        Ok(Err(err)) => {
            tracing::error!("board failed: {err:?}");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => {
            tracing::error!("board task panicked: {err:?}");
            Ok(ExitCode::FAILURE)
        }
    }
}
