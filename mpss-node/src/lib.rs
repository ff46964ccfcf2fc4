#![deny(missing_docs)]
//! The MPSS node service.
//!
//! A node serves the HTTP API of [`api`], holds a Shamir share of the
//! protocol secret and runs the epoch loop of [`protocol`]: once per epoch
//! it deals a proposal, verifies and combines the proposals the board
//! fixed, hands a blinded re-share to every new-group member and
//! reconstructs its own fresh share from the re-shares addressed to it.
//!
//! [`start`] wires everything together for a single node: it spawns the
//! axum server on the provided listener, submits the bootstrap share for
//! epoch 0 and runs the protocol until the configured number of epochs is
//! done. Internal failures cancel nothing silently: the protocol task
//! resolves with the error and the hosting binary decides the exit code.

use std::collections::BTreeMap;

use eyre::Context as _;
use mpss_common::{bootstrap, clients::BoardClient, config::SystemConfig};
use mpss_core::NodeId;
use mpss_types::Epoch;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;

pub mod api;
mod benchmark;
pub mod protocol;

pub use api::NodeHandle;
pub use protocol::{Mailboxes, Node, ProtocolError};

/// Everything needed to bring one node up.
pub struct NodeArgs {
    /// The validated deployment config.
    pub config: SystemConfig,
    /// The config label of this node (e.g. `node_1`).
    pub label: String,
    /// How many re-sharing epochs to run.
    pub max_epoch: Epoch,
    /// The already-bound serve socket.
    pub listener: TcpListener,
    /// Cancelled to shut the HTTP server down.
    pub cancellation_token: CancellationToken,
}

/// Handles to a started node.
pub struct RunningNode {
    /// Resolves when the node finished its last epoch (or failed).
    pub protocol: JoinHandle<eyre::Result<()>>,
    /// The HTTP server task; resolves after graceful shutdown.
    pub server: JoinHandle<()>,
}

/// Starts the HTTP server and the protocol task for one node.
pub async fn start(args: NodeArgs) -> eyre::Result<RunningNode> {
    let NodeArgs {
        config,
        label,
        max_epoch,
        listener,
        cancellation_token,
    } = args;

    let me = config.peer(&label)?.clone();
    let params = config.public_parameters()?;
    let share = params.is_old(me.id).then(|| {
        bootstrap::bootstrap_share_polynomial(params.degree()).evaluate(me.id.as_scalar())
    });

    let (handle, mailboxes) = NodeHandle::new();
    let router = api::routes(handle.clone());

    let addr = listener
        .local_addr()
        .context("while reading the listener address")?;
    tracing::info!(node = %me.id, %addr, "serving");

    let server = tokio::spawn({
        let token = cancellation_token.clone();
        async move {
            let shutdown = token.clone();
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            tracing::info!("node server shutdown");
            if let Err(err) = result {
                tracing::error!("got error from axum: {err:?}");
                token.cancel();
            }
        }
    });

    let http = reqwest::Client::new();
    let board = BoardClient::new(http.clone(), &config.primary.url);
    let peer_urls: BTreeMap<NodeId, String> = config
        .peers
        .values()
        .filter(|peer| peer.id != me.id)
        .map(|peer| (peer.id, peer.url.clone()))
        .collect();

    let node = Node::new(me.id, params, share, board, peer_urls, http, handle);

    let protocol = tokio::spawn(async move {
        if share.is_some() {
            // Epoch 0 kicks the protocol off with the bootstrap share.
            node.submit_share_to_board(Epoch::ZERO)
                .await
                .context("while submitting the bootstrap share")?;
        }
        node.run(mailboxes, max_epoch).await
    });

    Ok(RunningNode { protocol, server })
}
