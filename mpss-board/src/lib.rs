#![deny(missing_docs)]
//! The MPSS bulletin board (the "primary").
//!
//! The board is the trusted coordinator that binds every node to the same
//! set of dealings per epoch. Each epoch it collects exactly `2t + 1`
//! distinct-proposer digests, freezes them into the canonical
//! [`ProposalHashList`], broadcasts the list to every old-group node,
//! collects the resulting fresh shares, interpolates them at `x = 0` to
//! log the recovered secret (a diagnostic a production deployment would
//! omit) and finally releases every node's epoch gate.
//!
//! Epoch 0 is a warm-up: the board only assembles the bootstrap shares and
//! dials its peers before the first real epoch starts.

use std::{collections::BTreeMap, sync::Arc};

use ark_ff::Zero as _;
use eyre::Context as _;
use mpss_common::{clients::NodeClient, config::SystemConfig};
use mpss_core::{NodeId, Scalar, params::PublicParameters, polynomial::Polynomial};
use mpss_types::{
    Epoch,
    api::v1::{ProposalHashList, ProposalHashMsg, ShareMsg},
};
use parking_lot::Mutex;
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::api::{BoardChannels, BoardHandle, HashQuota};

pub mod api;

/// The diagnostic secret recovery of one epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoveredSecret {
    /// The epoch the shares belong to.
    pub epoch: Epoch,
    /// The interpolation of the collected shares at `x = 0`.
    pub secret: Scalar,
}

/// The board's epoch loop state.
pub struct BulletinBoard {
    params: PublicParameters,
    peer_urls: BTreeMap<NodeId, String>,
    nodes: BTreeMap<NodeId, NodeClient>,
    http: reqwest::Client,
    hashes: mpsc::Receiver<ProposalHashMsg>,
    hash_quota: Arc<Mutex<HashQuota>>,
    shares: mpsc::UnboundedReceiver<ShareMsg>,
    secret_tx: mpsc::UnboundedSender<RecoveredSecret>,
    cancellation_token: CancellationToken,
}

impl BulletinBoard {
    /// Runs the board until the cancellation token fires.
    pub async fn run(mut self) -> eyre::Result<()> {
        let token = self.cancellation_token.clone();
        tokio::select! {
            () = token.cancelled() => {
                tracing::info!("board shutting down");
                Ok(())
            }
            result = self.protocol_loop() => result,
        }
    }

    async fn protocol_loop(&mut self) -> eyre::Result<()> {
        // Warm-up: wait for the bootstrap shares and start the protocol.
        let mut epoch = Epoch::ZERO;
        self.assemble_secret(epoch).await?;

        loop {
            epoch = epoch.next();
            tracing::warn!(%epoch, "board entering epoch");
            self.consensus_on_proposal_hash(epoch).await?;
            self.assemble_secret(epoch).await?;
        }
    }

    /// Fixes the canonical digest set for `epoch` and broadcasts it to the
    /// old group.
    async fn consensus_on_proposal_hash(&mut self, epoch: Epoch) -> eyre::Result<()> {
        let list = collect_quorum_hashes(
            epoch,
            self.params.quorum(),
            &mut self.hashes,
            &self.hash_quota,
        )
        .await?;
        tracing::info!("enough digests received");

        let sends = self.params.old_group().iter().map(|&peer| {
            let client = self.node_client(peer);
            let list = &list;
            async move {
                client?
                    .start_checking_proposals(list)
                    .await
                    .with_context(|| format!("while sending the digest list to node {peer}"))
            }
        });
        futures::future::try_join_all(sends).await?;
        Ok(())
    }

    /// Collects the expected shares for `epoch`, logs the recovered secret
    /// and releases every node's epoch gate.
    async fn assemble_secret(&mut self, epoch: Epoch) -> eyre::Result<()> {
        // At bootstrap the shares come from the old group; afterwards the
        // fresh shares come from the new group.
        let expected = if epoch == Epoch::ZERO {
            self.params.old_group().len()
        } else {
            self.params.new_group().len()
        };

        let mut samples: BTreeMap<NodeId, Scalar> = BTreeMap::new();
        while samples.len() < expected {
            let msg = self
                .shares
                .recv()
                .await
                .ok_or_else(|| eyre::eyre!("share queue closed"))?;
            if msg.epoch < epoch {
                tracing::debug!(stale = %msg.epoch, %epoch, "ignoring share from a previous epoch");
                continue;
            }
            if msg.epoch > epoch {
                eyre::bail!("share for future epoch {} while at epoch {epoch}", msg.epoch);
            }
            tracing::debug!(from = %msg.from, "collected a share ({}/{expected})", samples.len() + 1);
            samples.insert(msg.from, msg.share);
        }

        let points: Vec<(Scalar, Scalar)> = samples
            .iter()
            .take(self.params.degree() + 1)
            .map(|(id, share)| (id.as_scalar(), *share))
            .collect();
        let poly = Polynomial::interpolate(&points).context("cannot recover the secret")?;
        let secret = poly.evaluate(Scalar::zero());
        tracing::warn!(%epoch, %secret, "finishing epoch");
        let _ = self.secret_tx.send(RecoveredSecret { epoch, secret });

        if epoch == Epoch::ZERO {
            self.connect_to_peers();
        }

        let advances = self.nodes.values().map(|client| client.advance_epoch());
        futures::future::try_join_all(advances)
            .await
            .context("while releasing the epoch gates")?;
        Ok(())
    }

    fn connect_to_peers(&mut self) {
        for (&peer, url) in &self.peer_urls {
            self.nodes
                .insert(peer, NodeClient::new(self.http.clone(), url));
            tracing::debug!(%peer, %url, "board connected to node");
        }
    }

    fn node_client(&self, peer: NodeId) -> eyre::Result<&NodeClient> {
        self.nodes
            .get(&peer)
            .ok_or_else(|| eyre::eyre!("no client for node {peer}"))
    }
}

/// Arms the digest quota for `epoch`, collects `quorum` distinct-proposer
/// digests and closes the quota again.
///
/// Digests for earlier epochs are leftovers in the queue and are dropped
/// with a debug log; a digest for a later epoch cannot exist before this
/// epoch's gates were released and is a protocol violation.
async fn collect_quorum_hashes(
    epoch: Epoch,
    quorum: usize,
    hashes: &mut mpsc::Receiver<ProposalHashMsg>,
    hash_quota: &Mutex<HashQuota>,
) -> eyre::Result<ProposalHashList> {
    {
        let mut guard = hash_quota.lock();
        *guard = HashQuota {
            epoch,
            full: CancellationToken::new(),
        };
    }

    let mut fixed: BTreeMap<NodeId, ProposalHashMsg> = BTreeMap::new();
    while fixed.len() < quorum {
        let msg = hashes
            .recv()
            .await
            .ok_or_else(|| eyre::eyre!("digest queue closed"))?;
        if msg.epoch < epoch {
            tracing::debug!(stale = %msg.epoch, %epoch, "ignoring digest from a previous epoch");
            continue;
        }
        if msg.epoch > epoch {
            eyre::bail!("digest for future epoch {} while at epoch {epoch}", msg.epoch);
        }
        tracing::debug!(proposer = %msg.proposer, "received a digest ({}/{quorum})", fixed.len() + 1);
        fixed.insert(msg.proposer, msg);
    }

    // No more digests accepted for this epoch.
    hash_quota.lock().full.cancel();

    Ok(ProposalHashList {
        epoch,
        list: fixed.into_values().collect(),
    })
}

async fn kill_watcher(
    mut kills: mpsc::UnboundedReceiver<()>,
    group_size: usize,
    allow_suicide: bool,
    cancellation_token: CancellationToken,
) {
    let mut count = 0usize;
    while kills.recv().await.is_some() {
        count += 1;
        tracing::debug!(count, group_size, "node reported done");
        if allow_suicide && count >= group_size {
            tracing::info!("all nodes done, killing myself...");
            cancellation_token.cancel();
            break;
        }
    }
}

/// Everything needed to bring the board up.
pub struct BoardArgs {
    /// The validated deployment config.
    pub config: SystemConfig,
    /// The already-bound serve socket.
    pub listener: TcpListener,
    /// Whether a kill report from every node terminates the process. The
    /// standalone binary enables this; the local simulation keeps the
    /// board alive so it can be torn down explicitly.
    pub allow_suicide: bool,
    /// Cancelled to shut the board down.
    pub cancellation_token: CancellationToken,
}

/// Handles to a started board.
pub struct RunningBoard {
    /// The epoch loop task.
    pub board: JoinHandle<eyre::Result<()>>,
    /// The HTTP server task; resolves after graceful shutdown.
    pub server: JoinHandle<()>,
    /// Observes the per-epoch diagnostic secret recoveries in order.
    pub recovered_secrets: mpsc::UnboundedReceiver<RecoveredSecret>,
}

/// Starts the HTTP server, the kill watcher and the board loop.
pub async fn start(args: BoardArgs) -> eyre::Result<RunningBoard> {
    let BoardArgs {
        config,
        listener,
        allow_suicide,
        cancellation_token,
    } = args;

    let params = config.public_parameters()?;
    let (handle, channels) = BoardHandle::new(2 * config.peers.len());
    let BoardChannels {
        hashes,
        hash_quota,
        shares,
        kills,
    } = channels;

    let addr = listener
        .local_addr()
        .context("while reading the listener address")?;
    tracing::info!(%addr, "board serving");

    let router = api::routes(handle);
    let server = tokio::spawn({
        let token = cancellation_token.clone();
        async move {
            let shutdown = token.clone();
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            tracing::info!("board server shutdown");
            if let Err(err) = result {
                tracing::error!("got error from axum: {err:?}");
                token.cancel();
            }
        }
    });

    tokio::spawn(kill_watcher(
        kills,
        config.peers.len(),
        allow_suicide,
        cancellation_token.clone(),
    ));

    let (secret_tx, recovered_secrets) = mpsc::unbounded_channel();
    let peer_urls: BTreeMap<NodeId, String> = config
        .peers
        .values()
        .map(|peer| (peer.id, peer.url.clone()))
        .collect();

    let board = BulletinBoard {
        params,
        peer_urls,
        nodes: BTreeMap::new(),
        http: reqwest::Client::new(),
        hashes,
        hash_quota,
        shares,
        secret_tx,
        cancellation_token: cancellation_token.clone(),
    };

    let board_task = tokio::spawn({
        let token = cancellation_token;
        async move {
            let result = board.run().await;
            if let Err(err) = &result {
                tracing::error!("board failed: {err:?}");
                token.cancel();
            }
            result
        }
    });

    Ok(RunningBoard {
        board: board_task,
        server,
        recovered_secrets,
    })
}

#[cfg(test)]
mod tests {
    use mpss_core::proposal::ProposalDigest;

    use super::*;

    fn digest_msg(epoch: Epoch, proposer: u64, fill: u8) -> ProposalHashMsg {
        ProposalHashMsg {
            epoch,
            proposer: NodeId(proposer),
            digest: ProposalDigest::new([fill; 32]),
        }
    }

    #[tokio::test]
    async fn fixes_exactly_the_quorum_and_drops_the_straggler() {
        let (handle, mut channels) = BoardHandle::new(8);

        // All four nodes race their digests in; the quota is 2t+1 = 3.
        for proposer in 1..=4u64 {
            let handle = handle.clone();
            tokio::spawn(async move {
                handle
                    .deliver_proposal_hash(digest_msg(Epoch(1), proposer, proposer as u8))
                    .await;
            });
        }

        let list = collect_quorum_hashes(Epoch(1), 3, &mut channels.hashes, &channels.hash_quota)
            .await
            .unwrap();
        assert_eq!(list.epoch, Epoch(1));
        assert_eq!(list.list.len(), 3);
        let mut proposers: Vec<NodeId> = list.list.iter().map(|entry| entry.proposer).collect();
        proposers.dedup();
        assert_eq!(proposers.len(), 3);

        // A digest arriving after the broadcast is not incorporated: it is
        // either dropped by the cancelled quota or discarded as stale by
        // the next epoch's collection.
        handle
            .deliver_proposal_hash(digest_msg(Epoch(1), 9, 9))
            .await;

        let feeder = tokio::spawn(async move {
            for proposer in 1..=3u64 {
                handle
                    .deliver_proposal_hash(digest_msg(Epoch(2), proposer, proposer as u8))
                    .await;
            }
        });
        let next = collect_quorum_hashes(Epoch(2), 3, &mut channels.hashes, &channels.hash_quota)
            .await
            .unwrap();
        feeder.await.unwrap();
        assert_eq!(next.list.len(), 3);
        assert!(next.list.iter().all(|entry| entry.epoch == Epoch(2)));
        assert!(next.list.iter().all(|entry| entry.proposer != NodeId(9)));
    }

    #[tokio::test]
    async fn repeated_proposers_only_count_once() {
        let (handle, mut channels) = BoardHandle::new(8);

        let feeder = tokio::spawn(async move {
            // Node 1 submits twice; the quorum still needs three distinct
            // proposers.
            for (proposer, fill) in [(1u64, 1u8), (1, 1), (2, 2), (3, 3)] {
                handle
                    .deliver_proposal_hash(digest_msg(Epoch(1), proposer, fill))
                    .await;
            }
        });

        let list = collect_quorum_hashes(Epoch(1), 3, &mut channels.hashes, &channels.hash_quota)
            .await
            .unwrap();
        feeder.await.unwrap();
        let mut proposers: Vec<NodeId> = list.list.iter().map(|entry| entry.proposer).collect();
        proposers.sort_unstable();
        assert_eq!(proposers, vec![NodeId(1), NodeId(2), NodeId(3)]);
    }

    #[tokio::test]
    async fn future_digests_are_a_protocol_violation() {
        let (handle, mut channels) = BoardHandle::new(8);

        let handle_clone = handle.clone();
        tokio::spawn(async move {
            handle_clone
                .deliver_proposal_hash(digest_msg(Epoch(5), 1, 1))
                .await;
        });

        let err = collect_quorum_hashes(Epoch(1), 3, &mut channels.hashes, &channels.hash_quota)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("future epoch"));
    }
}
