//! The node's epoch state machine and per-epoch message pipeline.
//!
//! Handlers enqueue incoming messages onto the [`Mailboxes`] queues; the
//! epoch task drains them in protocol order: proposals and the board's
//! digest list concurrently, then the combined blinded shares go out, then
//! the fresh share is reconstructed and reported. The epoch gate (a
//! capacity-1 channel) guarantees no message for epoch `e + 1` is processed
//! before the board's `AdvanceEpoch` for epoch `e` arrived.
//!
//! Past-epoch messages are dropped with a debug log. A future-epoch message
//! means the node desynchronized from the board and is a fatal protocol
//! violation, as are digest mismatches and rejected evaluation proofs.

use std::collections::BTreeMap;
use std::time::Instant;

use eyre::Context as _;
use mpss_common::clients::{BoardClient, ClientError, NodeClient};
use mpss_core::{
    NodeId, Scalar,
    params::PublicParameters,
    polynomial::{InterpolationError, Polynomial},
    proposal::{Proposal, ProposalDigest, ProposalError},
};
use mpss_types::{
    Epoch,
    api::v1::{BlindedShareMsg, ProposalHashList, ProposalHashMsg, ProposalMsg, ShareMsg},
};
use tokio::sync::mpsc;

use crate::{
    api::NodeHandle,
    benchmark::{Benchmark, EpochStats},
};

/// Fatal protocol conditions. Any of these aborts the node process; the
/// design assumes the deployment is re-driven from bootstrap on crash.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A peer or the board is ahead of us, which cannot happen while the
    /// epoch gate works.
    #[error("received a message for future epoch {got} while at epoch {current}")]
    FutureEpoch {
        /// Our current epoch.
        current: Epoch,
        /// The epoch carried by the message.
        got: Epoch,
    },
    /// A received proposal does not hash to the digest the board fixed.
    #[error("digest mismatch for the proposal of node {proposer}")]
    DigestMismatch {
        /// The dealer whose proposal was tampered with.
        proposer: NodeId,
    },
    /// The board's list names the same proposer twice.
    #[error("digest list for epoch {epoch} lists proposer {proposer} twice")]
    DuplicateProposer {
        /// The list epoch.
        epoch: Epoch,
        /// The repeated proposer.
        proposer: NodeId,
    },
    /// An evaluation did not verify against `comm(Q) + comm(R_k)`.
    #[error("proposal of node {proposer} failed the evaluation check towards new node {target}")]
    EvaluationRejected {
        /// The dealer of the failing proposal.
        proposer: NodeId,
        /// The new-group member the evaluation was blinded for.
        target: NodeId,
    },
    /// The board listed a proposer whose proposal never arrived.
    #[error("no proposal from node {proposer}, which appears in the board's list")]
    MissingProposal {
        /// The listed proposer.
        proposer: NodeId,
    },
    /// A listed proposal lacks required entries.
    #[error("proposal of node {proposer} is malformed")]
    MalformedProposal {
        /// The dealer of the malformed proposal.
        proposer: NodeId,
        /// What exactly is missing.
        #[source]
        source: ProposalError,
    },
    /// Reconstructing the fresh share failed; an implementation bug.
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
    /// A message queue closed while the epoch was still running.
    #[error("message queue closed while the epoch was still running")]
    QueueClosed,
    /// A protocol-critical RPC failed.
    #[error(transparent)]
    Transport(#[from] ClientError),
    /// No client exists for the given peer.
    #[error("no configured peer with id {0}")]
    UnknownPeer(NodeId),
    /// The node was asked to deal without holding a share.
    #[error("node holds no share to deal from")]
    MissingShare,
}

/// The receiving ends of the node's message queues.
///
/// Owned by the epoch task, never shared: each epoch borrows the queues,
/// drains what it needs and leaves stale messages for the next epoch's
/// drain to discard.
pub struct Mailboxes {
    pub(crate) proposals: mpsc::UnboundedReceiver<ProposalMsg>,
    pub(crate) hash_lists: mpsc::UnboundedReceiver<ProposalHashList>,
    pub(crate) blinded_shares: mpsc::UnboundedReceiver<BlindedShareMsg>,
    pub(crate) advances: mpsc::Receiver<()>,
}

/// One MPSS protocol participant.
pub struct Node {
    id: NodeId,
    params: PublicParameters,
    share: Option<Scalar>,
    board: BoardClient,
    peer_urls: BTreeMap<NodeId, String>,
    peers: BTreeMap<NodeId, NodeClient>,
    http: reqwest::Client,
    handle: NodeHandle,
    benchmark: Benchmark,
}

impl Node {
    /// Builds a node.
    ///
    /// `share` is the bootstrap share for old-group members and `None` for
    /// nodes that only join the new group. `peer_urls` maps every other
    /// configured node to its serve address; connections are established
    /// lazily at the first epoch.
    pub fn new(
        id: NodeId,
        params: PublicParameters,
        share: Option<Scalar>,
        board: BoardClient,
        peer_urls: BTreeMap<NodeId, String>,
        http: reqwest::Client,
        handle: NodeHandle,
    ) -> Self {
        Self {
            id,
            params,
            share,
            board,
            peer_urls,
            peers: BTreeMap::new(),
            http,
            handle,
            benchmark: Benchmark::default(),
        }
    }

    /// Reports the currently held share to the board; epoch 0 kicks the
    /// protocol off.
    pub async fn submit_share_to_board(&self, epoch: Epoch) -> Result<(), ProtocolError> {
        let share = self.share.ok_or(ProtocolError::MissingShare)?;
        self.board
            .assemble_share(&ShareMsg {
                epoch,
                from: self.id,
                share,
            })
            .await?;
        Ok(())
    }

    /// Runs the epoch loop until `max_epoch` epochs are done, then reports
    /// the benchmark and tells the board to die.
    pub async fn run(mut self, mut mailboxes: Mailboxes, max_epoch: Epoch) -> eyre::Result<()> {
        let mut epoch = Epoch::ZERO;
        loop {
            // The epoch only ever advances here, on the board's gate.
            mailboxes
                .advances
                .recv()
                .await
                .ok_or(ProtocolError::QueueClosed)?;
            epoch = epoch.next();
            if epoch > max_epoch {
                break;
            }
            if epoch == Epoch(1) {
                self.connect_peers();
            }
            tracing::info!(%epoch, "entering epoch");
            self.run_epoch(epoch, &mut mailboxes)
                .await
                .with_context(|| format!("while running epoch {epoch}"))?;
        }

        self.benchmark
            .report(self.params.degree(), self.params.old_group().len());
        self.board.kill().await?;
        tracing::info!("done");
        Ok(())
    }

    async fn run_epoch(
        &mut self,
        epoch: Epoch,
        mailboxes: &mut Mailboxes,
    ) -> Result<(), ProtocolError> {
        let started = Instant::now();
        let mut stats = EpochStats::default();

        if self.params.is_old(self.id) {
            let share = self.share.ok_or(ProtocolError::MissingShare)?;
            let proposal = Proposal::generate(&self.params, &mut rand::thread_rng());

            tracing::debug!("submitting the proposal digest to the board");
            self.board
                .submit_proposal_hash(&ProposalHashMsg {
                    epoch,
                    proposer: self.id,
                    digest: proposal.digest(),
                })
                .await?;

            let msg = ProposalMsg {
                epoch,
                from: self.id,
                proposal,
            };
            // The own proposal takes the same path as everyone else's.
            tracing::debug!("sending myself a proposal");
            self.handle.deliver_proposal(msg.clone());

            let sends = self
                .params
                .old_group()
                .iter()
                .filter(|&&peer| peer != self.id)
                .map(|&peer| {
                    let client = self.peer_client(peer);
                    let msg = &msg;
                    async move {
                        tracing::debug!(%peer, "sending proposal");
                        client?.submit_proposal(msg).await?;
                        Ok::<(), ProtocolError>(())
                    }
                });
            futures::future::try_join_all(sends).await?;

            let combined = collect_and_combine(
                epoch,
                self.id,
                share,
                &self.params,
                &mut mailboxes.proposals,
                &mut mailboxes.hash_lists,
                &mut stats,
            )
            .await?;
            tracing::info!("proposals verified and fresh blinded shares combined");

            for (&target, &value) in &combined {
                let msg = BlindedShareMsg {
                    epoch,
                    from: self.id,
                    value,
                };
                if target == self.id {
                    tracing::debug!("keeping my own blinded share");
                    self.handle.deliver_blinded_share(msg);
                } else {
                    tracing::debug!(%target, "submitting a blinded share");
                    self.peer_client(target)?.submit_blinded_share(&msg).await?;
                }
            }
        }

        if self.params.is_new(self.id) {
            let new_share = reconstruct_share(
                epoch,
                self.id,
                &self.params,
                &mut mailboxes.blinded_shares,
                &mut stats,
            )
            .await?;

            tracing::debug!("sending the fresh share to the board");
            self.board
                .assemble_share(&ShareMsg {
                    epoch,
                    from: self.id,
                    share: new_share,
                })
                .await?;
            // The old share is overwritten at the epoch boundary.
            self.share = Some(new_share);
        }

        stats.latency = started.elapsed();
        self.benchmark.record(epoch, stats);
        Ok(())
    }

    fn connect_peers(&mut self) {
        for (&peer, url) in &self.peer_urls {
            self.peers
                .insert(peer, NodeClient::new(self.http.clone(), url));
            tracing::debug!(%peer, %url, "connected to peer");
        }
    }

    fn peer_client(&self, peer: NodeId) -> Result<&NodeClient, ProtocolError> {
        self.peers
            .get(&peer)
            .ok_or(ProtocolError::UnknownPeer(peer))
    }
}

fn wire_size<T: serde::Serialize>(msg: &T) -> usize {
    serde_json::to_vec(msg).map(|bytes| bytes.len()).unwrap_or_default()
}

/// Collects the board's digest list and the listed proposals, verifies
/// both layers and folds everything into one blinded share per new-group
/// member.
///
/// Collection is driven by the digest list: the epoch completes as soon as
/// every listed proposal arrived, so a stalled peer outside the fixed
/// `2t+1` set cannot hold up the protocol.
async fn collect_and_combine(
    epoch: Epoch,
    my_id: NodeId,
    share: Scalar,
    params: &PublicParameters,
    proposals: &mut mpsc::UnboundedReceiver<ProposalMsg>,
    hash_lists: &mut mpsc::UnboundedReceiver<ProposalHashList>,
    stats: &mut EpochStats,
) -> Result<BTreeMap<NodeId, Scalar>, ProtocolError> {
    let mut received: BTreeMap<NodeId, Proposal> = BTreeMap::new();
    let mut reference: Option<BTreeMap<NodeId, ProposalDigest>> = None;

    let listed = loop {
        if let Some(listed) = reference.take() {
            if listed.keys().all(|proposer| received.contains_key(proposer)) {
                break listed;
            }
            reference = Some(listed);
        }
        tokio::select! {
            msg = proposals.recv() => {
                let msg = msg.ok_or(ProtocolError::QueueClosed)?;
                if msg.epoch < epoch {
                    tracing::debug!(stale = %msg.epoch, %epoch, "ignoring proposal from a previous epoch");
                    continue;
                }
                if msg.epoch > epoch {
                    return Err(ProtocolError::FutureEpoch { current: epoch, got: msg.epoch });
                }
                stats.bytes_off_chain += wire_size(&msg);
                tracing::debug!(from = %msg.from, "received a proposal ({} so far)", received.len() + 1);
                received.insert(msg.from, msg.proposal);
            }
            list = hash_lists.recv() => {
                let list = list.ok_or(ProtocolError::QueueClosed)?;
                if list.epoch < epoch {
                    tracing::debug!(stale = %list.epoch, %epoch, "ignoring digest list from a previous epoch");
                    continue;
                }
                if list.epoch > epoch {
                    return Err(ProtocolError::FutureEpoch { current: epoch, got: list.epoch });
                }
                stats.bytes_on_chain += wire_size(&list);
                let mut fixed = BTreeMap::new();
                for entry in &list.list {
                    if fixed.insert(entry.proposer, entry.digest).is_some() {
                        return Err(ProtocolError::DuplicateProposer { epoch, proposer: entry.proposer });
                    }
                }
                tracing::debug!(len = fixed.len(), "received the fixed digest list from the board");
                reference = Some(fixed);
            }
        }
    };

    // Bind everyone to the board's set: a proposal that does not hash to
    // its listed digest was tampered with in transit.
    let mut verified = Vec::with_capacity(listed.len());
    for (&proposer, digest) in &listed {
        let proposal = received
            .get(&proposer)
            .ok_or(ProtocolError::MissingProposal { proposer })?;
        if proposal.digest() != *digest {
            return Err(ProtocolError::DigestMismatch { proposer });
        }
        verified.push(proposer);
    }
    tracing::info!(?verified, "digests matched, proposals fixed");

    // Check every evaluation addressed to us against comm(Q) + comm(R_k).
    for &proposer in &verified {
        let proposal = &received[&proposer];
        for &target in params.new_group() {
            let ok = proposal
                .verify_evaluation(my_id, target)
                .map_err(|source| ProtocolError::MalformedProposal { proposer, source })?;
            if !ok {
                return Err(ProtocolError::EvaluationRejected { proposer, target });
            }
        }
    }

    // combined[k] = share + sum over the listed dealers of Q_j(i) + R_{j,k}(i)
    let mut combined = BTreeMap::new();
    for &target in params.new_group() {
        let mut value = share;
        for &proposer in &verified {
            value += received[&proposer]
                .evaluations_for(my_id)
                .and_then(|evals| evals.point_for(target))
                .map_err(|source| ProtocolError::MalformedProposal { proposer, source })?;
        }
        combined.insert(target, value);
    }
    Ok(combined)
}

/// Accumulates one blinded share per old-group sender, then interpolates
/// the degree-`t` polynomial through the first `t + 1` samples and
/// evaluates it at the own id to obtain the fresh share.
async fn reconstruct_share(
    epoch: Epoch,
    my_id: NodeId,
    params: &PublicParameters,
    blinded_shares: &mut mpsc::UnboundedReceiver<BlindedShareMsg>,
    stats: &mut EpochStats,
) -> Result<Scalar, ProtocolError> {
    let mut samples: BTreeMap<NodeId, Scalar> = BTreeMap::new();
    while samples.len() < params.old_group().len() {
        let msg = blinded_shares
            .recv()
            .await
            .ok_or(ProtocolError::QueueClosed)?;
        if msg.epoch < epoch {
            tracing::debug!(stale = %msg.epoch, %epoch, "ignoring blinded share from a previous epoch");
            continue;
        }
        if msg.epoch > epoch {
            return Err(ProtocolError::FutureEpoch {
                current: epoch,
                got: msg.epoch,
            });
        }
        stats.bytes_off_chain += wire_size(&msg);
        tracing::debug!(from = %msg.from, "received a blinded share");
        samples.insert(msg.from, msg.value);
    }
    tracing::debug!("got enough blinded shares to reconstruct");

    let points: Vec<(Scalar, Scalar)> = samples
        .iter()
        .take(params.degree() + 1)
        .map(|(sender, value)| (sender.as_scalar(), *value))
        .collect();
    let poly = Polynomial::interpolate(&points)?;
    Ok(poly.evaluate(my_id.as_scalar()))
}
