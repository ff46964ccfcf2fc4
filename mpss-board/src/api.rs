//! HTTP API of the bulletin board.
//!
//! The digest endpoint implements the per-epoch quota: once the board has
//! fixed its `2t + 1` digests for the epoch it cancels the epoch's "full"
//! token, and every further digest for that epoch is dropped on the floor.
//! Digests for a later epoch are held until the board arms that epoch's
//! collection, so a node that races ahead is delayed, never lost.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use mpss_types::{
    Epoch,
    api::v1::{ProposalHashMsg, ShareMsg},
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Which epoch the board currently accepts digests for, and the token that
/// is cancelled once that epoch's quota is full.
pub(crate) struct HashQuota {
    pub(crate) epoch: Epoch,
    pub(crate) full: CancellationToken,
}

impl HashQuota {
    fn closed() -> Self {
        let full = CancellationToken::new();
        full.cancel();
        Self {
            epoch: Epoch::ZERO,
            full,
        }
    }
}

/// The sending side of the board's queues, shared with the HTTP handlers.
#[derive(Clone)]
pub struct BoardHandle {
    hash_tx: mpsc::Sender<ProposalHashMsg>,
    hash_quota: Arc<Mutex<HashQuota>>,
    share_tx: mpsc::UnboundedSender<ShareMsg>,
    kill_tx: mpsc::UnboundedSender<()>,
}

/// The receiving side, owned by the board loop (and the kill watcher).
pub struct BoardChannels {
    pub(crate) hashes: mpsc::Receiver<ProposalHashMsg>,
    pub(crate) hash_quota: Arc<Mutex<HashQuota>>,
    pub(crate) shares: mpsc::UnboundedReceiver<ShareMsg>,
    pub(crate) kills: mpsc::UnboundedReceiver<()>,
}

impl BoardHandle {
    /// Creates the paired handle and channels.
    ///
    /// `capacity` bounds the digest queue; it must cover the in-flight
    /// digests of two adjacent epochs (twice the group size is plenty), so
    /// a node racing ahead of the board parks at most briefly. Epoch 0
    /// collects no digests, so the quota starts closed.
    pub fn new(capacity: usize) -> (Self, BoardChannels) {
        let (hash_tx, hashes) = mpsc::channel(capacity);
        let (share_tx, shares) = mpsc::unbounded_channel();
        let (kill_tx, kills) = mpsc::unbounded_channel();
        let hash_quota = Arc::new(Mutex::new(HashQuota::closed()));
        (
            Self {
                hash_tx,
                hash_quota: Arc::clone(&hash_quota),
                share_tx,
                kill_tx,
            },
            BoardChannels {
                hashes,
                hash_quota,
                shares,
                kills,
            },
        )
    }

    pub(crate) async fn deliver_proposal_hash(&self, msg: ProposalHashMsg) {
        let (armed_epoch, full) = {
            let guard = self.hash_quota.lock();
            (guard.epoch, guard.full.clone())
        };
        if msg.epoch < armed_epoch {
            tracing::debug!(epoch = %msg.epoch, "digest collection for this epoch is over, dropping");
            return;
        }
        if msg.epoch == armed_epoch {
            if full.is_cancelled() {
                tracing::debug!("digest quota for the epoch is full, dropping");
                return;
            }
            tokio::select! {
                biased;
                () = full.cancelled() => {
                    tracing::debug!("digest quota for the epoch is full, dropping");
                }
                result = self.hash_tx.send(msg) => {
                    if result.is_err() {
                        tracing::debug!("board loop gone, dropping digest");
                    }
                }
            }
        } else if self.hash_tx.send(msg).await.is_err() {
            // A digest for an epoch we have not armed yet: hold it until
            // the board gets there.
            tracing::debug!("board loop gone, dropping digest");
        }
    }

    pub(crate) fn deliver_share(&self, msg: ShareMsg) {
        if self.share_tx.send(msg).is_err() {
            tracing::debug!("board loop gone, dropping share");
        }
    }

    pub(crate) fn deliver_kill(&self) {
        if self.kill_tx.send(()).is_err() {
            tracing::debug!("kill watcher gone, dropping kill");
        }
    }
}

/// Builds the board's router.
pub fn routes(handle: BoardHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/proposal-hash", post(submit_proposal_hash))
        .route("/api/v1/share", post(assemble_share))
        .route("/api/v1/kill", post(kill))
        .with_state(handle)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "healthy"
}

async fn submit_proposal_hash(
    State(handle): State<BoardHandle>,
    Json(msg): Json<ProposalHashMsg>,
) -> StatusCode {
    tracing::debug!(proposer = %msg.proposer, epoch = %msg.epoch, "receiving a digest");
    handle.deliver_proposal_hash(msg).await;
    StatusCode::OK
}

async fn assemble_share(State(handle): State<BoardHandle>, Json(msg): Json<ShareMsg>) -> StatusCode {
    tracing::debug!(from = %msg.from, epoch = %msg.epoch, "receiving a share");
    handle.deliver_share(msg);
    StatusCode::OK
}

async fn kill(State(handle): State<BoardHandle>) -> StatusCode {
    tracing::debug!("node reported done");
    handle.deliver_kill();
    StatusCode::OK
}
