//! HTTP API of a node.
//!
//! Every endpoint is a short non-blocking handler that pushes the decoded
//! message onto the matching queue of the node's [`Mailboxes`]; all
//! verification and combination happens in the epoch task. A send to a
//! queue whose node already finished is dropped with a debug log; late
//! traffic after the final epoch is expected, not an error.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use mpss_types::api::v1::{BlindedShareMsg, ProposalHashList, ProposalMsg};
use tokio::sync::mpsc::{self, error::TrySendError};
use tower_http::trace::TraceLayer;

use crate::protocol::Mailboxes;

/// The sending side of the node's message queues, shared with the HTTP
/// handlers.
#[derive(Clone)]
pub struct NodeHandle {
    proposal_tx: mpsc::UnboundedSender<ProposalMsg>,
    hash_list_tx: mpsc::UnboundedSender<ProposalHashList>,
    blinded_share_tx: mpsc::UnboundedSender<BlindedShareMsg>,
    advance_tx: mpsc::Sender<()>,
}

impl NodeHandle {
    /// Creates the paired handle and mailboxes.
    ///
    /// The epoch gate is a capacity-1 channel: a pending release is
    /// buffered, a duplicate release collapses into it.
    pub fn new() -> (Self, Mailboxes) {
        let (proposal_tx, proposals) = mpsc::unbounded_channel();
        let (hash_list_tx, hash_lists) = mpsc::unbounded_channel();
        let (blinded_share_tx, blinded_shares) = mpsc::unbounded_channel();
        let (advance_tx, advances) = mpsc::channel(1);
        (
            Self {
                proposal_tx,
                hash_list_tx,
                blinded_share_tx,
                advance_tx,
            },
            Mailboxes {
                proposals,
                hash_lists,
                blinded_shares,
                advances,
            },
        )
    }

    pub(crate) fn deliver_proposal(&self, msg: ProposalMsg) {
        if self.proposal_tx.send(msg).is_err() {
            tracing::debug!("node already finished, dropping proposal");
        }
    }

    pub(crate) fn deliver_hash_list(&self, msg: ProposalHashList) {
        if self.hash_list_tx.send(msg).is_err() {
            tracing::debug!("node already finished, dropping digest list");
        }
    }

    pub(crate) fn deliver_blinded_share(&self, msg: BlindedShareMsg) {
        if self.blinded_share_tx.send(msg).is_err() {
            tracing::debug!("node already finished, dropping blinded share");
        }
    }

    pub(crate) fn release_epoch_gate(&self) {
        match self.advance_tx.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                tracing::debug!("epoch gate already released, ignoring duplicate advance");
            }
            Err(TrySendError::Closed(())) => {
                tracing::debug!("node already finished, dropping advance");
            }
        }
    }
}

/// Builds the node's router.
pub fn routes(handle: NodeHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/proposal", post(submit_proposal))
        .route("/api/v1/hash-list", post(start_checking_proposals))
        .route("/api/v1/blinded-share", post(submit_blinded_share))
        .route("/api/v1/advance-epoch", post(advance_epoch))
        .with_state(handle)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "healthy"
}

async fn submit_proposal(
    State(handle): State<NodeHandle>,
    Json(msg): Json<ProposalMsg>,
) -> StatusCode {
    tracing::debug!(from = %msg.from, epoch = %msg.epoch, "receiving a proposal");
    handle.deliver_proposal(msg);
    StatusCode::OK
}

async fn start_checking_proposals(
    State(handle): State<NodeHandle>,
    Json(msg): Json<ProposalHashList>,
) -> StatusCode {
    tracing::debug!(epoch = %msg.epoch, "received digest list from the board");
    handle.deliver_hash_list(msg);
    StatusCode::OK
}

async fn submit_blinded_share(
    State(handle): State<NodeHandle>,
    Json(msg): Json<BlindedShareMsg>,
) -> StatusCode {
    tracing::debug!(from = %msg.from, epoch = %msg.epoch, "receiving a blinded share");
    handle.deliver_blinded_share(msg);
    StatusCode::OK
}

async fn advance_epoch(State(handle): State<NodeHandle>) -> StatusCode {
    tracing::debug!("starting the next epoch, as instructed by the board");
    handle.release_epoch_gate();
    StatusCode::OK
}
