//! HTTP clients for the MPSS RPC surface.
//!
//! One client per remote role: [`BoardClient`] for node → board calls and
//! [`NodeClient`] for board → node and node → node calls. All requests are
//! JSON `POST`s; a non-2xx status on a protocol-critical path surfaces as a
//! [`ClientError`], which callers treat as fatal.

use mpss_types::api::v1::{
    BlindedShareMsg, ProposalHashList, ProposalHashMsg, ProposalMsg, ShareMsg,
};
use serde::Serialize;

/// Errors raised by the RPC clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be delivered or the peer rejected it.
    #[error("transport error talking to {url}: {source}")]
    Transport {
        /// The request URL.
        url: String,
        /// The underlying transport failure.
        #[source]
        source: reqwest::Error,
    },
}

async fn post_json<T: Serialize + ?Sized>(
    http: &reqwest::Client,
    base: &str,
    route: &str,
    msg: &T,
) -> Result<(), ClientError> {
    let url = format!("{base}/{route}");
    http.post(&url)
        .json(msg)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|source| ClientError::Transport {
            url: url.clone(),
            source,
        })?;
    Ok(())
}

/// Client for the bulletin board's API.
#[derive(Clone, Debug)]
pub struct BoardClient {
    http: reqwest::Client,
    base: String,
}

impl BoardClient {
    /// Builds a client for the board at `addr` (`host:port`).
    pub fn new(http: reqwest::Client, addr: &str) -> Self {
        Self {
            http,
            base: format!("http://{addr}"),
        }
    }

    /// Posts a proposal digest for the current epoch.
    pub async fn submit_proposal_hash(&self, msg: &ProposalHashMsg) -> Result<(), ClientError> {
        post_json(&self.http, &self.base, "api/v1/proposal-hash", msg).await
    }

    /// Reports a share for the board's diagnostic recovery.
    pub async fn assemble_share(&self, msg: &ShareMsg) -> Result<(), ClientError> {
        post_json(&self.http, &self.base, "api/v1/share", msg).await
    }

    /// Tells the board this node has finished its final epoch.
    pub async fn kill(&self) -> Result<(), ClientError> {
        post_json(&self.http, &self.base, "api/v1/kill", &()).await
    }
}

/// Client for a peer node's API.
#[derive(Clone, Debug)]
pub struct NodeClient {
    http: reqwest::Client,
    base: String,
}

impl NodeClient {
    /// Builds a client for the node at `addr` (`host:port`).
    pub fn new(http: reqwest::Client, addr: &str) -> Self {
        Self {
            http,
            base: format!("http://{addr}"),
        }
    }

    /// Delivers a full proposal to the peer.
    pub async fn submit_proposal(&self, msg: &ProposalMsg) -> Result<(), ClientError> {
        post_json(&self.http, &self.base, "api/v1/proposal", msg).await
    }

    /// Delivers a blinded re-share to the peer.
    pub async fn submit_blinded_share(&self, msg: &BlindedShareMsg) -> Result<(), ClientError> {
        post_json(&self.http, &self.base, "api/v1/blinded-share", msg).await
    }

    /// Hands the peer the fixed digest list for the current epoch.
    pub async fn start_checking_proposals(&self, msg: &ProposalHashList) -> Result<(), ClientError> {
        post_json(&self.http, &self.base, "api/v1/hash-list", msg).await
    }

    /// Releases the peer's epoch gate.
    pub async fn advance_epoch(&self) -> Result<(), ClientError> {
        post_json(&self.http, &self.base, "api/v1/advance-epoch", &()).await
    }
}
