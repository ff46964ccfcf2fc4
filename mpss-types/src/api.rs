//! API message types for the MPSS RPC surface.
//!
//! All endpoints are JSON-over-HTTP `POST`s under `/api/v1`:
//!
//! | direction | route | payload |
//! |---|---|---|
//! | node → board | `/api/v1/proposal-hash` | [`v1::ProposalHashMsg`] |
//! | node → board | `/api/v1/share` | [`v1::ShareMsg`] |
//! | node → board | `/api/v1/kill` | empty |
//! | board → node | `/api/v1/hash-list` | [`v1::ProposalHashList`] |
//! | board → node | `/api/v1/advance-epoch` | empty |
//! | node → node | `/api/v1/proposal` | [`v1::ProposalMsg`] |
//! | node → node | `/api/v1/blinded-share` | [`v1::BlindedShareMsg`] |

pub mod v1;
