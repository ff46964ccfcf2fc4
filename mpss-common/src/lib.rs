#![deny(missing_docs)]
//! Shared plumbing for the MPSS binaries.
//!
//! The node, board and simulation executables all need the same ambient
//! pieces: the TOML system configuration, the common CLI flags, tracing
//! setup with per-process JSON log files, shutdown signalling, the
//! deterministic bootstrap sharing, and HTTP clients for the RPC surface.
//! They live here so the service crates stay focused on protocol logic.

pub mod bootstrap;
pub mod cli;
pub mod clients;
pub mod config;
pub mod net;
pub mod shutdown;
pub mod telemetry;
