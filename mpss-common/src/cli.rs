//! CLI options common to the node, board and simulation binaries.
//!
//! Concrete binaries flatten [`CommonOpts`] with `#[clap(flatten)]` and add
//! their own flags (the node adds `--id`).

use std::path::PathBuf;

use clap::Parser;

/// The flags every MPSS process accepts.
#[derive(Parser, Debug, Clone)]
pub struct CommonOpts {
    /// Path to the TOML configuration file.
    #[clap(long, short = 'c', env = "MPSS_CONFIG")]
    pub config: PathBuf,

    /// Number of re-sharing epochs to run before shutting down.
    #[clap(long, env = "MPSS_ROUND", default_value = "1")]
    pub round: u32,

    /// Directory the per-process JSON log file is written to.
    #[clap(long, env = "MPSS_LOGDIR", default_value = "./log")]
    pub logdir: PathBuf,

    /// Verbose output (INFO level).
    #[clap(long, short = 'v')]
    pub verbose: bool,

    /// Super verbose output (DEBUG level).
    #[clap(long)]
    pub debug: bool,
}
