//! Tracing setup for the MPSS binaries.
//!
//! Installs a human-readable layer on stderr plus an append-only JSON log
//! file named after the process under the configured log directory. The
//! default level is WARN; `--verbose` raises it to INFO and `--debug` to
//! DEBUG, while a set `RUST_LOG` always wins.

use std::{fs, path::Path, sync::Mutex};

use eyre::Context as _;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Initializes the global tracing subscriber for `process`.
pub fn init_tracing(process: &str, logdir: &Path, verbose: bool, debug: bool) -> eyre::Result<()> {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fs::create_dir_all(logdir).context("while creating the log directory")?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(logdir.join(format!("{process}.log")))
        .context("while opening the log file")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().json().with_writer(Mutex::new(file)))
        .try_init()
        .context("while installing the tracing subscriber")?;
    Ok(())
}
