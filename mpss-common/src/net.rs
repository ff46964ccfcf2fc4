//! Listener helpers for the MPSS services.

use eyre::Context as _;
use tokio::net::TcpListener;

/// Binds the serve socket for a configured `host:port` address.
///
/// Only the port is taken from the config entry; the listener binds on all
/// interfaces so the configured host can be the address peers dial.
pub async fn bind_serve_addr(url: &str) -> eyre::Result<TcpListener> {
    let (_, port) = url
        .rsplit_once(':')
        .ok_or_else(|| eyre::eyre!("serve address {url:?} has no port"))?;
    let port: u16 = port.parse().context("while parsing the serve port")?;
    TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("while binding the listener on port {port}"))
}
