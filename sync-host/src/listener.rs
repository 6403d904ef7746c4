//! TCP accept loop.

use tokio::net::{TcpListener, ToSocketAddrs};

use crate::error::Result;
use crate::runtime::HostHandle;
use crate::session::Session;

/// Bind a listener on `addr`.
pub async fn bind(addr: impl ToSocketAddrs) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    if let Ok(local) = listener.local_addr() {
        tracing::info!("Listening on {}", local);
    }
    Ok(listener)
}

/// Accept viewers forever, spawning a [`Session`] for each.
///
/// Returns only if accepting fails.
pub async fn serve(listener: TcpListener, host: HostHandle) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
        }

        let session = Session::new(host.clone(), stream);
        // Spawn session handler - don't block the accept loop
        tokio::spawn(async move {
            if let Err(e) = session.run().await {
                tracing::warn!("Session error: {}", e);
            }
        });
    }
}
