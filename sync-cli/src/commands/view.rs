//! View command - mirror a host's files.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use syncpad_client::{
    ClientError, ClientEvent, MemoryDocuments, SyncClient, TcpTransport, TcpTransportConfig,
    TransportError,
};
use syncpad_types::DocPath;

/// Run the view command.
pub async fn run(address: &str, out_dir: Option<&Path>, connect_timeout: Duration) -> Result<()> {
    if let Some(dir) = out_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let transport = TcpTransport::with_config(TcpTransportConfig { connect_timeout });
    let mut client = SyncClient::new(address, transport, MemoryDocuments::new());
    client
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {address}"))?;
    println!("Connected to {address}. Press Ctrl-C to stop.");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let events = tokio::select! {
            _ = &mut ctrl_c => break,
            result = client.next_events() => match result {
                Ok(events) => events,
                Err(ClientError::Transport(TransportError::ConnectionClosed)) => {
                    println!("Host closed the connection.");
                    return Ok(());
                }
                Err(ClientError::Wire(e)) => {
                    tracing::warn!("Ignoring undecodable message: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            },
        };

        for event in events {
            match event {
                ClientEvent::FileOpened { path, version } => {
                    println!("Opened {path} (v{version})");
                    mirror(&client, &path, out_dir).await?;
                }
                ClientEvent::FileUpdated { path, version } => {
                    tracing::debug!("Updated {} to v{}", path, version);
                    mirror(&client, &path, out_dir).await?;
                }
                ClientEvent::ResyncRequested { path, anomaly } => {
                    println!("Resyncing {path}: {anomaly}");
                }
                ClientEvent::Ancillary(event) => {
                    println!("[host] {} {}", event.name, event.payload);
                }
            }
        }
    }

    client.disconnect().await.ok();
    Ok(())
}

/// Write the local copy of `path` under `out_dir`, if mirroring is enabled.
async fn mirror(
    client: &SyncClient<TcpTransport, MemoryDocuments>,
    path: &DocPath,
    out_dir: Option<&Path>,
) -> Result<()> {
    let (Some(dir), Some(text)) = (out_dir, client.documents().text(path)) else {
        return Ok(());
    };
    let target = dir.join(mirror_name(path));
    tokio::fs::write(&target, text)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))
}

/// Flatten a host path into a single file name.
fn mirror_name(path: &DocPath) -> PathBuf {
    let flat = path
        .as_str()
        .trim_start_matches('/')
        .replace(['/', '\\', ':'], "_");
    PathBuf::from(flat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_names_are_flat() {
        let name = |p: &str| mirror_name(&DocPath::new(p).unwrap());
        assert_eq!(name("notes.md"), PathBuf::from("notes.md"));
        assert_eq!(name("/home/me/src/main.rs"), PathBuf::from("home_me_src_main.rs"));
        assert_eq!(name("file:///C:/work/a.txt"), PathBuf::from("C__work_a.txt"));
    }
}
