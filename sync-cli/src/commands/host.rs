//! Host command - share files and stream their edits to viewers.
//!
//! Files are polled for changes every `watch.interval_ms`; each new revision
//! is diffed against what viewers already have and recorded as an edit.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use syncpad_host::{
    listener, spawn_host, Config, HostError, HostHandle, IncomingAncillary, RecordOutcome,
};
use syncpad_types::DocPath;
use tokio::sync::broadcast::error::RecvError;

/// A shared file on disk.
struct WatchedFile {
    disk_path: PathBuf,
    doc: DocPath,
    modified: Option<SystemTime>,
}

/// Run the host command.
pub async fn run(
    config_path: Option<&Path>,
    bind: Option<String>,
    files: &[PathBuf],
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => Config::from_file(path).context("Failed to load config")?,
        None => Config::default(),
    };
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }

    // Read everything up front so a typo fails before anything is bound
    let mut watched = Vec::with_capacity(files.len());
    let mut initial = Vec::with_capacity(files.len());
    for file in files {
        let text = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let doc = DocPath::new(&file.to_string_lossy())
            .with_context(|| format!("Cannot share {}", file.display()))?;
        watched.push(WatchedFile {
            disk_path: file.clone(),
            doc,
            modified: modified_time(file).await,
        });
        initial.push(text);
    }

    let (host, actor) = spawn_host(&config.tracker);
    let tcp = listener::bind(config.server.bind_address.as_str())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    let address = tcp.local_addr()?;
    let server = tokio::spawn(listener::serve(tcp, host.clone()));

    for (file, text) in watched.iter().zip(initial) {
        let outcome = host.share(file.doc.clone(), text).await?;
        println!("{}", outcome.message(file.doc.file_name()));
    }
    println!("Serving {} file(s) on {}", watched.len(), address);
    println!("Press Ctrl-C to stop.");

    let mut events = host.ancillary_events();
    let mut ticker = tokio::time::interval(config.watch.interval());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!("Shutting down.");
                break;
            }
            _ = ticker.tick() => {
                for file in &mut watched {
                    if let Err(e) = poll_file(&host, file).await {
                        tracing::warn!("Could not sync {}: {}", file.disk_path.display(), e);
                    }
                }
            }
            event = events.recv() => match event {
                Ok(incoming) => print_incoming(&incoming),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Missed {} viewer events", missed);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    server.abort();
    host.shutdown().await.ok();
    actor.await.ok();
    Ok(())
}

/// Push a file's latest revision to the host if it changed on disk.
async fn poll_file(host: &HostHandle, file: &mut WatchedFile) -> Result<()> {
    let modified = modified_time(&file.disk_path).await;
    if modified == file.modified {
        return Ok(());
    }
    file.modified = modified;

    let text = tokio::fs::read_to_string(&file.disk_path).await?;
    match host.record_text(file.doc.clone(), text.clone()).await {
        Ok(RecordOutcome::Unchanged) => {}
        Ok(outcome) => tracing::debug!("{}: {:?}", file.doc, outcome),
        Err(HostError::Track(e)) => {
            // The host's copy drifted from the disk; start the file over
            tracing::warn!("{}; re-sharing", e);
            let outcome = host.share(file.doc.clone(), text).await?;
            println!("{}", outcome.message(file.doc.file_name()));
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn modified_time(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

fn print_incoming(incoming: &IncomingAncillary) {
    println!(
        "[{}] {} {}",
        incoming.connection, incoming.event.name, incoming.event.payload
    );
}
