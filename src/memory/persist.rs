//! Background persistence writer
//!
//! Receives memory snapshots over a channel and writes them to disk on its
//! own thread. Queued snapshots are coalesced to the newest before writing;
//! failures are logged and never surfaced to the consuming thread.

use super::MemoryDoc;
use crate::{MochaError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

pub struct PersistWriter {
    tx: Option<Sender<MemoryDoc>>,
    handle: Option<JoinHandle<()>>,
}

impl PersistWriter {
    pub fn spawn(path: PathBuf) -> Self {
        let (tx, rx) = unbounded();
        let handle = thread::spawn(move || run(path, rx));
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Queue a snapshot for writing; never blocks the caller.
    pub fn queue(&self, doc: MemoryDoc) {
        if let Some(tx) = &self.tx {
            if tx.send(doc).is_err() {
                warn!("persistence worker gone, memory snapshot dropped");
            }
        }
    }

    /// Drop the sender and wait for pending writes to land. Used on
    /// shutdown paths that want the last snapshot on disk.
    pub fn finish(mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(path: PathBuf, rx: Receiver<MemoryDoc>) {
    info!(path = %path.display(), "memory writer started");
    while let Ok(mut doc) = rx.recv() {
        // Coalesce a backlog to the newest snapshot.
        while let Ok(newer) = rx.try_recv() {
            doc = newer;
        }
        match write_doc(&path, &doc) {
            Ok(()) => debug!(entries = doc.conversation.len(), "memory persisted"),
            Err(e) => warn!(error = %e, "failed to persist memory"),
        }
    }
    info!("memory writer stopped");
}

fn write_doc(path: &Path, doc: &MemoryDoc) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MochaError::Persistence(format!("create {}: {e}", parent.display())))?;
        }
    }
    let json = serde_json::to_string_pretty(doc)
        .map_err(|e| MochaError::Persistence(format!("serialize memory: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .map_err(|e| MochaError::Persistence(format!("write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| MochaError::Persistence(format!("rename into {}: {e}", path.display())))?;
    Ok(())
}
