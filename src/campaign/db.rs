use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::error::Error;

use super::Campaign;

/// Fixed file name of the primary snapshot within the data directory.
pub const SNAPSHOT_FILE: &str = "campaigns.json";

/// Persistent store holding one serialized snapshot of all campaigns.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Returns the last saved snapshot, or `None` when nothing has been
    /// stored yet. First-run absence is not an error.
    async fn load_campaigns(&self) -> Result<Option<Vec<Campaign>>, Error>;

    /// Overwrites the single stored snapshot. Atomic from the caller's
    /// perspective: a reader never observes a partial write.
    async fn save_campaigns(&self, campaigns: &[Campaign]) -> Result<(), Error>;
}

/// File-backed snapshot store with a one-time migration path from a
/// legacy flat JSON export.
#[derive(Clone, Debug)]
pub struct JsonSnapshotStore {
    snapshot_path: PathBuf,
    legacy_path: Option<PathBuf>,
}

impl JsonSnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> JsonSnapshotStore {
        JsonSnapshotStore {
            snapshot_path: data_dir.into().join(SNAPSHOT_FILE),
            legacy_path: None,
        }
    }

    /// Registers the location of a legacy flat export, read once when
    /// the primary snapshot is absent and deleted after adoption.
    pub fn with_legacy_export(mut self, path: impl Into<PathBuf>) -> JsonSnapshotStore {
        self.legacy_path = Some(path.into());
        self
    }

    async fn adopt_legacy_export(&self) -> Result<Option<Vec<Campaign>>, Error> {
        let legacy_path = match &self.legacy_path {
            Some(path) => path,
            None => return Ok(None),
        };

        let bytes = match fs::read(legacy_path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                warn!(%error, path = %legacy_path.display(), "failed to read legacy export");
                return Ok(None);
            }
        };

        match serde_json::from_slice::<Vec<Campaign>>(&bytes) {
            Ok(campaigns) => {
                info!(
                    path = %legacy_path.display(),
                    count = campaigns.len(),
                    "adopting legacy campaign export"
                );
                // Adopt first, delete second: the legacy copy survives
                // until the data is safe in the primary snapshot.
                self.save_campaigns(&campaigns).await?;
                if let Err(error) = fs::remove_file(legacy_path).await {
                    warn!(%error, "failed to delete adopted legacy export");
                }
                Ok(Some(campaigns))
            }
            Err(error) => {
                warn!(
                    %error,
                    path = %legacy_path.display(),
                    "legacy campaign export is malformed, discarding"
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl CampaignStore for JsonSnapshotStore {
    #[tracing::instrument(skip(self))]
    async fn load_campaigns(&self) -> Result<Option<Vec<Campaign>>, Error> {
        match fs::read(&self.snapshot_path).await {
            Ok(bytes) => {
                let campaigns =
                    serde_json::from_slice(&bytes).map_err(Error::FailedToParseSnapshot)?;
                Ok(Some(campaigns))
            }
            Err(error) if error.kind() == ErrorKind::NotFound => self.adopt_legacy_export().await,
            Err(error) => Err(error.into()),
        }
    }

    #[tracing::instrument(skip(self, campaigns), fields(count = campaigns.len()))]
    async fn save_campaigns(&self, campaigns: &[Campaign]) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(campaigns)?;

        if let Some(parent) = self.snapshot_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write-then-rename keeps the previous snapshot intact if the
        // process dies mid-write.
        let staging_path = self.snapshot_path.with_extension("json.tmp");
        fs::write(&staging_path, &json).await?;
        fs::rename(&staging_path, &self.snapshot_path).await?;

        Ok(())
    }
}

enum WriterMessage {
    Save(Vec<Campaign>),
    Flush(oneshot::Sender<()>),
}

/// Single-writer persistence queue. Mutations enqueue the full snapshot;
/// a burst of edits collapses to the newest one so writes never
/// interleave and a save in flight is never interrupted.
pub struct SnapshotWriter {
    tx: mpsc::UnboundedSender<WriterMessage>,
}

impl SnapshotWriter {
    pub fn spawn(store: Arc<dyn CampaignStore>) -> SnapshotWriter {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    WriterMessage::Save(mut snapshot) => {
                        let mut flushes = Vec::new();
                        loop {
                            match rx.try_recv() {
                                Ok(WriterMessage::Save(newer)) => snapshot = newer,
                                Ok(WriterMessage::Flush(ack)) => {
                                    flushes.push(ack);
                                    break;
                                }
                                Err(_) => break,
                            }
                        }

                        if let Err(error) = store.save_campaigns(&snapshot).await {
                            error!(%error, "failed to save campaign snapshot");
                        }
                        for ack in flushes {
                            let _ = ack.send(());
                        }
                    }
                    WriterMessage::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });

        SnapshotWriter { tx }
    }

    /// Best-effort: a failed save is logged by the writer task, never
    /// surfaced to the mutation that triggered it.
    pub fn enqueue(&self, campaigns: Vec<Campaign>) {
        if self.tx.send(WriterMessage::Save(campaigns)).is_err() {
            error!("snapshot writer task is gone, dropping save");
        }
    }

    /// Resolves once every previously enqueued save has been written.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(WriterMessage::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

#[cfg(test)]
pub mod test {
    use std::sync::Mutex;

    use super::*;

    /// In-memory stand-in for the snapshot store.
    #[derive(Default)]
    pub struct MemoryStore {
        pub snapshot: Mutex<Option<Vec<Campaign>>>,
        pub save_count: Mutex<usize>,
    }

    #[async_trait]
    impl CampaignStore for MemoryStore {
        async fn load_campaigns(&self) -> Result<Option<Vec<Campaign>>, Error> {
            Ok(self.snapshot.lock().unwrap().clone())
        }

        async fn save_campaigns(&self, campaigns: &[Campaign]) -> Result<(), Error> {
            *self.snapshot.lock().unwrap() = Some(campaigns.to_vec());
            *self.save_count.lock().unwrap() += 1;
            Ok(())
        }
    }
}
