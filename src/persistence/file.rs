//! JSON-file store.
//!
//! Layout under the data directory:
//! ```text
//! circuits/<encoded key>.json
//! checkpoints/<encoded execution id>.json
//! ```
//! Each write goes to a uniquely named temp file, is fsynced, then renamed
//! over the target, so a crash leaves either the old or the new record.
//! The parent directory is fsynced after every rename or delete so the
//! directory entry itself survives power loss.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::breaker::CircuitActor;
use crate::persistence::{StateStore, StoreError};
use crate::remediation::WorkflowCheckpoint;

const CIRCUITS_DIR: &str = "circuits";
const CHECKPOINTS_DIR: &str = "checkpoints";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(root.join(CIRCUITS_DIR)).await?;
        fs::create_dir_all(root.join(CHECKPOINTS_DIR)).await?;
        sync_dir(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, dir: &str, id: &str) -> PathBuf {
        self.root.join(dir).join(format!("{}.json", encode_key(id)))
    }

    async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        sync_parent(path).await
    }

    async fn list_records<T: DeserializeOwned>(&self, dir: &str) -> Result<Vec<T>, StoreError> {
        let mut entries = fs::read_dir(self.root.join(dir)).await?;
        let mut records = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record::<T>(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                }
            }
        }
        Ok(records)
    }
}

async fn sync_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(dir) => sync_dir(dir).await,
        None => Ok(()),
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

// Directories cannot be opened as files here; rename durability is left to
// the filesystem.
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[async_trait]
impl StateStore for FileStore {
    async fn load_circuit(&self, key: &str) -> Result<Option<CircuitActor>, StoreError> {
        Self::read_record(&self.record_path(CIRCUITS_DIR, key)).await
    }

    async fn save_circuit(&self, actor: &CircuitActor) -> Result<(), StoreError> {
        Self::write_record(&self.record_path(CIRCUITS_DIR, actor.key()), actor).await
    }

    async fn remove_circuit(&self, key: &str) -> Result<(), StoreError> {
        let path = self.record_path(CIRCUITS_DIR, key);
        match fs::remove_file(&path).await {
            Ok(()) => sync_parent(&path).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_circuits(&self) -> Result<Vec<CircuitActor>, StoreError> {
        self.list_records(CIRCUITS_DIR).await
    }

    async fn load_checkpoint(&self, execution_id: &str) -> Result<Option<WorkflowCheckpoint>, StoreError> {
        Self::read_record(&self.record_path(CHECKPOINTS_DIR, execution_id)).await
    }

    async fn save_checkpoint(&self, checkpoint: &WorkflowCheckpoint) -> Result<(), StoreError> {
        Self::write_record(&self.record_path(CHECKPOINTS_DIR, &checkpoint.execution_id), checkpoint).await
    }

    async fn list_checkpoints(&self) -> Result<Vec<WorkflowCheckpoint>, StoreError> {
        self.list_records(CHECKPOINTS_DIR).await
    }
}

/// Make an opaque key safe as a file name. Unreserved ASCII is kept, every
/// other byte becomes `%XX`, so distinct keys never collide.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (i, b) in key.bytes().enumerate() {
        let keep = b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || (b == b'.' && i > 0);
        if keep {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}
