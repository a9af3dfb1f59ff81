use async_trait::async_trait;
use recollect_core::{Namespace, RecollectError, RecollectResult};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use crate::store::{MemoryId, MemoryRecord};

/// What a backend holds for one namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedNamespace {
    /// Persisted records, in file order.
    pub records: Vec<MemoryRecord>,
    /// Id high-water mark, if one was written. Survives clears and evictions,
    /// so ids are never handed out twice across restarts.
    pub next_id: Option<MemoryId>,
}

/// Durable backing for namespace records.
///
/// The vocabulary is never persisted; it is rebuilt from the records' vectors
/// on load.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Load every persisted record of a namespace (empty if none).
    async fn load(&self, namespace: &Namespace) -> RecollectResult<PersistedNamespace>;

    /// Persist one newly stored record.
    async fn append(&self, namespace: &Namespace, record: &MemoryRecord) -> RecollectResult<()>;

    /// Replace the persisted records of a namespace.
    async fn rewrite(
        &self,
        namespace: &Namespace,
        records: &[MemoryRecord],
        next_id: MemoryId,
    ) -> RecollectResult<()>;

    /// Remove every persisted record of a namespace, keeping its id high-water mark.
    async fn clear(&self, namespace: &Namespace, next_id: MemoryId) -> RecollectResult<()>;
}

/// Backend that keeps nothing; memories live for the process lifetime only.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryBackend;

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    async fn load(&self, _namespace: &Namespace) -> RecollectResult<PersistedNamespace> {
        Ok(PersistedNamespace::default())
    }

    async fn append(&self, _namespace: &Namespace, _record: &MemoryRecord) -> RecollectResult<()> {
        Ok(())
    }

    async fn rewrite(
        &self,
        _namespace: &Namespace,
        _records: &[MemoryRecord],
        _next_id: MemoryId,
    ) -> RecollectResult<()> {
        Ok(())
    }

    async fn clear(&self, _namespace: &Namespace, _next_id: MemoryId) -> RecollectResult<()> {
        Ok(())
    }
}

/// File-backed store that persists each namespace as a JSONL file.
///
/// The file name is the hex-encoded namespace key, so any key maps to a safe,
/// unique path. Appends on store; rewrites via a temp file on eviction,
/// rollback repair, and clear. Rewritten files start with a
/// `{"next_id":N}` line carrying the id high-water mark.
pub struct JsonlBackend {
    dir: PathBuf,
}

/// Id high-water line of a namespace file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct IdMark {
    next_id: MemoryId,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Line {
    Mark(IdMark),
    Record(Box<MemoryRecord>),
}

impl JsonlBackend {
    /// Create a backend rooted at `dir`, creating the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> RecollectResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RecollectError::Storage(format!("Failed to create dir: {e}")))?;
        Ok(Self { dir })
    }

    /// Directory holding the namespace files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn namespace_path(&self, namespace: &Namespace) -> PathBuf {
        self.dir
            .join(format!("ns-{}.jsonl", hex::encode(namespace.as_str())))
    }
}

fn encode_line(value: &impl Serialize) -> RecollectResult<String> {
    let mut line = serde_json::to_string(value)
        .map_err(|e| RecollectError::Storage(format!("Failed to serialize record: {e}")))?;
    line.push('\n');
    Ok(line)
}

#[async_trait]
impl MemoryBackend for JsonlBackend {
    async fn load(&self, namespace: &Namespace) -> RecollectResult<PersistedNamespace> {
        let path = self.namespace_path(namespace);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Ok(PersistedNamespace::default())
            }
            Err(e) => {
                return Err(RecollectError::Storage(format!(
                    "Failed to read memory file: {e}"
                )))
            }
        };

        let mut persisted = PersistedNamespace::default();
        for (lineno, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parsed: Line = serde_json::from_str(line).map_err(|e| {
                RecollectError::Storage(format!("Invalid JSONL entry at line {}: {e}", lineno + 1))
            })?;
            match parsed {
                Line::Mark(mark) => {
                    persisted.next_id = persisted.next_id.max(Some(mark.next_id));
                }
                Line::Record(record) => {
                    if &record.namespace != namespace {
                        return Err(RecollectError::Storage(format!(
                            "record {} belongs to namespace '{}', found in file of '{}'",
                            record.id, record.namespace, namespace
                        )));
                    }
                    persisted.records.push(*record);
                }
            }
        }
        tracing::debug!(
            namespace = %namespace,
            records = persisted.records.len(),
            "Loaded memory file"
        );
        Ok(persisted)
    }

    async fn append(&self, namespace: &Namespace, record: &MemoryRecord) -> RecollectResult<()> {
        use tokio::io::AsyncWriteExt;
        let line = encode_line(record)?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.namespace_path(namespace))
            .await
            .map_err(|e| RecollectError::Storage(format!("Failed to open memory file: {e}")))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| RecollectError::Storage(format!("Failed to write record: {e}")))?;
        file.flush()
            .await
            .map_err(|e| RecollectError::Storage(format!("Failed to flush record: {e}")))?;
        Ok(())
    }

    async fn rewrite(
        &self,
        namespace: &Namespace,
        records: &[MemoryRecord],
        next_id: MemoryId,
    ) -> RecollectResult<()> {
        let path = self.namespace_path(namespace);
        let mut data = encode_line(&IdMark { next_id })?;
        for record in records {
            data.push_str(&encode_line(record)?);
        }

        let tmp = path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, data.as_bytes())
            .await
            .map_err(|e| RecollectError::Storage(format!("Failed to write memory file: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| RecollectError::Storage(format!("Failed to replace memory file: {e}")))?;
        Ok(())
    }

    async fn clear(&self, namespace: &Namespace, next_id: MemoryId) -> RecollectResult<()> {
        self.rewrite(namespace, &[], next_id).await
    }
}
