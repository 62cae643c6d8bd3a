//! In-memory artifact registry backed by files on disk.
//!
//! Entries are write-once: identifiers are never reused and an entry is
//! never mutated after registration. Skill-produced files stay where the
//! skill wrote them; in-memory payloads land under
//! `<data-dir>/runtime/<artifact-id>/<filename>`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub id: String,
    pub file_path: PathBuf,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    /// RFC 3339 creation instant.
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,
}

pub struct ArtifactStore {
    data_dir: PathBuf,
    artifacts: RwLock<HashMap<String, ArtifactEntry>>,
}

impl ArtifactStore {
    /// Creates the store, failing if the base directory cannot be created.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            artifacts: RwLock::new(HashMap::new()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn new_id() -> String {
        format!("artifact_{}", uuid::Uuid::new_v4().simple())
    }

    /// Registers a file a skill already wrote to disk.
    pub async fn register_file(
        &self,
        path: &Path,
        mime_type: &str,
        title: Option<String>,
        description: Option<String>,
        metadata: serde_json::Map<String, Value>,
    ) -> Result<ArtifactEntry> {
        let info = tokio::fs::metadata(path).await.map_err(|err| {
            AgentError::ArtifactUnavailable(format!("{}: {err}", path.display()))
        })?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AgentError::ArtifactUnavailable(format!("{} has no file name", path.display()))
            })?;

        let entry = ArtifactEntry {
            id: Self::new_id(),
            file_path: path.to_path_buf(),
            file_name,
            mime_type: mime_type.to_string(),
            size: info.len(),
            created_at: rfc3339_now(),
            title,
            description,
            metadata,
        };
        self.insert(entry).await
    }

    /// Persists in-memory bytes under the runtime directory and registers
    /// the result.
    pub async fn register_bytes(
        &self,
        file_name: &str,
        bytes: &[u8],
        mime_type: &str,
        title: Option<String>,
        description: Option<String>,
        metadata: serde_json::Map<String, Value>,
    ) -> Result<ArtifactEntry> {
        let id = Self::new_id();
        let dir = self.data_dir.join("runtime").join(&id);
        tokio::fs::create_dir_all(&dir).await.map_err(|err| {
            AgentError::ArtifactUnavailable(format!("runtime dir {}: {err}", dir.display()))
        })?;

        let file_path = dir.join(file_name);
        tokio::fs::write(&file_path, bytes).await.map_err(|err| {
            AgentError::ArtifactUnavailable(format!("{}: {err}", file_path.display()))
        })?;

        let entry = ArtifactEntry {
            id,
            file_path,
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            size: bytes.len() as u64,
            created_at: rfc3339_now(),
            title,
            description,
            metadata,
        };
        self.insert(entry).await
    }

    async fn insert(&self, entry: ArtifactEntry) -> Result<ArtifactEntry> {
        let mut artifacts = self.artifacts.write().await;
        if artifacts.contains_key(&entry.id) {
            // uuid collision would be a bug elsewhere; refuse to overwrite.
            warn!(target = "agent.artifacts", id = %entry.id, "duplicate artifact id");
            return Err(AgentError::ArtifactUnavailable(format!(
                "artifact id {} already registered",
                entry.id
            )));
        }
        artifacts.insert(entry.id.clone(), entry.clone());
        drop(artifacts);

        info!(
            target = "agent.artifacts",
            id = %entry.id,
            file = %entry.file_name,
            size = entry.size,
            "artifact registered"
        );
        Ok(entry)
    }

    pub async fn get(&self, id: &str) -> Option<ArtifactEntry> {
        self.artifacts.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }
}

/// RFC 3339 UTC timestamp without a date-time dependency.
pub(crate) fn rfc3339_now() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs();
    let millis = now.subsec_millis();

    let days = secs / 86_400;
    let (year, month, day) = civil_from_days(days as i64);
    let rem = secs % 86_400;
    let (hour, minute, second) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{millis:03}Z")
}

/// Filename-friendly `YYYY-MM-DD_HH-MM-SS.mmm` timestamp.
pub(crate) fn filename_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs();
    let millis = now.subsec_millis();

    let days = secs / 86_400;
    let (year, month, day) = civil_from_days(days as i64);
    let rem = secs % 86_400;
    let (hour, minute, second) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    format!("{year:04}-{month:02}-{day:02}_{hour:02}-{minute:02}-{second:02}.{millis:03}")
}

/// Days-since-epoch to (year, month, day), Howard Hinnant's algorithm.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}
