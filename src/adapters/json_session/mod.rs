// JSON session adapter - Clip list persistence with serde_json and tokio::fs

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::errors::PortError;
use crate::domain::model::MediaClip;
use crate::ports::{PortResult, SavedSession, SessionPort};

const SESSION_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    version: u32,
    saved_at: DateTime<Utc>,
    clips: Vec<MediaClip>,
}

/// Stores the clip list as one JSON document
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    path: PathBuf,
}

impl JsonSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

async fn source_exists(source: &str) -> bool {
    tokio::fs::try_exists(source).await.unwrap_or(false)
}

#[async_trait]
impl SessionPort for JsonSessionStore {
    async fn save(&self, clips: &[MediaClip]) -> PortResult<()> {
        let record = SessionRecord {
            version: SESSION_VERSION,
            saved_at: Utc::now(),
            clips: clips.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| PortError::Io(format!("serialize session: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Replace in one step so a crash never leaves half a session behind
        let temp = self.temp_path();
        tokio::fs::write(&temp, &json).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        info!("Saved {} clips to {}", clips.len(), self.path.display());
        Ok(())
    }

    async fn restore(&self) -> PortResult<Option<SavedSession>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let record: SessionRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring unreadable session {}: {}", self.path.display(), e);
                return Ok(None);
            }
        };
        if record.version > SESSION_VERSION {
            warn!(
                "Session {} has newer version {}, reading known fields only",
                self.path.display(),
                record.version
            );
        }

        let mut clips = Vec::with_capacity(record.clips.len());
        for clip in record.clips {
            if source_exists(&clip.source).await {
                clips.push(clip);
            } else {
                warn!("Dropping clip {}: source no longer exists", clip.source);
            }
        }

        Ok(Some(SavedSession {
            saved_at: record.saved_at,
            clips,
        }))
    }
}
