use crate::checkpoint::{Checkpoint, CheckpointError};
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// File-backed checkpoint with a staleness window
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    staleness: Duration,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, staleness_hours: u64) -> Self {
        Self {
            path: path.into(),
            staleness: Duration::hours(staleness_hours as i64),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the checkpoint if it is present, fresh and well formed
    ///
    /// Stale, unparsable or inconsistent files are ignored with a warning so
    /// that the run starts fresh.
    pub async fn load(&self) -> Option<Checkpoint> {
        self.load_at(Utc::now()).await
    }

    pub async fn load_at(&self, now: DateTime<Utc>) -> Option<Checkpoint> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Cannot read checkpoint: {}", e);
                return None;
            }
        };

        let checkpoint = match parse(&content) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Discarding checkpoint: {}", e);
                return None;
            }
        };

        let age = now - checkpoint.updated_at;
        if age > self.staleness {
            tracing::warn!(
                run_id = %checkpoint.run_id,
                age_hours = age.num_hours(),
                "Checkpoint expired, starting fresh"
            );
            return None;
        }

        tracing::info!(
            run_id = %checkpoint.run_id,
            age_minutes = age.num_minutes(),
            "Loaded checkpoint"
        );
        Some(checkpoint)
    }

    /// Writes the checkpoint atomically: temp file, fsync, rename
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(checkpoint)?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

fn parse(content: &str) -> Result<Checkpoint, CheckpointError> {
    let checkpoint: Checkpoint = serde_json::from_str(content)?;
    checkpoint.validate()?;
    Ok(checkpoint)
}
