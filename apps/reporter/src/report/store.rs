//! Flat on-disk artifact store.
//!
//! - One writer per filename at a time (per-name async mutex).
//! - Bytes land in a temp file in the same directory and are renamed into
//!   place, so a reader sees either the old artifact or the new one.
//! - Listing only reports `*.pdf` files; temp files never match.

use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use bytes::Bytes;
use chrono::{DateTime, Local};
use serde::Serialize;
use tempfile::Builder as TempBuilder;
use thiserror::Error;
use tracing::{debug, info};

use crate::report::naming::{self, NameError};

const TEMP_PREFIX: &str = ".reporter-";
const TEMP_SUFFIX: &str = ".part";
/// Upper bound on `_N` suffixes tried for a taken timestamp name.
const MAX_UNIQUE_ATTEMPTS: u32 = 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    InvalidName(#[from] NameError),

    #[error("Report '{0}' not found")]
    NotFound(String),

    #[error("No free filename derived from '{0}'")]
    Exhausted(String),

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store worker failed: {0}")]
    Worker(String),
}

/// How `write` treats an existing artifact with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Replace it. Last writer wins.
    Overwrite,
    /// Keep it and pick `name_2.pdf`, `name_3.pdf`, ...
    Unique,
}

#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub created: DateTime<Local>,
    pub download_url: String,
}

pub fn download_url(filename: &str) -> String {
    format!("/download/{filename}")
}

pub struct ArtifactStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ArtifactStore {
    /// Opens the store, creating the directory if it does not exist.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        info!(dir = %dir.display(), "Artifact store ready");
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub async fn write(
        &self,
        filename: &str,
        bytes: Bytes,
        policy: WritePolicy,
    ) -> Result<StoredArtifact, StoreError> {
        naming::validate(filename)?;

        match policy {
            WritePolicy::Overwrite => {
                self.with_lock(filename, self.persist(filename, bytes))
                    .await
            }
            WritePolicy::Unique => {
                for n in 1..=MAX_UNIQUE_ATTEMPTS {
                    let candidate = if n == 1 {
                        filename.to_string()
                    } else {
                        naming::with_suffix(filename, n)
                    };
                    let claimed = self
                        .with_lock(&candidate, self.persist_if_free(&candidate, bytes.clone()))
                        .await?;
                    if let Some(stored) = claimed {
                        return Ok(stored);
                    }
                    debug!(candidate = %candidate, "Filename taken, trying next suffix");
                }
                Err(StoreError::Exhausted(filename.to_string()))
            }
        }
    }

    /// Runs `op` while holding the per-name lock.
    async fn with_lock<T>(&self, filename: &str, op: impl Future<Output = T>) -> T {
        let lock = self.lock_for(filename);
        let guard = lock.clone().lock_owned().await;
        let result = op.await;
        drop(guard);
        self.release(filename, lock);
        result
    }

    /// `None` when an artifact already holds the name.
    async fn persist_if_free(
        &self,
        filename: &str,
        bytes: Bytes,
    ) -> Result<Option<StoredArtifact>, StoreError> {
        if tokio::fs::try_exists(self.dir.join(filename)).await? {
            return Ok(None);
        }
        self.persist(filename, bytes).await.map(Some)
    }

    async fn persist(&self, filename: &str, bytes: Bytes) -> Result<StoredArtifact, StoreError> {
        let target = self.dir.join(filename);
        let dir = self.dir.clone();
        let dest = target.clone();
        let size_bytes = bytes.len() as u64;
        tokio::task::spawn_blocking(move || persist_atomically(&dir, &dest, &bytes))
            .await
            .map_err(|e| StoreError::Worker(format!("spawn_blocking failed in write: {e}")))??;

        debug!(filename, size_bytes, "Artifact written");
        Ok(StoredArtifact {
            filename: filename.to_string(),
            path: target,
            size_bytes,
        })
    }

    pub async fn read(&self, filename: &str) -> Result<Bytes, StoreError> {
        naming::validate(filename)?;
        match tokio::fs::read(self.dir.join(filename)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(filename.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Every `.pdf` artifact, newest first.
    pub async fn list(&self) -> Result<Vec<ArtifactInfo>, StoreError> {
        let mut reports = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            if !naming::has_pdf_extension(&filename) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let created: SystemTime = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            reports.push(ArtifactInfo {
                download_url: download_url(&filename),
                filename,
                size_bytes: metadata.len(),
                created: DateTime::<Local>::from(created),
            });
        }

        reports.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(reports)
    }

    fn lock_for(&self, filename: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks
            .entry(filename.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drops the map entry once no other task holds or waits on it.
    fn release(&self, filename: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        drop(lock);
        if locks
            .get(filename)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(filename);
        }
    }
}

fn persist_atomically(dir: &Path, dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = TempBuilder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
