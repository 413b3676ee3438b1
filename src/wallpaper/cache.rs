//! Artifact cache: the single current temporary wallpaper plus saved copies.
//!
//! Temporary artifacts live in the artifact directory (the system temp dir
//! by default) as `IoWall_<random>.jpg`. Exactly one is current at a time;
//! the previous one is deleted once a replacement has been fetched,
//! validated and applied. Anything matching the naming convention at
//! startup is an orphan from an earlier process and is swept.
//!
//! Saved copies go to the save directory as
//! `<Category>_<YYYYMMDD_HHMMSS>.jpg` and are never touched again. A save
//! that lands on an existing name gets a `_2`, `_3`, ... suffix instead of
//! overwriting it.
//!
//! Every change to the current artifact is published on a
//! [`watch`](tokio::sync::watch) channel while the cache lock is held, so
//! readers never observe an older value after a newer one.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use super::category::Category;

/// File name prefix shared by every temporary artifact.
pub const ARTIFACT_PREFIX: &str = "IoWall_";

/// File extension shared by artifacts and saved copies.
pub const ARTIFACT_SUFFIX: &str = ".jpg";

/// Directory under the user's pictures folder for saved wallpapers.
pub const SAVE_DIR_NAME: &str = "IoWall";

/// Whether `name` follows the temporary artifact naming convention.
pub fn is_artifact_name(name: &str) -> bool {
    name.starts_with(ARTIFACT_PREFIX) && name.ends_with(ARTIFACT_SUFFIX)
}

/// Default save directory: `~/Pictures/IoWall`.
pub fn default_save_dir() -> Option<PathBuf> {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
        .map(|pictures| pictures.join(SAVE_DIR_NAME))
}

/// Highest numbered suffix tried before a save gives up.
const MAX_SAVE_COPIES: u32 = 999;

/// Saved-copy file name for `category` at `at`. Copy 1 has no suffix.
pub fn saved_file_name(category: Category, at: DateTime<Local>, copy: u32) -> String {
    let stamp = at.format("%Y%m%d_%H%M%S");
    match copy {
        0 | 1 => format!("{}_{stamp}{ARTIFACT_SUFFIX}", category.label()),
        n => format!("{}_{stamp}_{n}{ARTIFACT_SUFFIX}", category.label()),
    }
}

/// A downloaded, validated image file.
#[derive(Debug, Clone)]
pub struct WallpaperArtifact {
    pub path: PathBuf,
    pub category: Category,
    pub created_at: DateTime<Local>,
}

impl WallpaperArtifact {
    pub fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            path: self.path.clone(),
            category: self.category,
        }
    }
}

/// Read-only description of the current artifact, safe to hand to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub category: Category,
}

/// Cache operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Benign: there was nothing to delete.
    #[error("no temporary cache file found to delete")]
    NothingToClear,
    #[error("no wallpaper has been set yet")]
    NothingToSave,
    #[error("failed to save wallpaper to {path}: {source}")]
    Save { path: PathBuf, source: io::Error },
    #[error("failed to remove {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
}

impl CacheError {
    /// Machine-readable reason for wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            CacheError::NothingToClear => "nothing_to_clear",
            CacheError::NothingToSave => "nothing_to_save",
            CacheError::Save { .. } => "save_failed",
            CacheError::Remove { .. } => "clear_failed",
        }
    }

    /// Whether this is a no-op notice rather than a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, CacheError::NothingToClear)
    }

    /// Alert (or notice) title and message for the user.
    pub fn alert(&self) -> (&'static str, String) {
        match self {
            CacheError::NothingToClear => (
                "Clear Cache",
                "No temporary cache file found to delete.".to_string(),
            ),
            CacheError::NothingToSave => {
                ("Save Failed", "No wallpaper has been set yet.".to_string())
            }
            CacheError::Save { .. } => ("Save Error", format!("Failed to save wallpaper:\n{self}")),
            CacheError::Remove { .. } => {
                ("Clear Cache Error", format!("Could not clear cache:\n{self}"))
            }
        }
    }
}

/// Outcome of an orphan sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

/// Owns the current artifact reference.
///
/// Shared between the change worker and save/clear tasks behind a
/// `tokio::sync::Mutex`.
#[derive(Debug)]
pub struct CacheManager {
    artifact_dir: PathBuf,
    save_dir: PathBuf,
    current: Option<WallpaperArtifact>,
    published: watch::Sender<Option<ArtifactInfo>>,
}

impl CacheManager {
    pub fn new(artifact_dir: PathBuf, save_dir: PathBuf) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            artifact_dir,
            save_dir,
            current: None,
            published,
        }
    }

    pub fn current(&self) -> Option<&WallpaperArtifact> {
        self.current.as_ref()
    }

    /// Follow the current artifact. The receiver sees every update made
    /// through this manager, in order.
    pub fn watch_current(&self) -> watch::Receiver<Option<ArtifactInfo>> {
        self.published.subscribe()
    }

    fn publish(&self) {
        self.published
            .send_replace(self.current().map(WallpaperArtifact::info));
    }

    /// Delete every leftover artifact in the artifact directory.
    ///
    /// Individual failures are logged and counted; the sweep always runs to
    /// the end.
    pub async fn sweep_orphans(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let mut entries = match fs::read_dir(&self.artifact_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    dir = %self.artifact_dir.display(),
                    error = %e,
                    "cannot list artifact directory, skipping sweep"
                );
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "artifact directory listing interrupted");
                    report.failed += 1;
                    break;
                }
            };

            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !is_artifact_name(name) {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    tracing::warn!(file = name, error = %e, "failed to remove temp file");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Make `artifact` current and delete the artifact it supersedes.
    ///
    /// Returns the superseded path, if any. A failed delete is logged; the
    /// file is then left for the next startup sweep.
    pub async fn register_current(&mut self, artifact: WallpaperArtifact) -> Option<PathBuf> {
        let new_path = artifact.path.clone();
        tracing::debug!(
            path = %new_path.display(),
            category = %artifact.category,
            fetched_at = %artifact.created_at.format("%H:%M:%S"),
            "artifact registered"
        );
        let previous = self.current.replace(artifact);
        self.publish();
        let previous = previous?;
        if previous.path == new_path {
            return None;
        }

        match fs::remove_file(&previous.path).await {
            Ok(()) => {
                tracing::debug!(path = %previous.path.display(), "superseded artifact removed");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %previous.path.display(),
                    error = %e,
                    "failed to remove superseded artifact"
                );
            }
        }
        Some(previous.path)
    }

    /// Delete the current artifact and forget it.
    ///
    /// Returns [`CacheError::NothingToClear`] if there is no current
    /// artifact or its file is already gone. On any other failure the
    /// reference is kept so a later clear can retry.
    pub async fn clear(&mut self) -> Result<PathBuf, CacheError> {
        let artifact = self.current.take().ok_or(CacheError::NothingToClear)?;
        let result = match fs::remove_file(&artifact.path).await {
            Ok(()) => Ok(artifact.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CacheError::NothingToClear),
            Err(source) => {
                let path = artifact.path.clone();
                self.current = Some(artifact);
                Err(CacheError::Remove { path, source })
            }
        };
        self.publish();
        result
    }

    /// Copy the current artifact into the save directory. An existing saved
    /// copy is never overwritten.
    pub async fn persist(&self) -> Result<PathBuf, CacheError> {
        self.persist_at(Local::now()).await
    }

    async fn persist_at(&self, at: DateTime<Local>) -> Result<PathBuf, CacheError> {
        let artifact = self.current.as_ref().ok_or(CacheError::NothingToSave)?;
        if !fs::try_exists(&artifact.path).await.unwrap_or(false) {
            return Err(CacheError::NothingToSave);
        }

        fs::create_dir_all(&self.save_dir)
            .await
            .map_err(|source| CacheError::Save {
                path: self.save_dir.clone(),
                source,
            })?;

        let (mut file, destination) = self
            .create_saved(artifact.category, at)
            .await
            .map_err(|source| CacheError::Save {
                path: self.save_dir.clone(),
                source,
            })?;

        let copied: io::Result<()> = async {
            let mut source = fs::File::open(&artifact.path).await?;
            tokio::io::copy(&mut source, &mut file).await?;
            file.flush().await
        }
        .await;
        if let Err(source) = copied {
            discard(&destination).await;
            return Err(CacheError::Save {
                path: destination,
                source,
            });
        }

        Ok(destination)
    }

    /// Claim the first free saved-copy name with `create_new`.
    async fn create_saved(
        &self,
        category: Category,
        at: DateTime<Local>,
    ) -> io::Result<(fs::File, PathBuf)> {
        for copy in 1..=MAX_SAVE_COPIES {
            let path = self.save_dir.join(saved_file_name(category, at, copy));
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((file, path)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{MAX_SAVE_COPIES} saved copies already exist for this second"),
        ))
    }
}

/// Remove a file that must not outlive a failed pipeline step.
pub(crate) async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to discard artifact");
    }
}
