//! Painting the desktop background from a file.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Desktop background change failed. Carries the OS-level diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("{0}")]
    Os(String),
    #[error("failed to run `{command}`: {source}")]
    Spawn { command: String, source: io::Error },
    #[error("`{command}` exited with {status}")]
    Command { command: String, status: String },
    #[error("apply task failed: {0}")]
    Join(String),
}

/// Blocking OS call that sets the wallpaper. Runs on the blocking pool.
pub trait WallpaperApplier: Send + Sync {
    fn apply(&self, path: &Path) -> Result<(), ApplyError>;
}

/// The platform's own mechanism, via the `wallpaper` crate.
pub struct SystemApplier;

impl WallpaperApplier for SystemApplier {
    fn apply(&self, path: &Path) -> Result<(), ApplyError> {
        if !path.exists() {
            return Err(ApplyError::NotFound(path.to_path_buf()));
        }
        let path_str = path.display().to_string();
        wallpaper::set_from_path(&path_str).map_err(|e| ApplyError::Os(e.to_string()))
    }
}

/// A user-supplied shell template.
///
/// `%f` is replaced by the artifact path. The result is split on `;` and
/// each part runs through `sh -c` in order; the first non-zero exit stops
/// the chain.
pub struct CommandApplier {
    template: String,
}

impl CommandApplier {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl WallpaperApplier for CommandApplier {
    fn apply(&self, path: &Path) -> Result<(), ApplyError> {
        let rendered = self.template.replace("%f", &path.to_string_lossy());
        for part in rendered.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            tracing::debug!(command = part, "running apply command");
            let status = Command::new("sh")
                .arg("-c")
                .arg(part)
                .status()
                .map_err(|source| ApplyError::Spawn {
                    command: part.to_string(),
                    source,
                })?;
            if !status.success() {
                return Err(ApplyError::Command {
                    command: part.to_string(),
                    status: status.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_applier_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("IoWall_gone.jpg");
        assert!(matches!(
            SystemApplier.apply(&missing),
            Err(ApplyError::NotFound(_))
        ));
    }

    #[test]
    fn command_substitutes_path_and_runs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("IoWall_x.jpg");
        std::fs::write(&src, b"img").unwrap();
        let out = dir.path().join("out.jpg");
        let log = dir.path().join("log");

        let applier = CommandApplier::new(format!(
            "cp %f {}; echo done >> {}",
            out.display(),
            log.display()
        ));
        applier.apply(&src).unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), b"img");
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "done\n");
    }

    #[test]
    fn failing_part_stops_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let applier = CommandApplier::new(format!("false; touch {}", marker.display()));

        let err = applier.apply(Path::new("/tmp/IoWall_x.jpg")).unwrap_err();
        assert!(matches!(err, ApplyError::Command { ref command, .. } if command == "false"));
        assert!(!marker.exists());
    }

    #[test]
    fn empty_parts_are_skipped() {
        CommandApplier::new(" ; true ;; ")
            .apply(Path::new("/tmp/IoWall_x.jpg"))
            .unwrap();
    }
}
