//! Wallpaper acquisition: resolution-aware URL construction, connectivity
//! pre-check, download with format validation, apply, and the artifact
//! cache.
//!
//! Nothing here touches controller state. [`pipeline::Pipeline`] runs one
//! fetch-apply-register sequence and returns a typed error; the controller
//! turns that error into an alert.

pub mod applier;
pub mod cache;
pub mod category;
pub mod connectivity;
pub mod display;
pub mod fetcher;
pub mod pipeline;
pub mod url;

pub use category::{Category, Resolution};

use applier::ApplyError;

/// Failure of one change attempt.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Connectivity probe failed; no download was attempted.
    #[error("not connected to the internet")]
    Offline,
    /// Non-2xx status or transport fault during the download.
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    /// Payload is not a JPEG.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Apply(#[from] ApplyError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The worker task ended without reporting an outcome.
    #[error("wallpaper task ended before completing")]
    Aborted,
}

impl PipelineError {
    /// Alert title and message for the user.
    pub fn alert(&self) -> (&'static str, String) {
        match self {
            PipelineError::Offline => (
                "No Internet",
                "You're not connected to the internet.\nPlease check your connection and try again."
                    .to_string(),
            ),
            PipelineError::Http(e) => (
                "Download Error",
                format!("Failed to download wallpaper.\n{e}"),
            ),
            PipelineError::Validation(detail) => (
                "Download Error",
                format!("Invalid image received.\n{detail}"),
            ),
            PipelineError::Apply(e) => ("Set Wallpaper Error", format!("Could not set wallpaper:\n{e}")),
            PipelineError::Io(_) | PipelineError::Aborted => (
                "Category Error",
                format!("Failed to change wallpaper:\n{self}"),
            ),
        }
    }

    /// Machine-readable reason for wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Offline => "offline",
            PipelineError::Http(_) => "http_error",
            PipelineError::Validation(_) => "invalid_image",
            PipelineError::Apply(_) => "apply_failed",
            PipelineError::Io(_) => "io_error",
            PipelineError::Aborted => "aborted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_alert_text() {
        let (title, message) = PipelineError::Offline.alert();
        assert_eq!(title, "No Internet");
        assert!(message.starts_with("You're not connected to the internet.\n"));
    }

    #[test]
    fn validation_and_http_share_title() {
        let (title, message) = PipelineError::Validation("not a JPEG".into()).alert();
        assert_eq!(title, "Download Error");
        assert_eq!(message, "Invalid image received.\nnot a JPEG");
    }

    #[test]
    fn apply_alert_carries_diagnostic() {
        let err = PipelineError::from(ApplyError::Os("no desktop".into()));
        let (title, message) = err.alert();
        assert_eq!(title, "Set Wallpaper Error");
        assert!(message.ends_with("no desktop"));
        assert_eq!(err.code(), "apply_failed");
    }

    #[test]
    fn aborted_is_category_error() {
        assert_eq!(PipelineError::Aborted.alert().0, "Category Error");
    }
}
