//! Download and validate one wallpaper image.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use image::ImageFormat;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::PipelineError;
use super::cache::{ARTIFACT_PREFIX, ARTIFACT_SUFFIX, WallpaperArtifact, discard};
use super::category::Category;
use super::connectivity::ConnectivityChecker;

/// Default HTTP timeout for one download.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Bytes read back from a written artifact for signature detection.
const HEADER_LEN: u64 = 32;

pub struct Fetcher {
    client: reqwest::Client,
    connectivity: Arc<dyn ConnectivityChecker>,
    artifact_dir: PathBuf,
}

impl Fetcher {
    pub fn new(
        connectivity: Arc<dyn ConnectivityChecker>,
        artifact_dir: PathBuf,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("iowall/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            connectivity,
            artifact_dir,
        })
    }

    /// Fetch `url` into a fresh `IoWall_*.jpg` artifact.
    ///
    /// Checks connectivity first and issues no request when offline. The
    /// returned artifact has passed JPEG signature validation. On any
    /// failure after the file was created, the file is removed.
    pub async fn download(
        &self,
        url: &str,
        category: Category,
    ) -> Result<WallpaperArtifact, PipelineError> {
        if !self.connectivity.is_online().await {
            return Err(PipelineError::Offline);
        }

        let response = self.client.get(url).send().await?.error_for_status()?;
        tracing::debug!(
            url,
            status = %response.status(),
            content_type = ?response.headers().get(reqwest::header::CONTENT_TYPE),
            "download response"
        );
        let body = response.bytes().await?;

        let path = self.write_artifact(&body).await?;
        if let Err(e) = validate_jpeg(&path).await {
            discard(&path).await;
            return Err(e);
        }

        tracing::debug!(path = %path.display(), bytes = body.len(), "artifact written");
        Ok(WallpaperArtifact {
            path,
            category,
            created_at: Local::now(),
        })
    }

    async fn write_artifact(&self, body: &[u8]) -> Result<PathBuf, PipelineError> {
        let (file, path) = tempfile::Builder::new()
            .prefix(ARTIFACT_PREFIX)
            .suffix(ARTIFACT_SUFFIX)
            .tempfile_in(&self.artifact_dir)?
            .keep()
            .map_err(|e| e.error)?;

        let mut file = tokio::fs::File::from_std(file);
        let written: std::io::Result<()> = async {
            file.write_all(body).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            discard(&path).await;
            return Err(e.into());
        }
        Ok(path)
    }
}

async fn validate_jpeg(path: &Path) -> Result<(), PipelineError> {
    let mut header = Vec::with_capacity(HEADER_LEN as usize);
    let mut reader = tokio::fs::File::open(path).await?.take(HEADER_LEN);
    reader.read_to_end(&mut header).await?;

    if header.is_empty() {
        return Err(PipelineError::Validation("empty response body".into()));
    }
    match image::guess_format(&header) {
        Ok(ImageFormat::Jpeg) => Ok(()),
        Ok(other) => Err(PipelineError::Validation(format!(
            "expected a JPEG image, got {other:?}"
        ))),
        Err(_) => Err(PipelineError::Validation(
            "downloaded file is not a valid JPEG image".into(),
        )),
    }
}
