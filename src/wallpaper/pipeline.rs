//! One change attempt: build URL, download, apply, register.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::PipelineError;
use super::applier::{ApplyError, WallpaperApplier};
use super::cache::{ArtifactInfo, CacheManager, discard};
use super::category::{Category, Resolution};
use super::fetcher::Fetcher;
use super::url::UrlBuilder;

/// The fetch-apply-register sequence shared by every change worker.
pub struct Pipeline {
    urls: UrlBuilder,
    fetcher: Fetcher,
    applier: Arc<dyn WallpaperApplier>,
    cache: Arc<Mutex<CacheManager>>,
}

impl Pipeline {
    pub fn new(
        urls: UrlBuilder,
        fetcher: Fetcher,
        applier: Arc<dyn WallpaperApplier>,
        cache: Arc<Mutex<CacheManager>>,
    ) -> Self {
        Self {
            urls,
            fetcher,
            applier,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<Mutex<CacheManager>> {
        &self.cache
    }

    /// Run one change.
    ///
    /// The new artifact becomes current only after it has been applied; a
    /// failure at any step leaves the previous artifact current and on disk.
    pub async fn run(
        &self,
        category: Category,
        resolution: Resolution,
    ) -> Result<ArtifactInfo, PipelineError> {
        let url = self.urls.build(category, resolution);
        tracing::info!(%category, %resolution, %url, "fetching wallpaper");

        let artifact = self.fetcher.download(&url, category).await?;

        let applier = Arc::clone(&self.applier);
        let path = artifact.path.clone();
        let applied = tokio::task::spawn_blocking(move || applier.apply(&path))
            .await
            .map_err(|e| ApplyError::Join(e.to_string()))
            .and_then(|result| result);
        if let Err(e) = applied {
            discard(&artifact.path).await;
            return Err(e.into());
        }

        let info = artifact.info();
        self.cache.lock().await.register_current(artifact).await;
        tracing::info!(%category, path = %info.path.display(), "wallpaper applied");
        Ok(info)
    }
}
