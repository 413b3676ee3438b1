//! Fetch URL construction.
//!
//! Pure mapping from (category, resolution) to an image-service URL. The
//! service returns a random image per request; seeded paths keep results
//! topically consistent per category, and `Abstract` adds a blur so it is
//! visually distinct from `Random` even when the service ignores seeds.

use super::category::{Category, Resolution};

/// Default image service.
pub const DEFAULT_BASE_URL: &str = "https://picsum.photos";

/// Blur strength applied to the abstract category.
const ABSTRACT_BLUR: u8 = 2;

#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base: String,
}

impl UrlBuilder {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn build(&self, category: Category, resolution: Resolution) -> String {
        let Resolution { width, height } = resolution;
        match category {
            Category::Random => format!("{}/{width}/{height}", self.base),
            Category::Abstract => format!(
                "{}/seed/abstract/{width}/{height}?blur={ABSTRACT_BLUR}",
                self.base
            ),
            seeded => format!("{}/seed/{}/{width}/{height}", self.base, seeded.keyword()),
        }
    }
}

impl Default for UrlBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
