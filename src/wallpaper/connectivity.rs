//! Reachability probe run before every download attempt.

use std::time::Duration;

use async_trait::async_trait;

/// Default probe target.
pub const DEFAULT_PROBE_URL: &str = "https://www.google.com";

/// Default probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Pure boolean gate. Implementations must not retry.
#[async_trait]
pub trait ConnectivityChecker: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// One bounded HTTP GET against a stable host.
///
/// Any response, whatever its status, counts as online. Timeouts, DNS
/// failures and refused connections count as offline.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ConnectivityChecker for HttpProbe {
    async fn is_online(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "connectivity probe failed");
                false
            }
        }
    }
}
