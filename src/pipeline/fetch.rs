//! Registry access: detail pages and rendition binaries over HTTP.
//!
//! The registry signals an absent record by redirecting to its generic
//! landing page rather than returning 404, so "not found" is decided on the
//! final URL after redirects. Everything else that is not a 2xx is a fetch
//! failure for that attempt.

use crate::config::HarvestConfig;
use crate::error::{AttemptError, HarvestError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of fetching a detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedPage {
    /// The registry redirected to its landing page.
    NotFound,
    /// Decoded HTML of the detail page.
    Found(String),
}

/// Source of detail pages and rendition binaries.
#[async_trait]
pub trait LabelSource: Send + Sync {
    /// GET a detail page.
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, AttemptError>;

    /// GET a rendition binary. Non-200 and transport errors are
    /// [`AttemptError::DownloadFailure`].
    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, AttemptError>;
}

/// [`LabelSource`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpLabelSource {
    client: reqwest::Client,
    not_found_url: String,
    read_timeout_secs: u64,
}

impl HttpLabelSource {
    /// Build a client with the configured connect/read timeout pair.
    pub fn new(config: &HarvestConfig) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .map_err(|e| HarvestError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            not_found_url: config.not_found_url(),
            read_timeout_secs: config.read_timeout_secs,
        })
    }

    fn describe(&self, e: &reqwest::Error) -> String {
        if e.is_timeout() {
            format!("timed out after {}s", self.read_timeout_secs)
        } else {
            e.to_string()
        }
    }
}

/// Whether `final_url` is the registry's "no such record" landing page.
pub fn is_landing_redirect(final_url: &str, not_found_url: &str) -> bool {
    final_url.trim_end_matches('/') == not_found_url.trim_end_matches('/')
}

#[async_trait]
impl LabelSource for HttpLabelSource {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, AttemptError> {
        info!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptError::PageFetchFailed {
                url: url.to_string(),
                reason: self.describe(&e),
            })?;

        if is_landing_redirect(response.url().as_str(), &self.not_found_url) {
            debug!("{} redirected to landing page", url);
            return Ok(FetchedPage::NotFound);
        }

        if !response.status().is_success() {
            return Err(AttemptError::PageFetchFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| AttemptError::PageFetchFailed {
                url: url.to_string(),
                reason: self.describe(&e),
            })?;

        Ok(FetchedPage::Found(html))
    }

    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, AttemptError> {
        debug!("Downloading rendition {}", url);

        let failure = |reason: String| AttemptError::DownloadFailure {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failure(self.describe(&e)))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(failure(format!("HTTP {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| failure(self.describe(&e)))?;

        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_redirect_ignores_trailing_slash() {
        let landing = "https://mcp.fda.gov.tw/im";
        assert!(is_landing_redirect("https://mcp.fda.gov.tw/im", landing));
        assert!(is_landing_redirect("https://mcp.fda.gov.tw/im/", landing));
        assert!(!is_landing_redirect(
            "https://mcp.fda.gov.tw/im_detail_pdf/衛部藥製第000001號/",
            landing
        ));
    }

    #[test]
    fn client_builds_from_default_config() {
        let source = HttpLabelSource::new(&HarvestConfig::default()).unwrap();
        assert_eq!(source.not_found_url, "https://mcp.fda.gov.tw/im");
    }
}
