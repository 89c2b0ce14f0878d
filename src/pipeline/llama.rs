//! LlamaParse HTTP backend for [`DocumentParser`].
//!
//! The service is job-based: upload the file, poll the job until it leaves
//! `PENDING`, then fetch the Markdown result. One job yields one segment.

use crate::config::HarvestConfig;
use crate::error::{HarvestError, ParseServiceError};
use crate::output::ParsedText;
use crate::pipeline::parse::{ApiCredential, DocumentParser};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct JobCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct MarkdownResult {
    markdown: String,
}

/// Client for the LlamaParse REST API.
#[derive(Debug, Clone)]
pub struct LlamaParseClient {
    http: reqwest::Client,
    endpoint: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl LlamaParseClient {
    pub fn new(config: &HarvestConfig) -> Result<Self, HarvestError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| HarvestError::HttpClient(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.parse_endpoint.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(config.parse_poll_interval_ms),
            timeout: Duration::from_secs(config.parse_timeout_secs),
        })
    }

    async fn upload(
        &self,
        path: &Path,
        credential: &ApiCredential,
        language: &str,
    ) -> Result<String, ParseServiceError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ParseServiceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = Form::new().text("language", language.to_string()).part("file", part);

        let job: JobCreated = self
            .http
            .post(format!("{}/upload", self.endpoint))
            .bearer_auth(credential.secret())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(job.id)
    }

    async fn wait(&self, job_id: &str, credential: &ApiCredential) -> Result<(), ParseServiceError> {
        let started = Instant::now();
        loop {
            let status: JobStatus = self
                .http
                .get(format!("{}/job/{}", self.endpoint, job_id))
                .bearer_auth(credential.secret())
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            match status.status.as_str() {
                "SUCCESS" => return Ok(()),
                "ERROR" | "CANCELED" | "CANCELLED" => {
                    return Err(ParseServiceError::JobFailed {
                        job_id: job_id.to_string(),
                        status: status.status,
                    })
                }
                other => debug!("Job {}: {}", job_id, other),
            }

            if started.elapsed() >= self.timeout {
                return Err(ParseServiceError::JobTimeout {
                    job_id: job_id.to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl DocumentParser for LlamaParseClient {
    async fn parse(
        &self,
        path: &Path,
        credential: &ApiCredential,
        language: &str,
    ) -> Result<Vec<ParsedText>, ParseServiceError> {
        let job_id = self.upload(path, credential, language).await?;
        debug!("Uploaded {} as job {}", path.display(), job_id);
        self.wait(&job_id, credential).await?;

        let result: MarkdownResult = self
            .http
            .get(format!("{}/job/{}/result/markdown", self.endpoint, job_id))
            .bearer_auth(credential.secret())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if result.markdown.trim().is_empty() {
            return Err(ParseServiceError::Empty);
        }
        Ok(vec![ParsedText::new(result.markdown)])
    }
}
