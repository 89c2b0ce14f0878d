//! Remote document parsing: credential pool, rotation and retry.
//!
//! The parsing service is rate-limited per API key, so a pool of keys is
//! consumed round-robin. Each successful parse advances the pool by one;
//! failed attempts retry on the same key after a fixed pause.
//!
//! The wire protocol lives behind [`DocumentParser`] so the retry and rotation
//! rules can be exercised without a network. See
//! [`crate::pipeline::llama::LlamaParseClient`] for the HTTP backend.

use crate::config::{HarvestConfig, RotationMode};
use crate::error::{AttemptError, HarvestError, ParseServiceError};
use crate::output::ParsedText;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// One parsing-service API key. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential(String);

impl ApiCredential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Last four characters, for log lines.
    fn tail(&self) -> String {
        let n = self.0.chars().count();
        self.0.chars().skip(n.saturating_sub(4)).collect()
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiCredential(…{})", self.tail())
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "…{}", self.tail())
    }
}

/// Converts a document on disk into ordered text segments.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(
        &self,
        path: &Path,
        credential: &ApiCredential,
        language: &str,
    ) -> Result<Vec<ParsedText>, ParseServiceError>;
}

/// Round-robin cursor over the credential pool.
///
/// With `Rotate`, after K calls to [`advance`](Self::advance) the active index
/// is `K mod M`. With `Pinned(i)` the index stays at `i`.
#[derive(Debug, Clone)]
pub struct CredentialRotator {
    pool: Vec<ApiCredential>,
    mode: RotationMode,
    index: usize,
}

impl CredentialRotator {
    pub fn new(pool: Vec<ApiCredential>, mode: RotationMode) -> Result<Self, HarvestError> {
        if pool.is_empty() {
            return Err(HarvestError::NoCredentials);
        }
        let index = match mode {
            RotationMode::Rotate => 0,
            RotationMode::Pinned(i) if i < pool.len() => i,
            RotationMode::Pinned(i) => {
                return Err(HarvestError::CredentialOutOfRange {
                    index: i,
                    size: pool.len(),
                })
            }
        };
        Ok(Self { pool, mode, index })
    }

    pub fn active(&self) -> &ApiCredential {
        &self.pool[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn advance(&mut self) {
        if self.mode == RotationMode::Rotate {
            self.index = (self.index + 1) % self.pool.len();
        }
    }
}

/// Parsing-service client with bounded retry and key rotation.
pub struct RemoteParseClient {
    backend: Arc<dyn DocumentParser>,
    rotator: CredentialRotator,
    language: String,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl RemoteParseClient {
    /// Build from the credential, language and retry settings in `config`.
    pub fn new(backend: Arc<dyn DocumentParser>, config: &HarvestConfig) -> Result<Self, HarvestError> {
        let rotator = CredentialRotator::new(config.credentials.clone(), config.rotation)?;
        Ok(Self {
            backend,
            rotator,
            language: config.parse_language.clone(),
            max_attempts: config.max_retries.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub fn rotator(&self) -> &CredentialRotator {
        &self.rotator
    }

    /// Parse `path`, retrying up to the configured number of attempts.
    ///
    /// The pause is applied between attempts only. On success the rotator
    /// advances once; on exhaustion it stays put.
    pub async fn parse_with_retry(
        &mut self,
        path: &Path,
        label: &str,
    ) -> Result<Vec<ParsedText>, AttemptError> {
        let mut last_err = String::new();

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                warn!(
                    "{}: parse retry {}/{} after {}ms",
                    label,
                    attempt,
                    self.max_attempts,
                    self.retry_backoff.as_millis()
                );
                sleep(self.retry_backoff).await;
            }

            let credential = self.rotator.active();
            debug!("{}: parsing with key #{} ({})", label, self.rotator.index(), credential);

            match self.backend.parse(path, credential, &self.language).await {
                Ok(segments) if segments.iter().any(|s| !s.text.trim().is_empty()) => {
                    info!("{}: parsed {} segment(s) on attempt {}", label, segments.len(), attempt);
                    self.rotator.advance();
                    return Ok(segments);
                }
                Ok(_) => last_err = ParseServiceError::Empty.to_string(),
                Err(e) => last_err = e.to_string(),
            }
            warn!("{}: parse attempt {} failed: {}", label, attempt, last_err);
        }

        Err(AttemptError::ParseFailure {
            label: label.to_string(),
            attempts: self.max_attempts,
            detail: last_err,
        })
    }
}
