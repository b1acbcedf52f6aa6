use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::llm_client::prompts::{EXTRACTION_INSTRUCTION, EXTRACTION_SYSTEM};
use crate::llm_client::repair::parse_model_output;
use crate::llm_client::{ChatMessage, CompletionRequest, ExtractionService, ServiceError};
use crate::models::resume::NormalizedRecord;
use crate::normalizer::schedule::{Backoff, RetryPolicy};

const COMPLETE_STATUSES: &[&str] = &["processed", "completed", "ready", "finished", "success", "ok"];

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("document upload failed: {0}")]
    UploadFailed(#[source] ServiceError),

    #[error("file {file_id} not processed after {attempts} status checks (last status: {last_status:?})")]
    ProcessingTimeout {
        file_id: String,
        attempts: u32,
        last_status: Option<String>,
    },

    #[error("extraction failed for file {file_id}: {detail}")]
    ExtractionFailed {
        file_id: String,
        detail: String,
        /// Raw service response, when one was received.
        raw: Option<String>,
    },
}

/// Stages of one normalization, logged as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Uploaded,
    Ready,
    Extracting,
    Standardized,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Uploaded => "UPLOADED",
            Stage::Ready => "READY",
            Stage::Extracting => "EXTRACTING",
            Stage::Standardized => "STANDARDIZED",
            Stage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    pub model: String,
    pub max_tokens: u32,
    pub poll: RetryPolicy,
    pub complete_statuses: Vec<String>,
    pub extraction_attempts: u32,
    /// Applied when the service signals rate limiting.
    pub rate_limit_backoff: Backoff,
    /// Applied to every other failed extraction request.
    pub transient_backoff: Backoff,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            model: crate::llm_client::DEFAULT_MODEL.to_string(),
            max_tokens: 32_000,
            poll: RetryPolicy::new(3, Backoff::Fixed(Duration::from_secs(15))),
            complete_statuses: COMPLETE_STATUSES.iter().map(|s| s.to_string()).collect(),
            extraction_attempts: 3,
            rate_limit_backoff: Backoff::Linear(Duration::from_secs(15)),
            transient_backoff: Backoff::Fixed(Duration::from_secs(8)),
        }
    }
}

impl From<&Config> for NormalizerConfig {
    fn from(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            model: config.llm_model.clone(),
            poll: RetryPolicy::new(
                config.poll_attempts,
                Backoff::Fixed(Duration::from_secs(config.poll_interval_secs)),
            ),
            extraction_attempts: config.extraction_attempts.max(1),
            ..defaults
        }
    }
}

/// Output of a successful normalization.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub file_id: String,
    pub record: NormalizedRecord,
}

/// Drives one document through upload → poll → extract → standardize.
#[derive(Clone)]
pub struct Normalizer {
    service: Arc<dyn ExtractionService>,
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(service: Arc<dyn ExtractionService>, config: NormalizerConfig) -> Self {
        Self { service, config }
    }

    pub async fn normalize(
        &self,
        bytes: Bytes,
        filename: &str,
    ) -> Result<Normalized, NormalizeError> {
        let file_id = match self.service.upload_file(bytes, filename).await {
            Ok(id) => id,
            Err(e) => {
                warn!(stage = %Stage::Failed, "Upload of {filename} failed: {e}");
                return Err(NormalizeError::UploadFailed(e));
            }
        };
        info!(stage = %Stage::Uploaded, file_id = %file_id, "Uploaded {filename}");

        let result = self.process(&file_id).await;
        if let Err(e) = &result {
            warn!(stage = %Stage::Failed, file_id = %file_id, "{e}");
        }
        result.map(|record| Normalized { file_id, record })
    }

    async fn process(&self, file_id: &str) -> Result<NormalizedRecord, NormalizeError> {
        self.wait_until_processed(file_id).await?;
        info!(stage = %Stage::Ready, file_id = %file_id, "File processed by service");

        let raw = self.extract(file_id).await?;
        let record = standardize(file_id, raw)?;
        info!(
            stage = %Stage::Standardized,
            file_id = %file_id,
            "Standardized résumé for {}",
            record.display_name()
        );
        Ok(record)
    }

    fn is_complete(&self, status: &str) -> bool {
        let status = status.trim();
        self.config
            .complete_statuses
            .iter()
            .any(|s| s.eq_ignore_ascii_case(status))
    }

    async fn wait_until_processed(&self, file_id: &str) -> Result<(), NormalizeError> {
        let policy = self.config.poll;
        let mut last_status = None;

        for attempt in 1..=policy.max_attempts {
            match self.service.file_status(file_id).await {
                Ok(status) if self.is_complete(&status) => return Ok(()),
                Ok(status) => {
                    debug!(file_id = %file_id, "Status check {attempt}/{}: {status}", policy.max_attempts);
                    last_status = Some(status);
                }
                Err(e) => warn!(file_id = %file_id, "Status check {attempt} failed: {e}"),
            }

            if let Some(delay) = policy.next_delay(attempt) {
                tokio::time::sleep(delay).await;
            }
        }

        Err(NormalizeError::ProcessingTimeout {
            file_id: file_id.to_string(),
            attempts: policy.max_attempts,
            last_status,
        })
    }

    async fn extract(&self, file_id: &str) -> Result<String, NormalizeError> {
        let content = self
            .with_retry(file_id, "reading extracted content", || {
                self.service.file_content(file_id)
            })
            .await?;

        let request = CompletionRequest::json_object(
            &self.config.model,
            vec![
                ChatMessage::system(EXTRACTION_SYSTEM),
                ChatMessage::system(content),
                ChatMessage::user(EXTRACTION_INSTRUCTION),
            ],
            self.config.max_tokens,
        );

        info!(stage = %Stage::Extracting, file_id = %file_id, "Requesting extraction");
        self.with_retry(file_id, "extraction", || self.service.complete(&request))
            .await
    }

    /// Runs a service call up to `extraction_attempts` times, backing off
    /// linearly after a rate limit and by a fixed delay otherwise.
    async fn with_retry<T, F, Fut>(
        &self,
        file_id: &str,
        what: &str,
        mut call: F,
    ) -> Result<T, NormalizeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let max_attempts = self.config.extraction_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if attempt >= max_attempts {
                return Err(NormalizeError::ExtractionFailed {
                    file_id: file_id.to_string(),
                    detail: format!("{what} gave up after {attempt} attempts: {err}"),
                    raw: None,
                });
            }

            let delay = if err.is_rate_limited() {
                self.config.rate_limit_backoff.delay_after(attempt)
            } else {
                self.config.transient_backoff.delay_after(attempt)
            };
            warn!(
                file_id = %file_id,
                "{what} attempt {attempt} failed, retrying after {}s: {err}",
                delay.as_secs()
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Repairs and decodes the raw response. Nothing partial is returned.
fn standardize(file_id: &str, raw: String) -> Result<NormalizedRecord, NormalizeError> {
    let value = match parse_model_output(&raw) {
        Ok(value) => value,
        Err(e) => {
            return Err(NormalizeError::ExtractionFailed {
                file_id: file_id.to_string(),
                detail: e.to_string(),
                raw: Some(raw),
            })
        }
    };

    NormalizedRecord::from_model_output(value).map_err(|e| NormalizeError::ExtractionFailed {
        file_id: file_id.to_string(),
        detail: format!("response does not match the résumé layout: {e}"),
        raw: Some(raw),
    })
}
