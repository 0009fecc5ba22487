//! FailureAnalyst implementations.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use super::retry::RetryPolicy;
use crate::domain::AnalysisText;
use crate::ports::{AnalysisRequest, AnalystError, FailureAnalyst};

pub const RETRIES_EXHAUSTED: &str = "Error: Maximum retry attempts reached due to rate limiting.";

/// Always answers with the same text.
#[derive(Debug, Clone, Default)]
pub struct StaticAnalyst {
    text: AnalysisText,
}

impl StaticAnalyst {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: AnalysisText::new(text),
        }
    }
}

#[async_trait]
impl FailureAnalyst for StaticAnalyst {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisText, AnalystError> {
        Ok(self.text.clone())
    }
}

/// Reads the report an external analysis job left on disk.
#[derive(Debug, Clone)]
pub struct FileAnalyst {
    path: PathBuf,
}

impl FileAnalyst {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FailureAnalyst for FileAnalyst {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisText, AnalystError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(AnalysisText::new(text.trim())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AnalystError::Unavailable(
                format!("no report at {}", self.path.display()),
            )),
            Err(e) => Err(AnalystError::Other(e.to_string())),
        }
    }
}

/// Retries rate-limited calls and turns every failure into text.
///
/// Never returns `Err`: the analysis is an opaque payload of the cycle
/// record, so a failed analysis is recorded as its error message.
pub struct RetryingAnalyst<A> {
    inner: A,
    policy: RetryPolicy,
}

impl<A: FailureAnalyst> RetryingAnalyst<A> {
    pub fn new(inner: A) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    pub fn with_policy(inner: A, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: FailureAnalyst> FailureAnalyst for RetryingAnalyst<A> {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisText, AnalystError> {
        for attempt in 1..=self.policy.max_attempts {
            match self.inner.analyze(request).await {
                Ok(text) => return Ok(text),
                Err(AnalystError::RateLimited) => {
                    if attempt == self.policy.max_attempts {
                        break;
                    }
                    let delay = self.policy.next_delay(attempt);
                    warn!(attempt, ?delay, "analysis rate limited; retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    info!(error = %err, "analysis failed");
                    return Ok(AnalysisText::new(format!("Error analyzing failures: {err}")));
                }
            }
        }
        warn!(attempts = self.policy.max_attempts, "analysis retries exhausted");
        Ok(AnalysisText::new(RETRIES_EXHAUSTED))
    }
}
