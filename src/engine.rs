use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::types::{ClassificationMode, ClassificationResult};

/// A sentiment model the gateway forwards validated text to.
#[async_trait]
pub trait Classifier {
    async fn classify(
        &self,
        text: &str,
        mode: ClassificationMode,
    ) -> Result<ClassificationResult, BackendError>;
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("classification backend failed: {0}")]
    Failed(String),

    #[error("classification backend timed out after {0:?}")]
    Timeout(Duration),
}

impl BackendError {
    pub fn failed(msg: impl Into<String>) -> Self {
        BackendError::Failed(msg.into())
    }
}

/// Calls `classifier` once, bounded by `timeout`. Never retries.
#[tracing::instrument(skip(classifier, text), fields(text_len = text.len()))]
pub async fn classify_with_timeout(
    classifier: &(dyn Classifier + Send + Sync),
    text: &str,
    mode: ClassificationMode,
    timeout: Duration,
) -> Result<ClassificationResult, BackendError> {
    match tokio::time::timeout(timeout, classifier.classify(text, mode)).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(timeout)),
    }
}
