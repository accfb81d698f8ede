use serde::{Deserialize, Serialize};
use std::fmt;

/// Text submitted for classification. Built by the query extractor, so a
/// value of this type always carries the required `text` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMode {
    /// Multi-class sentiment, e.g. a star rating.
    Multi,
    /// Positive / negative sentiment.
    Binary,
}

impl ClassificationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Multi => "multi",
            Self::Binary => "binary",
        }
    }

    pub(crate) fn description(&self) -> &'static str {
        match self {
            Self::Multi => "multi-class",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for ClassificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
