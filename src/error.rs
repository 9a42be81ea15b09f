use std::fmt;

use thiserror::Error;

/// Why a model response could not be turned into an `AnalysisResult`
#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("no JSON array found in model response")]
    NoJsonArrayFound,

    #[error("model response is not valid JSON: {source}")]
    InvalidJson {
        /// The fence-stripped, bracket-sliced text that failed to parse
        sanitized: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("instance {index} is malformed: {source}")]
    MalformedInstance {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl NormalizationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoJsonArrayFound => "no_json_array",
            Self::InvalidJson { .. } => "invalid_json",
            Self::MalformedInstance { .. } => "malformed_instance",
        }
    }
}

/// Terminal failure of one analysis request
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("failed to stage upload: {0}")]
    Staging(#[from] std::io::Error),

    #[error("remote analysis call failed: {0:#}")]
    RemoteCall(anyhow::Error),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

impl AnalysisError {
    /// Stable machine-readable code for the HTTP error body
    pub fn code(&self) -> &'static str {
        match self {
            Self::Input(_) => "bad_request",
            Self::Staging(_) => "staging_failed",
            Self::RemoteCall(_) => "remote_call_failed",
            Self::Normalization(e) => e.code(),
        }
    }
}

/// A temporary artifact that could not be removed. Logged, never propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    pub artifact: String,
    pub reason: String,
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not remove {}: {}", self.artifact, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_per_kind() {
        let invalid = serde_json::from_str::<serde_json::Value>("[").unwrap_err();
        let malformed = serde_json::from_str::<serde_json::Value>("{").unwrap_err();

        let errors = [
            AnalysisError::Input("missing prompt".to_string()),
            AnalysisError::Staging(std::io::Error::other("disk full")),
            AnalysisError::RemoteCall(anyhow::anyhow!("quota exceeded")),
            NormalizationError::NoJsonArrayFound.into(),
            NormalizationError::InvalidJson {
                sanitized: "[".to_string(),
                source: invalid,
            }
            .into(),
            NormalizationError::MalformedInstance {
                index: 0,
                source: malformed,
            }
            .into(),
        ];

        let codes: std::collections::HashSet<_> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), errors.len());
    }
}
