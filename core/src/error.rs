use serde::Serialize;

/// Failures that can surface around the resolution engine.
///
/// Scoring and the decision policy never fail; everything here comes from
/// a collaborator (extractor, classifier, episode store) misbehaving.
#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    /// The signal extraction collaborator returned something we cannot read
    #[error("malformed target signals: {0}")]
    MalformedSignals(String),
    /// The feedback classification collaborator returned something we cannot read
    #[error("malformed feedback classification: {0}")]
    MalformedClassification(String),
    /// A collaborator call failed outright
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },
    /// Persisting a resolved episode failed
    #[error("failed to record episode for routine '{routine_id}': {message}")]
    EpisodeWrite { routine_id: String, message: String },
}

impl FeedbackError {
    pub fn collaborator(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Collaborator {
            collaborator,
            message: message.into(),
        }
    }

    /// Machine-readable code for the structured error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedSignals(_) | Self::MalformedClassification(_) => {
                codes::MALFORMED_COLLABORATOR_OUTPUT
            }
            Self::Collaborator { .. } => codes::COLLABORATOR_FAILED,
            Self::EpisodeWrite { .. } => codes::EPISODE_WRITE_FAILED,
        }
    }
}

/// Structured error body for agents.
/// Printed as JSON by tools wrapping the engine.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. "invalid_input", "episode_write_failed")
    pub error: String,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

impl ErrorBody {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            docs_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.docs_hint = Some(hint.into());
        self
    }
}

impl From<&FeedbackError> for ErrorBody {
    fn from(err: &FeedbackError) -> Self {
        ErrorBody::new(err.code(), err.to_string())
    }
}

/// Error codes used across Spotter tools
pub mod codes {
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const MALFORMED_COLLABORATOR_OUTPUT: &str = "malformed_collaborator_output";
    pub const COLLABORATOR_FAILED: &str = "collaborator_failed";
    pub const EPISODE_WRITE_FAILED: &str = "episode_write_failed";
    pub const CLI_ERROR: &str = "cli_error";
}
