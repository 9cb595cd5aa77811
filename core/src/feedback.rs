use serde::{Deserialize, Serialize};

use crate::error::FeedbackError;
use crate::signals::ExtractionMethod;

pub const DEFAULT_OUTCOME_TEXT_LIMIT: usize = 200;

pub const FEEDBACK_KEYWORDS: &[&str] = &[
    "too hard",
    "worked well",
    "didn't like",
    "completed",
    "stopped",
    "hurt",
    "injury",
    "pain",
    "abandoned",
    "finished",
    "loved",
    "hated",
    "too easy",
    "felt great",
    "couldn't finish",
    "gave up",
];

const INJURY_KEYWORDS: &[&str] = &["hurt", "injury", "pain", "injured"];
const ABANDONED_KEYWORDS: &[&str] = &["stopped", "abandoned", "gave up"];
const POSITIVE_KEYWORDS: &[&str] = &["worked", "loved", "great", "good", "completed"];

/// What the user reports happened with a routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeType {
    Positive,
    Negative,
    Injury,
    Abandoned,
}

impl OutcomeType {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeType::Positive => "positive",
            OutcomeType::Negative => "negative",
            OutcomeType::Injury => "injury",
            OutcomeType::Abandoned => "abandoned",
        }
    }

    /// Lenient parse for collaborator output; anything unknown is negative.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "positive" => OutcomeType::Positive,
            "injury" => OutcomeType::Injury,
            "abandoned" => OutcomeType::Abandoned,
            _ => OutcomeType::Negative,
        }
    }

    /// Keyword categories in priority order; first hit wins.
    pub fn from_message(message: &str) -> Self {
        let lowered = message.to_lowercase();
        let hits = |keywords: &[&str]| keywords.iter().any(|kw| lowered.contains(kw));
        if hits(INJURY_KEYWORDS) {
            OutcomeType::Injury
        } else if hits(ABANDONED_KEYWORDS) {
            OutcomeType::Abandoned
        } else if hits(POSITIVE_KEYWORDS) {
            OutcomeType::Positive
        } else {
            OutcomeType::Negative
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    pub outcome_type: OutcomeType,
    /// Short verbatim description, bounded in characters
    pub outcome_text: String,
}

/// Upstream verdict on a message: is it feedback, and if so what kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackClassification {
    pub is_feedback: bool,
    /// Present exactly when `is_feedback` is true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<FeedbackOutcome>,
    pub method: ExtractionMethod,
}

impl FeedbackClassification {
    pub fn not_feedback(method: ExtractionMethod) -> Self {
        Self {
            is_feedback: false,
            outcome: None,
            method,
        }
    }

    /// Parse `{is_feedback, outcome_type?, outcome_text?}` from a classifier
    /// collaborator. Missing outcome details fall back to the message itself.
    pub fn from_collaborator_json(
        raw: &str,
        message: &str,
        outcome_text_limit: usize,
    ) -> Result<Self, FeedbackError> {
        let value: serde_json::Value = serde_json::from_str(raw.trim()).map_err(|e| {
            FeedbackError::MalformedClassification(format!("invalid JSON: {e}"))
        })?;
        let Some(object) = value.as_object() else {
            return Err(FeedbackError::MalformedClassification(
                "expected a JSON object".to_string(),
            ));
        };

        let is_feedback = match object.get("is_feedback") {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(_) => {
                return Err(FeedbackError::MalformedClassification(
                    "'is_feedback' must be a boolean".to_string(),
                ));
            }
        };
        if !is_feedback {
            return Ok(Self::not_feedback(ExtractionMethod::Collaborator));
        }

        let outcome_type = object
            .get("outcome_type")
            .and_then(|v| v.as_str())
            .map(OutcomeType::parse_lenient)
            .unwrap_or(OutcomeType::Negative);
        let outcome_text = object
            .get("outcome_text")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(message);

        Ok(Self {
            is_feedback: true,
            outcome: Some(FeedbackOutcome {
                outcome_type,
                outcome_text: truncate_chars(outcome_text, outcome_text_limit),
            }),
            method: ExtractionMethod::Collaborator,
        })
    }
}

/// Decides whether a message is feedback and classifies its outcome.
pub trait FeedbackClassifier {
    fn classify(&self, message: &str) -> Result<FeedbackClassification, FeedbackError>;
}

#[derive(Debug, Clone, Copy)]
pub struct KeywordFeedbackClassifier {
    pub outcome_text_limit: usize,
}

impl Default for KeywordFeedbackClassifier {
    fn default() -> Self {
        Self {
            outcome_text_limit: DEFAULT_OUTCOME_TEXT_LIMIT,
        }
    }
}

impl KeywordFeedbackClassifier {
    pub fn new(outcome_text_limit: usize) -> Self {
        Self { outcome_text_limit }
    }

    pub fn is_feedback(message: &str) -> bool {
        let lowered = message.to_lowercase();
        FEEDBACK_KEYWORDS.iter().any(|kw| lowered.contains(kw))
    }

    pub fn classify_message(&self, message: &str) -> FeedbackClassification {
        if !Self::is_feedback(message) {
            return FeedbackClassification::not_feedback(ExtractionMethod::Keyword);
        }
        FeedbackClassification {
            is_feedback: true,
            outcome: Some(FeedbackOutcome {
                outcome_type: OutcomeType::from_message(message),
                outcome_text: truncate_chars(message, self.outcome_text_limit),
            }),
            method: ExtractionMethod::Keyword,
        }
    }
}

impl FeedbackClassifier for KeywordFeedbackClassifier {
    fn classify(&self, message: &str) -> Result<FeedbackClassification, FeedbackError> {
        Ok(self.classify_message(message))
    }
}

pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
