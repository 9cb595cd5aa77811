use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::FeedbackError;

/// Muscle vocabulary for the keyword path. Matched as plain substrings, so
/// "legs" hits "leg" and "lats" hits "lat".
pub const MUSCLE_KEYWORDS: &[&str] = &[
    "chest",
    "shoulder",
    "bicep",
    "tricep",
    "back",
    "leg",
    "quad",
    "hamstring",
    "glute",
    "lat",
    "trap",
    "core",
    "calf",
];

/// How a piece of message understanding was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Deterministic keyword rules
    #[default]
    Keyword,
    /// External text-understanding collaborator
    Collaborator,
    /// Collaborator failed; keyword rules were used instead
    Fallback,
}

/// Everything a feedback message says about *which* routine it concerns.
/// Empty is a valid state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetSignals {
    #[serde(default)]
    pub mentioned_muscles: BTreeSet<String>,
    #[serde(default)]
    pub mentioned_exercises: BTreeSet<String>,
    /// Literal phrases pointing at a routine ("the chest routine")
    #[serde(default)]
    pub explicit_routine_refs: Vec<String>,
    /// Phrases excluding a routine ("not the leg routine")
    #[serde(default)]
    pub negations: Vec<String>,
    /// Informational only; never changes scoring
    #[serde(default)]
    pub extraction_method: ExtractionMethod,
}

impl TargetSignals {
    pub fn total_signals(&self) -> usize {
        self.mentioned_muscles.len() + self.mentioned_exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_signals() == 0
            && self.explicit_routine_refs.is_empty()
            && self.negations.is_empty()
    }

    /// Parse the JSON a richer extraction collaborator returns. Each of the
    /// four lists is optional (`null` counts as absent); anything present
    /// must be a list of strings.
    pub fn from_collaborator_json(raw: &str) -> Result<Self, FeedbackError> {
        let value: serde_json::Value = serde_json::from_str(raw.trim())
            .map_err(|e| FeedbackError::MalformedSignals(format!("invalid JSON: {e}")))?;
        Self::from_collaborator_value(&value)
    }

    pub fn from_collaborator_value(value: &serde_json::Value) -> Result<Self, FeedbackError> {
        let Some(object) = value.as_object() else {
            return Err(FeedbackError::MalformedSignals(
                "expected a JSON object".to_string(),
            ));
        };

        let list = |field: &str| -> Result<Vec<String>, FeedbackError> {
            match object.get(field) {
                None | Some(serde_json::Value::Null) => Ok(Vec::new()),
                Some(serde_json::Value::Array(items)) => items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            FeedbackError::MalformedSignals(format!(
                                "'{field}' must contain only strings"
                            ))
                        })
                    })
                    .collect(),
                Some(_) => Err(FeedbackError::MalformedSignals(format!(
                    "'{field}' must be a list"
                ))),
            }
        };

        Ok(Self {
            mentioned_muscles: normalize_terms(list("mentioned_muscles")?),
            mentioned_exercises: normalize_terms(list("mentioned_exercises")?),
            explicit_routine_refs: non_empty(list("explicit_routine_refs")?),
            negations: non_empty(list("negations")?),
            extraction_method: ExtractionMethod::Collaborator,
        })
    }
}

fn normalize_terms(terms: Vec<String>) -> BTreeSet<String> {
    terms
        .into_iter()
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty())
        .collect()
}

fn non_empty(phrases: Vec<String>) -> Vec<String> {
    phrases
        .into_iter()
        .map(|phrase| phrase.trim().to_string())
        .filter(|phrase| !phrase.is_empty())
        .collect()
}

/// Turns a raw feedback message into target signals.
pub trait SignalExtractor {
    fn extract(&self, message: &str) -> Result<TargetSignals, FeedbackError>;
}

/// Deterministic safety net: muscle keywords only. No exercises, explicit
/// references or negations are ever produced here.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordSignalExtractor;

impl KeywordSignalExtractor {
    pub fn extract_signals(message: &str) -> TargetSignals {
        let lowered = message.to_lowercase();
        TargetSignals {
            mentioned_muscles: MUSCLE_KEYWORDS
                .iter()
                .filter(|muscle| lowered.contains(*muscle))
                .map(|muscle| muscle.to_string())
                .collect(),
            ..TargetSignals::default()
        }
    }
}

impl SignalExtractor for KeywordSignalExtractor {
    fn extract(&self, message: &str) -> Result<TargetSignals, FeedbackError> {
        Ok(Self::extract_signals(message))
    }
}
