use chrono::{DateTime, Utc};
use serde::Deserialize;
use spotter_core::error::FeedbackError;
use spotter_core::pipeline::CandidateProvider;
use spotter_core::routines::RoutineCandidate;
use spotter_core::scoring::ChatMembership;
use spotter_core::signals::{SignalExtractor, TargetSignals};

/// One feedback turn captured as a file: the message, the routines the
/// candidate store would return, and which of them the chat mentioned.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub user_id: String,
    pub chat_id: String,
    pub message: String,
    /// Evaluation time; defaults to the wall clock
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
    #[serde(default)]
    pub candidates: Vec<ScenarioCandidate>,
    /// Routine ids referenced in `chat_id`
    #[serde(default)]
    pub chat_routines: Vec<String>,
    /// Raw output of a richer signal extractor, replayed verbatim
    #[serde(default)]
    pub extracted_signals: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioCandidate {
    pub id: String,
    /// Stored routine document (`{title, sessions: [...]}`)
    pub routine: serde_json::Value,
    #[serde(default)]
    pub last_mentioned_at: Option<String>,
    #[serde(default)]
    pub existing_outcomes: u32,
}

impl Scenario {
    pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
        serde_json::from_value(value).map_err(|e| format!("Invalid scenario: {e}"))
    }

    pub fn evaluation_time(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    pub fn recorded_extractor(&self) -> Option<RecordedSignals<'_>> {
        self.extracted_signals.as_ref().map(RecordedSignals)
    }
}

impl CandidateProvider for Scenario {
    /// Routines mentioned within the last `days_back` whole days of the
    /// evaluation time. Routine documents that are not JSON objects are
    /// skipped, the same way the store drops rows it cannot decode. A
    /// routine without a readable mention time is kept and scores no
    /// recency.
    fn get_candidates(
        &self,
        user_id: &str,
        days_back: i64,
    ) -> Result<Vec<RoutineCandidate>, FeedbackError> {
        if user_id != self.user_id {
            return Ok(Vec::new());
        }
        let now = self.evaluation_time();
        Ok(self
            .candidates
            .iter()
            .filter(|candidate| {
                let decodable = candidate.routine.is_object();
                if !decodable {
                    tracing::warn!(routine_id = %candidate.id, "skipping undecodable routine document");
                }
                decodable
            })
            .map(|candidate| {
                RoutineCandidate::from_routine_document(
                    candidate.id.clone(),
                    &candidate.routine,
                    candidate.last_mentioned_at.clone(),
                    candidate.existing_outcomes,
                )
            })
            .filter(|candidate| match candidate.days_since_mention(now) {
                Some(days) if days >= days_back => {
                    tracing::debug!(
                        routine_id = %candidate.id,
                        days_since_mention = days,
                        days_back,
                        "routine outside candidate window"
                    );
                    false
                }
                _ => true,
            })
            .collect())
    }
}

impl ChatMembership for Scenario {
    fn routine_mentioned_in_chat(&self, chat_id: &str, routine_id: &str) -> bool {
        chat_id == self.chat_id && self.chat_routines.iter().any(|id| id == routine_id)
    }
}

/// Replays a captured extractor response.
pub struct RecordedSignals<'a>(&'a serde_json::Value);

impl SignalExtractor for RecordedSignals<'_> {
    fn extract(&self, _message: &str) -> Result<TargetSignals, FeedbackError> {
        TargetSignals::from_collaborator_value(self.0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use spotter_core::pipeline::CandidateProvider;
    use spotter_core::scoring::ChatMembership;
    use spotter_core::signals::SignalExtractor;

    use super::Scenario;

    fn scenario() -> Scenario {
        Scenario::from_value(json!({
            "user_id": "u-1",
            "chat_id": "chat-1",
            "message": "the push day was too hard",
            "now": "2026-02-01T12:00:00Z",
            "candidates": [
                {
                    "id": "push",
                    "routine": {"title": "Push Day", "sessions": [
                        {"exercises": [{"name": "Bench Press", "primary_muscle": "chest"}]}
                    ]},
                    "last_mentioned_at": "2026-01-31 09:00:00",
                    "existing_outcomes": 1
                },
                {"id": "broken", "routine": "not a document"}
            ],
            "chat_routines": ["push"],
            "extracted_signals": {"explicit_routine_refs": ["push day"]}
        }))
        .unwrap()
    }

    #[test]
    fn provider_skips_undecodable_documents() {
        let scenario = scenario();
        let candidates = scenario.get_candidates("u-1", 60).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].routine_title, "Push Day");
        assert!(candidates[0].routine_exercises.contains("bench press"));
        assert_eq!(candidates[0].existing_outcome_count, 1);
    }

    #[test]
    fn provider_drops_routines_outside_the_window() {
        let scenario = Scenario::from_value(json!({
            "user_id": "u-1",
            "chat_id": "chat-1",
            "message": "the chest routine was too hard",
            "now": "2026-06-01T12:00:00Z",
            "candidates": [
                {"id": "stale", "routine": {"title": "Chest Routine"},
                 "last_mentioned_at": "2025-01-01T12:00:00Z"},
                {"id": "edge", "routine": {"title": "Back Routine"},
                 "last_mentioned_at": "2026-04-02T12:00:00Z"},
                {"id": "recent", "routine": {"title": "Leg Routine"},
                 "last_mentioned_at": "2026-05-20T12:00:00Z"},
                {"id": "undated", "routine": {"title": "Core Routine"}}
            ],
            "extracted_signals": {"explicit_routine_refs": ["chest routine"]}
        }))
        .unwrap();

        let ids: Vec<String> = scenario
            .get_candidates("u-1", 60)
            .unwrap()
            .into_iter()
            .map(|candidate| candidate.id)
            .collect();
        assert_eq!(ids, vec!["recent", "undated"]);
    }

    #[test]
    fn provider_is_scoped_to_the_scenario_user() {
        assert!(scenario().get_candidates("someone-else", 60).unwrap().is_empty());
    }

    #[test]
    fn membership_requires_matching_chat() {
        let scenario = scenario();
        assert!(scenario.routine_mentioned_in_chat("chat-1", "push"));
        assert!(!scenario.routine_mentioned_in_chat("chat-2", "push"));
        assert!(!scenario.routine_mentioned_in_chat("chat-1", "broken"));
    }

    #[test]
    fn recorded_signals_replay_collaborator_output() {
        let scenario = scenario();
        let extractor = scenario.recorded_extractor().unwrap();
        let signals = extractor.extract(&scenario.message).unwrap();
        assert_eq!(signals.explicit_routine_refs, vec!["push day"]);
    }

    #[test]
    fn scenario_requires_message() {
        let err = Scenario::from_value(json!({"user_id": "u", "chat_id": "c"})).unwrap_err();
        assert!(err.contains("message"));
    }
}
