use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ResolutionConfig;
use crate::error::FeedbackError;
use crate::feedback::{
    FeedbackClassification, FeedbackClassifier, FeedbackOutcome, KeywordFeedbackClassifier,
    OutcomeType, truncate_chars,
};
use crate::resolution::{
    ClarificationCandidate, ResolutionDecider, ResolutionDecision, ResolutionDiagnostics,
};
use crate::routines::RoutineCandidate;
use crate::scoring::ChatMembership;
use crate::signals::{ExtractionMethod, KeywordSignalExtractor, SignalExtractor, TargetSignals};

/// Scored candidates kept in turn diagnostics
pub const DIAGNOSTIC_CANDIDATE_LIMIT: usize = 5;

/// Supplies routines eligible for resolution: one user, trailing window,
/// any order.
pub trait CandidateProvider {
    fn get_candidates(
        &self,
        user_id: &str,
        days_back: i64,
    ) -> Result<Vec<RoutineCandidate>, FeedbackError>;
}

/// A resolved (routine, outcome) pair ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeDraft {
    pub user_id: String,
    pub routine_id: String,
    pub outcome_type: OutcomeType,
    pub outcome_text: String,
}

/// Persists episodes. Only ever called for resolved feedback.
pub trait EpisodeRecorder {
    fn record_episode(&self, episode: &EpisodeDraft) -> Result<Uuid, FeedbackError>;
}

/// What the caller gets back for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedbackTurnOutcome {
    Resolved {
        routine_id: String,
        outcome_type: OutcomeType,
        outcome_text: String,
        episode_id: Uuid,
    },
    Clarification {
        candidates: Vec<ClarificationCandidate>,
    },
    Ignore,
}

/// Where the turn stopped in `received → classified → signals_extracted →
/// candidates_fetched → resolved | clarification | ignore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    NotFeedback,
    Resolved,
    Clarification,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDiagnostics {
    pub stage: TurnStage,
    pub detection_method: ExtractionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<TargetSignals>,
    pub candidates_fetched: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionDiagnostics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackTurn {
    pub outcome: FeedbackTurnOutcome,
    pub diagnostics: TurnDiagnostics,
}

/// Runs one feedback message through detection, signal extraction,
/// candidate resolution and (for resolved feedback) episode recording.
///
/// Collaborators are injected; the engine itself keeps no state between
/// turns. Classifier and extractor are optional: without them, or when they
/// fail, the keyword rules are used.
pub struct FeedbackEngine<'a> {
    config: ResolutionConfig,
    candidates: &'a dyn CandidateProvider,
    membership: &'a dyn ChatMembership,
    recorder: &'a dyn EpisodeRecorder,
    classifier: Option<&'a dyn FeedbackClassifier>,
    extractor: Option<&'a dyn SignalExtractor>,
}

impl<'a> FeedbackEngine<'a> {
    pub fn new(
        config: ResolutionConfig,
        candidates: &'a dyn CandidateProvider,
        membership: &'a dyn ChatMembership,
        recorder: &'a dyn EpisodeRecorder,
    ) -> Self {
        Self {
            config,
            candidates,
            membership,
            recorder,
            classifier: None,
            extractor: None,
        }
    }

    pub fn with_classifier(mut self, classifier: &'a dyn FeedbackClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_extractor(mut self, extractor: &'a dyn SignalExtractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    pub fn run_turn(
        &self,
        user_id: &str,
        chat_id: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<FeedbackTurn, FeedbackError> {
        let classification = self.classify(message);
        let detection_method = classification.method;
        if !classification.is_feedback {
            tracing::debug!(user_id, chat_id, method = ?detection_method, "message is not feedback");
            return Ok(FeedbackTurn {
                outcome: FeedbackTurnOutcome::Ignore,
                diagnostics: TurnDiagnostics {
                    stage: TurnStage::NotFeedback,
                    detection_method,
                    signals: None,
                    candidates_fetched: 0,
                    resolution: None,
                },
            });
        }
        let outcome = classification
            .outcome
            .unwrap_or_else(|| FeedbackOutcome {
                outcome_type: OutcomeType::from_message(message),
                outcome_text: truncate_chars(message, self.config.outcome_text_limit),
            });

        let signals = self.extract_signals(message);
        let candidates = self
            .candidates
            .get_candidates(user_id, self.config.candidate_window_days)?;

        let resolution = ResolutionDecider::new(&self.config, now).resolve(
            &candidates,
            &signals,
            chat_id,
            self.membership,
        );

        let (turn_outcome, stage) = match resolution.decision {
            ResolutionDecision::Resolved { routine_id } => {
                let draft = EpisodeDraft {
                    user_id: user_id.to_string(),
                    routine_id,
                    outcome_type: outcome.outcome_type,
                    outcome_text: outcome.outcome_text,
                };
                let episode_id = self.recorder.record_episode(&draft)?;
                (
                    FeedbackTurnOutcome::Resolved {
                        routine_id: draft.routine_id,
                        outcome_type: draft.outcome_type,
                        outcome_text: draft.outcome_text,
                        episode_id,
                    },
                    TurnStage::Resolved,
                )
            }
            ResolutionDecision::Clarification { candidates } => (
                FeedbackTurnOutcome::Clarification { candidates },
                TurnStage::Clarification,
            ),
            ResolutionDecision::Ignore => (FeedbackTurnOutcome::Ignore, TurnStage::Ignored),
        };

        let mut resolution_diagnostics = resolution.diagnostics;
        resolution_diagnostics
            .scored_candidates
            .truncate(DIAGNOSTIC_CANDIDATE_LIMIT);

        tracing::info!(
            user_id,
            chat_id,
            stage = ?stage,
            reason = ?resolution_diagnostics.reason,
            candidates = candidates.len(),
            top_score = ?resolution_diagnostics.top_score,
            "feedback turn finished"
        );

        Ok(FeedbackTurn {
            outcome: turn_outcome,
            diagnostics: TurnDiagnostics {
                stage,
                detection_method,
                signals: Some(signals),
                candidates_fetched: candidates.len(),
                resolution: Some(resolution_diagnostics),
            },
        })
    }

    fn classify(&self, message: &str) -> FeedbackClassification {
        let keyword = KeywordFeedbackClassifier::new(self.config.outcome_text_limit);
        let Some(classifier) = self.classifier else {
            return keyword.classify_message(message);
        };
        match classifier.classify(message) {
            Ok(classification) => classification,
            Err(err) => {
                tracing::warn!(error = %err, "feedback classifier failed; using keyword rules");
                FeedbackClassification {
                    method: ExtractionMethod::Fallback,
                    ..keyword.classify_message(message)
                }
            }
        }
    }

    fn extract_signals(&self, message: &str) -> TargetSignals {
        let Some(extractor) = self.extractor else {
            return KeywordSignalExtractor::extract_signals(message);
        };
        match extractor.extract(message) {
            Ok(signals) => signals,
            Err(err) => {
                tracing::warn!(error = %err, "signal extractor failed; using keyword rules");
                TargetSignals {
                    extraction_method: ExtractionMethod::Fallback,
                    ..KeywordSignalExtractor::extract_signals(message)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeSet;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::{
        CandidateProvider, EpisodeDraft, EpisodeRecorder, FeedbackEngine, FeedbackTurnOutcome,
        TurnStage,
    };
    use crate::config::ResolutionConfig;
    use crate::error::FeedbackError;
    use crate::feedback::{FeedbackClassification, FeedbackClassifier, OutcomeType};
    use crate::resolution::DecisionReason;
    use crate::routines::RoutineCandidate;
    use crate::signals::{ExtractionMethod, SignalExtractor, TargetSignals};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
    }

    struct FixedCandidates(Vec<RoutineCandidate>);

    impl CandidateProvider for FixedCandidates {
        fn get_candidates(
            &self,
            _user_id: &str,
            days_back: i64,
        ) -> Result<Vec<RoutineCandidate>, FeedbackError> {
            assert_eq!(days_back, 60);
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct MemoryRecorder(RefCell<Vec<EpisodeDraft>>);

    impl EpisodeRecorder for MemoryRecorder {
        fn record_episode(&self, episode: &EpisodeDraft) -> Result<Uuid, FeedbackError> {
            self.0.borrow_mut().push(episode.clone());
            Ok(Uuid::nil())
        }
    }

    struct FailingRecorder;

    impl EpisodeRecorder for FailingRecorder {
        fn record_episode(&self, episode: &EpisodeDraft) -> Result<Uuid, FeedbackError> {
            Err(FeedbackError::EpisodeWrite {
                routine_id: episode.routine_id.clone(),
                message: "store offline".to_string(),
            })
        }
    }

    struct BrokenCollaborator;

    impl SignalExtractor for BrokenCollaborator {
        fn extract(&self, _message: &str) -> Result<TargetSignals, FeedbackError> {
            Err(FeedbackError::collaborator("signal extractor", "timeout"))
        }
    }

    impl FeedbackClassifier for BrokenCollaborator {
        fn classify(&self, _message: &str) -> Result<FeedbackClassification, FeedbackError> {
            Err(FeedbackError::collaborator("feedback classifier", "timeout"))
        }
    }

    struct JsonExtractor(&'static str);

    impl SignalExtractor for JsonExtractor {
        fn extract(&self, _message: &str) -> Result<TargetSignals, FeedbackError> {
            TargetSignals::from_collaborator_json(self.0)
        }
    }

    fn routine(id: &str, title: &str, muscles: &[&str], days_ago: i64) -> RoutineCandidate {
        RoutineCandidate {
            id: id.to_string(),
            routine_title: title.to_string(),
            routine_muscles: muscles.iter().map(|m| m.to_string()).collect(),
            routine_exercises: BTreeSet::new(),
            last_mentioned_at: Some((now() - Duration::days(days_ago)).to_rfc3339()),
            existing_outcome_count: 1,
        }
    }

    fn in_chat(_: &str, routine_id: &str) -> bool {
        routine_id == "chest"
    }

    #[test]
    fn non_feedback_message_touches_nothing() {
        let provider = FixedCandidates(vec![routine("chest", "Chest Day", &["chest"], 0)]);
        let recorder = MemoryRecorder::default();
        let engine =
            FeedbackEngine::new(ResolutionConfig::default(), &provider, &in_chat, &recorder);

        let turn = engine
            .run_turn("u-1", "chat-1", "give me a pull workout", now())
            .unwrap();
        assert_eq!(turn.outcome, FeedbackTurnOutcome::Ignore);
        assert_eq!(turn.diagnostics.stage, TurnStage::NotFeedback);
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn resolved_feedback_records_exactly_one_episode() {
        let provider = FixedCandidates(vec![
            routine("legs", "Leg Day", &["quads"], 40),
            routine("chest", "Chest Day", &["chest"], 1),
        ]);
        let recorder = MemoryRecorder::default();
        let engine =
            FeedbackEngine::new(ResolutionConfig::default(), &provider, &in_chat, &recorder);

        let turn = engine
            .run_turn("u-1", "chat-1", "the chest session hurt my shoulder", now())
            .unwrap();

        assert_eq!(
            turn.outcome,
            FeedbackTurnOutcome::Resolved {
                routine_id: "chest".to_string(),
                outcome_type: OutcomeType::Injury,
                outcome_text: "the chest session hurt my shoulder".to_string(),
                episode_id: Uuid::nil(),
            }
        );
        let recorded = recorder.0.borrow();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].user_id, "u-1");
        assert_eq!(recorded[0].routine_id, "chest");
        assert_eq!(turn.diagnostics.candidates_fetched, 2);
        assert_eq!(turn.diagnostics.detection_method, ExtractionMethod::Keyword);
    }

    #[test]
    fn clarification_writes_nothing() {
        let provider = FixedCandidates(vec![
            routine("push-a", "Push A", &[], 0),
            routine("push-b", "Push B", &[], 1),
        ]);
        let recorder = MemoryRecorder::default();
        let never = |_: &str, _: &str| false;
        let engine = FeedbackEngine::new(ResolutionConfig::default(), &provider, &never, &recorder);

        let turn = engine
            .run_turn("u-1", "chat-9", "that was too hard", now())
            .unwrap();
        let FeedbackTurnOutcome::Clarification { candidates } = &turn.outcome else {
            panic!("expected clarification, got {:?}", turn.outcome);
        };
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, "push-a");
        assert_eq!(turn.diagnostics.stage, TurnStage::Clarification);
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn no_candidates_is_ignored_without_error() {
        let provider = FixedCandidates(Vec::new());
        let recorder = MemoryRecorder::default();
        let engine =
            FeedbackEngine::new(ResolutionConfig::default(), &provider, &in_chat, &recorder);

        let turn = engine
            .run_turn("u-1", "chat-1", "loved it", now())
            .unwrap();
        assert_eq!(turn.outcome, FeedbackTurnOutcome::Ignore);
        assert_eq!(
            turn.diagnostics.resolution.unwrap().reason,
            DecisionReason::NoCandidates
        );
    }

    #[test]
    fn failing_collaborators_fall_back_to_keyword_rules() {
        let provider = FixedCandidates(vec![routine("chest", "Chest Day", &["chest"], 0)]);
        let recorder = MemoryRecorder::default();
        let broken = BrokenCollaborator;
        let engine =
            FeedbackEngine::new(ResolutionConfig::default(), &provider, &in_chat, &recorder)
                .with_classifier(&broken)
                .with_extractor(&broken);

        let turn = engine
            .run_turn("u-1", "chat-1", "chest workout felt great", now())
            .unwrap();
        assert!(matches!(turn.outcome, FeedbackTurnOutcome::Resolved { .. }));
        assert_eq!(turn.diagnostics.detection_method, ExtractionMethod::Fallback);
        let signals = turn.diagnostics.signals.unwrap();
        assert_eq!(signals.extraction_method, ExtractionMethod::Fallback);
        assert!(signals.mentioned_muscles.contains("chest"));
    }

    #[test]
    fn collaborator_negation_steers_away_from_recent_routine() {
        let provider = FixedCandidates(vec![
            routine("legs", "Leg Day", &["quads"], 0),
            routine("chest", "Chest Day", &["chest"], 20),
        ]);
        let recorder = MemoryRecorder::default();
        let never = |_: &str, _: &str| false;
        let extractor = JsonExtractor(
            r#"{"mentioned_muscles": ["chest"], "negations": ["leg"]}"#,
        );
        let engine = FeedbackEngine::new(ResolutionConfig::default(), &provider, &never, &recorder)
            .with_extractor(&extractor);

        let turn = engine
            .run_turn("u-1", "chat-1", "not the leg one, the chest one was too hard", now())
            .unwrap();
        let FeedbackTurnOutcome::Resolved { routine_id, .. } = &turn.outcome else {
            panic!("expected resolved, got {:?}", turn.outcome);
        };
        assert_eq!(routine_id, "chest");
        assert_eq!(recorder.0.borrow().len(), 1);
    }

    #[test]
    fn recorder_failure_is_propagated() {
        let provider = FixedCandidates(vec![routine("chest", "Chest Day", &["chest"], 0)]);
        let engine = FeedbackEngine::new(
            ResolutionConfig::default(),
            &provider,
            &in_chat,
            &FailingRecorder,
        );

        let err = engine
            .run_turn("u-1", "chat-1", "completed the chest day", now())
            .unwrap_err();
        assert!(matches!(err, FeedbackError::EpisodeWrite { .. }));
    }

    #[test]
    fn outcome_serializes_to_tagged_shapes() {
        let ignore = serde_json::to_value(FeedbackTurnOutcome::Ignore).unwrap();
        assert_eq!(ignore, serde_json::json!({"type": "ignore"}));

        let resolved = serde_json::to_value(FeedbackTurnOutcome::Resolved {
            routine_id: "r".to_string(),
            outcome_type: OutcomeType::Abandoned,
            outcome_text: "gave up".to_string(),
            episode_id: Uuid::nil(),
        })
        .unwrap();
        assert_eq!(resolved["type"], "resolved");
        assert_eq!(resolved["outcome_type"], "abandoned");
    }
}
