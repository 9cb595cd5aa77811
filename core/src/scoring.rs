use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ResolutionConfig;
use crate::routines::RoutineCandidate;
use crate::signals::TargetSignals;

/// Same-chat membership check supplied by the caller.
pub trait ChatMembership {
    fn routine_mentioned_in_chat(&self, chat_id: &str, routine_id: &str) -> bool;
}

impl<F> ChatMembership for F
where
    F: Fn(&str, &str) -> bool,
{
    fn routine_mentioned_in_chat(&self, chat_id: &str, routine_id: &str) -> bool {
        self(chat_id, routine_id)
    }
}

/// Per-candidate score components. `total` is always their exact sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub recency: f64,
    pub same_chat: f64,
    pub missing_outcome: f64,
    pub target_match: f64,
    pub negation: f64,
    pub total: f64,
}

impl ScoreBreakdown {
    fn new(
        recency: f64,
        same_chat: f64,
        missing_outcome: f64,
        target_match: f64,
        negation: f64,
    ) -> Self {
        Self {
            recency,
            same_chat,
            missing_outcome,
            target_match,
            negation,
            total: recency + same_chat + missing_outcome + target_match + negation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub routine_id: String,
    pub title: String,
    pub total_score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub muscles: Vec<String>,
}

/// Deterministic, explainable scoring of routine candidates against the
/// signals of one feedback message. `now` is fixed per scorer so repeated
/// runs over the same inputs are identical.
#[derive(Debug, Clone, Copy)]
pub struct CandidateScorer<'a> {
    config: &'a ResolutionConfig,
    now: DateTime<Utc>,
}

impl<'a> CandidateScorer<'a> {
    pub fn new(config: &'a ResolutionConfig, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    /// Score every candidate and sort by total, highest first. Ties keep
    /// the incoming candidate order.
    pub fn score_candidates(
        &self,
        candidates: &[RoutineCandidate],
        signals: &TargetSignals,
        chat_id: &str,
        membership: &dyn ChatMembership,
    ) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates
            .iter()
            .map(|candidate| {
                let breakdown = self.breakdown(candidate, signals, chat_id, membership);
                tracing::debug!(
                    routine_id = %candidate.id,
                    recency = breakdown.recency,
                    same_chat = breakdown.same_chat,
                    missing_outcome = breakdown.missing_outcome,
                    target_match = breakdown.target_match,
                    negation = breakdown.negation,
                    total = breakdown.total,
                    "scored routine candidate"
                );
                ScoredCandidate {
                    routine_id: candidate.id.clone(),
                    title: candidate.routine_title.clone(),
                    total_score: breakdown.total,
                    score_breakdown: breakdown,
                    muscles: candidate.routine_muscles.iter().cloned().collect(),
                }
            })
            .collect();

        scored.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        scored
    }

    pub fn breakdown(
        &self,
        candidate: &RoutineCandidate,
        signals: &TargetSignals,
        chat_id: &str,
        membership: &dyn ChatMembership,
    ) -> ScoreBreakdown {
        let same_chat = if membership.routine_mentioned_in_chat(chat_id, &candidate.id) {
            self.config.same_chat_bonus
        } else {
            0.0
        };
        let missing_outcome = if candidate.existing_outcome_count == 0 {
            self.config.missing_outcome_bonus
        } else {
            0.0
        };

        ScoreBreakdown::new(
            self.recency_score(candidate),
            same_chat,
            missing_outcome,
            self.target_match_score(candidate, signals),
            self.negation_score(candidate, signals),
        )
    }

    /// Linear decay from `recency_max` today to zero at the horizon.
    /// Missing or unparsable timestamps score zero.
    pub fn recency_score(&self, candidate: &RoutineCandidate) -> f64 {
        let Some(days_since) = candidate.days_since_mention(self.now) else {
            return 0.0;
        };
        let horizon = self.config.recency_horizon_days.max(1) as f64;
        (self.config.recency_max * (1.0 - days_since as f64 / horizon)).max(0.0)
    }

    /// Share of the message's muscle/exercise signals found in the routine.
    /// Extra routine content the user did not mention costs nothing.
    pub fn target_match_score(
        &self,
        candidate: &RoutineCandidate,
        signals: &TargetSignals,
    ) -> f64 {
        let total_signals = signals.total_signals();
        if total_signals == 0 {
            return 0.0;
        }

        let matched_muscles = signals
            .mentioned_muscles
            .iter()
            .filter(|muscle| candidate.routine_muscles.contains(*muscle))
            .count();
        let matched_exercises = signals
            .mentioned_exercises
            .iter()
            .filter(|exercise| candidate.has_exercise(exercise))
            .count();

        self.config.target_match_max * (matched_muscles + matched_exercises) as f64
            / total_signals as f64
    }

    pub fn negation_score(&self, candidate: &RoutineCandidate, signals: &TargetSignals) -> f64 {
        if Self::is_negated(candidate, signals) {
            self.config.negation_penalty
        } else {
            0.0
        }
    }

    /// One negated phrase found in the title or a muscle tag is enough.
    pub fn is_negated(candidate: &RoutineCandidate, signals: &TargetSignals) -> bool {
        let title = candidate.routine_title.to_lowercase();
        signals
            .negations
            .iter()
            .map(|phrase| phrase.trim().to_lowercase())
            .filter(|phrase| !phrase.is_empty())
            .any(|phrase| {
                title.contains(&phrase)
                    || candidate
                        .routine_muscles
                        .iter()
                        .any(|muscle| muscle.contains(&phrase))
            })
    }
}
